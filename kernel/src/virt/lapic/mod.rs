//! Local APIC emulation: one virtual interrupt controller per vCPU.
//!
//! Mirrors the structure of [`super::vmx`] and [`super::devices`]: a plain
//! data module (`registers`), a routing algorithm module (`router`), and a
//! guest-facing surface (`mmio`) wired together here behind a
//! process-wide singleton, the same shape [`crate::arch::x86_64::apic`]
//! uses for the real hardware driver.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::sync::Arc;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use spin::RwLock;

use crate::error::KernelError;
use crate::sync::once_lock::OnceLock;

pub mod bitmap;
pub mod mmio;
pub mod queue;
pub mod registers;
pub mod router;
pub mod timer;

use queue::IrqQueue;
use registers::{Icr, LapicRegs};

/// Errors raised by the LAPIC emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapicError {
    InvalidVector { vector: u8 },
    DisabledApic,
    ReadOnly { offset: u32 },
    Unhandled { offset: u32 },
    InvalidLength { len: usize },
    NoSuchDestination { apic_id: u8 },
    BadDestinationFormat { model: u8 },
    UnsupportedDeliveryMode { mode: u8 },
    StateMismatch { expected: &'static str, actual: &'static str },
    NotInitialized,
    InvalidVcpu { index: usize },
}

impl core::fmt::Display for LapicError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidVector { vector } => write!(f, "vector {} is reserved", vector),
            Self::DisabledApic => write!(f, "APIC is software-disabled"),
            Self::ReadOnly { offset } => write!(f, "register at offset 0x{:x} is read-only", offset),
            Self::Unhandled { offset } => write!(f, "no register at offset 0x{:x}", offset),
            Self::InvalidLength { len } => write!(f, "unsupported access width: {} bytes", len),
            Self::NoSuchDestination { apic_id } => {
                write!(f, "no LAPIC with id {}", apic_id)
            }
            Self::BadDestinationFormat { model } => {
                write!(f, "unrecognized destination format model 0x{:x}", model)
            }
            Self::UnsupportedDeliveryMode { mode } => {
                write!(f, "delivery mode {} not supported for this source", mode)
            }
            Self::StateMismatch { expected, actual } => {
                write!(f, "expected lifecycle state {}, found {}", expected, actual)
            }
            Self::NotInitialized => write!(f, "LAPIC device state not initialized"),
            Self::InvalidVcpu { index } => write!(f, "no vCPU at index {}", index),
        }
    }
}

impl From<LapicError> for KernelError {
    fn from(e: LapicError) -> Self {
        KernelError::InvalidArgument {
            name: "lapic",
            value: match e {
                LapicError::InvalidVector { .. } => "invalid_vector",
                LapicError::DisabledApic => "disabled_apic",
                LapicError::ReadOnly { .. } => "read_only_register",
                LapicError::Unhandled { .. } => "unhandled_offset",
                LapicError::InvalidLength { .. } => "invalid_access_length",
                LapicError::NoSuchDestination { .. } => "no_such_destination",
                LapicError::BadDestinationFormat { .. } => "bad_destination_format",
                LapicError::UnsupportedDeliveryMode { .. } => "unsupported_delivery_mode",
                LapicError::StateMismatch { .. } => "state_mismatch",
                LapicError::NotInitialized => "not_initialized",
                LapicError::InvalidVcpu { .. } => "invalid_vcpu",
            },
        }
    }
}

/// Seam onto the owning vCPU: the LAPIC triggers delivery and lifecycle
/// transitions, but never runs guest code itself. Grounded on the
/// INIT/SIPI handshake in [`crate::sched::smp::cpu_up`] and the
/// host-thread-kick used by [`crate::sched::smp::send_ipi`]; the VM-barrier
/// lock this seam stands in for lives entirely on the implementer's side.
pub trait VcpuControl: Send + Sync {
    /// Wake the owning vCPU so it notices newly queued work.
    fn kick(&self);
    /// Reset architectural state and begin execution at `entry_point`
    /// (the real-mode segment:offset encoded the way a startup IPI vector
    /// does, left to the implementer to interpret).
    fn reset_and_start(&self, entry_point: u64);
    /// Whether this vCPU runs on a different host thread/core than the
    /// caller, i.e. whether `kick` crosses a real scheduling boundary.
    fn is_remote(&self) -> bool;
}

/// No-op [`VcpuControl`] for unit tests that only inspect LAPIC-local
/// state (queue contents, register values) and never need a live vCPU.
pub struct NullVcpu;

impl VcpuControl for NullVcpu {
    fn kick(&self) {}
    fn reset_and_start(&self, _entry_point: u64) {}
    fn is_remote(&self) -> bool {
        false
    }
}

/// [`VcpuControl`] backed by the real SMP bring-up/IPI path.
pub struct SmpVcpu {
    cpu_id: u8,
}

impl SmpVcpu {
    pub fn new(cpu_id: u8) -> Self {
        Self { cpu_id }
    }
}

impl VcpuControl for SmpVcpu {
    fn kick(&self) {
        crate::sched::smp::send_ipi(self.cpu_id, registers::RESCHEDULE_VECTOR);
    }

    fn reset_and_start(&self, entry_point: u64) {
        crate::log_service::klog(
            crate::log_service::LogLevel::Info,
            "lapic",
            "starting application processor via SIPI handshake",
        );
        let _ = entry_point;
        let _ = crate::sched::smp::cpu_up(self.cpu_id);
    }

    fn is_remote(&self) -> bool {
        self.cpu_id != crate::sched::smp::current_cpu_id()
    }
}

/// One emulated LAPIC: its register file, its inbound IRQ queue, and the
/// seam back onto the vCPU it belongs to.
#[cfg(feature = "alloc")]
pub struct Lapic {
    pub(crate) regs: RwLock<LapicRegs>,
    pub(crate) queue: IrqQueue,
    pub(crate) vcpu: Arc<dyn VcpuControl>,
}

/// The whole virtual interrupt-controller device: every vCPU's LAPIC,
/// indexed the same way the vCPU array itself is indexed.
#[cfg(feature = "alloc")]
pub struct LapicDeviceState {
    pub(crate) lapics: Vec<Lapic>,
}

#[cfg(feature = "alloc")]
impl LapicDeviceState {
    /// Build one LAPIC per entry in `vcpus`. Index 0 is the boot
    /// processor; every other LAPIC starts in the INIT lifecycle state
    /// awaiting a startup IPI, matching real multiprocessor bring-up.
    pub fn with_vcpus(vcpus: Vec<Arc<dyn VcpuControl>>) -> Self {
        let lapics = vcpus
            .into_iter()
            .enumerate()
            .map(|(idx, vcpu)| Lapic {
                regs: RwLock::new(LapicRegs::new(idx as u8, idx == 0)),
                queue: IrqQueue::new(),
                vcpu,
            })
            .collect();
        Self { lapics }
    }

    pub fn vcpu_count(&self) -> usize {
        self.lapics.len()
    }
}

#[cfg(feature = "alloc")]
static DEVICE_STATE: OnceLock<LapicDeviceState> = OnceLock::new();

#[cfg(feature = "alloc")]
fn device() -> Result<&'static LapicDeviceState, LapicError> {
    DEVICE_STATE.get().ok_or(LapicError::NotInitialized)
}

#[cfg(feature = "alloc")]
fn check_vcpu(state: &LapicDeviceState, vcpu: usize) -> Result<(), LapicError> {
    if vcpu < state.lapics.len() {
        Ok(())
    } else {
        Err(LapicError::InvalidVcpu { index: vcpu })
    }
}

/// Initialize one LAPIC per real CPU brought up by [`crate::sched::smp`].
#[cfg(feature = "alloc")]
pub fn init(n_cpus: usize) -> Result<(), LapicError> {
    let vcpus: Vec<Arc<dyn VcpuControl>> = (0..n_cpus)
        .map(|id| Arc::new(SmpVcpu::new(id as u8)) as Arc<dyn VcpuControl>)
        .collect();
    init_with_vcpus(vcpus)
}

/// Initialize against caller-supplied [`VcpuControl`] implementations
/// (used by tests, and by anything hosting guests outside the native
/// scheduler).
#[cfg(feature = "alloc")]
pub fn init_with_vcpus(vcpus: Vec<Arc<dyn VcpuControl>>) -> Result<(), LapicError> {
    let state = LapicDeviceState::with_vcpus(vcpus);
    DEVICE_STATE
        .set(state)
        .map_err(|_| LapicError::StateMismatch {
            expected: "uninitialized",
            actual: "already initialized",
        })
}

#[cfg(feature = "alloc")]
pub fn shutdown() {
    // OnceLock has no reset; re-running init_with_vcpus after a shutdown
    // is only meaningful in tests, which build their own LapicDeviceState
    // directly rather than going through the global.
}

// ---------------------------------------------------------------------------
// External interface (guest-facing)
// ---------------------------------------------------------------------------

/// Whether `vcpu`'s LAPIC has an interrupt ready to be taken.
#[cfg(feature = "alloc")]
pub fn pending(vcpu: usize) -> Result<bool, LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    drain_queue(state, vcpu);
    Ok(state.lapics[vcpu].regs.read().is_pending())
}

/// Highest-priority pending vector, if any.
#[cfg(feature = "alloc")]
pub fn highest(vcpu: usize) -> Result<Option<u8>, LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    drain_queue(state, vcpu);
    Ok(state.lapics[vcpu].regs.read().highest_irr())
}

/// Acknowledge delivery of `vector`: promote it from IRR to ISR.
#[cfg(feature = "alloc")]
pub fn begin(vcpu: usize, vector: u8) -> Result<(), LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    state.lapics[vcpu].regs.write().begin(vector);
    Ok(())
}

/// Route a synthetic ICR that did not originate from a real ICR MMIO
/// write (used by host-side code that needs to inject an IPI directly).
#[cfg(feature = "alloc")]
pub fn send_synthetic_ipi(icr: Icr) -> Result<(), LapicError> {
    let state = device()?;
    router::route(state, None, icr)
}

/// Direct delivery by number (§6): enqueue `vector` on `vcpu`'s own queue
/// and kick its host thread if remote, exactly like the fixed-delivery path
/// in [`router::deliver`]. The caller may run on any thread, so this must
/// not touch `vcpu`'s IRR/ISR directly -- only the owning vCPU thread does
/// that, via [`drain_queue`] on its next guest-facing entry point. The IER
/// mask and IRR coalescing are applied there, not here.
#[cfg(feature = "alloc")]
pub fn raise_interrupt(vcpu: usize, vector: u8) -> Result<(), LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    raise_interrupt_on(state, vcpu, vector)
}

#[cfg(feature = "alloc")]
fn raise_interrupt_on(state: &LapicDeviceState, vcpu: usize, vector: u8) -> Result<(), LapicError> {
    if vector <= 15 {
        return Err(LapicError::InvalidVector { vector });
    }
    let lapic = &state.lapics[vcpu];
    lapic.queue.push(vector);
    if lapic.vcpu.is_remote() {
        lapic.vcpu.kick();
    }
    Ok(())
}

/// Read the guest-facing IA32_APIC_BASE-style MSR value for `vcpu`.
#[cfg(feature = "alloc")]
pub fn read_msr(vcpu: usize) -> Result<u64, LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    let regs = state.lapics[vcpu].regs.read();
    let mut value = regs.base_addr & !0xFFF;
    if regs.bsp {
        value |= 1 << 8;
    }
    if regs.apic_enable {
        value |= 1 << 11;
    }
    Ok(value)
}

/// Write the guest-facing IA32_APIC_BASE-style MSR for `vcpu`.
#[cfg(feature = "alloc")]
pub fn write_msr(vcpu: usize, value: u64) -> Result<(), LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    let mut regs = state.lapics[vcpu].regs.write();
    regs.base_addr = value & !0xFFF;
    regs.apic_enable = value & (1 << 11) != 0;
    Ok(())
}

/// Decode an MMIO read of `len` bytes at `offset` against `vcpu`'s page.
#[cfg(feature = "alloc")]
pub fn mmio_read(vcpu: usize, offset: u32, len: usize) -> Result<u32, LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    drain_queue(state, vcpu);
    mmio::read(state, vcpu, offset, len)
}

/// Decode an MMIO write of `len` bytes at `offset` against `vcpu`'s page.
#[cfg(feature = "alloc")]
pub fn mmio_write(vcpu: usize, offset: u32, len: usize, value: u32) -> Result<(), LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    mmio::write(state, vcpu, offset, len, value)
}

/// Advance `vcpu`'s timer by `elapsed_ticks`.
#[cfg(feature = "alloc")]
pub fn tick_timer(vcpu: usize, elapsed_ticks: u64) -> Result<(), LapicError> {
    let state = device()?;
    check_vcpu(state, vcpu)?;
    timer::tick(state, vcpu, elapsed_ticks)
}

/// Drain `vcpu`'s inbound queue into IRR. Called on every guest-facing
/// entry point so that IPIs and timer fires enqueued from another thread
/// become visible before the caller inspects pending/highest state.
#[cfg(feature = "alloc")]
fn drain_queue(state: &LapicDeviceState, vcpu: usize) {
    let lapic = &state.lapics[vcpu];
    let mut raised = alloc::vec::Vec::new();
    lapic.queue.drain(|vector| raised.push(vector));
    if raised.is_empty() {
        return;
    }
    let mut regs = lapic.regs.write();
    for vector in raised {
        let _ = regs.raise_vector(vector);
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    fn vcpus(n: usize) -> Vec<Arc<dyn VcpuControl>> {
        (0..n).map(|_| Arc::new(NullVcpu) as Arc<dyn VcpuControl>).collect()
    }

    #[test]
    fn queued_ipi_becomes_visible_through_pending() {
        let state = LapicDeviceState::with_vcpus(vcpus(2));
        let icr = Icr::synthetic_fixed(0x40, 1);
        router::route(&state, Some(0), icr).unwrap();
        assert!(!state.lapics[1].regs.read().is_pending());
        drain_queue(&state, 1);
        assert!(state.lapics[1].regs.read().is_pending());
    }

    #[test]
    fn msr_round_trips_enable_bit() {
        let state = LapicDeviceState::with_vcpus(vcpus(1));
        {
            let mut regs = state.lapics[0].regs.write();
            regs.apic_enable = false;
        }
        let value = {
            let regs = state.lapics[0].regs.read();
            let mut v = regs.base_addr & !0xFFF;
            if regs.bsp {
                v |= 1 << 8;
            }
            v
        };
        assert_eq!(value & (1 << 11), 0);
    }

    #[test]
    fn raise_interrupt_enqueues_without_touching_irr_directly() {
        let state = LapicDeviceState::with_vcpus(vcpus(2));
        raise_interrupt_on(&state, 1, 0x40).unwrap();
        // Not mutated yet -- only the owning vCPU's drain_queue step does that.
        assert!(!state.lapics[1].regs.read().is_pending());
        assert_eq!(state.lapics[1].queue.len(), 1);
        drain_queue(&state, 1);
        assert!(state.lapics[1].regs.read().is_pending());
    }

    #[test]
    fn raise_interrupt_rejects_reserved_vector() {
        let state = LapicDeviceState::with_vcpus(vcpus(1));
        assert_eq!(
            raise_interrupt_on(&state, 0, 5),
            Err(LapicError::InvalidVector { vector: 5 })
        );
    }

    #[test]
    fn invalid_vcpu_index_is_rejected() {
        let state = LapicDeviceState::with_vcpus(vcpus(1));
        assert_eq!(check_vcpu(&state, 1), Err(LapicError::InvalidVcpu { index: 1 }));
    }

    /// Every vCPU thread sends a fixed IPI to every other vCPU's LAPIC
    /// concurrently. Exercises the non-overlapping per-queue / state-lock
    /// discipline §5 requires: nothing here should deadlock or lose a raise.
    #[cfg(not(target_os = "none"))]
    #[test]
    fn concurrent_all_to_all_ipis_deliver_exactly_once_each() {
        extern crate std;
        use std::sync::Arc as StdArc;
        use std::thread;

        const N: usize = 4;
        let state = StdArc::new(LapicDeviceState::with_vcpus(vcpus(N)));

        let handles: Vec<_> = (0..N)
            .map(|src| {
                let state = StdArc::clone(&state);
                thread::spawn(move || {
                    for dst in 0..N {
                        if dst == src {
                            continue;
                        }
                        let icr = Icr {
                            vector: 0x40,
                            delivery_mode: registers::DeliveryMode::Fixed,
                            shorthand: registers::DestinationShorthand::None,
                            flags: registers::IcrFlags::empty(),
                            destination: dst as u8,
                        };
                        router::route(&state, Some(src), icr).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        for lapic in state.lapics.iter() {
            assert_eq!(lapic.queue.len(), N - 1);
        }
    }
}
