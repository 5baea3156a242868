//! Per-vCPU LAPIC register file: identity, priority/destination registers,
//! local vector table, timer state, and the INIT/SIPI/STARTED lifecycle.

use bitflags::bitflags;

use super::bitmap::VectorBitmap;
use super::LapicError;

// ---------------------------------------------------------------------------
// MMIO register offsets (byte offsets from the per-LAPIC 4 KiB base)
// ---------------------------------------------------------------------------

pub const REG_ID: u32 = 0x020;
pub const REG_VERSION: u32 = 0x030;
pub const REG_TASK_PRIORITY: u32 = 0x080;
pub const REG_ARBITRATION_PRIORITY: u32 = 0x090;
pub const REG_PROCESSOR_PRIORITY: u32 = 0x0A0;
pub const REG_EOI: u32 = 0x0B0;
pub const REG_LOGICAL_DESTINATION: u32 = 0x0D0;
pub const REG_DESTINATION_FORMAT: u32 = 0x0E0;
pub const REG_SPURIOUS_VECTOR: u32 = 0x0F0;
pub const REG_ISR_BASE: u32 = 0x100;
pub const REG_TMR_BASE: u32 = 0x180;
pub const REG_IRR_BASE: u32 = 0x200;
pub const REG_ERROR_STATUS: u32 = 0x280;
pub const REG_ICR_LOW: u32 = 0x300;
pub const REG_ICR_HIGH: u32 = 0x310;
pub const REG_LVT_TIMER: u32 = 0x320;
pub const REG_LVT_THERMAL: u32 = 0x330;
pub const REG_LVT_PERF: u32 = 0x340;
pub const REG_LVT_LINT0: u32 = 0x350;
pub const REG_LVT_LINT1: u32 = 0x360;
pub const REG_LVT_ERROR: u32 = 0x370;
pub const REG_TIMER_INITIAL_COUNT: u32 = 0x380;
pub const REG_TIMER_CURRENT_COUNT: u32 = 0x390;
pub const REG_TIMER_DIVIDE_CONFIG: u32 = 0x3E0;

/// `0x80050010`: version 0x10, 8 LVT entries ((0x05 << 16) means max LVT
/// entry index 5, i.e. 6 entries), 0x80 marks directed-EOI unsupported here.
pub const VERSION_VALUE: u32 = 0x8005_0010;

/// IA32_APIC_BASE MSR address, mirrored here for the guest-facing MSR.
pub const APIC_BASE_MSR: u32 = 0x1B;

/// Vector used to kick a remote vCPU's host thread out of its run loop.
/// Arbitrary but fixed, the same way a reschedule IPI claims a vector in
/// the high range reserved for inter-processor signaling.
pub const RESCHEDULE_VECTOR: u8 = 0xFD;

const LVT_MASK_BIT: u32 = 1 << 16;
const SPURIOUS_VECTOR_DEFAULT: u32 = 0xFF;
const DESTINATION_FORMAT_DEFAULT: u32 = 0xFFFF_FFFF;
const LVT_TIMER_DEFAULT: u32 = 0x0001_0000;

// ---------------------------------------------------------------------------
// Interrupt Command Register decode
// ---------------------------------------------------------------------------

bitflags! {
    /// Single-bit fields of the Interrupt Command Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IcrFlags: u32 {
        /// Destination mode: set = logical, clear = physical.
        const LOGICAL_DEST   = 1 << 11;
        /// Level: set = assert.
        const LEVEL_ASSERT   = 1 << 14;
        /// Trigger mode: set = level-triggered.
        const TRIGGER_LEVEL  = 1 << 15;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Fixed,
    LowestPriority,
    Smi,
    Reserved,
    Nmi,
    Init,
    StartupIpi,
    ExtInt,
}

impl DeliveryMode {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0 => Self::Fixed,
            1 => Self::LowestPriority,
            2 => Self::Smi,
            3 => Self::Reserved,
            4 => Self::Nmi,
            5 => Self::Init,
            6 => Self::StartupIpi,
            7 => Self::ExtInt,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationShorthand {
    None,
    SelfOnly,
    AllIncludingSelf,
    AllExcludingSelf,
}

impl DestinationShorthand {
    fn from_bits(bits: u32) -> Self {
        match (bits >> 18) & 0b11 {
            0 => Self::None,
            1 => Self::SelfOnly,
            2 => Self::AllIncludingSelf,
            3 => Self::AllExcludingSelf,
            _ => unreachable!(),
        }
    }
}

/// A decoded snapshot of the 64-bit Interrupt Command Register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icr {
    pub vector: u8,
    pub delivery_mode: DeliveryMode,
    pub shorthand: DestinationShorthand,
    pub flags: IcrFlags,
    pub destination: u8,
}

impl Icr {
    /// Decode an ICR from its low (0x300) and high (0x310) MMIO halves.
    pub fn from_parts(low: u32, high: u32) -> Self {
        Self {
            vector: (low & 0xFF) as u8,
            delivery_mode: DeliveryMode::from_bits(low >> 8),
            shorthand: DestinationShorthand::from_bits(low),
            flags: IcrFlags::from_bits_truncate(low),
            destination: ((high >> 24) & 0xFF) as u8,
        }
    }

    pub fn is_logical(&self) -> bool {
        self.flags.contains(IcrFlags::LOGICAL_DEST)
    }

    /// Construct a synthetic ICR for the raise-interrupt / synthetic-IPI
    /// APIs without going through a real register write.
    pub fn synthetic_fixed(vector: u8, destination: u8) -> Self {
        Self {
            vector,
            delivery_mode: DeliveryMode::Fixed,
            shorthand: DestinationShorthand::None,
            flags: IcrFlags::empty(),
            destination,
        }
    }
}

// ---------------------------------------------------------------------------
// IPI lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpiLifecycle {
    Init,
    Sipi,
    Started,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    OneShot,
    Periodic,
}

// ---------------------------------------------------------------------------
// Internal vector routing (LVT sources)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalSource {
    Timer,
    Thermal,
    Perf,
    Lint0,
    Lint1,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseOutcome {
    NewlyRaised,
    Coalesced,
    Masked,
}

// ---------------------------------------------------------------------------
// Register file
// ---------------------------------------------------------------------------

/// The full per-vCPU LAPIC register file plus its vector bitmaps.
pub struct LapicRegs {
    pub id: u8,
    pub bsp: bool,
    pub apic_enable: bool,
    pub base_addr: u64,

    pub task_priority: u32,
    pub logical_destination: u32,
    pub destination_format: u32,
    pub spurious_vector: u32,
    pub error_status: u32,
    pub icr_low: u32,
    pub icr_high: u32,

    pub lvt_timer: u32,
    pub lvt_thermal: u32,
    pub lvt_perf: u32,
    pub lvt_lint0: u32,
    pub lvt_lint1: u32,
    pub lvt_error: u32,

    pub timer_initial_count: u32,
    pub timer_current_count: u32,
    pub timer_divide_config: u32,
    pub missed_ints: u32,

    pub lifecycle: IpiLifecycle,

    pub irr: VectorBitmap,
    pub isr: VectorBitmap,
    pub ier: VectorBitmap,
    /// Trigger Mode Register. This core models only edge-triggered internal
    /// and IPI delivery paths (level-triggered redirection is an IOAPIC
    /// concern, out of scope), so TMR is retained for MMIO-offset
    /// completeness but always reads zero.
    pub tmr: VectorBitmap,
}

/// Default physical base address of the LAPIC MMIO page.
pub const DEFAULT_BASE_ADDR: u64 = 0xFEE0_0000;

impl LapicRegs {
    pub fn new(id: u8, bsp: bool) -> Self {
        Self {
            id,
            bsp,
            apic_enable: true,
            base_addr: DEFAULT_BASE_ADDR,
            task_priority: 0,
            logical_destination: 0,
            destination_format: DESTINATION_FORMAT_DEFAULT,
            spurious_vector: SPURIOUS_VECTOR_DEFAULT,
            error_status: 0,
            icr_low: 0,
            icr_high: 0,
            lvt_timer: LVT_TIMER_DEFAULT,
            lvt_thermal: LVT_MASK_BIT,
            lvt_perf: LVT_MASK_BIT,
            lvt_lint0: LVT_MASK_BIT,
            lvt_lint1: LVT_MASK_BIT,
            lvt_error: LVT_MASK_BIT,
            timer_initial_count: 0,
            timer_current_count: 0,
            timer_divide_config: 0,
            missed_ints: 0,
            lifecycle: IpiLifecycle::Init,
            irr: VectorBitmap::new(),
            isr: VectorBitmap::new(),
            ier: VectorBitmap::all_set(),
            tmr: VectorBitmap::new(),
        }
    }

    pub fn timer_mode(&self) -> TimerMode {
        if self.lvt_timer & (0b01 << 17) != 0 {
            TimerMode::Periodic
        } else {
            TimerMode::OneShot
        }
    }

    /// §4.1 `set(vec)`: honor the IER mask, coalesce into IRR, reject
    /// reserved vectors.
    pub fn raise_vector(&mut self, vector: u8) -> Result<RaiseOutcome, LapicError> {
        if vector <= 15 {
            return Err(LapicError::InvalidVector { vector });
        }
        if !self.ier.test(vector) {
            return Ok(RaiseOutcome::Masked);
        }
        if !self.irr.set(vector) {
            return Ok(RaiseOutcome::Coalesced);
        }
        Ok(RaiseOutcome::NewlyRaised)
    }

    pub fn highest_irr(&self) -> Option<u8> {
        self.irr.highest()
    }

    pub fn highest_isr(&self) -> Option<u8> {
        self.isr.highest()
    }

    /// `pending` predicate: highest IRR outranks highest ISR.
    pub fn is_pending(&self) -> bool {
        match (self.highest_irr(), self.highest_isr()) {
            (Some(irr), Some(isr)) => irr > isr,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// §4.2 "begin IRQ": promote vector from IRR to ISR, only if IRR held it.
    pub fn begin(&mut self, vector: u8) {
        if self.irr.test(vector) {
            self.irr.clear(vector);
            self.isr.set(vector);
        }
    }

    /// §4.2 EOI: clear the highest ISR bit; spurious EOI (empty ISR) is a
    /// silent no-op. Never touches IRR.
    pub fn eoi(&mut self) {
        if let Some(vector) = self.isr.highest() {
            self.isr.clear(vector);
        }
    }

    fn lvt_mut(&mut self, source: InternalSource) -> &mut u32 {
        match source {
            InternalSource::Timer => &mut self.lvt_timer,
            InternalSource::Thermal => &mut self.lvt_thermal,
            InternalSource::Perf => &mut self.lvt_perf,
            InternalSource::Lint0 => &mut self.lvt_lint0,
            InternalSource::Lint1 => &mut self.lvt_lint1,
            InternalSource::Error => &mut self.lvt_error,
        }
    }

    /// §4.3 internal vector routing: returns the vector to enqueue if this
    /// source should raise right now.
    pub fn activate_internal(&mut self, source: InternalSource) -> Result<Option<u8>, LapicError> {
        let lvt = *self.lvt_mut(source);
        if lvt & LVT_MASK_BIT != 0 {
            return Ok(None);
        }
        // Timer and Error deliver as Fixed implicitly; the others decode the
        // 3-bit delivery-mode field like the ICR does.
        let fixed = matches!(source, InternalSource::Timer | InternalSource::Error)
            || DeliveryMode::from_bits(lvt >> 8) == DeliveryMode::Fixed;
        if !fixed {
            return Err(LapicError::UnsupportedDeliveryMode {
                mode: ((lvt >> 8) & 0b111) as u8,
            });
        }
        Ok(Some((lvt & 0xFF) as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_vector_rejects_reserved_range() {
        let mut regs = LapicRegs::new(0, true);
        assert_eq!(
            regs.raise_vector(5),
            Err(LapicError::InvalidVector { vector: 5 })
        );
    }

    #[test]
    fn raise_vector_coalesces() {
        let mut regs = LapicRegs::new(0, true);
        assert_eq!(regs.raise_vector(0x40), Ok(RaiseOutcome::NewlyRaised));
        assert_eq!(regs.raise_vector(0x40), Ok(RaiseOutcome::Coalesced));
    }

    #[test]
    fn begin_then_eoi_clears_both_bitmaps() {
        let mut regs = LapicRegs::new(0, true);
        regs.raise_vector(0x40).unwrap();
        assert!(regs.is_pending());
        regs.begin(0x40);
        assert!(!regs.irr.test(0x40));
        assert!(regs.isr.test(0x40));
        assert!(!regs.is_pending());
        regs.eoi();
        assert!(!regs.isr.test(0x40));
    }

    #[test]
    fn begin_on_vector_not_in_irr_is_noop() {
        let mut regs = LapicRegs::new(0, true);
        regs.begin(0x50);
        assert!(!regs.isr.test(0x50));
    }

    #[test]
    fn spurious_eoi_is_silent_noop() {
        let mut regs = LapicRegs::new(0, true);
        regs.eoi();
        assert_eq!(regs.highest_isr(), None);
    }

    #[test]
    fn masked_internal_source_returns_none() {
        let mut regs = LapicRegs::new(0, true);
        // lvt_thermal defaults masked.
        assert_eq!(regs.activate_internal(InternalSource::Thermal), Ok(None));
    }

    #[test]
    fn icr_decodes_self_shorthand_and_vector() {
        let icr = Icr::from_parts(0x000C0040, 0);
        assert_eq!(icr.vector, 0x40);
        assert_eq!(icr.shorthand, DestinationShorthand::AllExcludingSelf);
    }
}
