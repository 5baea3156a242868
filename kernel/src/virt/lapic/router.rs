//! IPI routing: shorthand/physical/logical destination resolution and the
//! logical-destination match predicate.

use super::registers::{DeliveryMode, DestinationShorthand, Icr, IpiLifecycle};
use super::{LapicDeviceState, LapicError};
use crate::log_service::{klog, LogLevel};

const LOG_SUBSYSTEM: &str = "lapic";

/// Route an ICR payload originating from `source` (`None` for synthetic
/// sources with no owning LAPIC) against the whole device.
///
/// Implements §4.4 of the interrupt-controller contract: shorthand
/// resolution first, then physical or logical destination-mode resolution,
/// then per-destination delivery-mode dispatch.
pub fn route(state: &LapicDeviceState, source: Option<usize>, icr: Icr) -> Result<(), LapicError> {
    match icr.shorthand {
        DestinationShorthand::SelfOnly => {
            let src = source.ok_or(LapicError::NoSuchDestination {
                apic_id: icr.destination,
            })?;
            deliver(state, source, src, icr)
        }
        DestinationShorthand::AllIncludingSelf => {
            for idx in 0..state.lapics.len() {
                deliver(state, source, idx, icr)?;
            }
            Ok(())
        }
        DestinationShorthand::AllExcludingSelf => {
            for idx in 0..state.lapics.len() {
                if Some(idx) == source {
                    continue;
                }
                deliver(state, source, idx, icr)?;
            }
            Ok(())
        }
        DestinationShorthand::None if !icr.is_logical() => {
            let idx = find_physical_apic(state, icr.destination).ok_or_else(|| {
                klog(
                    LogLevel::Warn,
                    LOG_SUBSYSTEM,
                    "physical IPI destination does not match any LAPIC",
                );
                LapicError::NoSuchDestination { apic_id: icr.destination }
            })?;
            deliver(state, source, idx, icr)
        }
        DestinationShorthand::None => route_logical(state, source, icr),
    }
}

/// Physical destination lookup. The indexed fast path first checks
/// `dst_idx < N` (the array bound), not `dst_idx > 0` -- the latter was a
/// bug in the routine this is grounded on, which incorrectly excluded index
/// 0 from the fast path.
fn find_physical_apic(state: &LapicDeviceState, dest_id: u8) -> Option<usize> {
    let dst_idx = dest_id as usize;
    if dst_idx < state.lapics.len() {
        let regs = state.lapics[dst_idx].regs.read();
        if regs.id == dest_id {
            return Some(dst_idx);
        }
    }
    state
        .lapics
        .iter()
        .position(|lapic| lapic.regs.read().id == dest_id)
}

fn route_logical(
    state: &LapicDeviceState,
    source: Option<usize>,
    icr: Icr,
) -> Result<(), LapicError> {
    if icr.delivery_mode == DeliveryMode::LowestPriority {
        let mut best: Option<(usize, u32)> = None;
        for (idx, lapic) in state.lapics.iter().enumerate() {
            let regs = lapic.regs.read();
            if logical_match(regs.logical_destination, regs.destination_format, icr.destination)? {
                let priority = regs.task_priority;
                if best.map(|(_, p)| priority < p).unwrap_or(true) {
                    best = Some((idx, priority));
                }
            }
        }
        return match best {
            Some((idx, _)) => deliver(state, source, idx, icr),
            None => {
                klog(
                    LogLevel::Warn,
                    LOG_SUBSYSTEM,
                    "lowest-priority logical IPI matched no destination",
                );
                Ok(())
            }
        };
    }

    for idx in 0..state.lapics.len() {
        let matches = {
            let regs = state.lapics[idx].regs.read();
            logical_match(regs.logical_destination, regs.destination_format, icr.destination)?
        };
        if matches {
            deliver(state, source, idx, icr)?;
        }
    }
    Ok(())
}

/// §4.5 logical destination match predicate.
pub fn logical_match(
    logical_destination: u32,
    destination_format: u32,
    mda: u8,
) -> Result<bool, LapicError> {
    if mda == 0xFF {
        return Ok(true);
    }
    let log_dst = ((logical_destination >> 24) & 0xFF) as u8;
    let model = (destination_format >> 28) & 0xF;
    match model {
        0xF => Ok((log_dst & mda) != 0),
        0x0 => {
            let dst_cluster = (log_dst >> 4) & 0xF;
            let dst_mask = log_dst & 0xF;
            let mda_cluster = (mda >> 4) & 0xF;
            let mda_mask = mda & 0xF;
            Ok(dst_cluster == mda_cluster && (dst_mask & mda_mask) != 0)
        }
        other => {
            klog(
                LogLevel::Warn,
                LOG_SUBSYSTEM,
                "unrecognized destination format model",
            );
            Err(LapicError::BadDestinationFormat { model: other as u8 })
        }
    }
}

fn deliver(
    state: &LapicDeviceState,
    source: Option<usize>,
    target: usize,
    icr: Icr,
) -> Result<(), LapicError> {
    let lapic = &state.lapics[target];
    match icr.delivery_mode {
        DeliveryMode::Fixed | DeliveryMode::LowestPriority => {
            lapic.queue.push(icr.vector);
            if source != Some(target) {
                lapic.vcpu.kick();
            }
            Ok(())
        }
        DeliveryMode::Init => {
            let mut regs = lapic.regs.write();
            if regs.lifecycle != IpiLifecycle::Init {
                klog(
                    LogLevel::Warn,
                    LOG_SUBSYSTEM,
                    "redundant INIT ignored (already past INIT state)",
                );
                return Ok(());
            }
            regs.lifecycle = IpiLifecycle::Sipi;
            Ok(())
        }
        DeliveryMode::StartupIpi => {
            let mut regs = lapic.regs.write();
            if regs.lifecycle != IpiLifecycle::Sipi {
                klog(
                    LogLevel::Warn,
                    LOG_SUBSYSTEM,
                    "startup IPI dropped (target not awaiting SIPI)",
                );
                return Ok(());
            }
            regs.lifecycle = IpiLifecycle::Started;
            let entry_point = (icr.vector as u64) << 12;
            drop(regs);
            lapic.vcpu.reset_and_start(entry_point);
            Ok(())
        }
        DeliveryMode::ExtInt => Ok(()),
        DeliveryMode::Smi | DeliveryMode::Nmi | DeliveryMode::Reserved => {
            klog(
                LogLevel::Warn,
                LOG_SUBSYSTEM,
                "unsupported delivery mode (SMI/NMI/reserved) rejected",
            );
            Err(LapicError::UnsupportedDeliveryMode { mode: 0 })
        }
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::virt::lapic::NullVcpu;
    use alloc::sync::Arc;

    fn device(n: usize) -> LapicDeviceState {
        LapicDeviceState::with_vcpus((0..n).map(|_| Arc::new(NullVcpu) as _).collect())
    }

    #[test]
    fn self_ipi_raises_on_source_only() {
        let dev = device(1);
        let icr = Icr {
            vector: 0x40,
            delivery_mode: DeliveryMode::Fixed,
            shorthand: DestinationShorthand::SelfOnly,
            flags: Default::default(),
            destination: 0,
        };
        route(&dev, Some(0), icr).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1);
    }

    #[test]
    fn broadcast_flat_logical_reaches_every_matching_lapic() {
        let dev = device(4);
        for lapic in dev.lapics.iter() {
            let mut regs = lapic.regs.write();
            regs.logical_destination = 0x01 << 24;
            regs.destination_format = 0xFFFF_FFFF;
        }
        let icr = Icr {
            vector: 0x80,
            delivery_mode: DeliveryMode::Fixed,
            shorthand: DestinationShorthand::None,
            flags: super::super::registers::IcrFlags::LOGICAL_DEST,
            destination: 0xFF,
        };
        route(&dev, None, icr).unwrap();
        for lapic in dev.lapics.iter() {
            assert_eq!(lapic.queue.len(), 1);
        }
    }

    #[test]
    fn lowest_priority_tie_picks_first_index() {
        let dev = device(2);
        for lapic in dev.lapics.iter() {
            let mut regs = lapic.regs.write();
            regs.logical_destination = 0x03 << 24;
            regs.destination_format = 0xFFFF_FFFF;
            regs.task_priority = 0;
        }
        let icr = Icr {
            vector: 0x90,
            delivery_mode: DeliveryMode::LowestPriority,
            shorthand: DestinationShorthand::None,
            flags: super::super::registers::IcrFlags::LOGICAL_DEST,
            destination: 0x03,
        };
        route(&dev, None, icr).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1);
        assert_eq!(dev.lapics[1].queue.len(), 0);
    }

    #[test]
    fn init_then_startup_handshake() {
        let dev = device(2);
        let init = Icr {
            vector: 0,
            delivery_mode: DeliveryMode::Init,
            shorthand: DestinationShorthand::None,
            flags: Default::default(),
            destination: 1,
        };
        route(&dev, Some(0), init).unwrap();
        assert_eq!(dev.lapics[1].regs.read().lifecycle, IpiLifecycle::Sipi);

        // Redundant INIT: state stays SIPI.
        route(&dev, Some(0), init).unwrap();
        assert_eq!(dev.lapics[1].regs.read().lifecycle, IpiLifecycle::Sipi);

        let startup = Icr {
            vector: 0x12,
            delivery_mode: DeliveryMode::StartupIpi,
            shorthand: DestinationShorthand::None,
            flags: Default::default(),
            destination: 1,
        };
        route(&dev, Some(0), startup).unwrap();
        assert_eq!(dev.lapics[1].regs.read().lifecycle, IpiLifecycle::Started);
    }

    #[test]
    fn startup_ipi_in_wrong_state_is_dropped() {
        let dev = device(2);
        let startup = Icr {
            vector: 0x12,
            delivery_mode: DeliveryMode::StartupIpi,
            shorthand: DestinationShorthand::None,
            flags: Default::default(),
            destination: 1,
        };
        route(&dev, Some(0), startup).unwrap();
        assert_eq!(dev.lapics[1].regs.read().lifecycle, IpiLifecycle::Init);
    }

    #[test]
    fn physical_none_errors_on_missing_destination() {
        let dev = device(2);
        let icr = Icr {
            vector: 0x40,
            delivery_mode: DeliveryMode::Fixed,
            shorthand: DestinationShorthand::None,
            flags: Default::default(),
            destination: 99,
        };
        assert_eq!(
            route(&dev, Some(0), icr),
            Err(LapicError::NoSuchDestination { apic_id: 99 })
        );
    }

    #[test]
    fn physical_fast_path_accepts_index_zero() {
        let dev = device(1);
        let icr = Icr {
            vector: 0x40,
            delivery_mode: DeliveryMode::Fixed,
            shorthand: DestinationShorthand::None,
            flags: Default::default(),
            destination: 0,
        };
        route(&dev, None, icr).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1);
    }
}
