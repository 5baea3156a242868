//! MMIO decode for the per-LAPIC 4 KiB register page (§4.6).

use super::registers::{
    self, Icr, REG_ARBITRATION_PRIORITY, REG_DESTINATION_FORMAT, REG_EOI, REG_ERROR_STATUS,
    REG_ICR_HIGH, REG_ICR_LOW, REG_IRR_BASE, REG_ISR_BASE, REG_LOGICAL_DESTINATION, REG_LVT_ERROR,
    REG_LVT_LINT0, REG_LVT_LINT1, REG_LVT_PERF, REG_LVT_THERMAL, REG_LVT_TIMER,
    REG_PROCESSOR_PRIORITY, REG_SPURIOUS_VECTOR, REG_TASK_PRIORITY, REG_TIMER_CURRENT_COUNT,
    REG_TIMER_DIVIDE_CONFIG, REG_TIMER_INITIAL_COUNT, REG_TMR_BASE, REG_VERSION, REG_ID,
};
use super::{LapicDeviceState, LapicError};
use crate::log_service::{klog, LogLevel};

const LOG_SUBSYSTEM: &str = "lapic";

/// Read `len` bytes (1, 2 or 4) from `offset` in the LAPIC at `idx`.
pub fn read(state: &LapicDeviceState, idx: usize, offset: u32, len: usize) -> Result<u32, LapicError> {
    if !matches!(len, 1 | 2 | 4) {
        return Err(LapicError::InvalidLength { len });
    }
    let lapic = &state.lapics[idx];
    let regs = lapic.regs.read();
    if !regs.apic_enable {
        return Err(LapicError::DisabledApic);
    }

    let value = match offset {
        REG_ID => (regs.id as u32) << 24,
        REG_VERSION => registers::VERSION_VALUE,
        REG_TASK_PRIORITY => regs.task_priority,
        REG_ARBITRATION_PRIORITY => 0,
        REG_PROCESSOR_PRIORITY => 0,
        REG_EOI => 0,
        REG_LOGICAL_DESTINATION => regs.logical_destination,
        REG_DESTINATION_FORMAT => regs.destination_format,
        REG_SPURIOUS_VECTOR => regs.spurious_vector,
        REG_ERROR_STATUS => regs.error_status,
        REG_ICR_LOW => regs.icr_low,
        REG_ICR_HIGH => regs.icr_high,
        REG_LVT_TIMER => regs.lvt_timer,
        REG_LVT_THERMAL => regs.lvt_thermal,
        REG_LVT_PERF => regs.lvt_perf,
        REG_LVT_LINT0 => regs.lvt_lint0,
        REG_LVT_LINT1 => regs.lvt_lint1,
        REG_LVT_ERROR => regs.lvt_error,
        REG_TIMER_INITIAL_COUNT => regs.timer_initial_count,
        REG_TIMER_CURRENT_COUNT => regs.timer_current_count,
        REG_TIMER_DIVIDE_CONFIG => regs.timer_divide_config,
        offset if subword_index(REG_ISR_BASE, offset).is_some() => {
            regs.isr.subword(subword_index(REG_ISR_BASE, offset).unwrap())
        }
        offset if subword_index(REG_TMR_BASE, offset).is_some() => {
            regs.tmr.subword(subword_index(REG_TMR_BASE, offset).unwrap())
        }
        offset if subword_index(REG_IRR_BASE, offset).is_some() => {
            regs.irr.subword(subword_index(REG_IRR_BASE, offset).unwrap())
        }
        _ => return Err(LapicError::Unhandled { offset }),
    };

    Ok(mask_to_len(value, len))
}

/// Write a 4-byte `value` to `offset` in the LAPIC at `idx`. Non-4-byte
/// writes are architecturally rejected.
pub fn write(
    state: &LapicDeviceState,
    idx: usize,
    offset: u32,
    len: usize,
    value: u32,
) -> Result<(), LapicError> {
    if len != 4 {
        return Err(LapicError::InvalidLength { len });
    }

    {
        let regs = state.lapics[idx].regs.read();
        if !regs.apic_enable {
            return Err(LapicError::DisabledApic);
        }
    }

    match offset {
        REG_VERSION | REG_ARBITRATION_PRIORITY | REG_PROCESSOR_PRIORITY => {
            Err(LapicError::ReadOnly { offset })
        }
        offset if subword_index(REG_ISR_BASE, offset).is_some() => Err(LapicError::ReadOnly { offset }),
        offset if subword_index(REG_TMR_BASE, offset).is_some() => Err(LapicError::ReadOnly { offset }),
        offset if subword_index(REG_IRR_BASE, offset).is_some() => Err(LapicError::ReadOnly { offset }),

        REG_ID => {
            state.lapics[idx].regs.write().id = (value >> 24) as u8;
            Ok(())
        }
        REG_TASK_PRIORITY => {
            state.lapics[idx].regs.write().task_priority = value;
            Ok(())
        }
        REG_LOGICAL_DESTINATION => {
            // Cross-LAPIC readable field: taken under this LAPIC's own
            // register lock, which doubles as the device state-lock for
            // readers resolving logical destinations elsewhere.
            state.lapics[idx].regs.write().logical_destination = value;
            Ok(())
        }
        REG_DESTINATION_FORMAT => {
            state.lapics[idx].regs.write().destination_format = value;
            Ok(())
        }
        REG_SPURIOUS_VECTOR => {
            state.lapics[idx].regs.write().spurious_vector = value;
            Ok(())
        }
        REG_ERROR_STATUS => {
            state.lapics[idx].regs.write().error_status = value;
            Ok(())
        }
        REG_LVT_TIMER => {
            state.lapics[idx].regs.write().lvt_timer = value;
            Ok(())
        }
        REG_LVT_THERMAL => {
            state.lapics[idx].regs.write().lvt_thermal = value;
            Ok(())
        }
        REG_LVT_PERF => {
            state.lapics[idx].regs.write().lvt_perf = value;
            Ok(())
        }
        REG_LVT_LINT0 => {
            state.lapics[idx].regs.write().lvt_lint0 = value;
            Ok(())
        }
        REG_LVT_LINT1 => {
            state.lapics[idx].regs.write().lvt_lint1 = value;
            Ok(())
        }
        REG_LVT_ERROR => {
            state.lapics[idx].regs.write().lvt_error = value;
            Ok(())
        }
        REG_TIMER_INITIAL_COUNT => {
            let mut regs = state.lapics[idx].regs.write();
            regs.timer_initial_count = value;
            regs.timer_current_count = value;
            Ok(())
        }
        REG_TIMER_DIVIDE_CONFIG => {
            state.lapics[idx].regs.write().timer_divide_config = value;
            Ok(())
        }

        REG_ICR_HIGH => {
            state.lapics[idx].regs.write().icr_high = value;
            Ok(())
        }
        REG_ICR_LOW => {
            let (low, high) = {
                let mut regs = state.lapics[idx].regs.write();
                regs.icr_low = value;
                (regs.icr_low, regs.icr_high)
            };
            let icr = Icr::from_parts(low, high);
            // §7: IPI routing failures are logged, but the guest has no
            // architectural channel to observe them through the ICR write --
            // only the router's own log calls report them, and this store
            // always succeeds.
            if super::router::route(state, Some(idx), icr).is_err() {
                klog(LogLevel::Warn, LOG_SUBSYSTEM, "ICR write triggered IPI routing failure");
            }
            Ok(())
        }
        REG_EOI => {
            state.lapics[idx].regs.write().eoi();
            Ok(())
        }

        _ => Err(LapicError::Unhandled { offset }),
    }
}

fn subword_index(base: u32, offset: u32) -> Option<usize> {
    if offset < base {
        return None;
    }
    let delta = offset - base;
    if delta % 0x10 != 0 {
        return None;
    }
    let idx = (delta / 0x10) as usize;
    if idx < 8 {
        Some(idx)
    } else {
        None
    }
}

fn mask_to_len(value: u32, len: usize) -> u32 {
    match len {
        1 => value & 0xFF,
        2 => value & 0xFFFF,
        _ => value,
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::virt::lapic::NullVcpu;
    use alloc::sync::Arc;

    fn device() -> LapicDeviceState {
        LapicDeviceState::with_vcpus(alloc::vec![Arc::new(NullVcpu) as _])
    }

    #[test]
    fn version_register_is_read_only() {
        let dev = device();
        assert_eq!(read(&dev, 0, REG_VERSION, 4).unwrap(), registers::VERSION_VALUE);
        assert_eq!(
            write(&dev, 0, REG_VERSION, 4, 0),
            Err(LapicError::ReadOnly { offset: REG_VERSION })
        );
    }

    #[test]
    fn eoi_read_returns_zero() {
        let dev = device();
        assert_eq!(read(&dev, 0, REG_EOI, 4).unwrap(), 0);
    }

    #[test]
    fn unknown_offset_is_unhandled() {
        let dev = device();
        assert_eq!(read(&dev, 0, 0x400, 4), Err(LapicError::Unhandled { offset: 0x400 }));
    }

    #[test]
    fn non_four_byte_write_rejected() {
        let dev = device();
        assert_eq!(
            write(&dev, 0, REG_TASK_PRIORITY, 2, 1),
            Err(LapicError::InvalidLength { len: 2 })
        );
    }

    #[test]
    fn timer_initial_count_write_loads_current_count() {
        let dev = device();
        write(&dev, 0, REG_TIMER_INITIAL_COUNT, 4, 1000).unwrap();
        assert_eq!(read(&dev, 0, REG_TIMER_CURRENT_COUNT, 4).unwrap(), 1000);
    }

    #[test]
    fn icr_low_write_triggers_self_routing() {
        let dev = device();
        // shorthand = self (01), delivery mode fixed, vector 0x40.
        write(&dev, 0, REG_ICR_LOW, 4, 0x0004_0040).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1);
    }

    /// §7: a guest can't observe IPI routing failures through the ICR
    /// write -- the store still succeeds even when routing fails (here,
    /// physical shorthand-none naming a destination id with no LAPIC).
    #[test]
    fn icr_low_write_succeeds_even_when_routing_fails() {
        let dev = device();
        // shorthand = none (00), physical, delivery mode fixed, vector
        // 0x40, destination id 0xEE (no matching LAPIC in a 1-vCPU device).
        let low = 0x0000_0040;
        write(&dev, 0, REG_ICR_HIGH, 4, 0xEE00_0000).unwrap();
        assert!(write(&dev, 0, REG_ICR_LOW, 4, low).is_ok());
        assert!(dev.lapics[0].queue.is_empty());
    }
}
