//! One-shot/periodic timer tick (§4.7).
//!
//! The timer is a producer into the owning LAPIC's [`super::queue::IrqQueue`]
//! like any other interrupt source -- it never touches IRR directly, since
//! the tick can be driven from a context other than the owning vCPU's own
//! run loop.

use super::registers::{InternalSource, TimerMode};
use super::{LapicDeviceState, LapicError};

/// Advance the timer at LAPIC `idx` by `elapsed_ticks` bus ticks.
///
/// The divide configuration register is read directly as a right-shift
/// amount (a `timer_divide_config` of 0 means divide-by-1, i.e. no shift):
/// this core does not reproduce the real APIC's scrambled 3-bit divide
/// encoding, since nothing downstream of this emulation observes the raw
/// register bit pattern.
///
/// Countdown and reload always run to completion regardless of whether the
/// LVT timer entry is masked -- masking only suppresses delivery of the
/// resulting vector, never the bookkeeping. Missed periodic fires (the
/// elapsed ticks cover more than one full period) are coalesced into a
/// single delivery and counted in `missed_ints`.
pub fn tick(state: &LapicDeviceState, idx: usize, elapsed_ticks: u64) -> Result<(), LapicError> {
    let lapic = &state.lapics[idx];
    let vector = {
        let mut regs = lapic.regs.write();

        if regs.timer_current_count == 0 && regs.timer_initial_count == 0 {
            return Ok(());
        }

        let shift = regs.timer_divide_config.min(31);
        let mut remaining = elapsed_ticks >> shift;
        let mut fired: u32 = 0;

        while remaining > 0 && regs.timer_current_count > 0 {
            let count = regs.timer_current_count as u64;
            if remaining < count {
                regs.timer_current_count -= remaining as u32;
                remaining = 0;
            } else {
                remaining -= count;
                regs.timer_current_count = 0;
                fired += 1;
                match regs.timer_mode() {
                    TimerMode::Periodic => {
                        if regs.timer_initial_count == 0 {
                            break;
                        }
                        regs.timer_current_count = regs.timer_initial_count;
                    }
                    TimerMode::OneShot => break,
                }
            }
        }

        if fired == 0 {
            return Ok(());
        }
        if fired > 1 {
            regs.missed_ints += fired - 1;
        }

        match regs.activate_internal(InternalSource::Timer)? {
            Some(vector) => vector,
            None => return Ok(()),
        }
    };

    lapic.queue.push(vector);
    lapic.vcpu.kick();
    Ok(())
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::virt::lapic::registers::REG_TIMER_INITIAL_COUNT;
    use crate::virt::lapic::NullVcpu;
    use alloc::sync::Arc;

    fn device() -> LapicDeviceState {
        LapicDeviceState::with_vcpus(alloc::vec![Arc::new(NullVcpu) as _])
    }

    #[test]
    fn one_shot_fires_once_and_stays_at_zero() {
        let dev = device();
        super::super::mmio::write(&dev, 0, REG_TIMER_INITIAL_COUNT, 4, 100).unwrap();
        tick(&dev, 0, 100).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1);
        assert_eq!(dev.lapics[0].regs.read().timer_current_count, 0);

        tick(&dev, 0, 50).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1, "one-shot must not refire");
    }

    #[test]
    fn periodic_reloads_and_fires_again() {
        let dev = device();
        {
            let mut regs = dev.lapics[0].regs.write();
            regs.lvt_timer = 1 << 17; // periodic, unmasked, vector 0
        }
        super::super::mmio::write(&dev, 0, REG_TIMER_INITIAL_COUNT, 4, 100).unwrap();
        tick(&dev, 0, 100).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1);
        assert_eq!(dev.lapics[0].regs.read().timer_current_count, 100);

        tick(&dev, 0, 100).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 2);
    }

    #[test]
    fn divide_by_one_consumes_ticks_at_full_rate() {
        let dev = device();
        // divide_config 0 == shift 0 == divide-by-1.
        super::super::mmio::write(&dev, 0, super::super::registers::REG_TIMER_DIVIDE_CONFIG, 4, 0)
            .unwrap();
        super::super::mmio::write(&dev, 0, REG_TIMER_INITIAL_COUNT, 4, 10).unwrap();
        tick(&dev, 0, 4).unwrap();
        assert_eq!(dev.lapics[0].regs.read().timer_current_count, 6);
    }

    #[test]
    fn masked_timer_still_counts_down_but_does_not_enqueue() {
        let dev = device();
        {
            let mut regs = dev.lapics[0].regs.write();
            regs.lvt_timer = 1 << 16; // masked
        }
        super::super::mmio::write(&dev, 0, REG_TIMER_INITIAL_COUNT, 4, 10).unwrap();
        tick(&dev, 0, 10).unwrap();
        assert_eq!(dev.lapics[0].regs.read().timer_current_count, 0);
        assert!(dev.lapics[0].queue.is_empty());
    }

    #[test]
    fn missed_fires_are_coalesced_and_counted() {
        let dev = device();
        {
            let mut regs = dev.lapics[0].regs.write();
            regs.lvt_timer = 1 << 17; // periodic, unmasked
        }
        super::super::mmio::write(&dev, 0, REG_TIMER_INITIAL_COUNT, 4, 10).unwrap();
        // 35 ticks against a period of 10: fires at 10, 20, 30, with 5 left over.
        tick(&dev, 0, 35).unwrap();
        assert_eq!(dev.lapics[0].queue.len(), 1, "coalesced into one delivery");
        assert_eq!(dev.lapics[0].regs.read().missed_ints, 2);
        assert_eq!(dev.lapics[0].regs.read().timer_current_count, 5);
    }
}
