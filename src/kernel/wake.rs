// Elapsed-time source for the main loop
//
// The timer ISR calls signal_tick(); the main loop drains the count
// with take_elapsed() and hands it to ActionScheduler::proceed.
// Critical section guards riscv32imc (no atomic RMW).
// Tick weight lets the timer slow down while idle without the
// scheduler losing time: at a 10x longer period, each interrupt
// counts as 10 base ticks.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

pub struct TickCounter {
    pending: Mutex<Cell<u32>>,
    uptime: Mutex<Cell<u32>>,
    weight: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(0)),
            uptime: Mutex::new(Cell::new(0)),
            weight: AtomicU32::new(1),
        }
    }

    /// One timer interrupt worth of ticks.
    #[inline]
    pub fn signal_tick(&self) {
        self.add(self.weight.load(Ordering::Relaxed));
    }

    pub fn add(&self, ticks: u32) {
        critical_section::with(|cs| {
            let pending = self.pending.borrow(cs);
            pending.set(pending.get().saturating_add(ticks));
            let uptime = self.uptime.borrow(cs);
            uptime.set(uptime.get().wrapping_add(ticks));
        });
    }

    /// Ticks since the previous call.
    pub fn take_elapsed(&self) -> u32 {
        critical_section::with(|cs| self.pending.borrow(cs).replace(0))
    }

    pub fn set_tick_weight(&self, weight: u32) {
        self.weight.store(weight.max(1), Ordering::Release);
    }

    pub fn tick_weight(&self) -> u32 {
        self.weight.load(Ordering::Acquire)
    }

    /// Total ticks seen, wrapping.
    pub fn uptime_ticks(&self) -> u32 {
        critical_section::with(|cs| self.uptime.borrow(cs).get())
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "riscv32")]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(not(target_arch = "riscv32"))]
    core::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_weighted_ticks() {
        let ticks = TickCounter::new();
        ticks.signal_tick();
        ticks.signal_tick();
        ticks.set_tick_weight(10);
        ticks.signal_tick();
        assert_eq!(ticks.take_elapsed(), 12);
        assert_eq!(ticks.take_elapsed(), 0);
        assert_eq!(ticks.uptime_ticks(), 12);
    }

    #[test]
    fn zero_weight_clamped() {
        let ticks = TickCounter::new();
        ticks.set_tick_weight(0);
        assert_eq!(ticks.tick_weight(), 1);
    }
}
