//! A low resolution monotonic tick counter for pacing indicator blinking and
//! responder delays. The counter is a u32 incremented from a periodic timer
//! interrupt every [crate::consts::COARSE_TIMER_TICK_MICROS] microseconds;
//! all elapsed-time math is done in unsigned wrap arithmetic, so predicates
//! stay correct across a single counter wrap.

use core::sync::atomic::{AtomicU32, Ordering};

/// A captured counter reading, used as the start of an interval.
pub type CoarseTimerValue = u32;

/// The shared tick counter. There is exactly one writer (the timer interrupt
/// calling [CoarseTimer::tick]), so relaxed atomic accesses replace the
/// interrupt masking a plain counter would need.
pub struct CoarseTimer {
    ticks: AtomicU32,
}

impl CoarseTimer {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advance the counter by one tick. Call from the timer interrupt.
    #[inline]
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// The current counter value.
    #[inline]
    pub fn now(&self) -> CoarseTimerValue {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks elapsed since `start_time`, robust across one counter wrap.
    pub fn elapsed_since(&self, start_time: CoarseTimerValue) -> u32 {
        self.now().wrapping_sub(start_time)
    }

    /// True iff strictly more than `duration` ticks have passed since
    /// `start_time`. The comparison is strict so an event never fires
    /// before its full duration at tick granularity: with `>=`, a start at
    /// the very end of a tick period would be considered elapsed almost a
    /// full tick early. A zero duration never elapses.
    pub fn has_elapsed(&self, start_time: CoarseTimerValue, duration: u32) -> bool {
        duration > 0 && self.elapsed_since(start_time) > duration
    }

    /// Overwrite the counter. Test hook.
    pub fn set_counter(&self, value: u32) {
        self.ticks.store(value, Ordering::Relaxed);
    }
}

impl Default for CoarseTimer {
    fn default() -> Self {
        Self::new()
    }
}
