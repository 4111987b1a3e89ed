// Timeline scheduler: delayed and periodic callbacks on a fixed pool
//
// NOTE: No dynamic allocation. Capacity is the const N (1..=255).
//
// Any context may register or cancel at any time, including an ISR and
// a callback that is currently firing. Structural state sits behind a
// blocking mutex whose RawMutex decides what "exclusive" means:
// CriticalSectionRawMutex masks interrupts, NoopRawMutex is for a
// single context. The lock is never held while a callback runs; the
// firing node is detached from the chain first, so concurrent
// registrations cannot reach it.

use core::cell::RefCell;
use core::fmt;
use core::num::NonZeroU8;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{debug, trace, warn};

use super::handle::ActionId;
use super::pool::Action;
use super::timeline::Timeline;

/// What a fired callback wants to happen to its registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done; the slot goes back to the pool.
    OneShot,
    /// Fire again after the registration's reload interval.
    Reload,
}

/// Callback plus the argument stored alongside it. Callbacks may call
/// back into the scheduler (schedule the next step, cancel themselves).
pub type Callback<T> = fn(T) -> Disposition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// Every slot is in use; nothing was registered.
    Full,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Full => write!(f, "timeline full"),
        }
    }
}

/// Why a handle did not cancel anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// Slot index beyond the pool.
    OutOfRange,
    /// Slot is free: the action already fired or was cancelled.
    Vacant,
    /// Slot was reused by a later registration.
    Stale,
}

impl fmt::Display for CancelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelError::OutOfRange => write!(f, "slot out of range"),
            CancelError::Vacant => write!(f, "slot not scheduled"),
            CancelError::Stale => write!(f, "stale handle"),
        }
    }
}

struct State<T, const N: usize> {
    timeline: Timeline<T, N>,
    // ticks charged against pending actions since the last reset
    proceeding_time: u32,
    watermark: u16,
}

impl<T: Copy, const N: usize> State<T, N> {
    const fn new() -> Self {
        Self {
            timeline: Timeline::new(),
            proceeding_time: 0,
            watermark: 0,
        }
    }

    fn register(
        &mut self,
        delay: u32,
        reload: u32,
        action: Action<T>,
    ) -> Result<ActionId, ScheduleError> {
        if self.timeline.pool.is_full() {
            return Err(ScheduleError::Full);
        }
        let idx = self
            .timeline
            .pool
            .find_free(self.timeline.tail())
            .ok_or(ScheduleError::Full)?;
        let id = self.timeline.pool.claim(idx, action, reload);
        self.timeline.insert(idx, delay);
        self.watermark = self.watermark.max(self.timeline.pool.occupied());
        Ok(id)
    }

    // Does `id` still name a live registration?
    fn check(&self, id: ActionId) -> Result<(), CancelError> {
        let idx = id.index();
        if usize::from(idx) >= N {
            return Err(CancelError::OutOfRange);
        }
        let node = &self.timeline.pool[idx];
        if node.action.is_none() {
            return Err(CancelError::Vacant);
        }
        if node.generation != id.generation() {
            return Err(CancelError::Stale);
        }
        Ok(())
    }

    fn cancel(&mut self, id: ActionId) -> Result<(), CancelError> {
        self.check(id)?;
        let idx = id.index();
        // no-op on the chain if the node is detached and firing
        self.timeline.remove(idx);
        self.timeline.pool.release(idx);
        Ok(())
    }

    fn cancel_all(&mut self, callback: Callback<T>) -> bool {
        let mut matched = false;
        let mut cursor = self.timeline.iter().next();
        while let Some(idx) = cursor {
            // read the successor before `idx` is unlinked
            cursor = (idx != self.timeline.tail()).then(|| self.timeline.pool[idx].next);
            if self.timeline.pool.action(idx).is_some_and(|a| a.calls(callback)) {
                self.timeline.remove(idx);
                self.timeline.pool.release(idx);
                matched = true;
            }
        }
        matched
    }

    // Detach the next due node, or charge what is left of `remaining` to
    // the head when nothing is due. Both happen under one lock so an ISR
    // cannot slip an earlier node in between.
    fn advance(&mut self, remaining: &mut u32) -> Option<(ActionId, Action<T>)> {
        match self.timeline.head_delta() {
            Some(delta) if delta <= *remaining => {
                *remaining -= delta;
                self.proceeding_time = self.proceeding_time.wrapping_add(delta);
                let idx = self.timeline.pop_head()?;
                let node = &self.timeline.pool[idx];
                let generation = NonZeroU8::new(node.generation)?;
                Some((ActionId::new(idx, generation), node.action?))
            }
            Some(_) => {
                self.timeline.consume(*remaining);
                self.proceeding_time = self.proceeding_time.wrapping_add(*remaining);
                *remaining = 0;
                None
            }
            None => None,
        }
    }

    // Apply a fired callback's disposition to its (detached) slot.
    fn settle(&mut self, id: ActionId, disposition: Disposition) {
        if self.check(id).is_err() {
            // cancelled while running, and possibly reused since
            return;
        }
        let idx = id.index();
        match disposition {
            Disposition::OneShot => self.timeline.pool.release(idx),
            Disposition::Reload => {
                let reload = self.timeline.pool[idx].reload;
                if reload == 0 {
                    warn!("zero reload interval on {}, dropping", id);
                    self.timeline.pool.release(idx);
                } else {
                    // same slot, same generation: the caller's handle stays valid
                    self.timeline.insert(idx, reload);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.timeline.reset();
        self.proceeding_time = 0;
        self.watermark = 0;
    }
}

/// Fixed-capacity timeline of delayed and periodic callbacks.
///
/// `M` is the critical-section policy, `T` the argument handed to each
/// callback, `N` the pool capacity (1..=255, checked at compile time).
/// All methods take `&self`, so one instance can live in a `static` and
/// be shared by the main loop and interrupt handlers.
pub struct ActionScheduler<M: RawMutex, T, const N: usize> {
    state: Mutex<M, RefCell<State<T, N>>>,
}

impl<M: RawMutex, T: Copy, const N: usize> ActionScheduler<M, T, N> {
    pub const fn new() -> Self {
        const {
            assert!(N >= 1 && N <= 255, "capacity must be within 1..=255");
        }
        Self {
            state: Mutex::new(RefCell::new(State::new())),
        }
    }

    #[inline]
    fn with<U>(&self, f: impl FnOnce(&mut State<T, N>) -> U) -> U {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Fire `callback(arg)` once after `delay` ticks.
    ///
    /// If the callback returns [`Disposition::Reload`] it fires again
    /// every `delay` ticks.
    pub fn schedule(
        &self,
        delay: u32,
        callback: Callback<T>,
        arg: T,
    ) -> Result<ActionId, ScheduleError> {
        self.schedule_reload(delay, delay, callback, arg)
    }

    /// Fire `callback(arg)` after `delay` ticks, then every `reload`
    /// ticks for as long as it returns [`Disposition::Reload`].
    ///
    /// On error nothing is allocated or linked.
    pub fn schedule_reload(
        &self,
        delay: u32,
        reload: u32,
        callback: Callback<T>,
        arg: T,
    ) -> Result<ActionId, ScheduleError> {
        let result = self.with(|s| s.register(delay, reload, Action { callback, arg }));
        match result {
            Ok(id) => trace!("scheduled {} in {} (reload {})", id, delay, reload),
            Err(e) => warn!("schedule rejected: {} ({} slots)", e, N),
        }
        result
    }

    /// Cancel a registration. Once this returns `Ok` the callback will
    /// not fire again, even if it is running right now and asks to be
    /// reloaded.
    pub fn cancel(&self, id: ActionId) -> Result<(), CancelError> {
        let result = self.with(|s| s.cancel(id));
        match result {
            Ok(()) => trace!("cancelled {}", id),
            Err(e) => debug!("cancel {} ignored: {}", id, e),
        }
        result
    }

    /// Cancel through a stored handle and clear it on success.
    ///
    /// Returns false (and leaves `id` untouched) for `None`, stale or
    /// already-finished handles, so a handle whose action fired and
    /// whose slot was reused can never cancel the newcomer.
    pub fn unschedule(&self, id: &mut Option<ActionId>) -> bool {
        let Some(handle) = *id else {
            return false;
        };
        if self.cancel(handle).is_ok() {
            *id = None;
            true
        } else {
            false
        }
    }

    /// Cancel every pending registration of `callback`. A matching
    /// callback that is firing right now is not reloaded.
    pub fn unschedule_all(&self, callback: Callback<T>) -> bool {
        let matched = self.with(|s| {
            let mut matched = s.cancel_all(callback);
            // detached nodes are not on the chain but still occupy a slot
            for idx in 0..N as u8 {
                let firing = s
                    .timeline
                    .pool
                    .action(idx)
                    .is_some_and(|a| a.calls(callback));
                if firing {
                    s.timeline.pool.release(idx);
                    matched = true;
                }
            }
            matched
        });
        if matched {
            trace!("unscheduled all matching callbacks");
        }
        matched
    }

    /// Advance the timeline by `elapsed` ticks, firing everything that
    /// came due, in deadline order. Returns true if anything fired.
    ///
    /// Callbacks run outside the critical section and may schedule or
    /// cancel freely. Not reentrant: call it from one context only.
    pub fn proceed(&self, elapsed: u32) -> bool {
        let mut remaining = elapsed;
        let mut fired = false;

        while let Some((id, action)) = self.with(|s| s.advance(&mut remaining)) {
            trace!("firing {}", id);
            let disposition = action.fire();
            fired = true;
            self.with(|s| s.settle(id, disposition));
        }

        fired
    }

    /// Drop every registration and reset the counters.
    ///
    /// Handles issued before the reset stay stale afterwards.
    pub fn clear(&self) {
        self.with(|s| s.reset());
        debug!("timeline cleared");
    }

    /// Ticks until the next firing, `None` if nothing is pending.
    ///
    /// A main loop can sleep this long when no interrupt intervenes.
    pub fn next_event_delay(&self) -> Option<u32> {
        self.with(|s| s.timeline.head_delta())
    }

    /// Ticks charged against pending actions since the last
    /// [`clear_proceeding_time`](Self::clear_proceeding_time). Idle
    /// periods with nothing scheduled are not counted.
    pub fn proceeding_time(&self) -> u32 {
        self.with(|s| s.proceeding_time)
    }

    pub fn clear_proceeding_time(&self) {
        self.with(|s| s.proceeding_time = 0);
    }

    pub fn is_callback_armed(&self, callback: Callback<T>) -> bool {
        self.with(|s| s.timeline.pool.iter_actions().any(|a| a.calls(callback)))
    }

    /// Peak number of occupied slots since the last [`clear`](Self::clear).
    pub fn active_nodes_watermark(&self) -> u16 {
        self.with(|s| s.watermark)
    }

    /// Occupied slots, including one whose callback is running.
    pub fn len(&self) -> usize {
        self.with(|s| usize::from(s.timeline.pool.occupied()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Visit pending registrations in fire order with the ticks left
    /// until each fires.
    ///
    /// Runs inside the critical section: `f` must not call back into
    /// the scheduler.
    pub fn for_each_pending(&self, mut f: impl FnMut(ActionId, u32)) {
        self.with(|s| {
            let mut at: u32 = 0;
            for idx in s.timeline.iter() {
                let node = &s.timeline.pool[idx];
                at = at.saturating_add(node.delta);
                if let Some(generation) = NonZeroU8::new(node.generation) {
                    f(ActionId::new(idx, generation), at);
                }
            }
        });
    }
}

impl<M: RawMutex, T: Copy, const N: usize> Default for ActionScheduler<M, T, N> {
    fn default() -> Self {
        Self::new()
    }
}
