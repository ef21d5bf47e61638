use std::collections::BTreeMap;

use hashbrown::HashMap;

use tracing::debug;

/// Handle of a delayed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// A scheduler of one-shot delayed callbacks.
///
/// Time is counted in ticks of the engine time base. Each scheduled action
/// is either returned once by [`Scheduler::expired`] or dropped by
/// [`Scheduler::cancel`] and [`Scheduler::clear`], never both.
#[derive(Debug)]
pub struct Scheduler<A> {
    timers: BTreeMap<(u64, TimerHandle), A>,
    expiries: HashMap<TimerHandle, u64>,
    next_handle: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    /// Creates an empty [`Scheduler`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
            expiries: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Schedules an action to fire `delay` ticks after `now`.
    pub fn schedule(&mut self, now: u64, delay: u64, action: A) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let expiry = now.saturating_add(delay);
        if self.timers.insert((expiry, handle), action).is_some() {
            debug!("Timer {handle:?} replaced an existing one");
        }
        if self.expiries.insert(handle, expiry).is_some() {
            debug!("Timer {handle:?} had already an expiry");
        }

        debug!("Timer {handle:?} scheduled at tick {expiry}");
        handle
    }

    /// Cancels a delayed callback, returning its action without firing it.
    ///
    /// Returns [`None`] when the callback already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<A> {
        let expiry = self.expiries.remove(&handle)?;
        debug!("Timer {handle:?} cancelled");
        self.timers.remove(&(expiry, handle))
    }

    /// Returns the tick at which the next callback expires.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.keys().next().map(|(expiry, _)| *expiry)
    }

    /// Removes and returns every action expired at `now`, earliest first.
    pub fn expired(&mut self, now: u64) -> Vec<(TimerHandle, A)> {
        let expired = match now.checked_add(1) {
            Some(next) => {
                let pending = self.timers.split_off(&(next, TimerHandle(0)));
                std::mem::replace(&mut self.timers, pending)
            }
            None => std::mem::take(&mut self.timers),
        };

        expired
            .into_iter()
            .map(|((_, handle), action)| {
                if self.expiries.remove(&handle).is_none() {
                    debug!("Timer {handle:?} had no expiry");
                }
                debug!("Timer {handle:?} fired at tick {now}");
                (handle, action)
            })
            .collect()
    }

    /// Drops every scheduled action without firing it, returning how many
    /// were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.timers.len();
        self.timers.clear();
        self.expiries.clear();
        dropped
    }

    /// Checks whether a delayed callback is still scheduled.
    #[must_use]
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.expiries.contains_key(&handle)
    }

    /// Returns the number of scheduled callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Checks whether no callbacks are scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;

    #[test]
    fn fires_at_expiry() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(10, 5, "stop");

        assert_eq!(scheduler.next_deadline(), Some(15));
        assert!(scheduler.expired(14).is_empty());

        let fired = scheduler.expired(15);
        assert_eq!(fired, vec![(handle, "stop")]);
        assert!(scheduler.is_empty());
        assert!(!scheduler.contains(handle));

        // Exactly once.
        assert!(scheduler.expired(100).is_empty());
        assert_eq!(scheduler.cancel(handle), None);
    }

    #[test]
    fn fires_late_in_order() {
        let mut scheduler = Scheduler::new();
        let late = scheduler.schedule(0, 7, 'b');
        let early = scheduler.schedule(0, 3, 'a');
        let future = scheduler.schedule(0, 50, 'c');

        assert_eq!(scheduler.next_deadline(), Some(3));
        assert_eq!(scheduler.expired(20), vec![(early, 'a'), (late, 'b')]);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.contains(future));
        assert_eq!(scheduler.next_deadline(), Some(50));
    }

    #[test]
    fn cancel_before_expiry() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(0, 5, 1);
        let other = scheduler.schedule(0, 5, 2);

        assert_eq!(scheduler.cancel(handle), Some(1));
        assert_eq!(scheduler.cancel(handle), None);
        assert_eq!(scheduler.expired(5), vec![(other, 2)]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(0, 1, ());
        let _other = scheduler.schedule(0, 2, ());

        assert_eq!(scheduler.clear(), 2);
        assert_eq!(scheduler.next_deadline(), None);
        assert!(scheduler.expired(u64::MAX).is_empty());
        assert_eq!(scheduler.cancel(handle), None);
    }

    #[test]
    fn saturating_expiry() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(u64::MAX - 1, 10, ());

        assert_eq!(scheduler.next_deadline(), Some(u64::MAX));
        assert_eq!(scheduler.expired(u64::MAX), vec![(handle, ())]);
    }
}
