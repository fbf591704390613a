use std::time::Duration;

/// What a timer drives. Declaration order is the tie-break when several
/// timers share a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Polls the resource loader while prepping.
    Prep,
    /// One-shot delay between `start_animator` and the first decode.
    Ready,
    /// Presents frames at frame-duration granularity.
    Display,
    /// Decode-ahead cadence.
    Decode,
}

/// Handle to a scheduled timer. Stale once the timer is cancelled or a one-shot fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    kind: TimerKind,
}

impl TimerHandle {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

#[derive(Debug, Clone)]
struct Timer {
    handle: TimerHandle,
    deadline: Duration,
    period: Option<Duration>,
}

/// Cooperative timer set driven from a single event loop.
///
/// Nothing fires on its own: the owner calls `pop_due` with the current time.
/// Repeating timers that fall behind fire once and skip to the next period
/// boundary after `now`, so missed ticks never pile up.
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
    next_id: u64,
}

const MIN_PERIOD: Duration = Duration::from_micros(100);

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, kind: TimerKind, deadline: Duration) -> TimerHandle {
        self.insert(kind, deadline, None)
    }

    pub fn schedule_repeating(
        &mut self,
        kind: TimerKind,
        first_deadline: Duration,
        period: Duration,
    ) -> TimerHandle {
        self.insert(kind, first_deadline, Some(period.max(MIN_PERIOD)))
    }

    fn insert(&mut self, kind: TimerKind, deadline: Duration, period: Option<Duration>) -> TimerHandle {
        let handle = TimerHandle {
            id: self.next_id,
            kind,
        };
        self.next_id += 1;
        self.timers.push(Timer {
            handle,
            deadline,
            period,
        });
        handle
    }

    /// Returns false if the handle was already stale.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    pub fn cancel_kind(&mut self, kind: TimerKind) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle.kind != kind);
        before - self.timers.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.timers.len();
        self.timers.clear();
        n
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn has_kind(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.handle.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// Takes the earliest timer due at `now`, rescheduling it if it repeats.
    pub fn pop_due(&mut self, now: Duration) -> Option<TimerHandle> {
        let pos = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.handle.kind, t.handle.id))
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[pos];
        let handle = timer.handle;
        match timer.period {
            Some(period) => timer.deadline = next_boundary_after(timer.deadline, period, now),
            None => {
                self.timers.swap_remove(pos);
            }
        }
        Some(handle)
    }
}

/// First `deadline + k * period` (k >= 1) strictly after `now`.
fn next_boundary_after(deadline: Duration, period: Duration, now: Duration) -> Duration {
    let next = deadline + period;
    if next > now {
        return next;
    }
    let period_ns = period.as_nanos();
    let behind_ns = (now - deadline).as_nanos();
    let steps = behind_ns / period_ns + 1;
    let advance = u64::try_from(steps * period_ns).unwrap_or(u64::MAX);
    deadline + Duration::from_nanos(advance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nothing_fires_early() {
        let mut q = TimerQueue::new();
        q.schedule_once(TimerKind::Ready, ms(10));
        assert!(q.pop_due(ms(9)).is_none());
        assert_eq!(q.pop_due(ms(10)).map(|h| h.kind()), Some(TimerKind::Ready));
        assert!(q.is_empty());
    }

    #[test]
    fn repeating_timer_reschedules_on_grid() {
        let mut q = TimerQueue::new();
        let h = q.schedule_repeating(TimerKind::Display, ms(100), ms(100));
        assert_eq!(q.pop_due(ms(100)), Some(h));
        assert_eq!(q.next_deadline(), Some(ms(200)));
        assert!(q.is_active(h));
    }

    #[test]
    fn late_repeating_timer_fires_once_and_skips_missed_ticks() {
        let mut q = TimerQueue::new();
        let h = q.schedule_repeating(TimerKind::Display, ms(100), ms(100));
        assert_eq!(q.pop_due(ms(450)), Some(h));
        assert!(q.pop_due(ms(450)).is_none());
        assert_eq!(q.next_deadline(), Some(ms(500)));
    }

    #[test]
    fn exact_boundary_moves_past_now() {
        assert_eq!(next_boundary_after(ms(100), ms(100), ms(300)), ms(400));
        assert_eq!(next_boundary_after(ms(100), ms(100), ms(150)), ms(200));
    }

    #[test]
    fn ties_break_by_kind() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(TimerKind::Decode, ms(50), ms(50));
        q.schedule_repeating(TimerKind::Display, ms(50), ms(100));
        assert_eq!(q.pop_due(ms(50)).map(|h| h.kind()), Some(TimerKind::Display));
        assert_eq!(q.pop_due(ms(50)).map(|h| h.kind()), Some(TimerKind::Decode));
    }

    #[test]
    fn earliest_deadline_first() {
        let mut q = TimerQueue::new();
        q.schedule_once(TimerKind::Decode, ms(20));
        q.schedule_once(TimerKind::Prep, ms(30));
        assert_eq!(q.pop_due(ms(40)).map(|h| h.kind()), Some(TimerKind::Decode));
        assert_eq!(q.pop_due(ms(40)).map(|h| h.kind()), Some(TimerKind::Prep));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut q = TimerQueue::new();
        let h = q.schedule_repeating(TimerKind::Decode, ms(10), ms(10));
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert!(q.pop_due(ms(1000)).is_none());
    }

    #[test]
    fn cancel_kind_leaves_others() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(TimerKind::Decode, ms(10), ms(10));
        q.schedule_repeating(TimerKind::Display, ms(10), ms(20));
        q.schedule_once(TimerKind::Prep, ms(5));
        assert_eq!(q.cancel_kind(TimerKind::Decode), 1);
        assert!(!q.has_kind(TimerKind::Decode));
        assert!(q.has_kind(TimerKind::Display));
        assert_eq!(q.cancel_all(), 2);
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn zero_period_is_clamped() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(TimerKind::Decode, ms(0), Duration::ZERO);
        assert!(q.pop_due(ms(0)).is_some());
        assert!(q.pop_due(ms(0)).is_none());
    }
}
