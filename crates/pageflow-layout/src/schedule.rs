//! Deferred rebalancing for bursts of edits.

use std::time::{Duration, Instant};

use crate::paginator::RebalanceSpan;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    span: RebalanceSpan,
    due: Instant,
}

/// Holds at most one pending rebalance.
///
/// Scheduling while work is pending supersedes it: the spans merge and the
/// deadline moves to `now + delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebalanceScheduler {
    delay: Duration,
    pending: Option<Pending>,
}

impl RebalanceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Span of the pending rebalance.
    pub fn pending_span(&self) -> Option<RebalanceSpan> {
        self.pending.map(|pending| pending.span)
    }

    /// Deadline of the pending rebalance.
    pub fn due_at(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.due)
    }

    /// Queue `span`; returns `true` if earlier pending work was superseded.
    pub fn schedule(&mut self, now: Instant, span: RebalanceSpan) -> bool {
        let due = now + self.delay;
        match self.pending.take() {
            Some(previous) => {
                self.pending = Some(Pending {
                    span: previous.span.merge(span),
                    due,
                });
                true
            }
            None => {
                self.pending = Some(Pending { span, due });
                false
            }
        }
    }

    /// Take the pending span if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<RebalanceSpan> {
        match self.pending {
            Some(pending) if pending.due <= now => {
                self.pending = None;
                Some(pending.span)
            }
            _ => None,
        }
    }

    /// Take the pending span regardless of its deadline.
    pub fn take(&mut self) -> Option<RebalanceSpan> {
        self.pending.take().map(|pending| pending.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_edits_supersede_and_push_the_deadline() {
        let start = Instant::now();
        let mut scheduler = RebalanceScheduler::new(Duration::from_millis(50));
        assert!(!scheduler.schedule(start, RebalanceSpan::grow(3)));
        assert!(scheduler.schedule(start + Duration::from_millis(30), RebalanceSpan::grow(1)));

        assert_eq!(scheduler.take_due(start + Duration::from_millis(60)), None);
        let span = scheduler.take_due(start + Duration::from_millis(80));
        assert_eq!(
            span.map(|s| (s.first, s.last)),
            Some((1, 3))
        );
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn take_ignores_the_deadline() {
        let now = Instant::now();
        let mut scheduler = RebalanceScheduler::new(Duration::from_secs(60));
        scheduler.schedule(now, RebalanceSpan::shrink(0, 2));
        assert_eq!(scheduler.take_due(now), None);
        assert_eq!(scheduler.take(), Some(RebalanceSpan::shrink(0, 2)));
        assert_eq!(scheduler.take(), None);
    }
}
