//! Shared shape of every entity state machine.
//!
//! Each entity type has a marker struct implementing [`Lifecycle`], whose
//! `target` function is the whole transition table: a `match` on
//! `(status, event)` with no allocation and nothing to initialise. A missing
//! arm is an illegal transition, never a no-op.

use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};

use super::EntityKind;
use crate::error::{Result, VernissageError};

pub trait Lifecycle {
    type Status: Copy + Eq + Debug + Display + Send + Sync + 'static;
    type Event: Copy + Eq + Debug + Display + Send + Sync + 'static;

    const ENTITY: EntityKind;
    const INITIAL: Self::Status;
    const STATUSES: &'static [Self::Status];
    const EVENTS: &'static [Self::Event];

    /// Status reached by applying `event` in `status`, if the table has a cell for it.
    fn target(status: Self::Status, event: Self::Event) -> Option<Self::Status>;

    /// No event is accepted from a terminal status.
    fn is_terminal(status: Self::Status) -> bool {
        Self::EVENTS
            .iter()
            .all(|&event| Self::target(status, event).is_none())
    }

    /// Events accepted from `status`, in declaration order.
    fn accepted_events(status: Self::Status) -> Vec<Self::Event> {
        Self::EVENTS
            .iter()
            .copied()
            .filter(|&event| Self::target(status, event).is_some())
            .collect()
    }
}

/// Resolve a transition or fail with [`VernissageError::IllegalTransition`].
pub fn resolve<L: Lifecycle>(
    key: &impl Display,
    status: L::Status,
    event: L::Event,
) -> Result<L::Status> {
    L::target(status, event).ok_or_else(|| VernissageError::IllegalTransition {
        entity: L::ENTITY,
        key: key.to_string(),
        current: status.to_string(),
        event: event.to_string(),
    })
}

/// What a transition does to one of the review timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Milestone {
    #[default]
    Keep,
    Set(DateTime<Utc>),
    Clear,
}

impl Milestone {
    pub fn apply(self, current: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match self {
            Milestone::Keep => current,
            Milestone::Set(at) => Some(at),
            Milestone::Clear => None,
        }
    }

    /// `(overwrite, value)` pair for a `CASE WHEN` column update.
    pub fn as_binding(self) -> (bool, Option<DateTime<Utc>>) {
        match self {
            Milestone::Keep => (false, None),
            Milestone::Set(at) => (true, Some(at)),
            Milestone::Clear => (true, None),
        }
    }
}

/// Review timestamp effects of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Milestones {
    pub submitted_at: Milestone,
    pub approved_at: Milestone,
}

impl Milestones {
    pub fn keep() -> Self {
        Self::default()
    }

    /// Entering review: stamp the submission time.
    pub fn submitted(now: DateTime<Utc>) -> Self {
        Self {
            submitted_at: Milestone::Set(now),
            approved_at: Milestone::Keep,
        }
    }

    pub fn approved(now: DateTime<Utc>) -> Self {
        Self {
            submitted_at: Milestone::Keep,
            approved_at: Milestone::Set(now),
        }
    }

    /// Leaving review without approval.
    pub fn review_closed() -> Self {
        Self {
            submitted_at: Milestone::Clear,
            approved_at: Milestone::Keep,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashSet, VecDeque};
    use std::hash::Hash;

    use super::Lifecycle;

    /// Every status reachable from the initial one can still reach a terminal status.
    pub fn assert_terminates<L: Lifecycle>()
    where
        L::Status: Hash,
    {
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::from([L::INITIAL]);
        while let Some(status) = queue.pop_front() {
            if !reachable.insert(status) {
                continue;
            }
            for event in L::accepted_events(status) {
                if let Some(next) = L::target(status, event) {
                    queue.push_back(next);
                }
            }
        }

        for &status in &reachable {
            let mut seen = HashSet::new();
            let mut queue = VecDeque::from([status]);
            let mut found = false;
            while let Some(current) = queue.pop_front() {
                if L::is_terminal(current) {
                    found = true;
                    break;
                }
                if !seen.insert(current) {
                    continue;
                }
                for event in L::accepted_events(current) {
                    if let Some(next) = L::target(current, event) {
                        queue.push_back(next);
                    }
                }
            }
            assert!(found, "{} status {status} cannot reach a terminal status", L::ENTITY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestone_application() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(1);
        assert_eq!(Milestone::Keep.apply(Some(earlier)), Some(earlier));
        assert_eq!(Milestone::Set(now).apply(Some(earlier)), Some(now));
        assert_eq!(Milestone::Clear.apply(Some(earlier)), None);
        assert_eq!(Milestone::Keep.as_binding(), (false, None));
        assert_eq!(Milestone::Clear.as_binding(), (true, None));
    }
}
