use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last known availability of a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityState {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl From<bool> for AvailabilityState {
    fn from(available: bool) -> Self {
        if available {
            AvailabilityState::Available
        } else {
            AvailabilityState::Unavailable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: AvailabilityState,
    pub current: AvailabilityState,
}

impl Transition {
    /// Only an observed unavailable -> available edge is worth an alert. The
    /// first observation of a target never is.
    pub fn should_notify(&self) -> bool {
        self.previous == AvailabilityState::Unavailable && self.current == AvailabilityState::Available
    }

    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// In-memory availability per target id. Not persisted: after a restart
/// every target starts from `Unknown`.
#[derive(Debug, Default)]
pub struct AvailabilityTracker {
    states: HashMap<String, AvailabilityState>,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, target_id: &str, available: bool) -> Transition {
        let current = AvailabilityState::from(available);
        let previous = self
            .states
            .insert(target_id.to_string(), current)
            .unwrap_or_default();

        Transition { previous, current }
    }

    pub fn state(&self, target_id: &str) -> AvailabilityState {
        self.states.get(target_id).copied().unwrap_or_default()
    }

    pub fn forget(&mut self, target_id: &str) {
        self.states.remove(target_id);
    }
}
