use std::time::Duration;

use chrono::{DateTime, Utc};

/// The coordinator's initial phase sequence after an empty-state startup,
/// allowing workers to register before dispatch begins.
///
/// The canonical variant name is `Preparation`;
/// [`ColdStartPhase::queue_alias`] exposes the `"tickets"` spelling the
/// queue consumer's log lines historically used, kept as a display synonym
/// rather than a second variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColdStartPhase {
    Discovery,
    Preparation,
    Dispatch,
}

impl ColdStartPhase {
    pub fn queue_alias(&self) -> &'static str {
        match self {
            ColdStartPhase::Discovery => "discovery",
            ColdStartPhase::Preparation => "tickets",
            ColdStartPhase::Dispatch => "dispatch",
        }
    }
}

impl std::fmt::Display for ColdStartPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColdStartPhase::Discovery => write!(f, "discovery"),
            ColdStartPhase::Preparation => write!(f, "preparation"),
            ColdStartPhase::Dispatch => write!(f, "dispatch"),
        }
    }
}

/// Tracks elapsed time since the first coordinator epoch after an
/// empty-state startup and maps it to a [`ColdStartPhase`]. Disabled
/// trackers report `Dispatch` immediately.
pub struct ColdStartTracker {
    enabled: bool,
    discovery: Duration,
    preparation: Duration,
    started_at: DateTime<Utc>,
}

impl ColdStartTracker {
    pub fn new(enabled: bool, discovery: Duration, preparation: Duration) -> Self {
        ColdStartTracker { enabled, discovery, preparation, started_at: Utc::now() }
    }

    pub fn disabled() -> Self {
        ColdStartTracker::new(false, Duration::ZERO, Duration::ZERO)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> ColdStartPhase {
        if !self.enabled {
            return ColdStartPhase::Dispatch;
        }
        let elapsed = (now - self.started_at).to_std().unwrap_or_default();
        if elapsed < self.discovery {
            ColdStartPhase::Discovery
        } else if elapsed < self.discovery + self.preparation {
            ColdStartPhase::Preparation
        } else {
            ColdStartPhase::Dispatch
        }
    }

    /// Workers delay dispatch until the tracker reaches `Dispatch`, giving
    /// late arrivals time to register during discovery/preparation.
    pub fn should_delay_dispatch(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) != ColdStartPhase::Dispatch
    }
}
