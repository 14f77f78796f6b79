//! Per-subscriber event filtering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Declarative predicate a subscriber attaches to its subscription.
///
/// Both constraints must hold for an event to pass. A zero `min_severity`
/// and an empty `regions` set each mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Inclusive lower bound on normalized severity
    #[serde(default)]
    pub min_severity: u8,
    /// Regions of interest; the event must touch at least one
    #[serde(default)]
    pub regions: BTreeSet<String>,
}

impl Filter {
    /// Whether this filter lets `event` through.
    pub fn matches(&self, event: &Event) -> bool {
        if event.severity < self.min_severity {
            return false;
        }
        self.regions.is_empty() || event.touches_any(&self.regions)
    }

    /// True when the filter places no constraint at all.
    pub fn is_empty(&self) -> bool {
        self.min_severity == 0 && self.regions.is_empty()
    }
}

/// Evaluate an optional subscription filter; an absent filter passes everything.
pub fn passes(filter: Option<&Filter>, event: &Event) -> bool {
    filter.map_or(true, |f| f.matches(event))
}
