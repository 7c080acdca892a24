//! Tracker-protection overrides made while browsing privately.
//!
//! The map lives only as long as the private session. It is deliberately not
//! serializable and is reset in full when the last private window closes.

use std::collections::HashMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrackerDecision {
    Allow,
    Block,
}

#[derive(Debug, Default)]
pub struct PrivatePreferenceOverrides {
    by_origin: HashMap<String, TrackerDecision>,
}

impl PrivatePreferenceOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision for the origin of `url`. Returns false if `url`
    /// has no usable origin.
    pub fn set(&mut self, url: &str, decision: TrackerDecision) -> bool {
        match origin_key(url) {
            Some(origin) => {
                self.by_origin.insert(origin, decision);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, url: &str) -> Option<TrackerDecision> {
        origin_key(url).and_then(|o| self.by_origin.get(&o).copied())
    }

    pub fn clear_origin(&mut self, url: &str) -> Option<TrackerDecision> {
        origin_key(url).and_then(|o| self.by_origin.remove(&o))
    }

    /// Drops every override. Called at private session end.
    pub fn clear_all(&mut self) {
        self.by_origin = HashMap::new();
    }

    pub fn len(&self) -> usize {
        self.by_origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_origin.is_empty()
    }
}

fn origin_key(url: &str) -> Option<String> {
    let origin = url::Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
