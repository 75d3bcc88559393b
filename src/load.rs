//! Runtime load lookup.
//!
//! Loads come from an external trace importer, already aggregated per
//! component and per call. They only tint the output (tower intensity and
//! call links) and never feed back into geometry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One observed call from `component` into `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLoad {
    pub parent: String,
    pub component: String,
    pub load: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTable {
    /// Load per component, keyed by full or short name.
    pub components: BTreeMap<String, f32>,
    pub calls: Vec<CallLoad>,
}

impl LoadTable {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.calls.is_empty()
    }

    /// Load of a component, looked up by full name first, then by short name.
    pub fn component_load(&self, full_name: &str, short_name: &str) -> Option<f32> {
        self.components
            .get(full_name)
            .or_else(|| self.components.get(short_name))
            .copied()
    }

    pub fn component_range(&self) -> LoadRange {
        self.components.values().copied().collect()
    }

    pub fn call_range(&self) -> LoadRange {
        self.calls.iter().map(|c| c.load).collect()
    }
}

/// Running min/max of a set of loads.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoadRange {
    min: f32,
    max: f32,
}

impl Default for LoadRange {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        }
    }
}

impl LoadRange {
    pub fn include(&mut self, load: f32) {
        if !load.is_finite() {
            return;
        }
        self.min = self.min.min(load);
        self.max = self.max.max(load);
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Maps `load` into `[0, 1]`. Loads past either end are clamped.
    /// A range holding a single value maps everything at or above it to 1.
    pub fn scale(&self, load: f32) -> f32 {
        if self.is_empty() || !load.is_finite() {
            return 0.0;
        }
        let span = self.max - self.min;
        if span <= f32::EPSILON {
            return if load >= self.min { 1.0 } else { 0.0 };
        }
        ((load - self.min) / span).clamp(0.0, 1.0)
    }
}

impl FromIterator<f32> for LoadRange {
    fn from_iter<I: IntoIterator<Item = f32>>(iter: I) -> Self {
        let mut range = Self::default();
        for load in iter {
            range.include(load);
        }
        range
    }
}
