use thiserror::Error;

use crate::layout::Footprint;

pub type Result<T> = std::result::Result<T, CityError>;

#[derive(Error, Debug)]
pub enum CityError {
    #[error("Invalid dependency name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A scope kept a cycle after the removal heuristic reached its fixed point.
    #[error("Scope '{scope}' is still cyclic after cycle removal: {}", cycle.join(" -> "))]
    CyclicScope { scope: String, cycle: Vec<String> },

    #[error("Degenerate footprint for '{name}': {footprint:?}")]
    DegenerateFootprint { name: String, footprint: Footprint },

    #[error("Name '{name}' is nested {depth} levels deep, the limit is {max}")]
    NameTooDeep { name: String, depth: usize, max: usize },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CityError {
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// True for the invariant violations that make a result unusable.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::CyclicScope { .. } | Self::DegenerateFootprint { .. }
        )
    }
}
