//! Performance metric definitions

use serde::{Deserialize, Serialize};

/// Whether higher values of a metric are good or bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub polarity: Polarity,
    /// Integrating metrics accumulate sector contributions across steps
    /// (dust coverage, cumulative counters); non-cumulative metrics are
    /// recomputed from this step's contributions alone.
    #[serde(default)]
    pub cumulative: bool,
}

impl MetricDefinition {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            unit: None,
            polarity: Polarity::Positive,
            cumulative: false,
        }
    }

    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    pub fn negative(mut self) -> Self {
        self.polarity = Polarity::Negative;
        self
    }
}
