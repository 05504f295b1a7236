//! Call-level flags for [`uniform_neighbor_sample`](crate::algs::sampling::uniform_neighbor_sample).

use serde::{Deserialize, Serialize};

/// Whether vertices used as sources in earlier hops stay eligible later.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorSourcesBehavior {
    /// Next frontier is exactly this hop's sampled destinations.
    #[default]
    Default,
    /// Earlier sources are re-added to every later frontier.
    CarryOver,
    /// A (vertex, label) used as a source is never a source again.
    Exclude,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Emit the hop index of each output row.
    pub return_hops: bool,
    pub with_replacement: bool,
    pub prior_sources_behavior: PriorSourcesBehavior,
    /// Collapse duplicate (vertex, label) pairs before sampling.
    pub dedupe_sources: bool,
    /// Validate vertex ids against the graph before sampling.
    pub do_expensive_check: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            return_hops: true,
            with_replacement: true,
            prior_sources_behavior: PriorSourcesBehavior::Default,
            dedupe_sources: false,
            do_expensive_check: false,
        }
    }
}

impl SamplingConfig {
    pub fn with_return_hops(mut self, yes: bool) -> Self {
        self.return_hops = yes;
        self
    }
    pub fn with_replacement(mut self, yes: bool) -> Self {
        self.with_replacement = yes;
        self
    }
    pub fn with_prior_sources(mut self, behavior: PriorSourcesBehavior) -> Self {
        self.prior_sources_behavior = behavior;
        self
    }
    pub fn with_dedupe_sources(mut self, yes: bool) -> Self {
        self.dedupe_sources = yes;
        self
    }
    pub fn with_expensive_check(mut self, yes: bool) -> Self {
        self.do_expensive_check = yes;
        self
    }
}
