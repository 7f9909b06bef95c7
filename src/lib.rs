pub mod analysis;
pub mod app;
pub mod channel;
pub mod config;
pub mod session;
pub mod ui;

use serde::{Deserialize, Serialize};

/// One frame of the live feed: per-core utilization values paired
/// positionally with per-core descriptive sentences.
///
/// Index `i` in `cpus` corresponds to index `i` in `sentences`. Samples
/// carry no history; each one supersedes the previous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub cpus: Vec<f32>,
    pub sentences: Vec<String>,
}

impl MetricSample {
    /// The two sequences must stay parallel; a frame that violates this is
    /// treated as malformed and dropped at the channel boundary.
    pub fn is_coherent(&self) -> bool {
        self.cpus.len() == self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }
}

/// Single response frame from the text-generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisText {
    pub text: String,
}
