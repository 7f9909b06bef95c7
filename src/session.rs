//! Session state machine
//!
//! Owns everything the dashboard renders: the current mode, the last applied
//! metric sample, and the snapshot (if any) with its analysis result. All
//! mutation happens through this type, synchronously within the event loop's
//! callbacks, so exactly one writer touches the display state at a time.
//!
//! ## Mode transitions
//!
//! ```text
//! Live ──capture()──▶ Frozen ──resume()──▶ Live
//! ```
//!
//! While `Frozen`, inbound samples are discarded without mutating the display
//! state. `capture()` reads the *last-applied* sample rather than the last
//! received message, so the snapshot matches exactly what the operator saw
//! when pressing the control.

use chrono::{DateTime, Utc};

use crate::MetricSample;

/// Governs whether live updates are applied to the display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Live,
    Frozen,
}

/// Immutable freeze of the displayed sample, taken at operator request.
///
/// A snapshot is *pending-analysis* until `attach_analysis` delivers the
/// generated text, after which it is *complete*. The generation counter
/// correlates an analysis response with the snapshot that requested it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    sample: MetricSample,
    generation: u64,
    analysis: Option<String>,
}

impl Snapshot {
    pub fn sample(&self) -> &MetricSample {
        &self.sample
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.analysis.is_none()
    }

    /// The payload sent to the analysis service: per-core sentences joined
    /// with newline separators, order preserved.
    pub fn document(&self) -> String {
        self.sample.sentences.join("\n")
    }
}

/// The dashboard session: mode, display state, and channel diagnostics.
pub struct Session {
    mode: SessionMode,

    /// Last sample applied to the display state. This is what `capture()`
    /// freezes; it is never replaced while frozen.
    sample: Option<MetricSample>,

    /// Current snapshot. Present iff mode is `Frozen`.
    snapshot: Option<Snapshot>,

    /// Incremented on every capture; tags analysis requests so that stale
    /// responses can be told apart from the current one.
    generation: u64,

    /// Live channel connection status.
    pub connected: bool,

    /// Last channel diagnostic (decode failure, disconnect reason).
    pub error_message: Option<String>,

    /// Timestamp of the last applied sample.
    pub last_update: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            mode: SessionMode::Live,
            sample: None,
            snapshot: None,
            generation: 0,
            connected: false,
            error_message: None,
            last_update: None,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_frozen(&self) -> bool {
        self.mode == SessionMode::Frozen
    }

    /// The authoritative sample for rendering: the snapshot's while frozen,
    /// the live one otherwise. Exactly one of the two backs the display at
    /// any instant.
    pub fn displayed_sample(&self) -> Option<&MetricSample> {
        match self.mode {
            SessionMode::Frozen => self.snapshot.as_ref().map(Snapshot::sample),
            SessionMode::Live => self.sample.as_ref(),
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Apply one inbound live sample. Returns whether the display state
    /// changed.
    ///
    /// While frozen the sample is discarded: a late frame must never
    /// overwrite the snapshot. A sample whose sequences are misaligned is
    /// rejected like a malformed frame: dropped with a diagnostic, without
    /// terminating anything.
    pub fn apply_sample(&mut self, sample: MetricSample) -> bool {
        if !sample.is_coherent() {
            tracing::error!(
                "dropping misaligned sample: {} cpus vs {} sentences",
                sample.cpus.len(),
                sample.sentences.len()
            );
            self.error_message = Some("malformed sample dropped".to_string());
            return false;
        }

        if self.mode == SessionMode::Frozen {
            tracing::trace!("discarding live sample while frozen");
            return false;
        }

        self.sample = Some(sample);
        self.last_update = Some(Utc::now());
        true
    }

    /// Freeze the currently displayed values and flip to `Frozen`.
    ///
    /// Returns a copy of the new snapshot for the caller to hand to the
    /// analysis requester. Capturing before any sample has been rendered is
    /// a valid degenerate case and yields an empty snapshot.
    pub fn capture(&mut self) -> Snapshot {
        let sample = self.sample.clone().unwrap_or_else(|| MetricSample {
            cpus: Vec::new(),
            sentences: Vec::new(),
        });

        self.generation += 1;

        let snapshot = Snapshot {
            sample,
            generation: self.generation,
            analysis: None,
        };

        self.snapshot = Some(snapshot.clone());
        self.mode = SessionMode::Frozen;

        snapshot
    }

    /// Discard the snapshot and return to live streaming. The caller is
    /// responsible for reopening the live channel; no missed messages are
    /// replayed.
    pub fn resume(&mut self) {
        self.snapshot = None;
        self.mode = SessionMode::Live;
    }

    /// Attach an analysis result to the snapshot that requested it.
    ///
    /// Applied only while frozen and only when the generation matches the
    /// current snapshot; anything else is a stale response (the operator
    /// resumed, or a newer capture superseded it) and is discarded. Returns
    /// whether the result was applied.
    pub fn attach_analysis(&mut self, generation: u64, text: String) -> bool {
        match &mut self.snapshot {
            Some(snapshot)
                if self.mode == SessionMode::Frozen && snapshot.generation == generation =>
            {
                snapshot.analysis = Some(text);
                true
            }
            _ => {
                tracing::debug!("discarding stale analysis response (generation {generation})");
                false
            }
        }
    }

    /// Label of the single operator control, a direct function of the mode.
    pub fn toggle_label(&self) -> &'static str {
        match self.mode {
            SessionMode::Live => "Snapshot",
            SessionMode::Frozen => "Resume",
        }
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
