//! Progress reporting for external observers.
//!
//! A [`ProgressReporter`] belongs to one run. It fans events out to any number
//! of [`ProgressSink`]s and guarantees the reported percentage never decreases.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{PipelineOutcome, ProgressEvent, Stage};

/// Observer of one or more pipeline runs
pub trait ProgressSink: Send + Sync {
    /// A run has started
    fn on_started(&self, _run_id: &str, _query: &str) {}

    fn on_event(&self, event: &ProgressEvent);

    /// A renderer output line
    fn on_output(&self, _run_id: &str, _line: &str) {}

    /// A run reached its terminal outcome
    fn on_finished(&self, _outcome: &PipelineOutcome) {}
}

#[derive(Debug)]
struct ReporterState {
    stage: Stage,
    percent: u8,
}

/// Per-run progress fan-out with a monotonic percentage
pub struct ProgressReporter {
    run_id: String,
    sinks: Vec<Arc<dyn ProgressSink>>,
    state: Mutex<ReporterState>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    /// Reporter for a new run with a fresh run id
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            sinks: Vec::new(),
            state: Mutex::new(ReporterState {
                stage: Stage::Initializing,
                percent: 0,
            }),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Last stage reported
    pub fn current_stage(&self) -> Stage {
        self.state.lock().map(|s| s.stage).unwrap_or(Stage::Initializing)
    }

    pub fn current_percent(&self) -> u8 {
        self.state.lock().map(|s| s.percent).unwrap_or(0)
    }

    pub fn started(&self, query: &str) {
        for sink in &self.sinks {
            sink.on_started(&self.run_id, query);
        }
    }

    /// Report entry into a stage at its nominal percentage
    pub fn report(&self, stage: Stage, detail: Option<String>) {
        self.report_at(stage, stage.nominal_percent(), detail);
    }

    /// Report a stage at an explicit percentage, clamped so it never goes backwards
    pub fn report_at(&self, stage: Stage, percent: u8, detail: Option<String>) {
        let percent = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.stage = stage;
            state.percent = state.percent.max(percent.min(100));
            state.percent
        };

        let event = ProgressEvent {
            run_id: self.run_id.clone(),
            stage,
            percent,
            detail,
            timestamp: Utc::now(),
        };
        for sink in &self.sinks {
            sink.on_event(&event);
        }
    }

    pub fn output_line(&self, line: &str) {
        for sink in &self.sinks {
            sink.on_output(&self.run_id, line);
        }
    }

    /// Emit the terminal event and hand the outcome to every sink
    pub fn finish(&self, outcome: &PipelineOutcome) {
        let (stage, detail) = match outcome {
            PipelineOutcome::Success(s) => (Stage::Completed, Some(s.link.clone())),
            PipelineOutcome::Failure(f) => (Stage::Failed, Some(f.reason.clone())),
        };
        self.report_at(stage, 100, detail);
        for sink in &self.sinks {
            sink.on_finished(outcome);
        }
    }
}

/// Sink that logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_started(&self, run_id: &str, query: &str) {
        info!("Run {} started: {}", run_id, query);
    }

    fn on_event(&self, event: &ProgressEvent) {
        match &event.detail {
            Some(detail) => info!(
                "[{:>3}%] {} - {}",
                event.percent,
                event.stage.label(),
                detail.lines().next().unwrap_or_default()
            ),
            None => info!("[{:>3}%] {}", event.percent, event.stage.label()),
        }
    }

    fn on_output(&self, _run_id: &str, line: &str) {
        debug!("render output: {}", line);
    }
}

/// Sink that republishes events on a broadcast channel
#[derive(Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressSink for ChannelSink {
    fn on_event(&self, event: &ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, RenderFailure};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
        finished: Mutex<usize>,
    }

    impl ProgressSink for Recorder {
        fn on_event(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn on_finished(&self, _outcome: &PipelineOutcome) {
            *self.finished.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_percent_never_decreases() {
        let recorder = Arc::new(Recorder::default());
        let reporter = ProgressReporter::with_run_id("run-1").with_sink(recorder.clone());

        reporter.report(Stage::Render, None);
        reporter.report(Stage::Repair, Some("attempt 1".to_string()));
        reporter.report(Stage::CodeValidation, None);

        let events = recorder.events.lock().unwrap();
        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![70, 70, 70]);
        assert_eq!(events[1].stage, Stage::Repair);
        assert_eq!(reporter.current_stage(), Stage::CodeValidation);
    }

    #[test]
    fn test_finish_reports_100_and_notifies() {
        let recorder = Arc::new(Recorder::default());
        let reporter = ProgressReporter::with_run_id("run-2").with_sink(recorder.clone());
        reporter.report(Stage::Feasibility, None);

        let outcome = PipelineOutcome::Failure(RenderFailure::new(
            "run-2",
            FailureKind::Infeasible,
            Stage::Feasibility,
            "not an animation",
        ));
        reporter.finish(&outcome);

        let events = recorder.events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.percent, 100);
        assert_eq!(last.stage, Stage::Failed);
        assert_eq!(*recorder.finished.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_events() {
        let sink = ChannelSink::new(16);
        let mut rx = sink.subscribe();
        let reporter = ProgressReporter::with_run_id("run-3").with_sink(Arc::new(sink));

        reporter.report(Stage::Description, Some("drafting".to_string()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id, "run-3");
        assert_eq!(event.stage, Stage::Description);
        assert_eq!(event.percent, 30);
    }

    #[test]
    fn test_fresh_run_ids_differ() {
        assert_ne!(ProgressReporter::new().run_id(), ProgressReporter::new().run_id());
    }
}
