use std::sync::{Arc, Mutex};

use super::results::RunReport;
use super::selection::{SelectionSummary, TriggerState};

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Busy,
    Succeeded,
    Failed,
}

/// State transitions pushed to whatever renders the uploader.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    EndpointChanged(String),
    SelectionChanged(Option<SelectionSummary>),
    TriggerChanged(TriggerState),
    PhaseChanged(RunPhase),
    ResultHidden,
    ProgressShown,
    /// Percentage in `0.0..=100.0`.
    Progress(f64),
    ProgressHidden,
    Finished(Arc<RunReport>),
}

pub trait UploadObserver: Send + Sync {
    fn on_event(&self, event: &UploadEvent);
}

/// Deliver an event, logging it at debug level.
pub fn emit_event(observer: &dyn UploadObserver, event: UploadEvent) {
    log::debug!("Emitting upload event: {}", event_name(&event));
    observer.on_event(&event);
}

fn event_name(event: &UploadEvent) -> &'static str {
    match event {
        UploadEvent::EndpointChanged(_) => "endpoint-changed",
        UploadEvent::SelectionChanged(_) => "selection-changed",
        UploadEvent::TriggerChanged(_) => "trigger-changed",
        UploadEvent::PhaseChanged(_) => "phase-changed",
        UploadEvent::ResultHidden => "result-hidden",
        UploadEvent::ProgressShown => "progress-shown",
        UploadEvent::Progress(_) => "upload-progress",
        UploadEvent::ProgressHidden => "progress-hidden",
        UploadEvent::Finished(_) => "upload-finished",
    }
}

/// Progress before uploading file `index` of `total`.
pub fn progress_before(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (index as f64 / total as f64) * 100.0
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<UploadEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UploadEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(e) => {
                log::warn!("Recorded events lock poisoned (non-critical): {}", e);
                Vec::new()
            }
        }
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn phases(&self) -> Vec<RunPhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::PhaseChanged(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn last_report(&self) -> Option<Arc<RunReport>> {
        self.events().into_iter().rev().find_map(|e| match e {
            UploadEvent::Finished(report) => Some(report),
            _ => None,
        })
    }

    pub fn last_trigger(&self) -> Option<TriggerState> {
        self.events().into_iter().rev().find_map(|e| match e {
            UploadEvent::TriggerChanged(trigger) => Some(trigger),
            _ => None,
        })
    }

    pub fn count(&self, predicate: impl Fn(&UploadEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(*e)).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl UploadObserver for RecordingObserver {
    fn on_event(&self, event: &UploadEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(e) => log::warn!("Failed to record upload event (non-critical): {}", e),
        }
    }
}
