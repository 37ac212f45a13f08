//! Client-side scan progress, shared with a display layer

use std::sync::Arc;

use parking_lot::RwLock;
use scanlink_core::ProgressEvent;
use scanlink_types::{FeedSide, ScanOutcome};

/// Snapshot of the progress of one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    /// Side of every captured page, in capture order
    pub markers: Vec<FeedSide>,
    /// Page highlighted for retrieval
    pub selected: usize,
    /// The scan completed and pages can be requested
    pub complete: bool,
    pub pages_saved: usize,
    /// One-line description of the last event
    pub status: String,
    pub outcome: Option<ScanOutcome>,
}

/// Cheaply clonable handle to the progress of a running scan
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    inner: Arc<RwLock<ProgressState>>,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state
    pub fn apply(&self, event: &ProgressEvent) {
        let mut state = self.inner.write();

        state.status = match event {
            ProgressEvent::FeedStart => "Scanning next page...".to_string(),
            ProgressEvent::PageFed => {
                state.markers.push(FeedSide::Front);
                "saving data".to_string()
            }
            ProgressEvent::Backside => {
                state.markers.push(FeedSide::Back);
                "Saving backside".to_string()
            }
            ProgressEvent::PageSaved(n) => {
                state.pages_saved = state.pages_saved.max(*n);
                format!("Saving Page {}", n)
            }
            ProgressEvent::Complete => {
                state.complete = true;
                state.outcome = Some(ScanOutcome::Completed);
                event.to_string()
            }
            ProgressEvent::EmptyScan => {
                state.outcome = Some(ScanOutcome::Empty);
                event.to_string()
            }
            ProgressEvent::Error(message) => {
                state.outcome = Some(ScanOutcome::Faulted(message.clone()));
                event.to_string()
            }
            ProgressEvent::PagesEnd => event.to_string(),
        };
    }

    /// Move the selection one page back
    pub fn select_previous(&self) -> usize {
        let mut state = self.inner.write();
        state.selected = state.selected.saturating_sub(1);
        state.selected
    }

    /// Move the selection one page forward, stopping at the last page
    pub fn select_next(&self) -> usize {
        let mut state = self.inner.write();
        let last = state.markers.len().saturating_sub(1);
        state.selected = (state.selected + 1).min(last);
        state.selected
    }

    pub fn selected(&self) -> usize {
        self.inner.read().selected
    }

    pub fn is_complete(&self) -> bool {
        self.inner.read().complete
    }

    pub fn pages_saved(&self) -> usize {
        self.inner.read().pages_saved
    }

    pub fn markers(&self) -> Vec<FeedSide> {
        self.inner.read().markers.clone()
    }

    pub fn status(&self) -> String {
        self.inner.read().status.clone()
    }

    pub fn snapshot(&self) -> ProgressState {
        self.inner.read().clone()
    }
}
