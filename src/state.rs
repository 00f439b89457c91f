//! Report page state as a pure reducer, plus a session wrapper that runs
//! fetches against it.
//!
//! Each fetch carries a request id. Only the completion of the most recently
//! started request is applied; anything older is dropped, so a slow earlier
//! request cannot overwrite the answer to a newer one.

use crate::classifier::{FilterType, Selection};
use crate::fetch::{fetch_report, ReportQuery, ReportSource};
use crate::loader::LoadReport;
use crate::reports::apply_selection;
use crate::types::ReportRoot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const NO_DATA_MESSAGE: &str = "No data for this period.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// Fetch succeeded but there is nothing to show.
    Empty,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub report: Option<Arc<ReportRoot>>,
    pub load_report: Option<LoadReport>,
    pub selection: Selection,
    pub status: LoadStatus,
    /// User-facing banner text (error or informational).
    pub message: Option<String>,
    pub latest_request: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Action {
    FetchStarted {
        request_id: u64,
    },
    FetchSucceeded {
        request_id: u64,
        report: ReportRoot,
        load: LoadReport,
    },
    FetchFailed {
        request_id: u64,
        message: String,
    },
    SelectionChanged(Selection),
    DismissMessage,
    Reset,
}

/// What an export should be built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSnapshot {
    pub report: ReportRoot,
    pub filter: FilterType,
}

pub fn reduce(state: PageState, action: Action) -> PageState {
    match action {
        Action::FetchStarted { request_id } => PageState {
            status: LoadStatus::Loading,
            message: None,
            latest_request: Some(request_id),
            ..state
        },
        Action::FetchSucceeded {
            request_id,
            report,
            load,
        } => {
            if state.latest_request != Some(request_id) {
                debug!(request_id, latest = ?state.latest_request, "dropping stale report response");
                return state;
            }
            let (status, message) = if report.is_empty() {
                (LoadStatus::Empty, Some(NO_DATA_MESSAGE.to_string()))
            } else {
                (LoadStatus::Loaded, None)
            };
            PageState {
                report: Some(Arc::new(report)),
                load_report: Some(load),
                status,
                message,
                ..state
            }
        }
        Action::FetchFailed {
            request_id,
            message,
        } => {
            if state.latest_request != Some(request_id) {
                debug!(request_id, latest = ?state.latest_request, "dropping stale report failure");
                return state;
            }
            // never leave old data on screen next to an error
            PageState {
                report: None,
                load_report: None,
                status: LoadStatus::Failed,
                message: Some(message),
                ..state
            }
        }
        Action::SelectionChanged(selection) => PageState { selection, ..state },
        Action::DismissMessage => {
            let status = if state.status == LoadStatus::Failed {
                LoadStatus::Idle
            } else {
                state.status
            };
            PageState {
                message: None,
                status,
                ..state
            }
        }
        Action::Reset => PageState::default(),
    }
}

impl PageState {
    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    /// The report as the page shows it under the current selection.
    pub fn view(&self) -> Option<ReportRoot> {
        self.report
            .as_deref()
            .map(|r| apply_selection(r, &self.selection))
    }

    /// The filtered snapshot an export triggered now should use. `None`
    /// while nothing is loaded (or a reload is in flight), in which case the
    /// export is skipped.
    pub fn export_snapshot(&self) -> Option<ExportSnapshot> {
        match self.status {
            LoadStatus::Loaded | LoadStatus::Empty => self.view().map(|report| ExportSnapshot {
                report,
                filter: self.selection.filter,
            }),
            _ => None,
        }
    }
}

/// One report page: the single current-state slot and a request counter.
#[derive(Debug, Default)]
pub struct ReportSession {
    state: Mutex<PageState>,
    next_request: AtomicU64,
}

impl ReportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PageState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply `action` and swap in the new state as a whole.
    pub fn dispatch(&self, action: Action) -> PageState {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = std::mem::take(&mut *guard);
        *guard = reduce(current, action);
        guard.clone()
    }

    pub fn select(&self, selection: Selection) -> PageState {
        self.dispatch(Action::SelectionChanged(selection))
    }

    fn next_request_id(&self) -> u64 {
        self.next_request.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch a report and record the outcome, unless a newer load was
    /// started in the meantime.
    pub async fn load(&self, source: &dyn ReportSource, query: &ReportQuery) -> PageState {
        let request_id = self.next_request_id();
        self.dispatch(Action::FetchStarted { request_id });
        let action = match fetch_report(source, query).await {
            Ok((report, load)) => {
                info!(
                    request_id,
                    endpoint = %query.endpoint,
                    groups = report.groups.len(),
                    members = report.member_count(),
                    "report loaded"
                );
                Action::FetchSucceeded {
                    request_id,
                    report,
                    load,
                }
            }
            Err(e) => Action::FetchFailed {
                request_id,
                message: e.user_message(),
            },
        };
        self.dispatch(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReportError, ReportResult};
    use crate::types::ReportPeriod;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn period() -> ReportPeriod {
        ReportPeriod::parse("2024-01-01", "2024-01-31").unwrap()
    }

    fn payload(accepted: u32) -> Value {
        json!({
            "periodStart": "2024-01-01",
            "periodEnd": "2024-01-31",
            "groups": [{ "groupName": "H1", "members": [
                { "workingId": "123", "metrics": { "accepted": accepted, "rejected": 1 } },
                { "workingId": "1234567890", "metrics": { "accepted": 5, "rejected": 0 } }
            ]}]
        })
    }

    struct DelayedSource {
        delay: Duration,
        result: Result<Value, u16>,
    }

    #[async_trait]
    impl ReportSource for DelayedSource {
        async fn fetch_raw(&self, _query: &ReportQuery) -> ReportResult<Value> {
            tokio::time::sleep(self.delay).await;
            match &self.result {
                Ok(v) => Ok(v.clone()),
                Err(status) => Err(ReportError::Status {
                    status: *status,
                    body: String::new(),
                }),
            }
        }
    }

    fn loaded(accepted: u32) -> PageState {
        let (report, load) = crate::loader::normalize(payload(accepted), None).unwrap();
        let s = reduce(PageState::default(), Action::FetchStarted { request_id: 1 });
        reduce(
            s,
            Action::FetchSucceeded {
                request_id: 1,
                report,
                load,
            },
        )
    }

    #[test]
    fn stale_success_is_ignored() {
        let s = reduce(PageState::default(), Action::FetchStarted { request_id: 1 });
        let s = reduce(s, Action::FetchStarted { request_id: 2 });
        let (report, load) = crate::loader::normalize(payload(10), None).unwrap();
        let s = reduce(
            s,
            Action::FetchSucceeded {
                request_id: 1,
                report,
                load,
            },
        );
        assert!(s.report.is_none());
        assert_eq!(s.status, LoadStatus::Loading);
    }

    #[test]
    fn failure_clears_report() {
        let s = loaded(10);
        assert!(s.report.is_some());
        let s = reduce(s, Action::FetchStarted { request_id: 2 });
        let s = reduce(
            s,
            Action::FetchFailed {
                request_id: 2,
                message: "Could not load".into(),
            },
        );
        assert!(s.report.is_none());
        assert_eq!(s.status, LoadStatus::Failed);
        assert_eq!(s.message.as_deref(), Some("Could not load"));

        let s = reduce(s, Action::DismissMessage);
        assert_eq!(s.status, LoadStatus::Idle);
        assert!(s.message.is_none());
    }

    #[test]
    fn empty_result_is_informational() {
        let (report, load) = crate::loader::normalize(json!({ "groups": [] }), Some(period())).unwrap();
        let s = reduce(PageState::default(), Action::FetchStarted { request_id: 1 });
        let s = reduce(
            s,
            Action::FetchSucceeded {
                request_id: 1,
                report,
                load,
            },
        );
        assert_eq!(s.status, LoadStatus::Empty);
        assert_eq!(s.message.as_deref(), Some(NO_DATA_MESSAGE));
    }

    #[test]
    fn export_uses_current_selection() {
        let s = loaded(10);
        let s = reduce(s, Action::SelectionChanged(Selection::company(FilterType::Keta)));
        let snap = s.export_snapshot().unwrap();
        assert_eq!(snap.filter, FilterType::Keta);
        assert_eq!(snap.report.member_count(), 1);
        assert_eq!(snap.report.groups[0].members[0].working_id, "1234567890");
    }

    #[test]
    fn export_without_report_is_skipped() {
        assert!(PageState::default().export_snapshot().is_none());
        let s = reduce(loaded(10), Action::FetchStarted { request_id: 2 });
        assert!(s.export_snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_load_wins_even_if_it_finishes_first() {
        let session = ReportSession::new();
        let slow = DelayedSource {
            delay: Duration::from_millis(200),
            result: Ok(payload(1)),
        };
        let fast = DelayedSource {
            delay: Duration::from_millis(10),
            result: Ok(payload(99)),
        };
        let q = ReportQuery::new("reports/rejections", period());
        tokio::join!(session.load(&slow, &q), session.load(&fast, &q));

        let s = session.state();
        assert_eq!(s.status, LoadStatus::Loaded);
        assert_eq!(s.latest_request, Some(2));
        let report = s.report.unwrap();
        assert_eq!(report.groups[0].members[0].metrics.accepted, 99.0);
    }

    #[tokio::test(start_paused = true)]
    async fn older_failure_cannot_clear_newer_report() {
        let session = ReportSession::new();
        let failing = DelayedSource {
            delay: Duration::from_millis(200),
            result: Err(503),
        };
        let ok = DelayedSource {
            delay: Duration::from_millis(10),
            result: Ok(payload(7)),
        };
        let q = ReportQuery::new("reports/rejections", period());
        tokio::join!(session.load(&failing, &q), session.load(&ok, &q));

        let s = session.state();
        assert_eq!(s.status, LoadStatus::Loaded);
        assert!(s.message.is_none());
        assert!(s.report.is_some());
    }

    #[tokio::test]
    async fn failed_load_sets_user_message() {
        let session = ReportSession::new();
        let failing = DelayedSource {
            delay: Duration::from_millis(0),
            result: Err(500),
        };
        let s = session
            .load(&failing, &ReportQuery::new("reports/rejections", period()))
            .await;
        assert_eq!(s.status, LoadStatus::Failed);
        assert_eq!(
            s.message.as_deref(),
            Some("Could not load the report. Please try again.")
        );
    }
}
