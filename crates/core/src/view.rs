//! Per-feature view state: busy flag, inline error, and the latest result.
//!
//! A view allows one outstanding request at a time. Submitting again while
//! busy is a no-op. A new request clears the previous result before it is
//! issued, and every request is bound to the owning view's cancellation token
//! so tearing the view down abandons it.

use crate::{error::TutorError, models::Feature};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Outcome of a submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    /// The request ran to completion (successfully or not).
    Completed(T),
    /// Another request was outstanding; nothing was sent.
    Ignored,
}

impl<T> Submission<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Submission<U> {
        match self {
            Submission::Completed(value) => Submission::Completed(f(value)),
            Submission::Ignored => Submission::Ignored,
        }
    }
}

/// A point-in-time copy of a view's state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot<T> {
    pub busy: bool,
    pub error: Option<String>,
    pub result: Option<T>,
}

struct ViewState<T> {
    error: Option<String>,
    result: Option<T>,
}

/// Resets the busy flag when the request finishes or is dropped.
struct BusyFlag<'a>(&'a AtomicBool);

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FeatureView<T> {
    feature: Feature,
    cancel: CancellationToken,
    busy: AtomicBool,
    state: Mutex<ViewState<T>>,
}

impl<T: Clone> FeatureView<T> {
    pub fn new(feature: Feature, cancel: CancellationToken) -> Self {
        Self {
            feature,
            cancel,
            busy: AtomicBool::new(false),
            state: Mutex::new(ViewState {
                error: None,
                result: None,
            }),
        }
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ViewSnapshot<T> {
        let state = self.state();
        ViewSnapshot {
            busy: self.is_busy(),
            error: state.error.clone(),
            result: state.result.clone(),
        }
    }

    /// Reads the current result without cloning it.
    pub fn with_result<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.state().result.as_ref())
    }

    /// Runs `request` for `input` unless a request is already outstanding.
    ///
    /// `request` is not polled when the input is blank; the view records the
    /// feature's validation message and keeps its previous result.
    pub async fn submit<F>(&self, input: &str, request: F) -> Submission<ViewSnapshot<T>>
    where
        F: Future<Output = Result<T, TutorError>>,
    {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!(feature = ?self.feature, "Submission ignored while a request is outstanding");
            return Submission::Ignored;
        }
        {
            let _busy = BusyFlag(&self.busy);
            self.run(input, request).await;
        }
        Submission::Completed(self.snapshot())
    }

    async fn run<F>(&self, input: &str, request: F)
    where
        F: Future<Output = Result<T, TutorError>>,
    {
        if input.trim().is_empty() {
            self.state().error = Some(self.feature.empty_input_message().to_string());
            return;
        }

        {
            let mut state = self.state();
            state.error = None;
            state.result = None;
        }

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TutorError::Cancelled),
            outcome = request => outcome,
        };

        match outcome {
            Ok(value) => self.state().result = Some(value),
            Err(TutorError::Cancelled) => {
                info!(feature = ?self.feature, "Request abandoned, view was torn down");
            }
            Err(err) => {
                error!(feature = ?self.feature, error = %err, "Request failed");
                self.state().error = Some(self.feature.failure_message().to_string());
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    fn view() -> FeatureView<String> {
        FeatureView::new(Feature::Grammar, CancellationToken::new())
    }

    async fn never_called() -> Result<String, TutorError> {
        panic!("request must not run")
    }

    fn completed(submission: Submission<ViewSnapshot<String>>) -> ViewSnapshot<String> {
        match submission {
            Submission::Completed(snapshot) => snapshot,
            Submission::Ignored => panic!("submission was ignored"),
        }
    }

    #[tokio::test]
    async fn test_successful_submission_stores_result() {
        let view = view();
        let snapshot = completed(view.submit("text", async { Ok("done".to_string()) }).await);
        assert_eq!(
            snapshot,
            ViewSnapshot {
                busy: false,
                error: None,
                result: Some("done".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_blank_input_keeps_previous_result_and_skips_request() {
        let view = view();
        view.submit("text", async { Ok("first".to_string()) }).await;

        let snapshot = completed(view.submit("  ", never_called()).await);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Please enter some text to check.")
        );
        assert_eq!(snapshot.result.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_failure_clears_previous_result_and_sets_message() {
        let view = view();
        view.submit("text", async { Ok("first".to_string()) }).await;

        let snapshot = completed(
            view.submit("text", async {
                Err(TutorError::SchemaViolation("$.errors is missing".to_string()))
            })
            .await,
        );
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Failed to check grammar. Please try again.")
        );
        assert_eq!(snapshot.result, None);
    }

    #[tokio::test]
    async fn test_resubmission_while_busy_is_ignored() {
        let view = Arc::new(view());
        let (tx, rx) = oneshot::channel::<String>();

        let in_flight = {
            let view = view.clone();
            tokio::spawn(async move {
                view.submit("text", async move { Ok(rx.await.unwrap_or_default()) })
                    .await
            })
        };
        while !view.is_busy() {
            tokio::task::yield_now().await;
        }

        // Previous state is cleared optimistically while the request runs.
        let snapshot = view.snapshot();
        assert!(snapshot.busy);
        assert_eq!(snapshot.result, None);

        let second = view.submit("text", never_called()).await;
        assert_eq!(second, Submission::Ignored);

        tx.send("answer".to_string()).unwrap();
        let snapshot = completed(in_flight.await.unwrap());
        assert!(!snapshot.busy);
        assert_eq!(snapshot.result.as_deref(), Some("answer"));
    }

    #[tokio::test]
    async fn test_cancelled_request_writes_nothing() {
        let token = CancellationToken::new();
        let view = FeatureView::<String>::new(Feature::Story, token.clone());
        token.cancel();

        let snapshot = completed(
            view.submit("a dragon", std::future::pending::<Result<String, TutorError>>())
                .await,
        );
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.result, None);
        assert!(!view.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_request_releases_busy_flag() {
        let view = view();
        {
            let submission =
                view.submit("text", std::future::pending::<Result<String, TutorError>>());
            tokio::pin!(submission);
            let poll = tokio::time::timeout(std::time::Duration::from_millis(10), &mut submission);
            assert!(poll.await.is_err());
            assert!(view.is_busy());
        }
        assert!(!view.is_busy());
    }
}
