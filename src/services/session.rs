//! Lookup session - the client-level state machine
//!
//! ```text
//! Idle ──submit──▶ Loading ──▶ Success
//!                     │   └──▶ Failed ──retry──▶ Loading
//!                     └─cancel─▶ Idle ◀──cancel── Failed / Success
//! ```
//!
//! The current state is published on a watch channel so UI adapters can
//! show `Loading` while a lookup is in flight.

use crate::domain::display::DisplayField;
use crate::io::fetch::{FetchError, PackageSource};
use crate::services::projector::{project, FieldSchema};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum LookupState {
    Idle,
    Loading { identifier: String },
    Success { identifier: String, fields: Vec<DisplayField> },
    Failed { identifier: String, error: FetchError },
}

impl LookupState {
    pub fn name(&self) -> &'static str {
        match self {
            LookupState::Idle => "idle",
            LookupState::Loading { .. } => "loading",
            LookupState::Success { .. } => "success",
            LookupState::Failed { .. } => "failed",
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            LookupState::Idle => None,
            LookupState::Loading { identifier }
            | LookupState::Success { identifier, .. }
            | LookupState::Failed { identifier, .. } => Some(identifier),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("retry is only possible after a failed lookup (current state: {0})")]
    NotRetryable(&'static str),
}

/// Resolves once the cancel flag is set. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct LookupSession<S: PackageSource> {
    source: Arc<S>,
    schema: FieldSchema,
    state_tx: watch::Sender<LookupState>,
}

impl<S: PackageSource> LookupSession<S> {
    pub fn new(source: Arc<S>, schema: FieldSchema) -> Self {
        let (state_tx, _) = watch::channel(LookupState::Idle);
        Self { source, schema, state_tx }
    }

    pub fn state(&self) -> LookupState {
        self.state_tx.borrow().clone()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<LookupState> {
        self.state_tx.subscribe()
    }

    /// Start a lookup for `identifier` from any state.
    ///
    /// Setting `cancel` to `true` while loading drops the in-flight fetch
    /// (request and timer) and returns to `Idle`.
    pub async fn submit(
        &mut self,
        identifier: impl Into<String>,
        cancel: watch::Receiver<bool>,
    ) -> LookupState {
        self.run(identifier.into(), cancel).await
    }

    /// Re-run the failed lookup with the same identifier
    pub async fn retry(
        &mut self,
        cancel: watch::Receiver<bool>,
    ) -> Result<LookupState, TransitionError> {
        let identifier = match &*self.state_tx.borrow() {
            LookupState::Failed { identifier, .. } => identifier.clone(),
            other => return Err(TransitionError::NotRetryable(other.name())),
        };
        Ok(self.run(identifier, cancel).await)
    }

    /// Back to `Idle`, e.g. when the user navigates away
    pub fn cancel(&mut self) {
        let previous = self.state_tx.send_replace(LookupState::Idle);
        debug!(from = %previous.name(), "lookup_cancelled");
    }

    async fn run(&mut self, identifier: String, mut cancel: watch::Receiver<bool>) -> LookupState {
        self.transition(LookupState::Loading { identifier: identifier.clone() });

        let outcome = tokio::select! {
            result = self.source.fetch_package(&identifier) => Some(result),
            _ = cancelled(&mut cancel) => None,
        };

        let next = match outcome {
            Some(Ok(record)) => {
                let fields = project(&record, &self.schema);
                LookupState::Success { identifier, fields }
            }
            Some(Err(error)) => LookupState::Failed { identifier, error },
            None => {
                info!(identifier = %identifier, "lookup_abandoned");
                LookupState::Idle
            }
        };

        self.transition(next.clone());
        next
    }

    fn transition(&self, next: LookupState) {
        let previous = self.state_tx.send_replace(next);
        debug!(
            from = %previous.name(),
            to = %self.state_tx.borrow().name(),
            "lookup_state_changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::PackageRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns queued outcomes in order, optionally after a delay
    struct ScriptedSource {
        outcomes: Mutex<VecDeque<Result<PackageRecord, FetchError>>>,
        calls: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(outcomes: Vec<Result<PackageRecord, FetchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PackageSource for ScriptedSource {
        async fn fetch_package(&self, identifier: &str) -> Result<PackageRecord, FetchError> {
            self.calls.lock().unwrap().push(identifier.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcomes.lock().unwrap().pop_front().unwrap_or(Err(FetchError::Timeout))
        }
    }

    fn record() -> PackageRecord {
        PackageRecord::from_value(json!({"package_details": {"package_id": "PKG-9"}}))
    }

    fn never_cancel() -> watch::Receiver<bool> {
        let (_tx, rx) = watch::channel(false);
        rx
    }

    #[tokio::test]
    async fn test_submit_success() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(record())]));
        let mut session = LookupSession::new(source.clone(), FieldSchema::web());
        assert_eq!(session.state(), LookupState::Idle);

        let state = session.submit("PKG-9", never_cancel()).await;
        match &state {
            LookupState::Success { identifier, fields } => {
                assert_eq!(identifier, "PKG-9");
                assert_eq!(fields[0].value.to_string(), "PKG-9");
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(session.state(), state);
        assert_eq!(source.calls(), vec!["PKG-9".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_then_retry_uses_same_identifier() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::NetworkUnreachable),
            Ok(record()),
        ]));
        let mut session = LookupSession::new(source.clone(), FieldSchema::web());

        let state = session.submit("PKG-9", never_cancel()).await;
        assert_eq!(
            state,
            LookupState::Failed {
                identifier: "PKG-9".to_string(),
                error: FetchError::NetworkUnreachable
            }
        );

        let state = session.retry(never_cancel()).await.unwrap();
        assert_eq!(state.name(), "success");
        assert_eq!(source.calls(), vec!["PKG-9".to_string(), "PKG-9".to_string()]);
    }

    #[tokio::test]
    async fn test_retry_requires_failed_state() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(record())]));
        let mut session = LookupSession::new(source.clone(), FieldSchema::web());

        assert_eq!(session.retry(never_cancel()).await, Err(TransitionError::NotRetryable("idle")));

        session.submit("PKG-9", never_cancel()).await;
        assert_eq!(
            session.retry(never_cancel()).await,
            Err(TransitionError::NotRetryable("success"))
        );
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_from_failed_returns_idle() {
        let source = Arc::new(ScriptedSource::new(vec![Err(FetchError::HttpStatus(500))]));
        let mut session = LookupSession::new(source, FieldSchema::web());

        session.submit("PKG-9", never_cancel()).await;
        session.cancel();
        assert_eq!(session.state(), LookupState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_while_loading() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(record())]).with_delay(Duration::from_secs(30)),
        );
        let mut session = LookupSession::new(source, FieldSchema::web());
        let mut states = session.subscribe();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = cancel_tx.send(true);
        });

        let state = session.submit("PKG-9", cancel_rx).await;
        assert_eq!(state, LookupState::Idle);
        assert_eq!(*states.borrow_and_update(), LookupState::Idle);
    }

    #[tokio::test]
    async fn test_loading_is_observable() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(record())]).with_delay(Duration::from_millis(50)),
        );
        let mut session = LookupSession::new(source, FieldSchema::web());
        let mut states = session.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while states.changed().await.is_ok() {
                let name = states.borrow_and_update().name();
                seen.push(name);
                if name != "loading" {
                    break;
                }
            }
            seen
        });

        session.submit("PKG-9", never_cancel()).await;
        let seen = observer.await.unwrap();
        assert_eq!(seen, vec!["loading", "success"]);
    }

    #[tokio::test]
    async fn test_dropped_cancel_sender_does_not_cancel() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(record())]).with_delay(Duration::from_millis(20)),
        );
        let mut session = LookupSession::new(source, FieldSchema::web());

        let state = session.submit("PKG-9", never_cancel()).await;
        assert_eq!(state.name(), "success");
    }
}
