//! Background execution of actions, one at a time.
//!
//! The presentation layer submits requests and keeps reading responses off a
//! channel, so it never blocks on network calls itself.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::mpsc::{self, error::SendError},
    task::JoinHandle,
};

use crate::orchestrator::{Action, ActionError, ActionOutcome, Orchestrator};

const QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub id: u64,
    pub action: Action,
    pub location: String,
}

#[derive(Debug)]
pub struct ActionResponse {
    pub id: u64,
    pub action: Action,
    pub result: Result<ActionOutcome, ActionError>,
}

#[derive(Debug)]
pub struct ActionWorker {
    requests: mpsc::Sender<ActionRequest>,
    next_id: AtomicU64,
    handle: JoinHandle<()>,
}

impl ActionWorker {
    /// Start the worker task. Responses arrive in submission order.
    pub fn spawn(orchestrator: Arc<Orchestrator>) -> (Self, mpsc::Receiver<ActionResponse>) {
        let (req_tx, mut req_rx) = mpsc::channel::<ActionRequest>(QUEUE_DEPTH);
        let (resp_tx, resp_rx) = mpsc::channel::<ActionResponse>(QUEUE_DEPTH);

        let handle = tokio::spawn(async move {
            while let Some(req) = req_rx.recv().await {
                tracing::debug!(id = req.id, action = %req.action, "running queued action");
                let result = orchestrator.run(req.action, &req.location).await;
                let response = ActionResponse { id: req.id, action: req.action, result };
                if resp_tx.send(response).await.is_err() {
                    tracing::debug!("response receiver dropped, stopping worker");
                    break;
                }
            }
        });

        let worker = Self { requests: req_tx, next_id: AtomicU64::new(1), handle };
        (worker, resp_rx)
    }

    /// Queue an action; returns the id its response will carry.
    pub async fn submit(
        &self,
        action: Action,
        location: impl Into<String>,
    ) -> Result<u64, SendError<ActionRequest>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests.send(ActionRequest { id, action, location: location.into() }).await?;
        Ok(id)
    }

    /// Stop accepting requests and wait for queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(e) = self.handle.await {
            tracing::warn!("action worker ended abnormally: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::WeatherError,
        orchestrator::tests::{FixedGeocoder, mount_forecast, mount_point, orchestrator},
    };
    use wiremock::MockServer;

    #[tokio::test]
    async fn runs_requests_in_order_and_reports_each() {
        let server = MockServer::start().await;
        mount_point(&server, "KLOT").await;
        mount_forecast(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(&server, dir.path(), Arc::new(FixedGeocoder::chicago())));
        let (worker, mut responses) = ActionWorker::spawn(orch);

        let first = worker.submit(Action::Current, "Chicago, IL").await.unwrap();
        let second = worker.submit(Action::Current, "").await.unwrap();
        let third = worker.submit(Action::Forecast, "Chicago, IL").await.unwrap();

        let r1 = responses.recv().await.unwrap();
        assert_eq!(r1.id, first);
        assert_eq!(r1.result.unwrap().as_text(), Some("Tonight: 48°F, Mostly Cloudy\n"));

        let r2 = responses.recv().await.unwrap();
        assert_eq!(r2.id, second);
        assert!(matches!(r2.result.unwrap_err().source, WeatherError::EmptyInput));

        // an earlier failure does not affect later actions
        let r3 = responses.recv().await.unwrap();
        assert_eq!(r3.id, third);
        assert_eq!(r3.action, Action::Forecast);
        assert!(r3.result.is_ok());

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_and_closes_responses() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(&server, dir.path(), Arc::new(FixedGeocoder::chicago())));
        let (worker, mut responses) = ActionWorker::spawn(orch);

        worker.submit(Action::Alerts, " ").await.unwrap();
        worker.shutdown().await;

        assert!(responses.recv().await.is_some());
        assert!(responses.recv().await.is_none());
    }
}
