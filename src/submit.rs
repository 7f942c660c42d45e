//! Throttled submission of the canvas to the recognition service.
//!
//! At most one request is in flight. The request runs on a worker thread and
//! its outcome is collected by [`SubmissionGate::poll`] on the UI thread.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use serde_json::{Map, Value};

use crate::service::{CalculateRequest, CalculateResponse, RecognitionService, ServiceError};
use crate::state::RecognitionResult;
use crate::surface::{ExportFormat, Surface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitStatus {
    /// A request is now in flight.
    Sent,
    /// Another request was still in flight; this one was dropped.
    Throttled,
    /// The surface has not been sized yet.
    NotReady,
    /// The canvas could not be encoded or the worker could not start.
    Failed,
}

#[derive(Debug)]
pub enum SubmissionOutcome {
    Recognized(RecognitionResult),
    NothingToDisplay,
    Failed(ServiceError),
}

type Settled = Result<CalculateResponse, ServiceError>;

pub struct SubmissionGate {
    service: Arc<dyn RecognitionService>,
    jpeg_quality: f32,
    loading: bool,
    pending: Option<Receiver<Settled>>,
    repaint: Option<egui::Context>,
    last_failure: Option<String>,
}

impl SubmissionGate {
    pub fn new(service: Arc<dyn RecognitionService>, jpeg_quality: f32) -> Self {
        Self {
            service,
            jpeg_quality,
            loading: false,
            pending: None,
            repaint: None,
            last_failure: None,
        }
    }

    /// Context woken when a response arrives, so the UI polls without input.
    pub fn set_repaint_context(&mut self, ctx: egui::Context) {
        self.repaint = Some(ctx);
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Description of the most recent swallowed failure, cleared by the next
    /// submission.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Exports `surface` and sends it along with `dict_of_vars`.
    pub fn submit(&mut self, surface: &Surface, dict_of_vars: &Map<String, Value>) -> SubmitStatus {
        if self.loading {
            log::debug!("submission dropped, a request is already in flight");
            return SubmitStatus::Throttled;
        }
        if !surface.is_initialized() {
            log::debug!("submission skipped, surface not initialized");
            return SubmitStatus::NotReady;
        }

        self.loading = true;
        self.last_failure = None;

        let image = match surface.export_image(ExportFormat::Jpeg, self.jpeg_quality) {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.loading = false;
                return SubmitStatus::NotReady;
            }
            Err(error) => {
                self.fail(error.to_string());
                return SubmitStatus::Failed;
            }
        };

        let request = CalculateRequest {
            image: image.to_data_uri(),
            dict_of_vars: dict_of_vars.clone(),
        };

        let (tx, rx) = mpsc::channel();
        let service = Arc::clone(&self.service);
        let repaint = self.repaint.clone();
        let spawned = thread::Builder::new()
            .name("recognition".to_owned())
            .spawn(move || {
                let settled = service.calculate(&request);
                if tx.send(settled).is_err() {
                    log::debug!("submission gate dropped before the response arrived");
                }
                if let Some(ctx) = repaint {
                    ctx.request_repaint();
                }
            });

        match spawned {
            Ok(_) => {
                self.pending = Some(rx);
                SubmitStatus::Sent
            }
            Err(error) => {
                self.fail(ServiceError::Spawn(error).to_string());
                SubmitStatus::Failed
            }
        }
    }

    /// Collects the in-flight outcome if it has settled. Clears `loading`
    /// whichever way the request ended.
    pub fn poll(&mut self) -> Option<SubmissionOutcome> {
        let settled = match self.pending.as_ref()?.try_recv() {
            Ok(settled) => settled,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ServiceError::WorkerLost),
        };
        self.pending = None;
        self.loading = false;

        let outcome = match settled {
            Ok(response) => match response.first_result() {
                Some(result) => {
                    log::info!("recognized `{}` = `{}`", result.expression, result.answer);
                    SubmissionOutcome::Recognized(result)
                }
                None => SubmissionOutcome::NothingToDisplay,
            },
            Err(error) => {
                self.fail(error.to_string());
                SubmissionOutcome::Failed(error)
            }
        };
        Some(outcome)
    }

    fn fail(&mut self, reason: String) {
        log::error!("error sending drawing: {reason}");
        self.loading = false;
        self.last_failure = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct Fixed(Mutex<Option<Settled>>);

    impl RecognitionService for Fixed {
        fn calculate(&self, _request: &CalculateRequest) -> Result<CalculateResponse, ServiceError> {
            self.0
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ServiceError::Unavailable("already used".to_owned())))
        }
    }

    fn gate(settled: Settled) -> SubmissionGate {
        SubmissionGate::new(Arc::new(Fixed(Mutex::new(Some(settled)))), 0.7)
    }

    fn ready_surface() -> Surface {
        let mut surface = Surface::new();
        surface.initialize(32, 32, 0);
        surface
    }

    fn settle(gate: &mut SubmissionGate) -> SubmissionOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = gate.poll() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "submission never settled");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn uninitialized_surface_is_not_submitted() {
        let mut gate = gate(Ok(CalculateResponse::default()));
        assert_eq!(gate.submit(&Surface::new(), &Map::new()), SubmitStatus::NotReady);
        assert!(!gate.is_loading());
    }

    #[test]
    fn success_maps_first_result() {
        let response = CalculateResponse::from_body(
            r#"{"status":"success","data":[{"expr":"2+2","result":"4"}]}"#,
        );
        let mut gate = gate(Ok(response));

        assert_eq!(gate.submit(&ready_surface(), &Map::new()), SubmitStatus::Sent);
        assert!(gate.is_loading());

        match settle(&mut gate) {
            SubmissionOutcome::Recognized(result) => {
                assert_eq!(result.expression, "2+2");
                assert_eq!(result.answer, "4");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!gate.is_loading());
    }

    #[test]
    fn failure_is_swallowed_and_clears_loading() {
        let mut gate = gate(Err(ServiceError::Unavailable("connection refused".to_owned())));

        gate.submit(&ready_surface(), &Map::new());
        assert!(matches!(settle(&mut gate), SubmissionOutcome::Failed(_)));
        assert!(!gate.is_loading());
        assert!(gate.last_failure().is_some_and(|reason| reason.contains("connection refused")));
    }

    #[test]
    fn next_submission_clears_last_failure() {
        let mut gate = gate(Err(ServiceError::Unavailable("down".to_owned())));
        gate.submit(&ready_surface(), &Map::new());
        settle(&mut gate);

        gate.submit(&ready_surface(), &Map::new());
        assert_eq!(gate.last_failure(), None);
    }
}
