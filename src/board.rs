//! The drawing-and-result state machine.
//!
//! [`Board`] owns the stroke surface, the input controller, the submission
//! gate and the shared [`AppState`]. The GUI shell forwards pointer events and
//! button presses to it and calls [`Board::step`] once per frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::input::{InputController, PointerEvent, Transition};
use crate::service::RecognitionService;
use crate::state::{AppState, PaletteColor, RESULT_WINDOW, RecognitionResult};
use crate::submit::{SubmissionGate, SubmissionOutcome, SubmitStatus};
use crate::surface::Surface;

pub struct Board {
    surface: Surface,
    input: InputController,
    gate: SubmissionGate,
    state: AppState,
    result_window: Duration,
    repaint: Option<egui::Context>,
}

impl Board {
    pub fn new(service: Arc<dyn RecognitionService>, jpeg_quality: f32) -> Self {
        Self {
            surface: Surface::new(),
            input: InputController::new(),
            gate: SubmissionGate::new(service, jpeg_quality),
            state: AppState::default(),
            result_window: RESULT_WINDOW,
            repaint: None,
        }
    }

    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = state;
        self
    }

    pub fn set_repaint_context(&mut self, ctx: egui::Context) {
        self.gate.set_repaint_context(ctx.clone());
        self.repaint = Some(ctx);
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_drawing(&self) -> bool {
        self.input.is_drawing()
    }

    pub fn is_loading(&self) -> bool {
        self.gate.is_loading()
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.gate.last_failure()
    }

    /// Sizes the surface from the viewport geometry observed at mount.
    pub fn mount(&mut self, viewport_width: u32, viewport_height: u32, top_offset: u32) {
        self.surface
            .initialize(viewport_width, viewport_height, top_offset);
    }

    pub fn pointer(&mut self, event: PointerEvent) -> Transition {
        let color = self.state.color.color32();
        let transition = self.input.handle(event, color, &mut self.surface);
        if transition == Transition::StrokeStarted {
            self.state.visibility.hide();
        }
        transition
    }

    pub fn select_color(&mut self, color: PaletteColor) {
        log::debug!("selected color {}", color.hex());
        self.state.color = color;
    }

    /// Queues a clear for the next [`Board::step`] and wakes the UI so that
    /// step runs without further input.
    pub fn request_reset(&mut self) {
        self.state.reset.request();
        if let Some(ctx) = &self.repaint {
            ctx.request_repaint();
        }
    }

    pub fn submit(&mut self) -> SubmitStatus {
        self.gate.submit(&self.surface, &self.state.dict_of_vars)
    }

    /// Runs one frame's worth of deferred work: a pending reset, a settled
    /// submission and result expiry, in that order.
    pub fn step(&mut self, now: Instant) {
        if self.state.reset.take() {
            log::debug!("clearing surface");
            self.surface.clear();
        }

        if let Some(outcome) = self.gate.poll() {
            self.apply_outcome(outcome, now);
        }

        self.state.visibility.tick(now);
    }

    /// The result to overlay, if any: visible, present and not superseded by
    /// an in-flight request.
    pub fn overlay(&self) -> Option<&RecognitionResult> {
        if !self.state.visibility.is_visible() || self.gate.is_loading() {
            return None;
        }
        self.state.result.as_ref()
    }

    /// Time until the overlay hides itself.
    pub fn next_expiry(&self, now: Instant) -> Option<Duration> {
        self.state.visibility.remaining(now)
    }

    fn apply_outcome(&mut self, outcome: SubmissionOutcome, now: Instant) {
        match outcome {
            SubmissionOutcome::Recognized(result) => {
                self.state.result = Some(result);
                self.state.visibility.show(now, self.result_window);
            }
            SubmissionOutcome::NothingToDisplay => {
                log::warn!("recognition returned nothing to display");
            }
            // Already logged and recorded by the gate.
            SubmissionOutcome::Failed(_) => {}
        }
    }
}
