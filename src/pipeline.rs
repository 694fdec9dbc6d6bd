//! The receipt digitization pipeline.
//!
//! A cycle runs capture → OCR → structuring → validation, strictly in order,
//! and ends by loading the new receipt into the cart. [`PipelineController`]
//! is the only thing that holds state across stages.
//!
//! ```text
//!            start_capture()
//!   Idle ───────────────────► CapturingImage ──(cancelled)──► Idle
//!    ▲                              │
//!    │ cancel()                     ▼
//!    │                        RecognizingText ───(error)───► Failed(stage, reason)
//!    │                              │                              │
//!    │                              ▼                              │
//!    │                        StructuringData ───(error)───────────┤
//!    │                              │                              │
//!    │                              ▼                              │
//!    └──────────────────────────  Ready ◄──── start_capture() ─────┘
//! ```
//!
//! Each cycle gets a generation number. Calling [`PipelineController::start_capture`]
//! or [`PipelineController::cancel`] bumps it, and any stage result which
//! arrives for an older generation is thrown away. Nothing is retried
//! automatically; to retry, call `start_capture` again.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;
use tracing::Span;

use crate::{
    capture::{CaptureOptions, ImageSource},
    cart::CartModel,
    data_url::Base64Image,
    errors::{IndexError, Stage, StageFailure},
    ocr::{OcrEngine, RecognizedText},
    prelude::*,
    receipt::{LineItem, Receipt},
    structuring::StructuringDriver,
    validator,
};

/// Where the pipeline is right now. Read by the presentation layer for
/// progress display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing is happening.
    #[default]
    Idle,
    /// Waiting for an image.
    CapturingImage,
    /// Waiting for OCR.
    RecognizingText,
    /// Waiting for the structuring service, then validating its output.
    StructuringData,
    /// A receipt has been loaded into the cart.
    Ready,
    /// The cycle failed.
    Failed(StageFailure),
}

impl PipelineState {
    /// Is a cycle in progress?
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::CapturingImage
                | PipelineState::RecognizingText
                | PipelineState::StructuringData
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::CapturingImage => f.write_str("capturing image"),
            PipelineState::RecognizingText => f.write_str("recognizing text"),
            PipelineState::StructuringData => f.write_str("structuring data"),
            PipelineState::Ready => f.write_str("ready"),
            PipelineState::Failed(failure) => write!(f, "{failure}"),
        }
    }
}

/// How a call to [`PipelineController::start_capture`] ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The receipt was loaded into the cart.
    Ready(Receipt),
    /// The user cancelled capture. The pipeline is back to `Idle`.
    Cancelled,
    /// A stage failed. The cart was not touched.
    Failed(StageFailure),
    /// A newer cycle (or a cancellation) replaced this one before it
    /// finished. Its results were discarded.
    Superseded,
}

/// The external collaborators the pipeline drives.
#[derive(Clone)]
pub struct PipelineServices {
    /// Where images come from.
    pub image_source: Arc<dyn ImageSource>,
    /// Turns images into text.
    pub ocr: Arc<dyn OcrEngine>,
    /// Turns text into receipt JSON.
    pub structuring: Arc<dyn StructuringDriver>,
}

/// State shared between cycles. Never held across an `await`.
#[derive(Debug, Default)]
struct Shared {
    /// The current cycle. Results from any other cycle are stale.
    generation: u64,

    /// The cart, holding the receipt from the last successful cycle.
    cart: CartModel,
}

/// Orchestrates capture → OCR → structuring → validation → cart.
pub struct PipelineController {
    services: PipelineServices,
    capture_options: CaptureOptions,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<PipelineState>,
}

impl PipelineController {
    /// Create a new, idle controller with an empty cart.
    pub fn new(services: PipelineServices, capture_options: CaptureOptions) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Self {
            services,
            capture_options,
            shared: Mutex::new(Shared::default()),
            state_tx,
        }
    }

    /// The current state.
    pub fn state(&self) -> PipelineState {
        self.state_tx.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Run a full capture cycle.
    ///
    /// This may be called again while a cycle is still in flight. The new
    /// call wins, and the older call returns [`CycleOutcome::Superseded`]
    /// without touching the state or the cart.
    #[instrument(level = "debug", skip_all, fields(generation))]
    pub async fn start_capture(&self) -> CycleOutcome {
        let generation = self.begin_cycle();
        Span::current().record("generation", generation);

        let image = match self.capture_image().await {
            Ok(Some(image)) => image,
            Ok(None) => return self.cancelled(generation),
            Err(failure) => return self.failed(generation, failure),
        };
        if !self.transition(generation, PipelineState::RecognizingText) {
            return CycleOutcome::Superseded;
        }

        let text = match self.recognize_text(&image).await {
            Ok(text) => text,
            Err(failure) => return self.failed(generation, failure),
        };
        if !self.transition(generation, PipelineState::StructuringData) {
            return CycleOutcome::Superseded;
        }

        match self.structure_data(&text).await {
            Ok(receipt) => self.ready(generation, receipt),
            Err(failure) => self.failed(generation, failure),
        }
    }

    /// Abandon any cycle in flight and return to `Idle`. The cart keeps the
    /// last successfully loaded receipt.
    pub fn cancel(&self) {
        let mut shared = self.lock();
        shared.generation += 1;
        debug!(generation = shared.generation, "Cancelled pipeline");
        self.state_tx.send_replace(PipelineState::Idle);
    }

    /// Capture stage.
    async fn capture_image(&self) -> Result<Option<Base64Image>, StageFailure> {
        self.services
            .image_source
            .capture(&self.capture_options)
            .await
            .map_err(|err| StageFailure::new(Stage::CapturingImage, &err))
    }

    /// OCR stage.
    async fn recognize_text(
        &self,
        image: &Base64Image,
    ) -> Result<RecognizedText, StageFailure> {
        self.services
            .ocr
            .recognize(image)
            .await
            .map_err(|err| StageFailure::new(Stage::RecognizingText, &err))
    }

    /// Structuring and validation stage. Validation failures count as
    /// structuring failures, because either way we have no usable receipt.
    async fn structure_data(&self, text: &RecognizedText) -> Result<Receipt, StageFailure> {
        let raw = self
            .services
            .structuring
            .structure(text)
            .await
            .map_err(|err| StageFailure::new(Stage::StructuringData, &err))?;
        validator::parse(&raw).map_err(|err| {
            debug!(raw = %raw.as_str(), "Rejected model output");
            StageFailure::new(Stage::StructuringData, &err)
        })
    }

    /// Start a new generation, superseding anything in flight.
    fn begin_cycle(&self) -> u64 {
        let mut shared = self.lock();
        shared.generation += 1;
        let previous = self.state_tx.send_replace(PipelineState::CapturingImage);
        if previous.is_busy() {
            debug!(%previous, "Superseding in-flight cycle");
        }
        shared.generation
    }

    /// Move to `state`, but only if `generation` is still current.
    fn transition(&self, generation: u64, state: PipelineState) -> bool {
        let shared = self.lock();
        if shared.generation != generation {
            debug!(generation, current = shared.generation, "Discarding stale result");
            return false;
        }
        debug!(%state, "Pipeline transition");
        self.state_tx.send_replace(state);
        true
    }

    /// Finish a cancelled cycle.
    fn cancelled(&self, generation: u64) -> CycleOutcome {
        if self.transition(generation, PipelineState::Idle) {
            info!("Capture cancelled");
            CycleOutcome::Cancelled
        } else {
            CycleOutcome::Superseded
        }
    }

    /// Finish a failed cycle.
    fn failed(&self, generation: u64, failure: StageFailure) -> CycleOutcome {
        if self.transition(generation, PipelineState::Failed(failure.clone())) {
            warn!(stage = %failure.stage, reason = %failure.reason, "Pipeline failed");
            CycleOutcome::Failed(failure)
        } else {
            CycleOutcome::Superseded
        }
    }

    /// Finish a successful cycle by loading the receipt into the cart.
    fn ready(&self, generation: u64, receipt: Receipt) -> CycleOutcome {
        let mut shared = self.lock();
        if shared.generation != generation {
            debug!(generation, current = shared.generation, "Discarding stale receipt");
            return CycleOutcome::Superseded;
        }
        shared.cart.load(receipt);
        self.state_tx.send_replace(PipelineState::Ready);
        let receipt = shared.cart.receipt().clone();
        info!(
            items = receipt.items.len(),
            total_sum = %receipt.total_sum,
            "Receipt ready"
        );
        CycleOutcome::Ready(receipt)
    }

    /// A snapshot of the cart.
    pub fn cart(&self) -> CartModel {
        self.lock().cart.clone()
    }

    /// A snapshot of the current receipt, with any edits applied.
    pub fn receipt(&self) -> Receipt {
        self.lock().cart.receipt().clone()
    }

    /// Add one unit to a cart item.
    pub fn increment_quantity(&self, index: usize) -> Result<LineItem, IndexError> {
        self.lock().cart.increment_quantity(index).cloned()
    }

    /// Remove one unit from a cart item, stopping at zero.
    pub fn decrement_quantity(&self, index: usize) -> Result<LineItem, IndexError> {
        self.lock().cart.decrement_quantity(index).cloned()
    }

    /// Add or remove several units at once, clamping at zero.
    pub fn adjust_quantity(&self, index: usize, delta: i64) -> Result<LineItem, IndexError> {
        self.lock().cart.adjust_quantity(index, delta).cloned()
    }

    /// Lock our shared state. Nothing we do under the lock can leave it
    /// half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
