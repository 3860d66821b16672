// SPDX-License-Identifier: GPL-3.0-only

//! Segmented capture recorder
//!
//! ```text
//!  caller ── Command ──┐
//!  UI ── SurfaceEvent ─┼──▶ camera-worker ──▶ CaptureSessionOrchestrator
//!  hardware ── Event ──┘        (queue)           │
//!                                                 ▼
//!                                   RecorderEvent::RecordingFinished
//! ```
//!
//! Every input is marshalled onto a single worker thread, so the
//! orchestrator's state is only ever touched from one place.
//!
//! # Modules
//!
//! - [`guard`]: Exclusive, bounded-wait permit for opening hardware
//! - [`ledger`]: Ordered segment files of the current recording
//! - [`state`]: Pure transition table
//! - [`orchestrator`]: Executes transitions against the collaborators
//! - [`worker`]: The worker thread and the caller-facing handle

pub mod guard;
pub mod ledger;
pub mod orchestrator;
pub mod state;
pub mod worker;

pub use guard::{DeviceAcquisitionGuard, Permit};
pub use ledger::{Segment, SegmentLedger};
pub use orchestrator::CaptureSessionOrchestrator;
pub use state::{Effect, RecordingState, Transition, Trigger, transition};
pub use worker::{CaptureRecorder, RecorderHandle};

use crate::backends::camera::{CameraHardware, CameraSelector};
use crate::config::Config;
use crate::pipelines::video::EncoderFactory;
use crate::preview::PreviewSurfaceProvider;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Caller command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Stop,
    Cancel,
    ToggleCamera,
    ToggleFlash,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Start,
        Command::Stop,
        Command::Cancel,
        Command::ToggleCamera,
        Command::ToggleFlash,
    ];

    pub fn trigger(self) -> Trigger {
        match self {
            Command::Start => Trigger::Start,
            Command::Stop => Trigger::Stop,
            Command::Cancel => Trigger::Cancel,
            Command::ToggleCamera => Trigger::ToggleCamera,
            Command::ToggleFlash => Trigger::ToggleFlash,
        }
    }

    /// Method name on the command channel
    pub fn method_name(self) -> &'static str {
        match self {
            Command::Start => "startRecording",
            Command::Stop => "stopRecording",
            Command::Cancel => "cancelRecording",
            Command::ToggleCamera => "toggleCamera",
            Command::ToggleFlash => "toggleFlash",
        }
    }

    pub fn from_method_name(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.method_name() == method)
    }
}

/// Outbound notification to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Stop completed; `None` when nothing was recorded
    RecordingFinished(Option<Vec<Arc<Segment>>>),
}

/// Snapshot of the recorder for diagnostics and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecorderStatus {
    pub state: RecordingState,
    pub camera: CameraSelector,
    pub torch_on: bool,
    pub segments: usize,
    pub device_open: bool,
    pub session_live: bool,
    pub encoder_live: bool,
    pub guard_held: bool,
}

impl RecorderStatus {
    /// Idle with every handle closed and the permit free
    pub fn is_quiescent(&self) -> bool {
        self.state == RecordingState::Idle
            && !self.device_open
            && !self.session_live
            && !self.encoder_live
            && !self.guard_held
    }
}

/// Runtime settings for one recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderSettings {
    pub working_dir: PathBuf,
    pub acquire_timeout: Duration,
    pub initial_camera: CameraSelector,
}

impl RecorderSettings {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            acquire_timeout: crate::constants::timing::ACQUIRE_TIMEOUT,
            initial_camera: CameraSelector::default(),
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_initial_camera(mut self, camera: CameraSelector) -> Self {
        self.initial_camera = camera;
        self
    }
}

impl From<&Config> for RecorderSettings {
    fn from(config: &Config) -> Self {
        Self {
            working_dir: config.working_dir(),
            acquire_timeout: config.acquire_timeout(),
            initial_camera: config.initial_camera,
        }
    }
}

/// Collaborators injected into the orchestrator
#[derive(Clone)]
pub struct RecorderDeps {
    pub hardware: Arc<dyn CameraHardware>,
    pub encoders: Arc<dyn EncoderFactory>,
    /// Owned by the UI layer; the recorder never keeps it alive
    pub preview: Weak<dyn PreviewSurfaceProvider>,
    /// Shared with every other recorder using the same hardware
    pub guard: Arc<DeviceAcquisitionGuard>,
}
