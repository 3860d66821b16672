// SPDX-License-Identifier: GPL-3.0-only

//! Capture session orchestrator
//!
//! Owns the device, session and encoder handles, the camera selector, the
//! torch flag and the segment ledger. Every trigger goes through
//! [`transition`]; this type only executes the resulting effects.
//!
//! Not thread-safe by design of use: it lives on the camera worker and is
//! driven one message at a time. Tests drive it directly.

use super::guard::Permit;
use super::ledger::{Segment, SegmentLedger};
use super::state::{ABORT_EFFECTS, Effect, RecordingState, Trigger, transition};
use super::{Command, RecorderDeps, RecorderEvent, RecorderSettings, RecorderStatus};
use crate::backends::camera::{
    CameraDeviceHandle, CameraSelector, CaptureSessionHandle, CaptureTemplate, EpisodeId,
    HardwareEvent, HardwareEventSink, Surface,
};
use crate::errors::{CaptureError, CaptureResult};
use crate::flash::TorchState;
use crate::pipelines::video::EncoderSink;
use crate::preview::SurfaceEvent;
use crate::storage;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

pub struct CaptureSessionOrchestrator {
    deps: RecorderDeps,
    settings: RecorderSettings,
    hardware_events: HardwareEventSink,
    events: UnboundedSender<RecorderEvent>,

    state: RecordingState,
    selector: CameraSelector,
    torch: TorchState,
    ledger: SegmentLedger,

    permit: Option<Permit>,
    device: Option<Box<dyn CameraDeviceHandle>>,
    session: Option<Box<dyn CaptureSessionHandle>>,
    encoder: Option<Box<dyn EncoderSink>>,
    encoder_started: bool,
    /// Segment whose encoder is prepared but not yet recording
    pending_segment: Option<Segment>,
    session_targets: Vec<Surface>,
    session_requested: bool,

    /// Episode whose callbacks are current; everything else is stale
    episode: Option<EpisodeId>,
    last_episode: EpisodeId,
}

impl CaptureSessionOrchestrator {
    /// `hardware_events` must route back into [`Self::on_hardware_event`]
    pub fn new(
        deps: RecorderDeps,
        settings: RecorderSettings,
        hardware_events: HardwareEventSink,
        events: UnboundedSender<RecorderEvent>,
    ) -> Self {
        let selector = settings.initial_camera;
        Self {
            deps,
            settings,
            hardware_events,
            events,
            state: RecordingState::Idle,
            selector,
            torch: TorchState::default(),
            ledger: SegmentLedger::new(),
            permit: None,
            device: None,
            session: None,
            encoder: None,
            encoder_started: false,
            pending_segment: None,
            session_targets: Vec::new(),
            session_requested: false,
            episode: None,
            last_episode: EpisodeId(0),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn camera(&self) -> CameraSelector {
        self.selector
    }

    pub fn torch(&self) -> TorchState {
        self.torch
    }

    pub fn ledger(&self) -> &SegmentLedger {
        &self.ledger
    }

    pub fn current_episode(&self) -> Option<EpisodeId> {
        self.episode
    }

    pub fn status(&self) -> RecorderStatus {
        RecorderStatus {
            state: self.state,
            camera: self.selector,
            torch_on: self.torch.is_on(),
            segments: self.ledger.len(),
            device_open: self.device.is_some(),
            session_live: self.session.is_some(),
            encoder_live: self.encoder.is_some(),
            guard_held: self.permit.is_some(),
        }
    }

    /// Run a caller command
    ///
    /// The caller only sees an acknowledgement; the result is for logging
    /// and tests.
    pub fn handle_command(&mut self, command: Command) -> CaptureResult<()> {
        self.apply(command.trigger())
    }

    /// Feed a hardware callback into the state machine
    pub fn on_hardware_event(&mut self, event: HardwareEvent) -> CaptureResult<()> {
        let episode = event.episode();
        if self.episode != Some(episode) {
            debug!(%episode, current = ?self.episode, ?event, "Ignoring stale camera callback");
            discard(event);
            return Ok(());
        }

        match event {
            HardwareEvent::DeviceOpened { mut device, .. } => {
                if self.state != RecordingState::Opening || self.device.is_some() {
                    device.close();
                    return Err(self.rejected(Trigger::DeviceOpened));
                }
                info!(camera = %device.selector(), %episode, "Camera opened");
                self.device = Some(device);
                self.apply(Trigger::DeviceOpened)
            }
            HardwareEvent::DeviceError { code, .. } => {
                let err = if self.device.is_none() {
                    CaptureError::DeviceOpenFailure(format!("camera error {}", code))
                } else {
                    CaptureError::DeviceFault(code)
                };
                self.fail(Trigger::DeviceFailed, err)
            }
            HardwareEvent::DeviceDisconnected { .. } => {
                self.fail(Trigger::DeviceFailed, CaptureError::DeviceDisconnected)
            }
            HardwareEvent::SessionConfigured { mut session, .. } => {
                if self.state != RecordingState::Opening || self.session.is_some() {
                    session.close();
                    return Err(self.rejected(Trigger::SessionConfigured));
                }
                debug!(%episode, "Capture session configured");
                self.session = Some(session);
                self.apply(Trigger::SessionConfigured)
            }
            HardwareEvent::SessionConfigureFailed { .. } => {
                let err = CaptureError::SessionConfigFailed(format!(
                    "{} camera rejected the session",
                    self.selector
                ));
                self.fail(Trigger::SessionConfigureFailed, err)
            }
        }
    }

    /// Feed a preview availability change into the state machine
    pub fn on_surface_event(&mut self, event: SurfaceEvent) -> CaptureResult<()> {
        match event {
            SurfaceEvent::Available => self.apply(Trigger::SurfaceAvailable),
            SurfaceEvent::Destroyed => {
                if self.state == RecordingState::Active {
                    warn!("Preview surface destroyed while recording");
                }
                self.apply(Trigger::SurfaceDestroyed)
            }
        }
    }

    /// Tear down any live recording with cancel semantics
    pub fn shutdown(&mut self) {
        if self.state != RecordingState::Idle {
            info!(state = %self.state, "Shutting down with a live recording, discarding it");
            if let Err(e) = self.apply(Trigger::Cancel) {
                warn!(error = %e, "Cancel during shutdown failed");
                self.abort();
            }
        }
    }

    fn apply(&mut self, trigger: Trigger) -> CaptureResult<()> {
        let from = self.state;
        let transition = match transition(from, trigger) {
            Ok(transition) => transition,
            Err(e) => {
                if trigger.is_command() {
                    warn!(state = %from, %trigger, "Command rejected");
                } else {
                    debug!(state = %from, %trigger, "Callback rejected");
                }
                return Err(e);
            }
        };

        if transition.is_noop(from) {
            debug!(state = %from, %trigger, "No-op");
            return Ok(());
        }

        if let Some(via) = transition.via {
            self.state = via;
        }
        debug!(from = %from, to = %transition.next, %trigger, "Transition");

        for effect in transition.effects {
            if let Err(e) = self.run(effect) {
                if e.is_fatal() {
                    error!(state = %self.state, ?effect, error = %e, "Recording aborted");
                    self.abort();
                } else {
                    warn!(state = %from, ?effect, error = %e, "Effect not applied");
                    self.state = from;
                }
                self.check_invariants();
                return Err(e);
            }
        }

        self.state = transition.next;
        self.check_invariants();
        Ok(())
    }

    fn fail(&mut self, trigger: Trigger, err: CaptureError) -> CaptureResult<()> {
        error!(state = %self.state, camera = %self.selector, error = %err, "Camera failure");
        self.apply(trigger)?;
        Err(err)
    }

    fn abort(&mut self) {
        for effect in ABORT_EFFECTS {
            // Abort effects cannot fail
            let _ = self.run(effect);
        }
        self.state = RecordingState::Idle;
    }

    fn rejected(&self, trigger: Trigger) -> CaptureError {
        CaptureError::InvalidStateTransition {
            state: self.state,
            trigger,
        }
    }

    fn run(&mut self, effect: Effect) -> CaptureResult<()> {
        match effect {
            Effect::ClearLedger => self.ledger.clear(),
            Effect::AcquireGuard => {
                let permit = self.deps.guard.acquire(self.settings.acquire_timeout)?;
                self.permit = Some(permit);
            }
            Effect::RequestOpen => self.request_open()?,
            Effect::ConfigureSession => self.configure_session()?,
            Effect::AppendSegment => self.append_segment()?,
            Effect::StartEncoder => self.start_encoder()?,
            Effect::StartRepeating => self
                .submit_repeating_request(self.torch)
                .map_err(|e| CaptureError::SessionConfigFailed(e.to_string()))?,
            Effect::Teardown => self.teardown(),
            Effect::ReleaseGuard => {
                if let Some(permit) = self.permit.take() {
                    permit.release();
                }
            }
            Effect::FlipCamera => {
                let next = self.selector.toggled();
                info!(from = %self.selector, to = %next, "Switching camera");
                self.selector = next;
            }
            Effect::ToggleTorch => self.toggle_torch()?,
            Effect::EmitFinished => self.emit_finished(),
            Effect::DeleteSegments => {
                self.ledger.delete_all_files();
            }
        }
        Ok(())
    }

    fn request_open(&mut self) -> CaptureResult<()> {
        let episode = self.last_episode.next();
        self.last_episode = episode;
        self.episode = Some(episode);

        info!(camera = %self.selector, %episode, "Opening camera");
        self.deps
            .hardware
            .open_device(self.selector, episode, self.hardware_events.clone())
            .map_err(|e| CaptureError::DeviceOpenFailure(e.to_string()))
    }

    /// Bind the preview surface and a fresh encoder to the open device
    ///
    /// Waits (returns Ok) until the device is open, and reports
    /// AwaitingSurface until a usable preview target exists.
    fn configure_session(&mut self) -> CaptureResult<()> {
        if self.session_requested {
            debug!("Capture session already requested");
            return Ok(());
        }
        if self.device.is_none() {
            debug!("Waiting for camera to open before configuring");
            return Ok(());
        }
        let Some(episode) = self.episode else {
            return Err(CaptureError::SessionConfigFailed(
                "no open episode".to_string(),
            ));
        };

        let preview = self
            .deps
            .preview
            .upgrade()
            .and_then(|provider| provider.current_surface())
            .filter(Surface::is_usable)
            .ok_or(CaptureError::AwaitingSurface)?;

        let characteristics = self
            .deps
            .hardware
            .characteristics(self.selector)
            .map_err(|e| CaptureError::SessionConfigFailed(e.to_string()))?;
        let rotation = characteristics.orientation_hint();

        storage::ensure_working_dir(&self.settings.working_dir)?;
        let path = storage::segment_path(&self.settings.working_dir, self.deps.encoders.extension());
        self.pending_segment = Some(Segment::new(path.clone(), rotation));

        let encoder = self
            .deps
            .encoders
            .create(&path, rotation)
            .map_err(|e| CaptureError::EncoderStartFailure(e.to_string()))?;
        let encoder = self.encoder.insert(encoder);
        encoder
            .prepare()
            .map_err(|e| CaptureError::EncoderStartFailure(e.to_string()))?;
        let encoder_surface = encoder.target_surface().ok_or_else(|| {
            CaptureError::EncoderStartFailure("encoder has no input surface".to_string())
        })?;

        let targets = vec![preview, encoder_surface];
        let Some(device) = self.device.as_mut() else {
            return Err(CaptureError::SessionConfigFailed("camera closed".to_string()));
        };
        device
            .create_capture_session(&targets, episode, self.hardware_events.clone())
            .map_err(|e| CaptureError::SessionConfigFailed(e.to_string()))?;

        info!(
            camera = %self.selector,
            %episode,
            rotation,
            path = %path.display(),
            "Configuring capture session"
        );
        self.session_targets = targets;
        self.session_requested = true;
        Ok(())
    }

    fn append_segment(&mut self) -> CaptureResult<()> {
        let segment = self.pending_segment.take().ok_or_else(|| {
            CaptureError::SessionConfigFailed("no segment prepared".to_string())
        })?;
        info!(
            index = self.ledger.len(),
            path = %segment.path.display(),
            rotation = segment.rotation,
            "Segment started"
        );
        self.ledger.append(segment);
        Ok(())
    }

    fn start_encoder(&mut self) -> CaptureResult<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| CaptureError::EncoderStartFailure("no encoder".to_string()))?;
        encoder
            .start()
            .map_err(|e| CaptureError::EncoderStartFailure(e.to_string()))?;
        self.encoder_started = true;
        Ok(())
    }

    fn has_flash(&self) -> bool {
        self.deps
            .hardware
            .characteristics(self.selector)
            .map(|c| c.has_flash)
            .unwrap_or(false)
    }

    /// Rebuild the repeating request over the same targets and resubmit it
    fn submit_repeating_request(&mut self, torch: TorchState) -> CaptureResult<()> {
        let flash_mode = torch.flash_mode(self.has_flash());
        let (Some(device), Some(session)) = (self.device.as_ref(), self.session.as_mut()) else {
            return Err(CaptureError::CaptureRequestFailed(
                "no live session".to_string(),
            ));
        };

        let request = self
            .session_targets
            .iter()
            .fold(
                device.create_capture_request(CaptureTemplate::Record),
                |builder, surface| builder.add_target(*surface),
            )
            .flash_mode(flash_mode)
            .build();

        session
            .set_repeating_request(request)
            .map_err(|e| CaptureError::CaptureRequestFailed(e.to_string()))
    }

    fn toggle_torch(&mut self) -> CaptureResult<()> {
        if !self.has_flash() {
            return Err(CaptureError::FlashUnsupported(self.selector));
        }
        let toggled = self.torch.toggled();
        self.submit_repeating_request(toggled)?;
        self.torch = toggled;
        info!(camera = %self.selector, torch = toggled.is_on(), "Torch toggled");
        Ok(())
    }

    /// Close session, stop and release encoder, close device
    ///
    /// Works on partial setup: any handle may be missing.
    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }

        if let Some(mut encoder) = self.encoder.take() {
            if self.encoder_started
                && let Err(e) = encoder.stop()
            {
                warn!(path = %encoder.output_path().display(), error = %e, "Encoder stop failed");
            }
            encoder.release();
        }
        self.encoder_started = false;

        if let Some(mut device) = self.device.take() {
            device.close();
            info!(camera = %device.selector(), "Camera closed");
        }

        if let Some(segment) = self.pending_segment.take()
            && let Err(e) = storage::remove_file_if_exists(&segment.path)
        {
            warn!(path = %segment.path.display(), error = %e, "Failed to remove unused segment");
        }

        self.session_targets.clear();
        self.session_requested = false;
        self.episode = None;
    }

    fn emit_finished(&mut self) {
        let segments = self.ledger.snapshot();
        info!(segments = segments.len(), "Recording finished");

        let payload = if segments.is_empty() {
            None
        } else {
            Some(segments)
        };
        if self
            .events
            .send(RecorderEvent::RecordingFinished(payload))
            .is_err()
        {
            debug!("Nobody is listening for the finished event");
        }
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.state != RecordingState::Idle
                || (self.device.is_none()
                    && self.session.is_none()
                    && self.encoder.is_none()
                    && self.permit.is_none()),
            "idle with live handles or a held permit"
        );
    }
}

impl Drop for CaptureSessionOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Close any handle carried by a callback nobody wants
pub(super) fn discard(event: HardwareEvent) {
    match event {
        HardwareEvent::DeviceOpened { mut device, .. } => device.close(),
        HardwareEvent::SessionConfigured { mut session, .. } => session.close(),
        HardwareEvent::DeviceError { .. }
        | HardwareEvent::DeviceDisconnected { .. }
        | HardwareEvent::SessionConfigureFailed { .. } => {}
    }
}
