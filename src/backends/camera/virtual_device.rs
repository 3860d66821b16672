// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera hardware
//!
//! An in-process stand-in for a camera manager with two fixed cameras. It
//! honors the same asynchronous contract as real hardware (every open and
//! session request completes through the event sink) and supports fault
//! injection, so the orchestrator's error paths can be exercised.
//!
//! [`HardwareProbe`] records what the hardware saw: which devices are open,
//! the peak number of simultaneously open devices, sessions and the most
//! recent opens and repeating requests.

use super::types::*;
use super::{CameraDeviceHandle, CameraHardware, CaptureSessionHandle};
use crate::utils::lock_or_recover;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Camera error code reported for an injected device failure
pub const ERROR_CAMERA_DEVICE: i32 = 4;

/// Opens and requests kept by the probe; older entries are dropped
pub const PROBE_HISTORY_LIMIT: usize = 64;

/// Injected failures
#[derive(Debug, Default)]
struct FaultPlan {
    /// Error code to report when opening a given camera
    open_errors: HashMap<CameraSelector, i32>,
    /// Refuse open requests synchronously
    refuse_open: bool,
    /// Fail every session configuration
    fail_configure: bool,
    /// Delay before open completes (delivered from a helper thread)
    open_delay: Option<Duration>,
}

/// The device currently handed out, for disconnect injection
struct LiveDevice {
    episode: EpisodeId,
    events: HardwareEventSink,
}

/// Observations recorded by the virtual hardware
#[derive(Debug, Default)]
pub struct HardwareProbe {
    state: Mutex<ProbeState>,
}

#[derive(Debug, Default)]
struct ProbeState {
    open: Vec<CameraSelector>,
    max_open: usize,
    open_history: VecDeque<CameraSelector>,
    live_sessions: usize,
    sessions_created: usize,
    requests: VecDeque<CaptureRequest>,
}

fn push_bounded<T>(history: &mut VecDeque<T>, item: T) {
    if history.len() == PROBE_HISTORY_LIMIT {
        history.pop_front();
    }
    history.push_back(item);
}

impl HardwareProbe {
    fn device_opened(&self, camera: CameraSelector) {
        let mut state = lock_or_recover(&self.state);
        state.open.push(camera);
        push_bounded(&mut state.open_history, camera);
        state.max_open = state.max_open.max(state.open.len());
    }

    fn device_closed(&self, camera: CameraSelector) {
        let mut state = lock_or_recover(&self.state);
        if let Some(pos) = state.open.iter().position(|c| *c == camera) {
            state.open.remove(pos);
        }
    }

    fn session_created(&self) {
        let mut state = lock_or_recover(&self.state);
        state.live_sessions += 1;
        state.sessions_created += 1;
    }

    fn session_closed(&self) {
        let mut state = lock_or_recover(&self.state);
        state.live_sessions = state.live_sessions.saturating_sub(1);
    }

    fn record_request(&self, request: CaptureRequest) {
        push_bounded(&mut lock_or_recover(&self.state).requests, request);
    }

    /// Cameras whose device handle is currently open
    pub fn open_devices(&self) -> Vec<CameraSelector> {
        lock_or_recover(&self.state).open.clone()
    }

    /// Peak number of simultaneously open devices
    pub fn max_concurrent_open(&self) -> usize {
        lock_or_recover(&self.state).max_open
    }

    /// The most recent cameras opened, oldest first
    pub fn open_history(&self) -> Vec<CameraSelector> {
        lock_or_recover(&self.state).open_history.iter().copied().collect()
    }

    /// Sessions configured and not yet closed
    pub fn live_sessions(&self) -> usize {
        lock_or_recover(&self.state).live_sessions
    }

    /// Total sessions configured
    pub fn sessions_created(&self) -> usize {
        lock_or_recover(&self.state).sessions_created
    }

    /// The most recent repeating requests, oldest first
    pub fn repeating_requests(&self) -> Vec<CaptureRequest> {
        lock_or_recover(&self.state).requests.iter().cloned().collect()
    }

    /// The most recent repeating request
    pub fn last_request(&self) -> Option<CaptureRequest> {
        lock_or_recover(&self.state).requests.back().cloned()
    }
}

/// Virtual camera manager with a primary and a secondary camera
pub struct VirtualCameraHardware {
    cameras: HashMap<CameraSelector, CameraCharacteristics>,
    faults: Arc<Mutex<FaultPlan>>,
    live: Arc<Mutex<Option<LiveDevice>>>,
    probe: Arc<HardwareProbe>,
}

impl Default for VirtualCameraHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCameraHardware {
    /// Back camera: sensor at 90° with flash. Front camera: sensor at 270°, no flash.
    pub fn new() -> Self {
        let mut cameras = HashMap::new();
        cameras.insert(
            CameraSelector::Primary,
            CameraCharacteristics {
                sensor_orientation: 90,
                has_flash: true,
            },
        );
        cameras.insert(
            CameraSelector::Secondary,
            CameraCharacteristics {
                sensor_orientation: 270,
                has_flash: false,
            },
        );

        Self {
            cameras,
            faults: Arc::new(Mutex::new(FaultPlan::default())),
            live: Arc::new(Mutex::new(None)),
            probe: Arc::new(HardwareProbe::default()),
        }
    }

    /// Complete open requests after `delay`, from a helper thread
    #[must_use]
    pub fn with_open_delay(self, delay: Duration) -> Self {
        lock_or_recover(&self.faults).open_delay = Some(delay);
        self
    }

    /// Report `code` instead of opening `camera`
    pub fn fail_open(&self, camera: CameraSelector, code: i32) {
        lock_or_recover(&self.faults).open_errors.insert(camera, code);
    }

    /// Refuse open requests synchronously
    pub fn refuse_open(&self, refuse: bool) {
        lock_or_recover(&self.faults).refuse_open = refuse;
    }

    /// Fail every session configuration while set
    pub fn fail_configure(&self, fail: bool) {
        lock_or_recover(&self.faults).fail_configure = fail;
    }

    /// Simulate the open camera going away.
    ///
    /// Returns false when no device is currently handed out.
    pub fn disconnect(&self) -> bool {
        let Some(live) = lock_or_recover(&self.live).take() else {
            return false;
        };
        info!(episode = %live.episode, "Virtual camera disconnected");
        live.events.post(HardwareEvent::DeviceDisconnected {
            episode: live.episode,
        })
    }

    /// Observations shared with tests and diagnostics
    pub fn probe(&self) -> Arc<HardwareProbe> {
        Arc::clone(&self.probe)
    }

    fn complete_open(
        camera: CameraSelector,
        episode: EpisodeId,
        events: HardwareEventSink,
        error_code: Option<i32>,
        faults: Arc<Mutex<FaultPlan>>,
        live: Arc<Mutex<Option<LiveDevice>>>,
        probe: Arc<HardwareProbe>,
    ) {
        if let Some(code) = error_code {
            warn!(%camera, %episode, code, "Virtual camera open failed");
            events.post(HardwareEvent::DeviceError { episode, code });
            return;
        }

        probe.device_opened(camera);
        *lock_or_recover(&live) = Some(LiveDevice {
            episode,
            events: events.clone(),
        });

        let device = VirtualDevice {
            camera,
            episode,
            faults,
            live,
            probe,
            closed: false,
        };
        debug!(%camera, %episode, "Virtual camera opened");
        // An undelivered device is dropped here, which closes it
        events.post(HardwareEvent::DeviceOpened {
            episode,
            device: Box::new(device),
        });
    }
}

impl CameraHardware for VirtualCameraHardware {
    fn characteristics(&self, camera: CameraSelector) -> BackendResult<CameraCharacteristics> {
        self.cameras
            .get(&camera)
            .copied()
            .ok_or_else(|| BackendError::DeviceNotFound(camera.hardware_id().to_string()))
    }

    fn open_device(
        &self,
        camera: CameraSelector,
        episode: EpisodeId,
        events: HardwareEventSink,
    ) -> BackendResult<()> {
        if !self.cameras.contains_key(&camera) {
            return Err(BackendError::DeviceNotFound(camera.hardware_id().to_string()));
        }

        let (refuse, error_code, delay) = {
            let faults = lock_or_recover(&self.faults);
            (
                faults.refuse_open,
                faults.open_errors.get(&camera).copied(),
                faults.open_delay,
            )
        };
        if refuse {
            return Err(BackendError::Busy);
        }

        let faults = Arc::clone(&self.faults);
        let live = Arc::clone(&self.live);
        let probe = Arc::clone(&self.probe);

        match delay {
            Some(delay) => {
                std::thread::Builder::new()
                    .name("virtual-camera-open".to_string())
                    .spawn(move || {
                        std::thread::sleep(delay);
                        Self::complete_open(camera, episode, events, error_code, faults, live, probe);
                    })
                    .map_err(|e| BackendError::Other(format!("Spawn open thread: {}", e)))?;
            }
            None => Self::complete_open(camera, episode, events, error_code, faults, live, probe),
        }
        Ok(())
    }
}

/// Device handle handed out by [`VirtualCameraHardware`]
struct VirtualDevice {
    camera: CameraSelector,
    episode: EpisodeId,
    faults: Arc<Mutex<FaultPlan>>,
    live: Arc<Mutex<Option<LiveDevice>>>,
    probe: Arc<HardwareProbe>,
    closed: bool,
}

impl CameraDeviceHandle for VirtualDevice {
    fn selector(&self) -> CameraSelector {
        self.camera
    }

    fn create_capture_session(
        &mut self,
        targets: &[Surface],
        episode: EpisodeId,
        events: HardwareEventSink,
    ) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed(format!("{} camera", self.camera)));
        }

        let fail = lock_or_recover(&self.faults).fail_configure;
        if fail || targets.is_empty() || targets.iter().any(|s| !s.is_usable()) {
            warn!(camera = %self.camera, %episode, targets = targets.len(), "Virtual session configuration failed");
            events.post(HardwareEvent::SessionConfigureFailed { episode });
            return Ok(());
        }

        self.probe.session_created();
        let session = VirtualSession {
            probe: Arc::clone(&self.probe),
            closed: false,
        };
        events.post(HardwareEvent::SessionConfigured {
            episode,
            session: Box::new(session),
        });
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.probe.device_closed(self.camera);

        let mut live = lock_or_recover(&self.live);
        if live.as_ref().is_some_and(|l| l.episode == self.episode) {
            *live = None;
        }
        debug!(camera = %self.camera, episode = %self.episode, "Virtual camera closed");
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Session handle handed out by [`VirtualDevice`]
struct VirtualSession {
    probe: Arc<HardwareProbe>,
    closed: bool,
}

impl CaptureSessionHandle for VirtualSession {
    fn set_repeating_request(&mut self, request: CaptureRequest) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::Closed("capture session".to_string()));
        }
        if request.targets.is_empty() {
            return Err(BackendError::InvalidTarget(
                "repeating request has no targets".to_string(),
            ));
        }
        self.probe.record_request(request);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.session_closed();
        }
    }
}

impl Drop for VirtualSession {
    fn drop(&mut self) {
        self.close();
    }
}
