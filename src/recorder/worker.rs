// SPDX-License-Identifier: GPL-3.0-only

//! The camera worker
//!
//! A single thread owns the [`CaptureSessionOrchestrator`]. Commands, hardware
//! callbacks and surface changes are queued as [`WorkerMessage`]s and handled
//! strictly in arrival order.

use super::orchestrator::{CaptureSessionOrchestrator, discard};
use super::state::RecordingState;
use super::{Command, RecorderDeps, RecorderEvent, RecorderSettings, RecorderStatus};
use crate::backends::camera::{HardwareEvent, HardwareEventSink};
use crate::constants::timing;
use crate::errors::{AppError, AppResult, CaptureError, CaptureResult};
use crate::preview::{PreviewSlot, SurfaceEvent};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tracing::{debug, info, warn};

/// Everything the worker can be asked to do
pub enum WorkerMessage {
    Command(Command),
    Hardware(HardwareEvent),
    Surface(SurfaceEvent),
    Status(oneshot::Sender<RecorderStatus>),
    Shutdown,
}

/// Cloneable, thread-safe handle to a running recorder
///
/// Every command is acknowledged as soon as it is queued; the outcome shows
/// up in state changes and [`RecorderEvent`]s.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<WorkerMessage>,
}

impl RecorderHandle {
    fn send(&self, message: WorkerMessage) -> CaptureResult<()> {
        self.tx
            .send(message)
            .map_err(|_| CaptureError::WorkerUnavailable)
    }

    pub fn command(&self, command: Command) -> CaptureResult<()> {
        debug!(command = command.method_name(), "Queueing command");
        self.send(WorkerMessage::Command(command))
    }

    pub fn start_recording(&self) -> CaptureResult<()> {
        self.command(Command::Start)
    }

    pub fn stop_recording(&self) -> CaptureResult<()> {
        self.command(Command::Stop)
    }

    pub fn cancel_recording(&self) -> CaptureResult<()> {
        self.command(Command::Cancel)
    }

    pub fn toggle_camera(&self) -> CaptureResult<()> {
        self.command(Command::ToggleCamera)
    }

    pub fn toggle_flash(&self) -> CaptureResult<()> {
        self.command(Command::ToggleFlash)
    }

    pub fn surface_available(&self) -> CaptureResult<()> {
        self.send(WorkerMessage::Surface(SurfaceEvent::Available))
    }

    pub fn surface_destroyed(&self) -> CaptureResult<()> {
        self.send(WorkerMessage::Surface(SurfaceEvent::Destroyed))
    }

    /// Forward the slot's availability changes to this recorder
    pub fn follow_preview(&self, slot: &PreviewSlot) {
        let handle = self.clone();
        slot.subscribe(move |event| {
            if handle.send(WorkerMessage::Surface(event)).is_err() {
                debug!(?event, "Recorder gone, dropping surface event");
            }
        });
    }

    /// Current status (blocks until the worker answers)
    ///
    /// Must not be called from inside an async runtime; use
    /// [`Self::status_async`] there.
    pub fn status(&self) -> CaptureResult<RecorderStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(WorkerMessage::Status(tx))?;
        rx.blocking_recv()
            .map_err(|_| CaptureError::WorkerUnavailable)
    }

    pub async fn status_async(&self) -> CaptureResult<RecorderStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(WorkerMessage::Status(tx))?;
        rx.await.map_err(|_| CaptureError::WorkerUnavailable)
    }

    /// Poll until the recorder reaches `state`; false on timeout
    pub fn wait_for_state(&self, state: RecordingState, timeout: Duration) -> bool {
        self.wait_until(timeout, |status| status.state == state)
    }

    /// Poll until `condition` holds for the status; false on timeout
    pub fn wait_until(
        &self,
        timeout: Duration,
        condition: impl Fn(&RecorderStatus) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.status() {
                Ok(status) if condition(&status) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(timing::STATE_POLL_INTERVAL);
        }
    }
}

/// A running recorder: the worker thread plus a handle to it
///
/// Dropping it discards any live recording (cancel semantics) and joins the
/// worker.
pub struct CaptureRecorder {
    handle: RecorderHandle,
    thread: Option<JoinHandle<()>>,
}

impl CaptureRecorder {
    /// Start the worker thread
    ///
    /// Returns the recorder and the receiver for its outbound events.
    pub fn spawn(
        deps: RecorderDeps,
        settings: RecorderSettings,
    ) -> AppResult<(Self, UnboundedReceiver<RecorderEvent>)> {
        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();

        let hardware_tx = tx.clone();
        let hardware_events = HardwareEventSink::new(move |event| {
            hardware_tx.send(WorkerMessage::Hardware(event)).is_ok()
        });

        let thread = std::thread::Builder::new()
            .name("camera-worker".to_string())
            .spawn(move || {
                let orchestrator =
                    CaptureSessionOrchestrator::new(deps, settings, hardware_events, event_tx);
                run_worker(orchestrator, rx);
            })
            .map_err(|e| AppError::Other(format!("Failed to spawn camera worker: {}", e)))?;

        info!("Camera worker started");
        Ok((
            Self {
                handle: RecorderHandle { tx },
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    pub fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }

    /// Stop the worker, discarding any live recording
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.handle.send(WorkerMessage::Shutdown).is_err() {
            debug!("Camera worker already gone");
        }
        if thread.join().is_err() {
            warn!("Camera worker panicked");
        }
        info!("Camera worker stopped");
    }
}

impl std::ops::Deref for CaptureRecorder {
    type Target = RecorderHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for CaptureRecorder {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run_worker(mut orchestrator: CaptureSessionOrchestrator, rx: mpsc::Receiver<WorkerMessage>) {
    while let Ok(message) = rx.recv() {
        let result = match message {
            WorkerMessage::Command(command) => orchestrator.handle_command(command),
            WorkerMessage::Hardware(event) => orchestrator.on_hardware_event(event),
            WorkerMessage::Surface(event) => orchestrator.on_surface_event(event),
            WorkerMessage::Status(reply) => {
                if reply.send(orchestrator.status()).is_err() {
                    debug!("Status requester went away");
                }
                Ok(())
            }
            WorkerMessage::Shutdown => {
                orchestrator.shutdown();
                break;
            }
        };
        // Already logged where it happened; callers only get acknowledgements
        if let Err(e) = result {
            debug!(error = %e, "Worker message not applied");
        }
    }

    // Late callbacks still queued carry handles that must be closed
    drop(orchestrator);
    while let Ok(message) = rx.try_recv() {
        if let WorkerMessage::Hardware(event) = message {
            debug!(?event, "Dropping callback after shutdown");
            discard(event);
        }
    }
}
