// SPDX-License-Identifier: GPL-3.0-only

//! Camera hardware abstraction
//!
//! The orchestrator drives hardware only through these traits, so the whole
//! recording lifecycle can run against the virtual camera in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ CaptureSessionOrchestrator│  ← single camera worker
//! └────────────┬─────────────┘
//!              │ open / configure / request / close
//!              ▼
//! ┌──────────────────────────┐      HardwareEvent      ┌──────────────┐
//! │   CameraHardware Trait   │ ──────────────────────► │ EventSink    │
//! │   (device + session)     │  opened / error /       │ (worker queue)│
//! └────────────┬─────────────┘  configured / failed    └──────────────┘
//!              ▼
//!        ┌────────────┐
//!        │  Virtual   │  ← in-process implementation
//!        └────────────┘
//! ```

pub mod types;
pub mod virtual_device;

pub use types::*;
pub use virtual_device::{HardwareProbe, VirtualCameraHardware};

/// Camera manager: characteristics lookup and asynchronous open
pub trait CameraHardware: Send + Sync {
    /// Fixed characteristics of the given camera
    fn characteristics(&self, camera: CameraSelector) -> BackendResult<CameraCharacteristics>;

    /// Request the camera to be opened
    ///
    /// Completion is reported later through `events` as
    /// [`HardwareEvent::DeviceOpened`] or [`HardwareEvent::DeviceError`], tagged
    /// with `episode`. An `Err` return means the request was refused outright
    /// and no callback will follow.
    fn open_device(
        &self,
        camera: CameraSelector,
        episode: EpisodeId,
        events: HardwareEventSink,
    ) -> BackendResult<()>;
}

/// An open camera device
pub trait CameraDeviceHandle: Send {
    /// Which camera this handle belongs to
    fn selector(&self) -> CameraSelector;

    /// Request a capture session streaming into `targets`
    ///
    /// Completion is reported through `events` as
    /// [`HardwareEvent::SessionConfigured`] or
    /// [`HardwareEvent::SessionConfigureFailed`].
    fn create_capture_session(
        &mut self,
        targets: &[Surface],
        episode: EpisodeId,
        events: HardwareEventSink,
    ) -> BackendResult<()>;

    /// Start building a request for this device
    fn create_capture_request(&self, template: CaptureTemplate) -> CaptureRequestBuilder {
        CaptureRequestBuilder::new(template)
    }

    /// Close the device. Closing twice is a no-op.
    fn close(&mut self);
}

/// A configured capture session
pub trait CaptureSessionHandle: Send {
    /// Replace the standing request the session streams with
    fn set_repeating_request(&mut self, request: CaptureRequest) -> BackendResult<()>;

    /// Close the session. Closing twice is a no-op.
    fn close(&mut self);
}
