// SPDX-License-Identifier: GPL-3.0-only

//! Camera Segments - segmented video capture with live camera switching
//!
//! A recording is a sequence of segment files, one per contiguous interval
//! during which a camera is open. Switching cameras closes one device and
//! opens the other, starting a new segment; toggling the torch resubmits the
//! live capture request without interrupting it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`recorder`]: Orchestrator state machine, device permit, segment ledger and worker
//! - [`backends`]: Camera hardware abstraction and the virtual camera
//! - [`pipelines`]: Encoder sink contract and the file-backed sink
//! - [`preview`]: Preview surface provider owned by the UI layer
//! - [`channel`]: JSON method-call command channel
//! - [`config`]: User configuration handling
//! - [`storage`]: Private segment directory management
//!
//! # Example
//!
//! ```no_run
//! use camera_segments::backends::camera::{Surface, VirtualCameraHardware};
//! use camera_segments::pipelines::video::FileSinkFactory;
//! use camera_segments::preview::{PreviewSlot, non_owning};
//! use camera_segments::recorder::{
//!     CaptureRecorder, DeviceAcquisitionGuard, RecorderDeps, RecorderSettings,
//! };
//! use std::sync::Arc;
//!
//! let preview = Arc::new(PreviewSlot::new());
//! let deps = RecorderDeps {
//!     hardware: Arc::new(VirtualCameraHardware::new()),
//!     encoders: Arc::new(FileSinkFactory::default()),
//!     preview: non_owning(&preview),
//!     guard: DeviceAcquisitionGuard::shared(),
//! };
//! let (recorder, mut events) =
//!     CaptureRecorder::spawn(deps, RecorderSettings::new("/tmp/segments")).unwrap();
//! recorder.follow_preview(&preview);
//!
//! recorder.start_recording().unwrap();
//! preview.publish(Surface::preview(640, 480));
//! recorder.stop_recording().unwrap();
//! let finished = events.blocking_recv();
//! ```

pub mod backends;
pub mod channel;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;
pub mod pipelines;
pub mod preview;
pub mod recorder;
pub mod storage;

pub(crate) mod utils;

// Re-export commonly used types
pub use backends::camera::{CameraSelector, VirtualCameraHardware};
pub use channel::CommandChannel;
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError, CaptureResult};
pub use recorder::{
    CaptureRecorder, RecorderEvent, RecorderHandle, RecorderStatus, RecordingState, Segment,
};
