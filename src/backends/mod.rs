// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera hardware
//!
//! The orchestrator talks to hardware only through the traits in [`camera`].
//! The in-process [`camera::VirtualCameraHardware`] implements them for the
//! command-line tool and the test suite.
//!
//! # Modules
//!
//! - [`camera`]: Camera manager, device and session contracts plus the virtual camera

pub mod camera;
