// SPDX-License-Identifier: GPL-3.0-only

//! Recording pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Capture      │ ──▶ │  Encoder Sink     │ ──▶ │ Segment File │
//! │ Session      │     │  (target surface) │     │ (cache dir)  │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`video`]: Encoder sink contract and the file-backed sink

pub mod video;
