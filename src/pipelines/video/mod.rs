// SPDX-License-Identifier: GPL-3.0-only

//! Video encoder sinks
//!
//! A sink accepts frames through one target surface and writes a single
//! segment file. The orchestrator creates one sink per open-camera episode
//! through an [`EncoderFactory`] and drives its lifecycle:
//! `prepare → start → stop → release`.

pub mod file_sink;

pub use file_sink::{FileSink, FileSinkFactory};

use crate::backends::camera::types::{BackendResult, Surface};
use crate::constants::encoder;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container format of a segment file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Mp4,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
        }
    }
}

/// Fixed encoding parameters for every segment
///
/// No runtime negotiation happens; the profile is chosen once from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderProfile {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub video_bitrate: u32,
    pub video_codec: String,
    pub audio_codec: String,
    /// Record microphone audio alongside video
    pub audio: bool,
    pub container: Container,
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self {
            width: encoder::WIDTH,
            height: encoder::HEIGHT,
            framerate: encoder::FRAMERATE,
            video_bitrate: encoder::VIDEO_BITRATE,
            video_codec: encoder::VIDEO_CODEC.to_string(),
            audio_codec: encoder::AUDIO_CODEC.to_string(),
            audio: true,
            container: Container::Mp4,
        }
    }
}

/// An encoder writing one segment file
pub trait EncoderSink: Send {
    /// Open the output and allocate the input surface
    fn prepare(&mut self) -> BackendResult<()>;

    /// Input surface to add as a capture-session target (after `prepare`)
    fn target_surface(&self) -> Option<Surface>;

    /// Begin writing frames
    fn start(&mut self) -> BackendResult<()>;

    /// Finish the file. Errors if the sink was never started.
    fn stop(&mut self) -> BackendResult<()>;

    /// Free all resources. Safe to call in any state, more than once.
    fn release(&mut self);

    /// Where the segment is written
    fn output_path(&self) -> &Path;
}

/// Creates one sink per segment
pub trait EncoderFactory: Send + Sync {
    /// A sink writing to `output`, tagged with `rotation_hint` degrees
    fn create(&self, output: &Path, rotation_hint: i32) -> BackendResult<Box<dyn EncoderSink>>;

    /// Extension for segment files produced by this factory
    fn extension(&self) -> &'static str {
        Container::Mp4.extension()
    }
}
