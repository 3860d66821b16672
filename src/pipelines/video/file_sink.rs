// SPDX-License-Identifier: GPL-3.0-only

//! File-backed encoder sink
//!
//! Writes the segment envelope to the caller-specified path: a header line
//! with the encoding profile and orientation tag, then start and stop marks.
//! Frame compression belongs to platform encoders implementing
//! [`EncoderSink`]; this sink gives the virtual camera real files to manage.

use super::{EncoderFactory, EncoderProfile, EncoderSink};
use crate::backends::camera::types::{BackendError, BackendResult, Surface};
use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Created,
    Prepared,
    Recording,
    Stopped,
    Released,
}

#[derive(Serialize)]
struct SegmentHeader<'a> {
    profile: &'a EncoderProfile,
    rotation: i32,
    created_at: String,
}

#[derive(Serialize)]
struct SegmentMark {
    event: &'static str,
    at: String,
}

/// Sink writing one segment file
pub struct FileSink {
    output: PathBuf,
    profile: EncoderProfile,
    rotation_hint: i32,
    surface: Option<Surface>,
    writer: Option<BufWriter<File>>,
    state: SinkState,
}

impl FileSink {
    pub fn new(output: &Path, profile: EncoderProfile, rotation_hint: i32) -> Self {
        Self {
            output: output.to_path_buf(),
            profile,
            rotation_hint,
            surface: None,
            writer: None,
            state: SinkState::Created,
        }
    }

    fn write_line(&mut self, value: &impl Serialize) -> BackendResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BackendError::Encoder("output is not open".to_string()))?;
        serde_json::to_writer(&mut *writer, value)
            .map_err(|e| BackendError::Encoder(e.to_string()))?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn mark(&mut self, event: &'static str) -> BackendResult<()> {
        let mark = SegmentMark {
            event,
            at: Utc::now().to_rfc3339(),
        };
        self.write_line(&mark)
    }
}

impl EncoderSink for FileSink {
    fn prepare(&mut self) -> BackendResult<()> {
        if self.state != SinkState::Created {
            return Err(BackendError::Encoder(format!(
                "prepare called in {:?} state",
                self.state
            )));
        }

        let file = File::create(&self.output)?;
        self.writer = Some(BufWriter::new(file));

        let profile = self.profile.clone();
        let header = SegmentHeader {
            profile: &profile,
            rotation: self.rotation_hint,
            created_at: Utc::now().to_rfc3339(),
        };
        self.write_line(&header)?;

        self.surface = Some(Surface::encoder(self.profile.width, self.profile.height));
        self.state = SinkState::Prepared;
        debug!(path = %self.output.display(), rotation = self.rotation_hint, "Segment sink prepared");
        Ok(())
    }

    fn target_surface(&self) -> Option<Surface> {
        self.surface
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.state != SinkState::Prepared {
            return Err(BackendError::Encoder(format!(
                "start called in {:?} state",
                self.state
            )));
        }
        self.mark("start")?;
        self.state = SinkState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> BackendResult<()> {
        if self.state != SinkState::Recording {
            return Err(BackendError::Encoder(format!(
                "stop called in {:?} state",
                self.state
            )));
        }
        self.mark("stop")?;
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        self.state = SinkState::Stopped;
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            warn!(path = %self.output.display(), error = %e, "Failed to flush segment on release");
        }
        self.surface = None;
        self.state = SinkState::Released;
    }

    fn output_path(&self) -> &Path {
        &self.output
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Creates a [`FileSink`] per segment with a shared profile
#[derive(Debug, Clone, Default)]
pub struct FileSinkFactory {
    profile: EncoderProfile,
}

impl FileSinkFactory {
    pub fn new(profile: EncoderProfile) -> Self {
        Self { profile }
    }
}

impl EncoderFactory for FileSinkFactory {
    fn create(&self, output: &Path, rotation_hint: i32) -> BackendResult<Box<dyn EncoderSink>> {
        Ok(Box::new(FileSink::new(
            output,
            self.profile.clone(),
            rotation_hint,
        )))
    }

    fn extension(&self) -> &'static str {
        self.profile.container.extension()
    }
}
