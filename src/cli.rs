// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Serving the command channel over stdin/stdout
//! - Recording a scripted demo session
//! - Purging leftover segment files
//! - Showing the effective configuration
//!
//! Every recorder here runs on the virtual camera with a ready preview
//! surface sized to the encoder profile.

use camera_segments::backends::camera::{CameraHardware, Surface, VirtualCameraHardware};
use camera_segments::channel::{CommandChannel, encode_event};
use camera_segments::constants::timing;
use camera_segments::pipelines::video::FileSinkFactory;
use camera_segments::preview::{PreviewSlot, non_owning};
use camera_segments::recorder::{
    CaptureRecorder, DeviceAcquisitionGuard, RecorderDeps, RecorderEvent, RecorderSettings,
    RecordingState,
};
use camera_segments::{Config, storage};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// How long to wait for the recorder to settle between steps
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// A recorder wired to the virtual camera and a published preview
struct VirtualSession {
    recorder: CaptureRecorder,
    events: UnboundedReceiver<RecorderEvent>,
    // Keeps the preview alive; the recorder only holds a weak handle
    _preview: Arc<PreviewSlot>,
}

impl VirtualSession {
    fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let preview = Arc::new(PreviewSlot::new());
        let hardware: Arc<dyn CameraHardware> = Arc::new(VirtualCameraHardware::new());
        let deps = RecorderDeps {
            hardware,
            encoders: Arc::new(FileSinkFactory::new(config.encoder.clone())),
            preview: non_owning(&preview),
            guard: DeviceAcquisitionGuard::shared(),
        };

        let (recorder, events) = CaptureRecorder::spawn(deps, RecorderSettings::from(config))?;
        recorder.follow_preview(&preview);
        preview.publish(Surface::preview(config.encoder.width, config.encoder.height));

        Ok(Self {
            recorder,
            events,
            _preview: preview,
        })
    }
}

/// Serve one JSON method call per stdin line; replies and events go to stdout
pub fn run_stdio(config: &Config) -> CliResult {
    let VirtualSession {
        recorder,
        mut events,
        _preview,
    } = VirtualSession::new(config)?;
    let channel = CommandChannel::new(recorder.handle());

    let writer = std::thread::Builder::new()
        .name("event-writer".to_string())
        .spawn(move || {
            while let Some(event) = events.blocking_recv() {
                write_line(&encode_event(event));
            }
        })?;

    // Ctrl+C discards a live recording before exiting
    let handle = recorder.handle();
    ctrlc::set_handler(move || {
        if handle.cancel_recording().is_ok() {
            handle.wait_for_state(RecordingState::Idle, timing::SHUTDOWN_JOIN_TIMEOUT);
        }
        std::process::exit(130);
    })?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        write_line(&channel.dispatch_line(&line));
    }

    drop(channel);
    recorder.shutdown();
    if writer.join().is_err() {
        return Err("event writer panicked".into());
    }
    Ok(())
}

fn write_line(line: &str) {
    let mut out = std::io::stdout().lock();
    // A closed stdout only means nobody is reading anymore
    let _ = writeln!(out, "{}", line).and_then(|_| out.flush());
}

/// Start, switch cameras `toggles` times, then stop (or cancel)
pub fn run_demo(config: &Config, toggles: usize, flash: bool, cancel: bool) -> CliResult {
    let VirtualSession {
        recorder,
        mut events,
        _preview,
    } = VirtualSession::new(config)?;

    println!("Recording to {}", config.working_dir().display());
    recorder.start_recording()?;
    if !recorder.wait_for_state(RecordingState::Active, SETTLE_TIMEOUT) {
        return Err("recording did not start".into());
    }

    if flash {
        recorder.toggle_flash()?;
        println!("Torch on");
    }

    for switch in 1..=toggles {
        std::thread::sleep(timing::DEMO_STEP);
        recorder.toggle_camera()?;
        let reached = recorder.wait_until(SETTLE_TIMEOUT, |status| {
            status.state == RecordingState::Active && status.segments == switch + 1
        });
        if !reached {
            return Err(format!("camera switch {} did not complete", switch).into());
        }
        println!("Switched camera ({} of {})", switch, toggles);
    }

    std::thread::sleep(timing::DEMO_STEP);
    if cancel {
        recorder.cancel_recording()?;
        recorder.wait_for_state(RecordingState::Idle, SETTLE_TIMEOUT);
        println!("Recording discarded");
        return Ok(());
    }

    recorder.stop_recording()?;
    match events.blocking_recv() {
        Some(event) => {
            println!("{}", encode_event(event.clone()));
            let RecorderEvent::RecordingFinished(segments) = event;
            let segments = segments.unwrap_or_default();
            println!();
            println!("Recorded {} segment(s):", segments.len());
            for segment in &segments {
                println!("  {} (rotation {})", segment.path.display(), segment.rotation);
            }
        }
        None => return Err("recorder stopped without finishing".into()),
    }

    recorder.shutdown();
    Ok(())
}

/// Delete leftover segment files in the working directory
pub fn clean(config: &Config) -> CliResult {
    let dir = config.working_dir();
    let removed = storage::purge_segments(&dir)?;
    println!("Removed {} segment file(s) from {}", removed, dir.display());
    Ok(())
}

/// Print the effective configuration as JSON
pub fn show_config(config: &Config) -> CliResult {
    if let Some(path) = Config::default_path() {
        println!("# default location: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
