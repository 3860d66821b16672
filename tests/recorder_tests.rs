// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the recorder against the virtual camera

use camera_segments::backends::camera::types::{BackendError, BackendResult};
use camera_segments::backends::camera::virtual_device::ERROR_CAMERA_DEVICE;
use camera_segments::backends::camera::{
    CameraHardware, CameraSelector, HardwareProbe, Surface, VirtualCameraHardware,
};
use camera_segments::flash::FlashMode;
use camera_segments::pipelines::video::{EncoderFactory, EncoderSink, FileSinkFactory};
use camera_segments::preview::{PreviewSlot, non_owning};
use camera_segments::recorder::{
    CaptureRecorder, DeviceAcquisitionGuard, RecorderDeps, RecorderEvent, RecorderSettings,
    RecordingState, Segment,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(5);

struct Rig {
    recorder: CaptureRecorder,
    events: UnboundedReceiver<RecorderEvent>,
    hardware: Arc<VirtualCameraHardware>,
    probe: Arc<HardwareProbe>,
    preview: Arc<PreviewSlot>,
    dir: TempDir,
}

struct RigOptions {
    hardware: VirtualCameraHardware,
    encoders: Arc<dyn EncoderFactory>,
    guard: Arc<DeviceAcquisitionGuard>,
    camera: CameraSelector,
    acquire_timeout: Duration,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            hardware: VirtualCameraHardware::new(),
            encoders: Arc::new(FileSinkFactory::default()),
            guard: DeviceAcquisitionGuard::shared(),
            camera: CameraSelector::Primary,
            acquire_timeout: Duration::from_millis(2500),
        }
    }
}

fn rig_with(options: RigOptions) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let hardware = Arc::new(options.hardware);
    let probe = hardware.probe();
    let preview = Arc::new(PreviewSlot::new());

    let deps = RecorderDeps {
        hardware: Arc::clone(&hardware) as Arc<dyn CameraHardware>,
        encoders: options.encoders,
        preview: non_owning(&preview),
        guard: options.guard,
    };
    let settings = RecorderSettings::new(dir.path())
        .with_acquire_timeout(options.acquire_timeout)
        .with_initial_camera(options.camera);

    let (recorder, events) = CaptureRecorder::spawn(deps, settings).unwrap();
    recorder.follow_preview(&preview);

    Rig {
        recorder,
        events,
        hardware,
        probe,
        preview,
        dir,
    }
}

fn rig() -> Rig {
    rig_with(RigOptions::default())
}

impl Rig {
    fn show_preview(&self) {
        self.preview.publish(Surface::preview(640, 480));
    }

    fn start_active(&self) {
        self.show_preview();
        self.recorder.start_recording().unwrap();
        assert!(
            self.recorder
                .wait_for_state(RecordingState::Active, WAIT),
            "recorder never became active"
        );
    }

    fn wait_segments(&self, count: usize) {
        assert!(
            self.recorder.wait_until(WAIT, |s| {
                s.state == RecordingState::Active && s.segments == count
            }),
            "never reached {} active segments",
            count
        );
    }

    fn wait_quiescent(&self) {
        assert!(
            self.recorder.wait_until(WAIT, |s| s.is_quiescent()),
            "recorder did not settle in idle"
        );
    }

    fn stop_and_collect(&mut self) -> Option<Vec<Arc<Segment>>> {
        self.recorder.stop_recording().unwrap();
        match self.events.blocking_recv() {
            Some(RecorderEvent::RecordingFinished(segments)) => segments,
            None => panic!("event channel closed"),
        }
    }

    fn files_on_disk(&self) -> Vec<PathBuf> {
        files_in(self.dir.path())
    }

    /// No finished event has been emitted so far
    fn assert_no_event(&mut self) {
        assert!(self.events.try_recv().is_err(), "unexpected finished event");
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default()
}

#[test]
fn test_happy_path_yields_one_segment() {
    let mut rig = rig();
    rig.recorder.start_recording().unwrap();
    // Surface becomes ready only after the start command
    rig.show_preview();
    assert!(rig.recorder.wait_for_state(RecordingState::Active, WAIT));

    let segments = rig.stop_and_collect().expect("one segment");
    assert_eq!(segments.len(), 1);
    assert!(segments[0].path.exists());
    assert_eq!(segments[0].rotation, 90);
    assert!(segments[0].path.starts_with(rig.dir.path()));
    rig.wait_quiescent();
    assert!(rig.probe.open_devices().is_empty());
}

#[test]
fn test_rotation_follows_initial_camera() {
    let mut rig = rig_with(RigOptions {
        camera: CameraSelector::Secondary,
        ..RigOptions::default()
    });
    rig.start_active();
    let segments = rig.stop_and_collect().unwrap();
    assert_eq!(segments[0].rotation, 270);
}

#[test]
fn test_cancel_removes_every_file() {
    let mut rig = rig();
    rig.start_active();
    rig.recorder.toggle_camera().unwrap();
    rig.wait_segments(2);
    assert_eq!(rig.files_on_disk().len(), 2);

    rig.recorder.cancel_recording().unwrap();
    rig.wait_quiescent();
    assert!(rig.files_on_disk().is_empty());
    rig.assert_no_event();
}

#[test]
fn test_switching_yields_one_segment_per_episode() {
    const SWITCHES: usize = 3;
    let mut rig = rig();
    rig.start_active();

    for i in 0..SWITCHES {
        rig.recorder.toggle_camera().unwrap();
        rig.wait_segments(i + 2);
    }

    let segments = rig.stop_and_collect().unwrap();
    assert_eq!(segments.len(), SWITCHES + 1);

    let mut paths: Vec<_> = segments.iter().map(|s| s.path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), SWITCHES + 1, "segment files must be distinct");
    assert!(paths.iter().all(|p| p.exists()));

    let rotations: Vec<i32> = segments.iter().map(|s| s.rotation).collect();
    assert_eq!(rotations, vec![90, 270, 90, 270]);

    assert_eq!(rig.probe.max_concurrent_open(), 1);
    assert_eq!(
        rig.probe.open_history(),
        vec![
            CameraSelector::Primary,
            CameraSelector::Secondary,
            CameraSelector::Primary,
            CameraSelector::Secondary,
        ]
    );
}

#[test]
fn test_switching_with_slow_open_never_overlaps() {
    let mut rig = rig_with(RigOptions {
        hardware: VirtualCameraHardware::new().with_open_delay(Duration::from_millis(40)),
        ..RigOptions::default()
    });
    rig.start_active();
    rig.recorder.toggle_camera().unwrap();
    rig.wait_segments(2);
    rig.recorder.toggle_camera().unwrap();
    rig.wait_segments(3);

    assert_eq!(rig.stop_and_collect().unwrap().len(), 3);
    assert_eq!(rig.probe.max_concurrent_open(), 1);
}

#[test]
fn test_double_flash_toggle_restores_torch() {
    let rig = rig();
    rig.start_active();
    let initial = rig.probe.last_request().unwrap();
    assert_eq!(initial.flash_mode, FlashMode::Off);

    rig.recorder.toggle_flash().unwrap();
    assert!(rig.recorder.wait_until(WAIT, |s| s.torch_on));
    assert_eq!(rig.probe.last_request().unwrap().flash_mode, FlashMode::Torch);

    rig.recorder.toggle_flash().unwrap();
    assert!(rig.recorder.wait_until(WAIT, |s| !s.torch_on));

    let last = rig.probe.last_request().unwrap();
    assert_eq!(last.flash_mode, FlashMode::Off);
    assert_eq!(last.targets, initial.targets);
    assert_eq!(rig.probe.live_sessions(), 1);
}

#[test]
fn test_flash_on_camera_without_flash_is_ignored() {
    let rig = rig_with(RigOptions {
        camera: CameraSelector::Secondary,
        ..RigOptions::default()
    });
    rig.start_active();
    let requests = rig.probe.repeating_requests().len();

    rig.recorder.toggle_flash().unwrap();
    let status = rig.recorder.status().unwrap();
    assert!(!status.torch_on);
    assert_eq!(status.state, RecordingState::Active);
    assert_eq!(rig.probe.repeating_requests().len(), requests);
}

#[test]
fn test_held_permit_times_out_other_recorder() {
    let guard = DeviceAcquisitionGuard::shared();
    let first = rig_with(RigOptions {
        guard: Arc::clone(&guard),
        ..RigOptions::default()
    });
    let mut second = rig_with(RigOptions {
        guard: Arc::clone(&guard),
        acquire_timeout: Duration::from_millis(100),
        ..RigOptions::default()
    });

    first.start_active();
    second.show_preview();
    second.recorder.start_recording().unwrap();
    second.wait_quiescent();
    assert!(second.probe.open_history().is_empty());
    second.assert_no_event();

    // The first recorder is untouched and still owns the permit
    let status = first.recorder.status().unwrap();
    assert_eq!(status.state, RecordingState::Active);
    assert!(guard.is_held());

    first.recorder.stop_recording().unwrap();
    first.wait_quiescent();
    assert!(!guard.is_held());

    second.recorder.start_recording().unwrap();
    assert!(second.recorder.wait_for_state(RecordingState::Active, WAIT));
}

#[test]
fn test_idle_commands_change_nothing() {
    let mut rig = rig();
    rig.show_preview();
    let before = rig.recorder.status().unwrap();

    rig.recorder.stop_recording().unwrap();
    rig.recorder.cancel_recording().unwrap();
    rig.recorder.toggle_camera().unwrap();
    rig.recorder.toggle_flash().unwrap();

    let after = rig.recorder.status().unwrap();
    assert_eq!(before, after);
    assert!(after.is_quiescent());
    assert_eq!(after.camera, CameraSelector::Primary);
    assert!(rig.probe.open_history().is_empty());
    rig.assert_no_event();
}

#[test]
fn test_stop_before_surface_reports_nothing() {
    let mut rig = rig();
    rig.recorder.start_recording().unwrap();
    let segments = rig.stop_and_collect();
    assert_eq!(segments, None);

    rig.wait_quiescent();
    assert!(rig.files_on_disk().is_empty());
    assert!(rig.probe.open_devices().is_empty());
}

#[test]
fn test_waits_in_opening_until_surface() {
    let rig = rig();
    rig.recorder.start_recording().unwrap();
    assert!(rig.recorder.wait_until(WAIT, |s| s.device_open));
    let status = rig.recorder.status().unwrap();
    assert_eq!(status.state, RecordingState::Opening);
    assert!(!status.session_live);

    rig.show_preview();
    assert!(rig.recorder.wait_for_state(RecordingState::Active, WAIT));
}

#[test]
fn test_second_start_is_rejected() {
    let mut rig = rig();
    rig.start_active();
    rig.recorder.start_recording().unwrap();

    let status = rig.recorder.status().unwrap();
    assert_eq!(status.state, RecordingState::Active);
    assert_eq!(status.segments, 1);
    assert_eq!(rig.probe.open_history().len(), 1);
    assert_eq!(rig.stop_and_collect().unwrap().len(), 1);
}

#[test]
fn test_open_error_returns_to_idle() {
    let mut rig = rig();
    rig.hardware
        .fail_open(CameraSelector::Primary, ERROR_CAMERA_DEVICE);
    rig.show_preview();
    rig.recorder.start_recording().unwrap();
    rig.wait_quiescent();
    rig.assert_no_event();
    assert!(rig.files_on_disk().is_empty());
}

#[test]
fn test_configure_failure_returns_to_idle() {
    let mut rig = rig();
    rig.hardware.fail_configure(true);
    rig.show_preview();
    rig.recorder.start_recording().unwrap();
    rig.wait_quiescent();
    assert!(rig.files_on_disk().is_empty());
    assert!(rig.probe.open_devices().is_empty());
    rig.assert_no_event();
}

#[test]
fn test_disconnect_while_active_discards_recording() {
    let mut rig = rig();
    rig.start_active();
    assert_eq!(rig.files_on_disk().len(), 1);

    assert!(rig.hardware.disconnect());
    rig.wait_quiescent();
    assert!(rig.files_on_disk().is_empty());
    rig.assert_no_event();

    // Recording works again afterwards
    rig.recorder.start_recording().unwrap();
    assert!(rig.recorder.wait_for_state(RecordingState::Active, WAIT));
}

#[test]
fn test_switch_to_failing_camera_cleans_up() {
    let mut rig = rig();
    rig.start_active();
    rig.hardware
        .fail_open(CameraSelector::Secondary, ERROR_CAMERA_DEVICE);

    rig.recorder.toggle_camera().unwrap();
    rig.wait_quiescent();
    assert!(rig.files_on_disk().is_empty());
    rig.assert_no_event();
}

struct FailingSink {
    path: PathBuf,
}

impl EncoderSink for FailingSink {
    fn prepare(&mut self) -> BackendResult<()> {
        std::fs::write(&self.path, b"header")?;
        Ok(())
    }

    fn target_surface(&self) -> Option<Surface> {
        Some(Surface::encoder(640, 480))
    }

    fn start(&mut self) -> BackendResult<()> {
        Err(BackendError::Encoder("codec unavailable".to_string()))
    }

    fn stop(&mut self) -> BackendResult<()> {
        Err(BackendError::Encoder("not started".to_string()))
    }

    fn release(&mut self) {}

    fn output_path(&self) -> &Path {
        &self.path
    }
}

struct FailingEncoders;

impl EncoderFactory for FailingEncoders {
    fn create(&self, output: &Path, _rotation_hint: i32) -> BackendResult<Box<dyn EncoderSink>> {
        Ok(Box::new(FailingSink {
            path: output.to_path_buf(),
        }))
    }
}

#[test]
fn test_encoder_start_failure_returns_to_idle() {
    let mut rig = rig_with(RigOptions {
        encoders: Arc::new(FailingEncoders),
        ..RigOptions::default()
    });
    rig.show_preview();
    rig.recorder.start_recording().unwrap();
    rig.wait_quiescent();

    assert!(rig.files_on_disk().is_empty());
    assert!(rig.probe.open_devices().is_empty());
    assert_eq!(rig.probe.live_sessions(), 0);
    rig.assert_no_event();
}

#[test]
fn test_dropping_recorder_discards_live_recording() {
    let rig = rig();
    rig.start_active();
    let Rig {
        recorder,
        probe,
        dir,
        ..
    } = rig;
    drop(recorder);

    assert!(files_in(dir.path()).is_empty());
    assert!(probe.open_devices().is_empty());
}

#[test]
fn test_preview_owner_gone_keeps_waiting() {
    let mut rig = rig();
    // The UI drops its slot; the recorder's weak handle now dangles
    rig.preview = Arc::new(PreviewSlot::new());

    rig.recorder.start_recording().unwrap();
    assert!(rig.recorder.wait_until(WAIT, |s| s.device_open));
    assert_eq!(rig.recorder.status().unwrap().state, RecordingState::Opening);
    assert_eq!(rig.stop_and_collect(), None);
}

#[tokio::test]
async fn test_status_from_async_context() {
    let rig = rig();
    let status = rig.recorder.status_async().await.unwrap();
    assert!(status.is_quiescent());
    assert_eq!(status.camera, CameraSelector::Primary);
}
