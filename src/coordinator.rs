//! The single coordinating context. All session, workflow and
//! UI-adjacent state is owned here and mutated only on this task; SDK
//! callback threads reach it exclusively through the marshaling
//! channels. Every marshaled handler body runs inside a failure boundary
//! that routes errors to the tracker instead of letting them cross back
//! toward the SDK.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::BoothcamConfig;
use crate::error::{BoothcamError, Result};
use crate::events::{event_channels, EventChannels};
use crate::liveview::{map_click, Canvas, LiveViewPipeline};
use crate::sdk::{CameraSdk, FocusStep, SaveDestination};
use crate::session::SessionController;
use crate::shell::PresentationShell;
use crate::tracker::ErrorTracker;
use crate::workflow::CaptureWorkflow;

const DUPLICATE_WARNING_TITLE: &str = "Duplicate Serial Number";
const DUPLICATE_WARNING: &str = "This serial number has already been used on this date. \
Please select another card with a unique serial number.";

/// Operator-level commands fed into the coordinating loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RefreshDevices,
    OpenSession { index: usize },
    CloseSession,
    ToggleLiveView,
    TakePhoto,
    /// Scanner-key semantics: capture when idle, accept when a decision
    /// is pending.
    PrimaryAction,
    ToggleRecording,
    SetSerial(String),
    AppendSerial(char),
    Backspace,
    Accept,
    Reject,
    SelectAperture(String),
    SelectShutter(String),
    SelectIso(String),
    SelectWhiteBalance(usize),
    SetSaveDestination(SaveDestination),
    SetBulbDuration(u32),
    ViewportClick { x: u32, y: u32 },
    FocusDrive(FocusStep),
    ReEnableUi,
    Shutdown,
}

pub(crate) struct CoordinatorCore {
    pub(crate) session: SessionController,
    pub(crate) workflow: CaptureWorkflow,
    pub(crate) pipeline: LiveViewPipeline,
    pub(crate) tracker: ErrorTracker,
    shell: Arc<dyn PresentationShell>,
    sdk: Arc<dyn CameraSdk>,
    /// Operator live-view intent; frames arriving while this is off are
    /// no-ops.
    pub(crate) live_view: bool,
    bulb_duration_ms: u32,
    feedback_millis: u64,
}

pub struct Coordinator {
    core: CoordinatorCore,
    channels: EventChannels,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        shell: Arc<dyn PresentationShell>,
        canvas: Arc<dyn Canvas>,
        config: &BoothcamConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Sender<Command>) {
        let capacity = config.system.event_channel_capacity;
        let (ports, channels) = event_channels(capacity);
        sdk.register_callbacks(ports);

        let (command_tx, command_rx) = mpsc::channel(capacity);
        let save_root = PathBuf::from(&config.storage.save_root);

        let core = CoordinatorCore {
            session: SessionController::new(
                Arc::clone(&sdk),
                Arc::clone(&shell),
                save_root.clone(),
            ),
            workflow: CaptureWorkflow::new(
                Arc::clone(&sdk),
                Arc::clone(&shell),
                save_root,
                config.storage.accept_subdir.clone(),
                config.workflow.serial_length,
                config.workflow.jpeg_quality,
                config.workflow.rollover_hour,
            ),
            pipeline: LiveViewPipeline::new(canvas, config.viewport.width, config.viewport.height),
            tracker: ErrorTracker::new(Arc::clone(&shell)),
            shell,
            sdk,
            live_view: false,
            bulb_duration_ms: config.workflow.bulb_duration_ms,
            feedback_millis: config.workflow.feedback_millis,
        };

        (
            Self {
                core,
                channels,
                commands: command_rx,
                cancel,
            },
            command_tx,
        )
    }

    /// Run until cancellation or a shutdown command. Event handling is
    /// FIFO within each callback kind; fairness across kinds is up to
    /// the select.
    pub async fn run(self) -> Result<()> {
        let Coordinator {
            mut core,
            mut channels,
            mut commands,
            cancel,
        } = self;

        let initial = core.session.refresh_devices();
        core.report_result(initial);
        info!("Coordinator running");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Coordinator cancelled");
                    break;
                }
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        info!("Coordinator shutting down");
                        break;
                    }
                    Some(command) => {
                        let result = core.handle_command(command);
                        core.report_result(result);
                    }
                },
                Some(percent) = channels.progress.recv() => {
                    core.handle_progress(percent);
                }
                Some(buffer) = channels.frame.recv() => {
                    let result = core.handle_frame(buffer);
                    core.report_result(result);
                }
                Some(buffer) = channels.image.recv() => {
                    let result = core.handle_image(buffer);
                    core.report_result(result);
                }
                Some(()) = channels.device_added.recv() => {
                    let result = core.handle_device_added();
                    core.report_result(result);
                }
                Some(()) = channels.device_shutdown.recv() => {
                    let result = core.handle_device_shutdown();
                    core.report_result(result);
                }
            }
        }

        if core.session.is_open() {
            let result = core.close_session();
            core.report_result(result);
        }
        Ok(())
    }
}

impl CoordinatorCore {
    pub(crate) fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::RefreshDevices => self.session.refresh_devices(),
            Command::OpenSession { index } => self.session.open(index),
            Command::CloseSession => self.close_session(),
            Command::ToggleLiveView => self.toggle_live_view(),
            Command::TakePhoto => self.take_photo(),
            Command::PrimaryAction => {
                if self.workflow.is_pending() && self.workflow.serial_valid() {
                    self.accept()
                } else {
                    self.take_photo()
                }
            }
            Command::ToggleRecording => {
                self.require_session("record")?;
                self.workflow
                    .toggle_recording(self.session.save_destination())
                    .map(|_| ())
            }
            Command::SetSerial(serial) => {
                self.workflow.set_serial(serial);
                Ok(())
            }
            Command::AppendSerial(c) => {
                // A new scan starting while a decision is pending accepts
                // the pending capture first.
                if self.workflow.is_pending() && self.workflow.serial_valid() {
                    let result = self.accept();
                    self.report_result(result);
                }
                self.workflow.append_serial(c);
                Ok(())
            }
            Command::Backspace => {
                if self.workflow.is_pending() && self.workflow.serial_valid() {
                    self.reject()
                } else {
                    self.workflow.backspace_serial();
                    Ok(())
                }
            }
            Command::Accept => self.accept(),
            Command::Reject => self.reject(),
            Command::SelectAperture(label) => self.session.select_aperture(&label),
            Command::SelectShutter(label) => self.session.select_shutter(&label),
            Command::SelectIso(label) => self.session.select_iso(&label),
            Command::SelectWhiteBalance(index) => self.session.select_white_balance(index),
            Command::SetSaveDestination(destination) => {
                self.session.set_save_destination(destination)
            }
            Command::SetBulbDuration(ms) => {
                self.bulb_duration_ms = ms;
                Ok(())
            }
            Command::ViewportClick { x, y } => self.viewport_click(x, y),
            Command::FocusDrive(step) => self.session.focus_drive(step),
            Command::ReEnableUi => {
                self.tracker.re_enable();
                Ok(())
            }
            Command::Shutdown => Ok(()),
        }
    }

    pub(crate) fn handle_progress(&self, percent: u8) {
        self.shell.set_progress(percent);
    }

    /// A live-view frame arrived. Once live view is off or the session
    /// closed, in-flight frames become no-ops.
    pub(crate) fn handle_frame(&mut self, buffer: Vec<u8>) -> Result<()> {
        if !self.live_view || !self.session.is_open() {
            return Ok(());
        }
        self.pipeline.render_frame(buffer)
    }

    pub(crate) fn handle_image(&mut self, buffer: Vec<u8>) -> Result<()> {
        let entered = self.workflow.on_image_ready(buffer, self.live_view)?;
        if entered {
            if let Some(image) = self.workflow.pending_image() {
                self.pipeline.show_still(image);
            }
        }
        Ok(())
    }

    pub(crate) fn handle_device_added(&mut self) -> Result<()> {
        debug!("Device added, re-enumerating");
        self.session.refresh_devices()
    }

    /// An asynchronous device shutdown takes the identical close path an
    /// operator close does.
    pub(crate) fn handle_device_shutdown(&mut self) -> Result<()> {
        info!("Device shutdown event");
        self.close_session()
    }

    pub(crate) fn close_session(&mut self) -> Result<()> {
        let result = self.session.close();
        self.live_view = false;
        self.pipeline.clear();
        result
    }

    fn toggle_live_view(&mut self) -> Result<()> {
        self.require_session("live_view")?;
        if self.live_view {
            self.sdk.stop_live_view()?;
            self.live_view = false;
            self.pipeline.clear();
        } else {
            self.sdk.start_live_view()?;
            self.live_view = true;
        }
        Ok(())
    }

    fn take_photo(&self) -> Result<()> {
        self.require_session("take_photo")?;
        let bulb = if self.session.bulb_selected() {
            Some(self.bulb_duration_ms)
        } else {
            None
        };
        self.workflow.take_photo(bulb)
    }

    fn accept(&mut self) -> Result<()> {
        self.workflow.accept()?;
        self.spawn_feedback_revert();
        Ok(())
    }

    fn reject(&mut self) -> Result<()> {
        self.workflow.reject()?;
        self.spawn_feedback_revert();
        Ok(())
    }

    fn viewport_click(&self, x: u32, y: u32) -> Result<()> {
        if !self.live_view {
            return Ok(());
        }
        let Some(coord) = self.sdk.coordinate_system() else {
            return Ok(());
        };
        let (view_width, view_height) = self.pipeline.viewport();
        let (device_x, device_y) = map_click(x, y, view_width, view_height, &coord);
        self.sdk.set_manual_wb_point(device_x, device_y)
    }

    /// One-shot, auto-disarming revert of the accept/reject flash.
    fn spawn_feedback_revert(&self) {
        let shell = Arc::clone(&self.shell);
        let millis = self.feedback_millis;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            shell.clear_feedback();
        });
    }

    fn require_session(&self, action: &str) -> Result<()> {
        if !self.session.is_open() {
            return Err(BoothcamError::invalid_state(action, "no open session"));
        }
        Ok(())
    }

    /// The failure boundary for marshaled handlers and commands: the
    /// duplicate-serial rejection gets its specific warning; everything
    /// else goes through the tracker's escalation policy.
    pub(crate) fn report_result(&self, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_duplicate_serial() => {
                self.shell
                    .show_warning(DUPLICATE_WARNING_TITLE, DUPLICATE_WARNING);
            }
            Err(e) => {
                drop(self.tracker.report(&e.to_string(), false));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveview::{DrawRect, MemoryCanvas};
    use crate::sdk::mock::MockSdk;
    use crate::shell::{ControlGroup, MemoryShell};
    use image::codecs::jpeg::JpegEncoder;

    const SERIAL: &str = "ABCDEF123456";

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([64, 64, 64]),
        ));
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, 85);
        encoder.encode_image(&img).unwrap();
        buf
    }

    struct Fixture {
        sdk: Arc<MockSdk>,
        shell: Arc<MemoryShell>,
        canvas: Arc<MemoryCanvas>,
        coordinator: Coordinator,
        commands: mpsc::Sender<Command>,
        cancel: CancellationToken,
        _dir: tempfile::TempDir,
        save_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let sdk = Arc::new(MockSdk::reference_booth());
        let shell = Arc::new(MemoryShell::new());
        let canvas = Arc::new(MemoryCanvas::new());
        let dir = tempfile::tempdir().unwrap();
        let save_root = dir.path().join("photos");

        let mut config = BoothcamConfig::default();
        config.storage.save_root = save_root.to_string_lossy().to_string();

        let cancel = CancellationToken::new();
        let (coordinator, commands) = Coordinator::new(
            sdk.clone() as Arc<dyn CameraSdk>,
            shell.clone() as Arc<dyn PresentationShell>,
            canvas.clone() as Arc<dyn Canvas>,
            &config,
            cancel.clone(),
        );

        Fixture {
            sdk,
            shell,
            canvas,
            coordinator,
            commands,
            cancel,
            _dir: dir,
            save_root,
        }
    }

    fn open_session(core: &mut CoordinatorCore) {
        core.handle_command(Command::RefreshDevices).unwrap();
        core.handle_command(Command::OpenSession { index: 0 }).unwrap();
    }

    #[tokio::test]
    async fn test_open_session_and_live_view_frame() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;

        open_session(core);
        assert_eq!(core.session.aperture.options.len(), 5);
        assert_eq!(core.session.shutter.options.len(), 6);
        assert_eq!(core.session.iso.options.len(), 4);
        assert_eq!(core.session.aperture.selected_label(), Some("5.6"));
        assert_eq!(core.session.shutter.selected_label(), Some("1/125"));
        assert_eq!(core.session.iso.selected_label(), Some("200"));

        core.handle_command(Command::ToggleLiveView).unwrap();
        assert!(f.sdk.is_live_view_on());

        core.handle_frame(jpeg_bytes(1920, 1080)).unwrap();
        let draws = f.canvas.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(
            draws[0].2,
            DrawRect { x: 0, y: 0, width: 640, height: 360 }
        );
    }

    #[tokio::test]
    async fn test_frames_are_noops_without_live_view() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        core.handle_frame(jpeg_bytes(1920, 1080)).unwrap();
        assert!(f.canvas.draws().is_empty());

        // A garbage buffer is also a no-op while live view is off.
        core.handle_frame(vec![1, 2, 3]).unwrap();
    }

    #[tokio::test]
    async fn test_accept_then_duplicate_warning() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        core.handle_command(Command::SetSerial(SERIAL.to_string()))
            .unwrap();
        core.handle_image(jpeg_bytes(80, 60)).unwrap();
        assert!(core.workflow.is_pending());

        core.handle_command(Command::Accept).unwrap();
        let saved: Vec<_> = walk_jpegs(&f.save_root);
        assert_eq!(saved.len(), 1);
        assert!(saved[0].ends_with(&format!("{}.jpg", SERIAL)));

        // Second accept of the same serial on the same shooting day.
        core.handle_command(Command::SetSerial(SERIAL.to_string()))
            .unwrap();
        core.handle_image(jpeg_bytes(80, 60)).unwrap();
        let result = core.handle_command(Command::Accept);
        core.report_result(result);

        assert_eq!(walk_jpegs(&f.save_root).len(), 1);
        let state = f.shell.state();
        assert_eq!(state.warnings.len(), 1);
        assert_eq!(state.warnings[0].0, DUPLICATE_WARNING_TITLE);
        // The duplicate never feeds the escalation counter.
        assert!(state.errors.is_empty());
    }

    fn walk_jpegs(root: &PathBuf) -> Vec<String> {
        let mut found = Vec::new();
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    found.extend(walk_jpegs(&path));
                } else if path.extension().map(|e| e == "jpg").unwrap_or(false) {
                    found.push(path.to_string_lossy().to_string());
                }
            }
        }
        found
    }

    #[tokio::test]
    async fn test_capture_still_interrupts_live_view_and_resumes() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        core.handle_command(Command::ToggleLiveView).unwrap();
        core.handle_command(Command::SetSerial(SERIAL.to_string()))
            .unwrap();
        core.handle_image(jpeg_bytes(80, 60)).unwrap();

        // The still was drawn and the device stream stopped.
        assert!(!f.sdk.is_live_view_on());
        assert_eq!(f.canvas.draws().len(), 1);

        core.handle_command(Command::Reject).unwrap();
        assert!(f.sdk.is_live_view_on());
    }

    #[tokio::test]
    async fn test_primary_action_captures_then_accepts() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        core.handle_command(Command::SetSerial(SERIAL.to_string()))
            .unwrap();
        core.handle_command(Command::PrimaryAction).unwrap();
        assert_eq!(f.sdk.last_capture(), Some(None));

        core.handle_image(jpeg_bytes(80, 60)).unwrap();
        core.handle_command(Command::SetSerial(SERIAL.to_string()))
            .unwrap();
        core.handle_command(Command::PrimaryAction).unwrap();
        assert!(!core.workflow.is_pending());
        assert_eq!(walk_jpegs(&f.save_root).len(), 1);
    }

    #[tokio::test]
    async fn test_bulb_mode_passes_duration() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        core.handle_command(Command::SelectShutter("Bulb".to_string()))
            .unwrap();
        core.handle_command(Command::SetBulbDuration(25_000)).unwrap();
        core.handle_command(Command::SetSerial(SERIAL.to_string()))
            .unwrap();
        core.handle_command(Command::TakePhoto).unwrap();

        assert_eq!(f.sdk.last_capture(), Some(Some(25_000)));
    }

    #[tokio::test]
    async fn test_viewport_click_maps_into_device_space() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        // Out of live view: a no-op.
        core.handle_command(Command::ViewportClick { x: 320, y: 240 })
            .unwrap();
        assert!(f.sdk.recorded_wb_points().is_empty());

        core.handle_command(Command::ToggleLiveView).unwrap();
        core.handle_command(Command::ViewportClick { x: 320, y: 240 })
            .unwrap();
        // 640x480 viewport onto the 1024x768 preview space.
        assert_eq!(f.sdk.recorded_wb_points(), vec![(512, 384)]);
    }

    #[tokio::test]
    async fn test_focus_drive_forwards_steps() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;

        // Out of session: rejected by state guard.
        let result = core.handle_command(Command::FocusDrive(FocusStep::Near1));
        assert!(result.is_err());

        open_session(core);
        core.handle_command(Command::FocusDrive(FocusStep::Near1))
            .unwrap();
        core.handle_command(Command::FocusDrive(FocusStep::Far3))
            .unwrap();
        assert_eq!(
            f.sdk.recorded_focus_steps(),
            vec![FocusStep::Near1, FocusStep::Far3]
        );
    }

    #[tokio::test]
    async fn test_save_destination_routes_to_recording() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);

        core.handle_command(Command::SetSaveDestination(SaveDestination::Camera))
            .unwrap();
        core.handle_command(Command::ToggleRecording).unwrap();
        // Camera-only destination: no host path handed to the SDK.
        assert_eq!(f.sdk.filming_path(), None);
        core.handle_command(Command::ToggleRecording).unwrap();

        core.handle_command(Command::SetSaveDestination(SaveDestination::Both))
            .unwrap();
        core.handle_command(Command::ToggleRecording).unwrap();
        assert_eq!(f.sdk.filming_path(), Some(f.save_root.clone()));
    }

    #[tokio::test]
    async fn test_device_shutdown_forces_close() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);
        core.handle_command(Command::ToggleLiveView).unwrap();

        core.handle_device_shutdown().unwrap();
        assert!(!core.session.is_open());
        assert!(!core.live_view);
        assert!(!f.shell.is_enabled(ControlGroup::Settings));
        // The device list was re-enumerated on the close path.
        assert_eq!(core.session.devices().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_route_to_tracker() {
        let mut f = fixture();
        let core = &mut f.coordinator.core;
        open_session(core);
        core.handle_command(Command::ToggleLiveView).unwrap();

        // Garbage frame while live view is on: decode fails, reported.
        let result = core.handle_frame(vec![0xBA, 0xD0]);
        core.report_result(result);
        assert_eq!(f.shell.state().errors.len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_processes_and_shuts_down() {
        let f = fixture();
        let sdk = f.sdk.clone();
        let shell = f.shell.clone();

        let handle = tokio::spawn(f.coordinator.run());

        f.commands
            .send(Command::OpenSession { index: 0 })
            .await
            .unwrap();
        sdk.emit_progress(40);

        // Let the loop drain before asking it to stop.
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.commands.send(Command::Shutdown).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("coordinator did not stop")
            .unwrap()
            .unwrap();

        assert_eq!(shell.state().progress, 40);
        // Shutdown closed the session behind the operator.
        assert!(!sdk.is_live_view_on());
        assert_eq!(shell.state().session_text, "No open session");
    }

    #[tokio::test]
    async fn test_cancellation_token_stops_loop() {
        let f = fixture();
        let handle = tokio::spawn(f.coordinator.run());

        f.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("coordinator did not stop")
            .unwrap()
            .unwrap();
    }
}
