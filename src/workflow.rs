//! The operator capture workflow: take photo, record video, and the
//! accept/reject decision for each captured still, keyed on a scanned
//! serial number with per-shooting-day duplicate detection.

use chrono::{Local, NaiveDateTime, NaiveTime};
use image::codecs::jpeg::JpegEncoder;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BoothcamError, Result};
use crate::sdk::{CameraSdk, SaveDestination};
use crate::shell::{ControlGroup, Feedback, PresentationShell};

/// A captured still awaiting the operator's decision.
pub struct CapturedImage {
    pub id: Uuid,
    pub image: image::DynamicImage,
}

/// Workflow position between capture and decision.
pub enum PendingCapture {
    Idle,
    AwaitingDecision {
        image: CapturedImage,
        live_view_was_active: bool,
    },
}

/// The shooting-day bucket for a timestamp. The day rolls over at
/// `rollover_hour` local time, not midnight: captures before that hour
/// belong to the previous calendar day. This is the studio's convention.
pub fn date_bucket(timestamp: NaiveDateTime, rollover_hour: u32) -> String {
    let rollover = NaiveTime::from_hms_opt(rollover_hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let date = if timestamp.time() < rollover {
        timestamp.date() - chrono::Duration::days(1)
    } else {
        timestamp.date()
    };
    date.format("%m_%d_%Y").to_string()
}

pub struct CaptureWorkflow {
    sdk: Arc<dyn CameraSdk>,
    shell: Arc<dyn PresentationShell>,
    save_root: PathBuf,
    accept_subdir: String,
    serial_length: usize,
    jpeg_quality: u8,
    rollover_hour: u32,
    serial: String,
    pending: PendingCapture,
}

impl CaptureWorkflow {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        shell: Arc<dyn PresentationShell>,
        save_root: PathBuf,
        accept_subdir: String,
        serial_length: usize,
        jpeg_quality: u8,
        rollover_hour: u32,
    ) -> Self {
        Self {
            sdk,
            shell,
            save_root,
            accept_subdir,
            serial_length,
            jpeg_quality,
            rollover_hour,
            serial: String::new(),
            pending: PendingCapture::Idle,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn serial_valid(&self) -> bool {
        self.serial.chars().count() == self.serial_length
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.pending, PendingCapture::AwaitingDecision { .. })
    }

    pub fn pending_image(&self) -> Option<&image::DynamicImage> {
        match &self.pending {
            PendingCapture::AwaitingDecision { image, .. } => Some(&image.image),
            PendingCapture::Idle => None,
        }
    }

    /// Replace the serial number and apply the enablement gating: only a
    /// full-length serial allows capture, and an edited serial revokes
    /// accept/reject until the next image arrives.
    pub fn set_serial(&mut self, serial: String) {
        self.serial = serial;
        if self.serial_valid() {
            self.shell.set_enabled(ControlGroup::TakePhoto, true);
        } else {
            self.shell.set_enabled(ControlGroup::TakePhoto, false);
            self.shell.set_enabled(ControlGroup::Accept, false);
            self.shell.set_enabled(ControlGroup::Reject, false);
        }
    }

    pub fn append_serial(&mut self, c: char) {
        let mut serial = self.serial.clone();
        serial.push(c);
        self.set_serial(serial);
    }

    pub fn backspace_serial(&mut self) {
        let mut serial = self.serial.clone();
        serial.pop();
        self.set_serial(serial);
    }

    /// Trigger a still capture. `bulb_duration_ms` is supplied when the
    /// Bulb shutter mode is selected.
    pub fn take_photo(&self, bulb_duration_ms: Option<u32>) -> Result<()> {
        if !self.serial_valid() {
            return Err(BoothcamError::invalid_state(
                "take_photo",
                "serial number incomplete",
            ));
        }
        self.sdk.take_photo(bulb_duration_ms)
    }

    /// Start recording. Refused while already recording; when the save
    /// destination includes the host, the target directory is created
    /// first (idempotently).
    pub fn start_recording(&self, destination: SaveDestination) -> Result<()> {
        if self.sdk.is_filming() {
            return Err(BoothcamError::invalid_state(
                "start_recording",
                "already recording",
            ));
        }
        if destination.includes_host() {
            std::fs::create_dir_all(&self.save_root)?;
            self.sdk.start_filming(Some(&self.save_root))?;
        } else {
            self.sdk.start_filming(None)?;
        }
        info!("Recording started");
        Ok(())
    }

    pub fn stop_recording(&self) -> Result<()> {
        self.sdk.stop_filming()?;
        info!("Recording stopped");
        Ok(())
    }

    /// Record-button semantics: start when idle, stop when recording.
    pub fn toggle_recording(&self, destination: SaveDestination) -> Result<bool> {
        if self.sdk.is_filming() {
            self.stop_recording()?;
            Ok(false)
        } else {
            self.start_recording(destination)?;
            Ok(true)
        }
    }

    /// A captured still arrived. Ignored without a full-length serial.
    /// Otherwise live view is stopped and the workflow enters the
    /// pending-decision state; returns whether that transition happened.
    pub fn on_image_ready(&mut self, buffer: Vec<u8>, live_view_intent: bool) -> Result<bool> {
        if !self.serial_valid() {
            debug!("Captured image ignored, serial number incomplete");
            return Ok(false);
        }

        let decoded = image::load_from_memory(&buffer)
            .map_err(|e| BoothcamError::sdk_call("image_transfer", e.to_string()))?;
        drop(buffer);

        if self.sdk.is_live_view_on() {
            self.sdk.stop_live_view()?;
        }

        let captured = CapturedImage {
            id: Uuid::new_v4(),
            image: decoded,
        };
        info!(
            "Capture {} awaiting decision for serial {}",
            captured.id, self.serial
        );

        self.shell.set_enabled(ControlGroup::LiveViewToggle, false);
        self.shell.set_enabled(ControlGroup::TakePhoto, false);
        self.shell.set_enabled(ControlGroup::Accept, true);
        self.shell.set_enabled(ControlGroup::Reject, true);

        self.pending = PendingCapture::AwaitingDecision {
            image: captured,
            live_view_was_active: live_view_intent,
        };
        Ok(true)
    }

    /// Accept the pending capture: persist it as a JPEG under the
    /// shooting-day bucket unless the serial was already used that day.
    /// The workflow resets either way; only the file write is skipped on
    /// a duplicate.
    pub fn accept(&mut self) -> Result<PathBuf> {
        let (image, live_view_was_active) =
            match std::mem::replace(&mut self.pending, PendingCapture::Idle) {
                PendingCapture::AwaitingDecision {
                    image,
                    live_view_was_active,
                } => (image, live_view_was_active),
                PendingCapture::Idle => {
                    return Err(BoothcamError::invalid_state(
                        "accept",
                        "no pending capture",
                    ));
                }
            };

        let bucket = date_bucket(Local::now().naive_local(), self.rollover_hour);
        let dir = self.save_root.join(&bucket).join(&self.accept_subdir);
        let filename = format!("{}.jpg", self.serial);
        let serial = self.serial.clone();

        let duplicate = if dir.exists() {
            dir.join(&filename).exists()
        } else {
            std::fs::create_dir_all(&dir)?;
            false
        };

        if duplicate {
            warn!("Serial {} already saved in bucket {}", serial, bucket);
            self.finish_decision(live_view_was_active);
            return Err(BoothcamError::duplicate_serial(serial));
        }

        let path = dir.join(&filename);
        self.write_jpeg(&image.image, &path)?;
        info!("Capture {} saved to {}", image.id, path.display());

        self.shell.flash_feedback(Feedback::Accepted);
        self.finish_decision(live_view_was_active);
        Ok(path)
    }

    /// Discard the pending capture without writing anything.
    pub fn reject(&mut self) -> Result<()> {
        let live_view_was_active =
            match std::mem::replace(&mut self.pending, PendingCapture::Idle) {
                PendingCapture::AwaitingDecision {
                    live_view_was_active,
                    ..
                } => live_view_was_active,
                PendingCapture::Idle => {
                    return Err(BoothcamError::invalid_state(
                        "reject",
                        "no pending capture",
                    ));
                }
            };

        info!("Capture rejected");
        self.shell.flash_feedback(Feedback::Rejected);
        self.finish_decision(live_view_was_active);
        Ok(())
    }

    fn write_jpeg(&self, image: &image::DynamicImage, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| BoothcamError::encode_or_write(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        encoder
            .encode_image(image)
            .map_err(|e| BoothcamError::encode_or_write(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| BoothcamError::encode_or_write(e.to_string()))?;
        Ok(())
    }

    /// Common reset after a decision: the pending image is gone, the
    /// serial field is cleared, capture is re-gated, and live view
    /// resumes if the operator had it running before the capture.
    fn finish_decision(&mut self, live_view_was_active: bool) {
        self.serial.clear();
        self.shell.clear_serial();
        self.shell.set_enabled(ControlGroup::TakePhoto, false);
        self.shell.set_enabled(ControlGroup::Accept, false);
        self.shell.set_enabled(ControlGroup::Reject, false);
        self.shell.set_enabled(ControlGroup::LiveViewToggle, true);

        if live_view_was_active {
            if let Err(e) = self.sdk.start_live_view() {
                warn!("Could not resume live view: {}", e);
            }
        }
    }
}
