//! Device session lifecycle: enumeration, the single open session, the
//! settings-population sequence on open, and the idempotent close path.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BoothcamError, Result};
use crate::sdk::{CameraSdk, Device, FocusStep, Property, SaveDestination, EXPOSURE_MODE_MANUAL};
use crate::shell::{ControlGroup, PresentationShell};
use crate::values;

const NO_SESSION_TEXT: &str = "No open session";
const MANUAL_MODE_WARNING: &str = "Camera is not in manual mode. Some features might not work!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Listed,
    SessionOpen { device: Device },
}

/// One settings control: translated options and the selected index, if
/// the device's current value matched a known label.
#[derive(Debug, Clone, Default)]
pub struct SettingSelection {
    pub options: Vec<SettingOption>,
    pub selected: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingOption {
    pub label: &'static str,
    pub code: u32,
}

impl SettingSelection {
    pub fn selected_label(&self) -> Option<&'static str> {
        self.selected
            .and_then(|index| self.options.get(index))
            .map(|option| option.label)
    }
}

pub struct SessionController {
    sdk: Arc<dyn CameraSdk>,
    shell: Arc<dyn PresentationShell>,
    save_root: PathBuf,
    state: SessionState,
    devices: Vec<Device>,
    pub aperture: SettingSelection,
    pub shutter: SettingSelection,
    pub iso: SettingSelection,
    /// Selection index into the fixed white-balance table.
    pub white_balance: Option<usize>,
    save_destination: SaveDestination,
}

impl SessionController {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        shell: Arc<dyn PresentationShell>,
        save_root: PathBuf,
    ) -> Self {
        Self {
            sdk,
            shell,
            save_root,
            state: SessionState::Disconnected,
            devices: Vec::new(),
            aperture: SettingSelection::default(),
            shutter: SettingSelection::default(),
            iso: SettingSelection::default(),
            white_balance: None,
            save_destination: SaveDestination::Host,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::SessionOpen { .. })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn save_destination(&self) -> SaveDestination {
        self.save_destination
    }

    /// Re-enumerate devices. An open session is left alone unless its
    /// device disappeared, which is treated as a device shutdown.
    pub fn refresh_devices(&mut self) -> Result<()> {
        self.devices = self.sdk.enumerate_devices()?;
        debug!("Listed {} device(s)", self.devices.len());

        match &self.state {
            SessionState::SessionOpen { device } => {
                let still_attached = self
                    .devices
                    .iter()
                    .any(|d| d.description == device.description);
                if !still_attached {
                    warn!(
                        "Session device '{}' disappeared during refresh",
                        device.description
                    );
                    self.close()?;
                }
            }
            SessionState::Disconnected | SessionState::Listed => {
                self.state = SessionState::Listed;
            }
        }
        Ok(())
    }

    /// Open a session on the listed device at `index` and run the
    /// settings-population sequence. Dependent surfaces are enabled only
    /// once the whole sequence succeeded.
    pub fn open(&mut self, index: usize) -> Result<()> {
        if self.is_open() {
            return Err(BoothcamError::invalid_state(
                "open_session",
                "a session is already open",
            ));
        }
        let device = self.devices.get(index).cloned().ok_or_else(|| {
            BoothcamError::invalid_state("open_session", "no device at the selected index")
        })?;

        self.sdk.open_session(&device)?;
        info!("Session opened on '{}'", device.description);
        self.shell.set_session_text(&device.description);
        self.state = SessionState::SessionOpen { device };

        if self.sdk.get_setting(Property::ExposureMode)? != EXPOSURE_MODE_MANUAL {
            self.shell.show_message(MANUAL_MODE_WARNING);
        }

        self.aperture = self.load_selection(Property::Aperture, values::aperture_label)?;
        self.shutter = self.load_selection(Property::Shutter, values::shutter_label)?;
        self.iso = self.load_selection(Property::Iso, values::iso_label)?;
        self.white_balance =
            values::white_balance_index(self.sdk.get_setting(Property::WhiteBalance)?);

        self.shell.set_enabled(ControlGroup::Settings, true);
        self.shell.set_enabled(ControlGroup::LiveViewPanel, true);
        self.shell.set_enabled(ControlGroup::LiveViewToggle, true);
        self.shell.set_enabled(ControlGroup::Record, true);
        self.shell
            .set_enabled(ControlGroup::BulbDuration, self.bulb_selected());

        self.set_save_destination(SaveDestination::Host)?;
        Ok(())
    }

    /// Close the session. Safe to call in any state and after an
    /// unexpected device shutdown; always clears the settings lists,
    /// disables dependent surfaces and forces re-enumeration, because
    /// closing invalidates every listed handle.
    pub fn close(&mut self) -> Result<()> {
        let close_result = if self.is_open() {
            self.sdk.close_session()
        } else {
            Ok(())
        };
        if close_result.is_ok() && self.is_open() {
            info!("Session closed");
        }

        self.state = SessionState::Disconnected;
        self.aperture = SettingSelection::default();
        self.shutter = SettingSelection::default();
        self.iso = SettingSelection::default();
        self.white_balance = None;

        self.shell.set_enabled(ControlGroup::Settings, false);
        self.shell.set_enabled(ControlGroup::LiveViewPanel, false);
        self.shell.set_enabled(ControlGroup::LiveViewToggle, false);
        self.shell.set_enabled(ControlGroup::Record, false);
        self.shell.set_enabled(ControlGroup::BulbDuration, false);
        self.shell.set_session_text(NO_SESSION_TEXT);

        self.refresh_devices()?;
        close_result
    }

    fn load_selection(
        &self,
        property: Property,
        label_of: fn(u32) -> Option<&'static str>,
    ) -> Result<SettingSelection> {
        let codes = self.sdk.get_setting_options(property)?;
        let options: Vec<SettingOption> = codes
            .iter()
            .filter_map(|&code| label_of(code).map(|label| SettingOption { label, code }))
            .collect();

        let current = self.sdk.get_setting(property)?;
        // Exact-match lookup against the translated label. No match
        // leaves the control unselected.
        let selected = label_of(current)
            .and_then(|label| options.iter().position(|option| option.label == label));

        Ok(SettingSelection { options, selected })
    }

    pub fn select_aperture(&mut self, label: &str) -> Result<()> {
        self.require_open("select_aperture")?;
        if let Some(position) = self
            .aperture
            .options
            .iter()
            .position(|option| option.label == label)
        {
            self.sdk
                .set_setting(Property::Aperture, self.aperture.options[position].code)?;
            self.aperture.selected = Some(position);
        }
        Ok(())
    }

    pub fn select_shutter(&mut self, label: &str) -> Result<()> {
        self.require_open("select_shutter")?;
        if let Some(position) = self
            .shutter
            .options
            .iter()
            .position(|option| option.label == label)
        {
            self.sdk
                .set_setting(Property::Shutter, self.shutter.options[position].code)?;
            self.shutter.selected = Some(position);
            self.shell
                .set_enabled(ControlGroup::BulbDuration, label == values::BULB_LABEL);
        }
        Ok(())
    }

    pub fn select_iso(&mut self, label: &str) -> Result<()> {
        self.require_open("select_iso")?;
        if let Some(position) = self
            .iso
            .options
            .iter()
            .position(|option| option.label == label)
        {
            self.sdk
                .set_setting(Property::Iso, self.iso.options[position].code)?;
            self.iso.selected = Some(position);
        }
        Ok(())
    }

    pub fn select_white_balance(&mut self, index: usize) -> Result<()> {
        self.require_open("select_white_balance")?;
        if let Some(code) = values::white_balance_code(index) {
            self.sdk.set_setting(Property::WhiteBalance, code)?;
            self.white_balance = Some(index);
        }
        Ok(())
    }

    /// Whether the selected shutter mode is the Bulb mode that takes an
    /// explicit exposure duration.
    pub fn bulb_selected(&self) -> bool {
        self.shutter.selected_label() == Some(values::BULB_LABEL)
    }

    pub fn set_save_destination(&mut self, destination: SaveDestination) -> Result<()> {
        self.require_open("set_save_destination")?;
        self.sdk
            .set_setting(Property::SaveTo, destination.code())?;
        if destination.includes_host() {
            // Host-bound captures need the free-space accounting re-armed
            // or the device stops handing images over.
            self.sdk.set_capacity()?;
            std::fs::create_dir_all(&self.save_root)?;
        }
        self.save_destination = destination;
        Ok(())
    }

    pub fn focus_drive(&self, step: FocusStep) -> Result<()> {
        self.require_open("focus_drive")?;
        self.sdk.set_focus_drive(step)
    }

    fn require_open(&self, action: &str) -> Result<()> {
        if !self.is_open() {
            return Err(BoothcamError::invalid_state(action, "no open session"));
        }
        Ok(())
    }
}
