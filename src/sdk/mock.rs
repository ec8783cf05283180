//! In-memory camera SDK with scriptable devices and callback delivery.
//! Used by the reference binary and by tests that need a camera without
//! hardware attached.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    CameraSdk, CoordinateSystem, Device, DeviceHandle, FocusStep, Property, EXPOSURE_MODE_MANUAL,
};
use crate::error::{BoothcamError, Result};
use crate::events::CallbackPorts;

struct AttachedDevice {
    id: u64,
    description: String,
}

#[derive(Default)]
struct MockState {
    attached: Vec<AttachedDevice>,
    next_id: u64,
    /// Handles issued by the most recent enumeration, mapped to stable
    /// device ids. Cleared on session close.
    listed: HashMap<u64, u64>,
    generation: u64,
    session: Option<u64>,
    options: HashMap<Property, Vec<u32>>,
    current: HashMap<Property, u32>,
    live_view: bool,
    filming: bool,
    filming_path: Option<PathBuf>,
    last_capture: Option<Option<u32>>,
    wb_points: Vec<(u16, u16)>,
    focus_steps: Vec<FocusStep>,
    capacity_armed: bool,
}

pub struct MockSdk {
    state: Mutex<MockState>,
    ports: Mutex<Option<CallbackPorts>>,
}

impl MockSdk {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            ports: Mutex::new(None),
        }
    }

    /// A booth-like camera: one attached device with manual exposure,
    /// five apertures, six shutter speeds (including Bulb), four ISO
    /// speeds and daylight white balance.
    pub fn reference_booth() -> Self {
        let sdk = Self::new();
        sdk.attach_device("Reference Booth Camera");
        {
            let mut state = sdk.state.lock();
            state
                .options
                .insert(Property::Aperture, vec![0x20, 0x28, 0x30, 0x38, 0x40]);
            state
                .options
                .insert(Property::Shutter, vec![0x0C, 0x60, 0x68, 0x70, 0x78, 0x80]);
            state
                .options
                .insert(Property::Iso, vec![0x48, 0x50, 0x58, 0x60]);
            state.current.insert(Property::Aperture, 0x30); // 5.6
            state.current.insert(Property::Shutter, 0x70); // 1/125
            state.current.insert(Property::Iso, 0x50); // 200
            state.current.insert(Property::WhiteBalance, 1); // Daylight
            state
                .current
                .insert(Property::ExposureMode, EXPOSURE_MODE_MANUAL);
        }
        sdk
    }

    /// Attach a device and raise the device-added callback.
    pub fn attach_device(&self, description: &str) -> u64 {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.attached.push(AttachedDevice {
                id,
                description: description.to_string(),
            });
            id
        };
        if let Some(ports) = self.ports.lock().as_ref() {
            ports.device_added();
        }
        id
    }

    /// Detach a device. If it backed the open session, the shutdown
    /// callback fires, as the real SDK does on unplug.
    pub fn detach_device(&self, id: u64) {
        let had_session = {
            let mut state = self.state.lock();
            state.attached.retain(|d| d.id != id);
            if state.session == Some(id) {
                state.session = None;
                state.live_view = false;
                state.filming = false;
                true
            } else {
                false
            }
        };
        if had_session {
            if let Some(ports) = self.ports.lock().as_ref() {
                ports.device_shutdown();
            }
        }
    }

    pub fn set_options(&self, property: Property, codes: Vec<u32>) {
        self.state.lock().options.insert(property, codes);
    }

    pub fn set_current(&self, property: Property, code: u32) {
        self.state.lock().current.insert(property, code);
    }

    pub fn emit_progress(&self, percent: u8) {
        if let Some(ports) = self.ports.lock().as_ref() {
            ports.progress(percent);
        }
    }

    pub fn emit_frame(&self, buffer: Vec<u8>) {
        if let Some(ports) = self.ports.lock().as_ref() {
            ports.frame(buffer);
        }
    }

    pub fn emit_image(&self, buffer: Vec<u8>) {
        if let Some(ports) = self.ports.lock().as_ref() {
            ports.image(buffer);
        }
    }

    /// Arguments of the most recent `take_photo` call.
    pub fn last_capture(&self) -> Option<Option<u32>> {
        self.state.lock().last_capture
    }

    pub fn recorded_wb_points(&self) -> Vec<(u16, u16)> {
        self.state.lock().wb_points.clone()
    }

    pub fn recorded_focus_steps(&self) -> Vec<FocusStep> {
        self.state.lock().focus_steps.clone()
    }

    pub fn filming_path(&self) -> Option<PathBuf> {
        self.state.lock().filming_path.clone()
    }

    pub fn capacity_armed(&self) -> bool {
        self.state.lock().capacity_armed
    }

    fn require_session(state: &MockState, call: &str) -> Result<()> {
        if state.session.is_none() {
            return Err(BoothcamError::sdk_call(call, "no open session"));
        }
        Ok(())
    }
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSdk for MockSdk {
    fn enumerate_devices(&self) -> Result<Vec<Device>> {
        let mut state = self.state.lock();
        state.generation += 1;
        let generation = state.generation;

        let devices: Vec<Device> = state
            .attached
            .iter()
            .enumerate()
            .map(|(index, attached)| Device {
                handle: DeviceHandle((generation << 8) | index as u64),
                description: attached.description.clone(),
            })
            .collect();

        state.listed = state
            .attached
            .iter()
            .enumerate()
            .map(|(index, attached)| ((generation << 8) | index as u64, attached.id))
            .collect();

        debug!("Enumerated {} device(s)", devices.len());
        Ok(devices)
    }

    fn open_session(&self, device: &Device) -> Result<()> {
        let mut state = self.state.lock();
        if state.session.is_some() {
            return Err(BoothcamError::invalid_state(
                "open_session",
                "a session is already open",
            ));
        }
        let id = state
            .listed
            .get(&device.handle.0)
            .copied()
            .ok_or_else(|| BoothcamError::device_unavailable(device.description.clone()))?;
        if !state.attached.iter().any(|d| d.id == id) {
            return Err(BoothcamError::device_unavailable(device.description.clone()));
        }
        state.session = Some(id);
        Ok(())
    }

    fn close_session(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.session = None;
        state.live_view = false;
        state.filming = false;
        // Handles are only good for the listing that produced them.
        state.listed.clear();
        Ok(())
    }

    fn get_setting(&self, property: Property) -> Result<u32> {
        let state = self.state.lock();
        Self::require_session(&state, "get_setting")?;
        state
            .current
            .get(&property)
            .copied()
            .ok_or_else(|| BoothcamError::sdk_call("get_setting", "property not supported"))
    }

    fn set_setting(&self, property: Property, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "set_setting")?;
        state.current.insert(property, value);
        Ok(())
    }

    fn get_setting_options(&self, property: Property) -> Result<Vec<u32>> {
        let state = self.state.lock();
        Self::require_session(&state, "get_setting_options")?;
        state
            .options
            .get(&property)
            .cloned()
            .ok_or_else(|| BoothcamError::sdk_call("get_setting_options", "property not supported"))
    }

    fn set_capacity(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "set_capacity")?;
        state.capacity_armed = true;
        Ok(())
    }

    fn take_photo(&self, bulb_duration_ms: Option<u32>) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "take_photo")?;
        state.last_capture = Some(bulb_duration_ms);
        Ok(())
    }

    fn start_live_view(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "start_live_view")?;
        state.live_view = true;
        Ok(())
    }

    fn stop_live_view(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.live_view = false;
        Ok(())
    }

    fn is_live_view_on(&self) -> bool {
        self.state.lock().live_view
    }

    fn start_filming(&self, host_path: Option<&Path>) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "start_filming")?;
        if state.filming {
            return Err(BoothcamError::invalid_state(
                "start_filming",
                "already recording",
            ));
        }
        state.filming = true;
        state.filming_path = host_path.map(Path::to_path_buf);
        Ok(())
    }

    fn stop_filming(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.filming = false;
        Ok(())
    }

    fn is_filming(&self) -> bool {
        self.state.lock().filming
    }

    fn set_manual_wb_point(&self, x: u16, y: u16) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "set_manual_wb_point")?;
        state.wb_points.push((x, y));
        Ok(())
    }

    fn set_focus_drive(&self, step: FocusStep) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_session(&state, "set_focus_drive")?;
        state.focus_steps.push(step);
        Ok(())
    }

    fn coordinate_system(&self) -> Option<CoordinateSystem> {
        let state = self.state.lock();
        if state.live_view {
            Some(CoordinateSystem {
                width: 1024,
                height: 768,
            })
        } else {
            None
        }
    }

    fn register_callbacks(&self, ports: CallbackPorts) {
        *self.ports.lock() = Some(ports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channels;

    #[test]
    fn test_enumeration_issues_fresh_handles() {
        let sdk = MockSdk::reference_booth();
        let first = sdk.enumerate_devices().unwrap();
        let second = sdk.enumerate_devices().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].handle, second[0].handle);
        assert_eq!(first[0].description, second[0].description);
    }

    #[test]
    fn test_open_with_stale_handle_fails() {
        let sdk = MockSdk::reference_booth();
        let stale = sdk.enumerate_devices().unwrap();
        let _fresh = sdk.enumerate_devices().unwrap();

        // The older listing's handle was superseded.
        let err = sdk.open_session(&stale[0]).unwrap_err();
        assert!(matches!(err, BoothcamError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_open_after_unplug_fails() {
        let sdk = MockSdk::new();
        let id = sdk.attach_device("Booth Cam");
        let devices = sdk.enumerate_devices().unwrap();
        sdk.detach_device(id);

        let err = sdk.open_session(&devices[0]).unwrap_err();
        assert!(matches!(err, BoothcamError::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_single_session_invariant() {
        let sdk = MockSdk::reference_booth();
        let devices = sdk.enumerate_devices().unwrap();
        sdk.open_session(&devices[0]).unwrap();

        let err = sdk.open_session(&devices[0]).unwrap_err();
        assert!(matches!(err, BoothcamError::InvalidState { .. }));

        sdk.close_session().unwrap();
        // Close invalidates the old listing, a fresh one is required.
        let err = sdk.open_session(&devices[0]).unwrap_err();
        assert!(matches!(err, BoothcamError::DeviceUnavailable { .. }));
        let devices = sdk.enumerate_devices().unwrap();
        sdk.open_session(&devices[0]).unwrap();
    }

    #[test]
    fn test_settings_require_session() {
        let sdk = MockSdk::reference_booth();
        assert!(sdk.get_setting(Property::Aperture).is_err());

        let devices = sdk.enumerate_devices().unwrap();
        sdk.open_session(&devices[0]).unwrap();
        assert_eq!(sdk.get_setting(Property::Aperture).unwrap(), 0x30);
        sdk.set_setting(Property::Aperture, 0x28).unwrap();
        assert_eq!(sdk.get_setting(Property::Aperture).unwrap(), 0x28);
    }

    #[test]
    fn test_filming_state_guard() {
        let sdk = MockSdk::reference_booth();
        let devices = sdk.enumerate_devices().unwrap();
        sdk.open_session(&devices[0]).unwrap();

        sdk.start_filming(None).unwrap();
        assert!(sdk.is_filming());
        let err = sdk.start_filming(None).unwrap_err();
        assert!(matches!(err, BoothcamError::InvalidState { .. }));
        sdk.stop_filming().unwrap();
        assert!(!sdk.is_filming());
    }

    #[tokio::test]
    async fn test_detach_of_session_device_raises_shutdown() {
        let sdk = MockSdk::new();
        let id = sdk.attach_device("Booth Cam");
        let (ports, mut channels) = event_channels(8);
        sdk.register_callbacks(ports);

        let devices = sdk.enumerate_devices().unwrap();
        sdk.open_session(&devices[0]).unwrap();
        sdk.detach_device(id);

        assert_eq!(channels.device_shutdown.recv().await, Some(()));
    }

    #[tokio::test]
    async fn test_attach_raises_device_added() {
        let sdk = MockSdk::new();
        let (ports, mut channels) = event_channels(8);
        sdk.register_callbacks(ports);

        sdk.attach_device("Second Cam");
        assert_eq!(channels.device_added.recv().await, Some(()));
    }

    #[test]
    fn test_coordinate_system_known_only_during_live_view() {
        let sdk = MockSdk::reference_booth();
        let devices = sdk.enumerate_devices().unwrap();
        sdk.open_session(&devices[0]).unwrap();

        assert!(sdk.coordinate_system().is_none());
        sdk.start_live_view().unwrap();
        assert!(sdk.coordinate_system().is_some());
        sdk.stop_live_view().unwrap();
        assert!(sdk.coordinate_system().is_none());
    }
}
