//! The vendor camera SDK surface, abstracted behind a trait.
//!
//! Everything the rest of the system knows about the camera goes through
//! [`CameraSdk`]: enumeration, session lifecycle, the opaque settings API,
//! capture, live view and recording. Callbacks are delivered through
//! [`CallbackPorts`] registered once at startup; the SDK may invoke them
//! from any thread it owns.

pub mod mock;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::events::CallbackPorts;

/// Opaque device handle. Only valid for the listing that produced it;
/// closing a session invalidates all outstanding handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// An enumerated camera device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub handle: DeviceHandle,
    pub description: String,
}

/// The live-view preview coordinate space, used to map viewport clicks
/// onto device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateSystem {
    pub width: u32,
    pub height: u32,
}

/// Device properties addressed through the opaque settings API. The
/// values exchanged for each property are uninterpreted device codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Aperture,
    Shutter,
    Iso,
    WhiteBalance,
    ExposureMode,
    SaveTo,
}

/// Device code reported for a fully manual exposure mode.
pub const EXPOSURE_MODE_MANUAL: u32 = 3;

/// Where captures and recordings are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDestination {
    Camera,
    Host,
    Both,
}

impl SaveDestination {
    pub fn code(&self) -> u32 {
        match self {
            SaveDestination::Camera => 1,
            SaveDestination::Host => 2,
            SaveDestination::Both => 3,
        }
    }

    pub fn includes_host(&self) -> bool {
        matches!(self, SaveDestination::Host | SaveDestination::Both)
    }
}

/// Focus drive steps, near and far in three magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusStep {
    Near3,
    Near2,
    Near1,
    Far1,
    Far2,
    Far3,
}

pub trait CameraSdk: Send + Sync {
    /// List currently attached devices. Handles from any earlier listing
    /// become invalid.
    fn enumerate_devices(&self) -> Result<Vec<Device>>;

    /// Open an exclusive control session on a listed device. Fails with
    /// `DeviceUnavailable` if the device vanished since the listing.
    fn open_session(&self, device: &Device) -> Result<()>;

    /// Close the open session, if any. Idempotent.
    fn close_session(&self) -> Result<()>;

    fn get_setting(&self, property: Property) -> Result<u32>;
    fn set_setting(&self, property: Property, value: u32) -> Result<()>;
    fn get_setting_options(&self, property: Property) -> Result<Vec<u32>>;

    /// Re-arm the device's free-space accounting. Required after
    /// switching the save destination to the host so the device keeps
    /// handing captures over.
    fn set_capacity(&self) -> Result<()>;

    /// Trigger a still capture. `bulb_duration_ms` is passed through when
    /// the Bulb shutter mode is selected.
    fn take_photo(&self, bulb_duration_ms: Option<u32>) -> Result<()>;

    fn start_live_view(&self) -> Result<()>;
    fn stop_live_view(&self) -> Result<()>;
    fn is_live_view_on(&self) -> bool;

    /// Start video recording. `host_path` is the host-side destination
    /// when the save destination includes the host.
    fn start_filming(&self, host_path: Option<&Path>) -> Result<()>;
    fn stop_filming(&self) -> Result<()>;
    fn is_filming(&self) -> bool;

    fn set_manual_wb_point(&self, x: u16, y: u16) -> Result<()>;
    fn set_focus_drive(&self, step: FocusStep) -> Result<()>;

    /// The preview coordinate space, known only while live view runs.
    fn coordinate_system(&self) -> Option<CoordinateSystem>;

    /// Register the callback ports the SDK will raise events on.
    fn register_callbacks(&self, ports: CallbackPorts);
}

/// Construct the SDK binding for this build. This tree carries the
/// in-memory reference implementation; a vendor binding implements the
/// same trait and slots in here. Failure is fatal to the caller.
pub fn connect() -> Result<Arc<dyn CameraSdk>> {
    Ok(Arc::new(mock::MockSdk::reference_booth()))
}
