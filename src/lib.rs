pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod keyboard;
pub mod liveview;
pub mod sdk;
pub mod session;
pub mod shell;
pub mod tracker;
pub mod values;
pub mod workflow;

pub use config::BoothcamConfig;
pub use coordinator::{Command, Coordinator};
pub use error::{BoothcamError, Result};
pub use events::{event_channels, CallbackPorts, EventChannels};
pub use keyboard::KeyboardInputHandler;
pub use liveview::{fit_rect, map_click, Canvas, DrawRect, LiveViewPipeline, MemoryCanvas, NullCanvas};
pub use sdk::mock::MockSdk;
pub use sdk::{
    CameraSdk, CoordinateSystem, Device, DeviceHandle, FocusStep, Property, SaveDestination,
};
pub use session::{SessionController, SessionState, SettingOption, SettingSelection};
pub use shell::{ConsoleShell, ControlGroup, Feedback, MemoryShell, PresentationShell};
pub use tracker::{ErrorTracker, ReportGuard};
pub use workflow::{date_bucket, CaptureWorkflow, CapturedImage, PendingCapture};
