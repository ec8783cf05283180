use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoothcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device unavailable: {description}")]
    DeviceUnavailable { description: String },

    #[error("SDK call '{call}' failed: {details}")]
    SdkCallFailure { call: String, details: String },

    #[error("Serial number {serial} has already been used on this date")]
    DuplicateSerial { serial: String },

    #[error("Failed to encode or write image: {details}")]
    EncodeOrWriteFailure { details: String },

    #[error("Invalid state for {action}: {details}")]
    InvalidState { action: String, details: String },
}

impl BoothcamError {
    pub fn device_unavailable<S: Into<String>>(description: S) -> Self {
        Self::DeviceUnavailable {
            description: description.into(),
        }
    }

    pub fn sdk_call<C: Into<String>, D: Into<String>>(call: C, details: D) -> Self {
        Self::SdkCallFailure {
            call: call.into(),
            details: details.into(),
        }
    }

    pub fn duplicate_serial<S: Into<String>>(serial: S) -> Self {
        Self::DuplicateSerial {
            serial: serial.into(),
        }
    }

    pub fn encode_or_write<S: Into<String>>(details: S) -> Self {
        Self::EncodeOrWriteFailure {
            details: details.into(),
        }
    }

    pub fn invalid_state<S: Into<String>>(action: S, details: S) -> Self {
        Self::InvalidState {
            action: action.into(),
            details: details.into(),
        }
    }

    /// Whether this error is the duplicate-serial rejection, which gets its
    /// own specific warning and never participates in error escalation.
    pub fn is_duplicate_serial(&self) -> bool {
        matches!(self, Self::DuplicateSerial { .. })
    }
}

pub type Result<T> = std::result::Result<T, BoothcamError>;
