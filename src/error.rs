use thiserror::Error;

/// Terminal error code reported by the platform when a device open fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    /// The device is no longer available (disconnected or removed)
    Unavailable,
    /// Camera access is disabled by device policy
    DisabledByPolicy,
    /// Another client already holds the device
    InUse,
    /// The platform camera service failed
    ServiceFailure,
    /// The maximum number of open devices has been reached
    TooManyOpenDevices,
    /// Any error code the platform did not further classify
    Unknown,
}

#[derive(Error, Debug)]
pub enum CamflowError {
    #[error("Camera device unavailable")]
    DeviceUnavailable,

    #[error("Camera device disabled by policy")]
    DeviceDisabledByPolicy,

    #[error("Camera device already in use")]
    DeviceInUse,

    #[error("Camera service failure")]
    ServiceFailure,

    #[error("Too many open camera devices")]
    TooManyOpenDevices,

    #[error("Capture session configuration failed for device {device_id}")]
    SessionConfigurationFailed { device_id: String },

    #[error("Coordinator is already initialized")]
    AlreadyInitialized,

    #[error("Worker context '{context}' is closed")]
    ContextClosed { context: &'static str },

    #[error("Initialization did not complete within {timeout_ms}ms")]
    InitializeTimeout { timeout_ms: u64 },

    #[error("Unknown camera error: {message}")]
    Unknown { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
}

impl CamflowError {
    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    pub fn context_closed(context: &'static str) -> Self {
        Self::ContextClosed { context }
    }

    /// Map a platform open-failure code onto the crate taxonomy.
    pub fn from_device_error(code: DeviceErrorCode) -> Self {
        match code {
            DeviceErrorCode::Unavailable => Self::DeviceUnavailable,
            DeviceErrorCode::DisabledByPolicy => Self::DeviceDisabledByPolicy,
            DeviceErrorCode::InUse => Self::DeviceInUse,
            DeviceErrorCode::ServiceFailure => Self::ServiceFailure,
            DeviceErrorCode::TooManyOpenDevices => Self::TooManyOpenDevices,
            DeviceErrorCode::Unknown => Self::unknown("unclassified device error"),
        }
    }
}

pub type Result<T> = std::result::Result<T, CamflowError>;
