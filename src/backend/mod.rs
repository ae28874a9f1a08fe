use crate::error::{DeviceErrorCode, Result};
use crate::frame::{DeviceCharacteristics, Size};
use crate::pool::FramePool;
use std::sync::Arc;

pub mod mock;

pub use mock::{MockBackend, MockBackendConfig, MockMetrics};

/// Opaque handle to a UI-owned live-preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub u64);

/// One output destination for captured frames. The set is fixed for the
/// life of a session.
#[derive(Clone)]
pub enum CaptureTarget {
    /// The frame pool's backing surface (GPU-sampled-image consumption)
    Pool(Arc<FramePool>),
    /// An optional live-preview surface supplied by the UI collaborator
    Preview(SurfaceHandle),
}

impl std::fmt::Debug for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureTarget::Pool(pool) => write!(f, "Pool({} slots)", pool.capacity()),
            CaptureTarget::Preview(handle) => write!(f, "Preview({:?})", handle),
        }
    }
}

/// Signal that the platform rejected the submitted session configuration.
/// The device itself remains valid and closable.
#[derive(Debug, Clone, Copy)]
pub struct ConfigureFailed;

/// Completion callback for an asynchronous device-open request. Invoked on
/// an arbitrary platform thread.
pub type OpenCallback =
    Box<dyn FnOnce(std::result::Result<Box<dyn CameraDevice>, DeviceErrorCode>) + Send>;

/// Completion callback for an asynchronous session-configuration request.
/// Invoked on an arbitrary platform thread.
pub type ConfigureCallback =
    Box<dyn FnOnce(std::result::Result<Box<dyn CaptureSession>, ConfigureFailed>) + Send>;

/// Entry point into the platform camera subsystem.
pub trait CameraBackend: Send + Sync + 'static {
    /// Issue an asynchronous open request for a device id.
    fn open_device(&self, device_id: &str, on_result: OpenCallback);

    /// Read-only characteristics snapshot for a device id.
    fn characteristics(&self, device_id: &str) -> Result<DeviceCharacteristics>;

    /// Output sizes the device supports for its capture surfaces.
    fn supported_sizes(&self, device_id: &str) -> Vec<Size>;
}

/// An opened camera device, exclusively owned by the coordinator.
pub trait CameraDevice: Send + Sync {
    fn id(&self) -> &str;

    /// Submit the fixed capture-target set for session negotiation.
    fn configure_session(&self, targets: Vec<CaptureTarget>, on_result: ConfigureCallback);

    /// Close the device. Returns without awaiting platform completion and
    /// must be idempotent; any in-flight session becomes terminal.
    fn close(&self);
}

/// A negotiated capture pipeline bound to a device and its target set.
pub trait CaptureSession: Send + Sync {
    /// Submit one standing request that produces frames continuously into
    /// the full target set until the device is closed.
    fn set_repeating(&self) -> Result<()>;
}
