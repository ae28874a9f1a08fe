pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod pool;
pub mod renderer;
pub mod sink;
pub mod worker;

pub use backend::{
    CameraBackend, CameraDevice, CaptureSession, CaptureTarget, ConfigureFailed, MockBackend,
    MockBackendConfig, MockMetrics, SurfaceHandle,
};
pub use config::CamflowConfig;
pub use coordinator::CameraCoordinator;
pub use error::{CamflowError, DeviceErrorCode, Result};
pub use frame::{
    select_preview_size, DeviceCharacteristics, FrameSlot, GpuBufferHandle, PreviewGeometry,
    SensorImage, Size,
};
pub use lifecycle::{LifecycleGate, Phase};
pub use pool::{FramePool, FrameAvailableListener, PoolStatsSnapshot};
pub use renderer::{FrameRenderer, LogRenderer};
pub use sink::{FrameSink, RenderSink};
pub use worker::WorkerContext;
