use super::{
    CameraBackend, CameraDevice, CaptureSession, CaptureTarget, ConfigureCallback, ConfigureFailed,
    OpenCallback,
};
use crate::error::{CamflowError, DeviceErrorCode, Result};
use crate::frame::{DeviceCharacteristics, GpuBufferHandle, SensorImage, Size};
use crate::pool::FramePool;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Simulated camera backend for tests and hardware-free runs.
///
/// Delivers open/configure completions from spawned tasks the way the real
/// platform delivers callbacks from its thread pool, and produces frames at
/// a fixed interval while a repeating request is set. Production suspends on
/// its own when the frame pool is exhausted.
pub struct MockBackend {
    config: MockBackendConfig,
    metrics: Arc<MockMetrics>,
}

#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    pub characteristics: DeviceCharacteristics,
    pub supported_sizes: Vec<Size>,
    /// Fail the open request with this code instead of producing a device
    pub fail_open: Option<DeviceErrorCode>,
    /// Reject session configuration after a successful open
    pub fail_configure: bool,
    /// Latency before a platform completion callback fires
    pub callback_delay: Duration,
    /// Interval between produced frames while capture is repeating
    pub frame_interval: Duration,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            characteristics: DeviceCharacteristics {
                sensor_orientation: 90,
                exposure_time_range: (100_000, 100_000_000),
                sensitivity_range: (100, 3200),
            },
            supported_sizes: vec![
                Size::new(1920, 1080),
                Size::new(1280, 960),
                Size::new(640, 480),
            ],
            fail_open: None,
            fail_configure: false,
            callback_delay: Duration::from_millis(1),
            frame_interval: Duration::from_millis(5),
        }
    }
}

/// Observable side effects of the simulated platform, for assertions.
#[derive(Debug, Default)]
pub struct MockMetrics {
    pub devices_opened: AtomicUsize,
    pub devices_closed: AtomicUsize,
    pub sessions_configured: AtomicUsize,
    pub frames_produced: AtomicU64,
    pub gpu_buffers_released: AtomicU64,
}

impl MockBackend {
    pub fn new(config: MockBackendConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MockMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<MockMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl CameraBackend for MockBackend {
    fn open_device(&self, device_id: &str, on_result: OpenCallback) {
        let device_id = device_id.to_string();
        let config = self.config.clone();
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            sleep(config.callback_delay).await;

            if let Some(code) = config.fail_open {
                warn!("Mock open of device {} failing with {:?}", device_id, code);
                on_result(Err(code));
                return;
            }

            metrics.devices_opened.fetch_add(1, Ordering::SeqCst);
            debug!("Mock device {} opened", device_id);
            on_result(Ok(Box::new(MockDevice {
                shared: Arc::new(MockDeviceShared {
                    device_id,
                    config,
                    metrics,
                    cancel: CancellationToken::new(),
                    closed: AtomicBool::new(false),
                }),
            })));
        });
    }

    fn characteristics(&self, device_id: &str) -> Result<DeviceCharacteristics> {
        if device_id.is_empty() {
            return Err(CamflowError::DeviceUnavailable);
        }
        Ok(self.config.characteristics)
    }

    fn supported_sizes(&self, _device_id: &str) -> Vec<Size> {
        self.config.supported_sizes.clone()
    }
}

struct MockDeviceShared {
    device_id: String,
    config: MockBackendConfig,
    metrics: Arc<MockMetrics>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

struct MockDevice {
    shared: Arc<MockDeviceShared>,
}

impl CameraDevice for MockDevice {
    fn id(&self) -> &str {
        &self.shared.device_id
    }

    fn configure_session(&self, targets: Vec<CaptureTarget>, on_result: ConfigureCallback) {
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            sleep(shared.config.callback_delay).await;

            if shared.closed.load(Ordering::SeqCst) {
                debug!(
                    "Mock device {} closed before configuration completed",
                    shared.device_id
                );
                on_result(Err(ConfigureFailed));
                return;
            }

            if shared.config.fail_configure {
                warn!(
                    "Mock session configuration failing for device {}",
                    shared.device_id
                );
                on_result(Err(ConfigureFailed));
                return;
            }

            shared.metrics.sessions_configured.fetch_add(1, Ordering::SeqCst);
            debug!("Mock session configured for device {}", shared.device_id);
            on_result(Ok(Box::new(MockSession { shared, targets })));
        });
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            debug!("Mock device {} already closed", self.shared.device_id);
            return;
        }
        self.shared.cancel.cancel();
        self.shared.metrics.devices_closed.fetch_add(1, Ordering::SeqCst);
        info!("Mock device {} closed", self.shared.device_id);
    }
}

struct MockSession {
    shared: Arc<MockDeviceShared>,
    targets: Vec<CaptureTarget>,
}

impl CaptureSession for MockSession {
    fn set_repeating(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(CamflowError::DeviceUnavailable);
        }

        let pool = self
            .targets
            .iter()
            .find_map(|target| match target {
                CaptureTarget::Pool(pool) => Some(Arc::clone(pool)),
                CaptureTarget::Preview(_) => None,
            })
            .ok_or_else(|| CamflowError::unknown("repeating request has no pool target"))?;

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let geometry = pool.geometry();
            let mut sequence: u64 = 0;

            info!(
                "Mock repeating capture started for device {} at {}x{}",
                shared.device_id, geometry.width, geometry.height
            );

            loop {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = sleep(shared.config.frame_interval) => {}
                }

                let image = SensorImage::new(
                    sequence,
                    geometry.width,
                    geometry.height,
                    vec![(sequence % 256) as u8; 32],
                );

                let metrics = Arc::clone(&shared.metrics);
                let gpu = GpuBufferHandle::with_release_hook(
                    sequence,
                    geometry.width,
                    geometry.height,
                    Box::new(move || {
                        metrics.gpu_buffers_released.fetch_add(1, Ordering::SeqCst);
                    }),
                );

                // Suspends when all pool slots are in flight, like the
                // platform pipeline stalling on an exhausted image reader
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    result = pool.produce(image, gpu) => {
                        if result.is_err() {
                            break;
                        }
                    }
                }

                shared.metrics.frames_produced.fetch_add(1, Ordering::SeqCst);
                trace!("Mock frame {} produced", sequence);
                sequence += 1;
            }

            info!(
                "Mock repeating capture stopped for device {}",
                shared.device_id
            );
        });

        Ok(())
    }
}
