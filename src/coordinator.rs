use crate::backend::{CameraBackend, CameraDevice, CaptureSession, CaptureTarget, SurfaceHandle};
use crate::config::CamflowConfig;
use crate::error::{CamflowError, Result};
use crate::frame::{
    select_preview_size, DeviceCharacteristics, PreviewGeometry, Size,
};
use crate::lifecycle::{LifecycleGate, Phase};
use crate::pool::{FramePool, PoolStatsSnapshot};
use crate::sink::FrameSink;
use crate::worker::WorkerContext;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Owns the open-device → configure-session → start-repeating-capture
/// protocol and the resources it produces.
///
/// One `initialize` per coordinator instance, then `close` (idempotent) and
/// `shutdown`. Both worker contexts start with the coordinator, before any
/// device operation, and every device/session state mutation happens on the
/// control context so all transitions share one total order.
pub struct CameraCoordinator {
    backend: Arc<dyn CameraBackend>,
    config: CamflowConfig,
    control: Arc<WorkerContext>,
    notifications: Arc<WorkerContext>,
    gate: Arc<LifecycleGate>,
    inner: Arc<Mutex<CoordinatorInner>>,
}

#[derive(Default)]
struct CoordinatorInner {
    device: Option<Box<dyn CameraDevice>>,
    session: Option<Box<dyn CaptureSession>>,
    characteristics: Option<DeviceCharacteristics>,
    pool: Option<Arc<FramePool>>,
}

impl CameraCoordinator {
    /// Create the coordinator and start its worker contexts.
    pub fn new(backend: Arc<dyn CameraBackend>, config: CamflowConfig) -> Self {
        Self {
            backend,
            config,
            control: Arc::new(WorkerContext::start("camera-control")),
            notifications: Arc::new(WorkerContext::start("frame-notify")),
            gate: Arc::new(LifecycleGate::new()),
            inner: Arc::new(Mutex::new(CoordinatorInner::default())),
        }
    }

    pub fn phase(&self) -> Phase {
        self.gate.phase()
    }

    /// Characteristics snapshot taken at open time, if initialized.
    pub fn characteristics(&self) -> Option<DeviceCharacteristics> {
        self.inner.lock().characteristics
    }

    /// Cached sensor orientation in degrees, if initialized.
    pub fn orientation(&self) -> Option<u16> {
        self.characteristics().map(|c| c.sensor_orientation)
    }

    pub fn pool_stats(&self) -> Option<PoolStatsSnapshot> {
        self.inner.lock().pool.as_ref().map(|pool| pool.stats())
    }

    /// Submit arbitrary work to the frame-notification context.
    pub fn run_on_notifications<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.notifications.submit(task)
    }

    /// Open the device, negotiate the capture session, and start repeating
    /// capture. Suspends the caller cooperatively until the protocol
    /// resolves; at most one call per coordinator.
    ///
    /// `on_preview_ready` fires with the negotiated geometry before session
    /// configuration. Every completed frame reaches `sink` exactly once on
    /// the notification context.
    pub async fn initialize<F>(
        &self,
        display_hint: Size,
        on_preview_ready: F,
        sink: Arc<dyn FrameSink>,
        preview_surface: Option<SurfaceHandle>,
    ) -> Result<()>
    where
        F: FnOnce(PreviewGeometry) + Send + 'static,
    {
        self.gate.begin_initialize()?;
        info!(
            "Initializing camera device {} (display hint {})",
            self.config.camera.device_id, display_hint
        );

        let protocol = self.run_protocol(display_hint, on_preview_ready, sink, preview_surface);
        let result = match self.config.runtime.initialize_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), protocol).await {
                    Ok(result) => result,
                    Err(_) => Err(CamflowError::InitializeTimeout { timeout_ms }),
                }
            }
            None => protocol.await,
        };

        if let Err(e) = &result {
            self.gate.fail();
            error!("Camera initialization failed: {}", e);
        }
        result
    }

    async fn run_protocol<F>(
        &self,
        display_hint: Size,
        on_preview_ready: F,
        sink: Arc<dyn FrameSink>,
        preview_surface: Option<SurfaceHandle>,
    ) -> Result<()>
    where
        F: FnOnce(PreviewGeometry) + Send + 'static,
    {
        let device_id = self.config.camera.device_id.clone();

        // Opening: issue the open request from the control context. The
        // completion arrives on a platform thread and resumes us through the
        // oneshot.
        let (open_tx, open_rx) = oneshot::channel();
        {
            let backend = Arc::clone(&self.backend);
            let id = device_id.clone();
            self.control
                .run(move || {
                    backend.open_device(
                        &id,
                        Box::new(move |result| {
                            if let Err(Ok(device)) = open_tx.send(result) {
                                // Nobody is awaiting anymore (timeout or
                                // teardown); the device must not leak open.
                                device.close();
                            }
                        }),
                    );
                })
                .await?;
        }

        let device = match open_rx.await {
            Ok(Ok(device)) => device,
            Ok(Err(code)) => {
                // Failure while Opening leaves nothing to release
                return Err(CamflowError::from_device_error(code));
            }
            Err(_) => return Err(CamflowError::unknown("open completion dropped")),
        };
        info!("Camera device {} opened", device_id);

        // Open: re-enter the control context to adopt the device and take
        // the one read-only characteristics snapshot.
        let (characteristics, supported) = {
            let backend = Arc::clone(&self.backend);
            let gate = Arc::clone(&self.gate);
            let inner = Arc::clone(&self.inner);
            let id = device_id.clone();
            self.control
                .run(move || -> Result<(DeviceCharacteristics, Vec<Size>)> {
                    if gate.is_closed() {
                        device.close();
                        return Err(CamflowError::unknown(
                            "coordinator closed during initialization",
                        ));
                    }
                    gate.advance(Phase::Open);
                    let characteristics = backend.characteristics(&id)?;
                    let supported = backend.supported_sizes(&id);
                    inner.lock().device = Some(device);
                    Ok((characteristics, supported))
                })
                .await??
        };

        let preview = select_preview_size(display_hint, &supported).ok_or_else(|| {
            CamflowError::unknown(format!("device {} reports no supported sizes", device_id))
        })?;
        let geometry = PreviewGeometry::from(preview);
        info!(
            "Negotiated preview size {} for display hint {} (sensor orientation {}°)",
            preview, display_hint, characteristics.sensor_orientation
        );
        self.inner.lock().characteristics = Some(characteristics);
        on_preview_ready(geometry);

        // Configuring: submit the fixed capture-target set.
        let pool = Arc::new(FramePool::new(self.config.camera.pool_capacity, geometry));
        self.install_delivery(&pool, sink, characteristics.sensor_orientation);

        let mut targets = vec![CaptureTarget::Pool(Arc::clone(&pool))];
        if let Some(surface) = preview_surface {
            targets.push(CaptureTarget::Preview(surface));
        }

        let (configure_tx, configure_rx) = oneshot::channel();
        {
            let gate = Arc::clone(&self.gate);
            let inner = Arc::clone(&self.inner);
            self.control
                .run(move || -> Result<()> {
                    if gate.is_closed() {
                        return Err(CamflowError::unknown(
                            "coordinator closed during initialization",
                        ));
                    }
                    gate.advance(Phase::Configuring);
                    let mut guard = inner.lock();
                    guard.pool = Some(pool);
                    let device = guard
                        .device
                        .as_ref()
                        .ok_or_else(|| CamflowError::unknown("device missing while configuring"))?;
                    device.configure_session(
                        targets,
                        Box::new(move |result| {
                            let _ = configure_tx.send(result);
                        }),
                    );
                    Ok(())
                })
                .await??;
        }

        let session = match configure_rx.await {
            Ok(Ok(session)) => session,
            Ok(Err(_)) => {
                // The device handle itself is still valid and closable
                return Err(CamflowError::SessionConfigurationFailed { device_id });
            }
            Err(_) => return Err(CamflowError::unknown("configure completion dropped")),
        };
        debug!("Capture session configured for device {}", device_id);

        // Active: start the standing repeating request over the target set.
        {
            let gate = Arc::clone(&self.gate);
            let inner = Arc::clone(&self.inner);
            self.control
                .run(move || -> Result<()> {
                    if gate.is_closed() {
                        return Err(CamflowError::unknown(
                            "coordinator closed during initialization",
                        ));
                    }
                    session.set_repeating()?;
                    inner.lock().session = Some(session);
                    gate.advance(Phase::Active);
                    Ok(())
                })
                .await??;
        }

        info!("Camera session active on device {}", device_id);
        Ok(())
    }

    /// Route produced frames onto the notification context, discarding any
    /// frame that surfaces after close without touching the device.
    fn install_delivery(
        &self,
        pool: &Arc<FramePool>,
        sink: Arc<dyn FrameSink>,
        orientation_degrees: u16,
    ) {
        let notifications = Arc::clone(&self.notifications);
        let gate = Arc::clone(&self.gate);

        pool.set_listener(Arc::new(move |slot| {
            if gate.is_closed() {
                trace!("Discarding frame {} delivered after close", slot.sequence());
                return;
            }
            let sink = Arc::clone(&sink);
            let gate = Arc::clone(&gate);
            let submitted = notifications.submit(async move {
                if gate.is_closed() {
                    trace!("Discarding frame {} delivered after close", slot.sequence());
                    return;
                }
                if let Err(e) = sink.deliver(slot, orientation_degrees).await {
                    warn!("Frame delivery failed: {}", e);
                }
            });
            if submitted.is_err() {
                trace!("Notification context closed; frame released undelivered");
            }
        }));
    }

    /// Close the device handle synchronously on the caller's thread.
    ///
    /// Idempotent; does not await platform completion. Any in-flight session
    /// becomes terminal and later completion callbacks or frame deliveries
    /// are ignored.
    pub fn close(&self) {
        let Some(previous) = self.gate.close_once() else {
            debug!("Coordinator already closed");
            return;
        };

        let (device, session, pool) = {
            let mut inner = self.inner.lock();
            (inner.device.take(), inner.session.take(), inner.pool.take())
        };

        if let Some(pool) = pool {
            pool.clear_listener();
        }
        drop(session);

        match device {
            Some(device) => {
                device.close();
                info!("Camera device closed (was {:?})", previous);
            }
            None => debug!("Close with no open device (was {:?})", previous),
        }
    }

    /// Full teardown: close the device, then drain and stop both worker
    /// contexts. The contexts are only quiesced once the device is closed so
    /// no drained frame callback can reference a torn-down device.
    pub async fn shutdown(&self) {
        self.close();
        self.control.close().await;
        self.notifications.close().await;
        info!("Coordinator shut down");
    }
}
