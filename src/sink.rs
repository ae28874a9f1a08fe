use crate::error::Result;
use crate::frame::FrameSlot;
use crate::renderer::FrameRenderer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Consumer of completed frames, invoked once per frame on the notification
/// context with the single unreleased slot and the cached sensor
/// orientation. The slot must not be retained past the call; dropping it is
/// the release.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn deliver(&self, slot: FrameSlot, orientation_degrees: u16) -> Result<()>;
}

/// Standard sink: hand the frame's GPU buffer and orientation to the
/// renderer, then let the slot drop release the GPU reference and the pool
/// slot in that order — on the error path too.
pub struct RenderSink {
    renderer: Arc<dyn FrameRenderer>,
}

impl RenderSink {
    pub fn new(renderer: Arc<dyn FrameRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl FrameSink for RenderSink {
    async fn deliver(&self, slot: FrameSlot, orientation_degrees: u16) -> Result<()> {
        let result = self.renderer.render(slot.gpu_buffer(), orientation_degrees);
        if let Err(e) = &result {
            warn!("Renderer rejected frame {}: {}", slot.sequence(), e);
        }
        // slot drops here: GPU buffer first, pool permit second
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CamflowError;
    use crate::frame::{GpuBufferHandle, SensorImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    struct FailingRenderer;

    impl FrameRenderer for FailingRenderer {
        fn surface_available(&self, _size: crate::frame::Size) {}
        fn surface_resized(&self, _size: crate::frame::Size) {}
        fn render(&self, _buffer: &GpuBufferHandle, _orientation: u16) -> Result<()> {
            Err(CamflowError::unknown("render device lost"))
        }
    }

    async fn slot_with_release_counter(
        permits: &Arc<Semaphore>,
        releases: &Arc<AtomicUsize>,
    ) -> FrameSlot {
        let permit = Arc::clone(permits).acquire_owned().await.unwrap();
        let releases = Arc::clone(releases);
        let gpu = GpuBufferHandle::with_release_hook(
            1,
            640,
            480,
            Box::new(move || {
                releases.fetch_add(1, Ordering::SeqCst);
            }),
        );
        FrameSlot::new(SensorImage::new(1, 640, 480, vec![0u8; 16]), gpu, permit)
    }

    #[tokio::test]
    async fn test_deliver_releases_buffer_and_slot() {
        let permits = Arc::new(Semaphore::new(1));
        let releases = Arc::new(AtomicUsize::new(0));
        let slot = slot_with_release_counter(&permits, &releases).await;

        let sink = RenderSink::new(Arc::new(crate::renderer::LogRenderer::new()));
        sink.deliver(slot, 90).await.unwrap();

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_deliver_releases_on_render_failure() {
        let permits = Arc::new(Semaphore::new(1));
        let releases = Arc::new(AtomicUsize::new(0));
        let slot = slot_with_release_counter(&permits, &releases).await;

        let sink = RenderSink::new(Arc::new(FailingRenderer));
        let result = sink.deliver(slot, 90).await;

        assert!(result.is_err());
        // Both releases still happened
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(permits.available_permits(), 1);
    }
}
