use crate::error::Result;
use crate::frame::{GpuBufferHandle, Size};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// External GPU rendering collaborator.
///
/// Receives one GPU-importable buffer plus the sensor orientation per frame,
/// and window-surface events from the UI shell. It takes no part in session
/// negotiation and returns nothing the coordinator consumes beyond a
/// per-frame error.
pub trait FrameRenderer: Send + Sync {
    /// A platform window surface became available for output.
    fn surface_available(&self, size: Size);

    /// The output surface changed dimensions.
    fn surface_resized(&self, size: Size);

    /// Render one frame from the given GPU buffer.
    fn render(&self, buffer: &GpuBufferHandle, orientation_degrees: u16) -> Result<()>;
}

/// Renderer that only logs, used by the demo binary and tests.
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames_rendered: AtomicU64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

impl FrameRenderer for LogRenderer {
    fn surface_available(&self, size: Size) {
        info!("Render surface available: {}", size);
    }

    fn surface_resized(&self, size: Size) {
        info!("Render surface resized: {}", size);
    }

    fn render(&self, buffer: &GpuBufferHandle, orientation_degrees: u16) -> Result<()> {
        let count = self.frames_rendered.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Rendered GPU buffer {} ({}x{}, orientation {}°, frame #{})",
            buffer.id(),
            buffer.width(),
            buffer.height(),
            orientation_degrees,
            count
        );
        Ok(())
    }
}
