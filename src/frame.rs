use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{trace, warn};

/// Output dimensions, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Negotiated preview output size, computed once at session setup and
/// immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewGeometry {
    pub width: u32,
    pub height: u32,
}

impl From<Size> for PreviewGeometry {
    fn from(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

/// Read-only device snapshot taken at open time and cached for the life of
/// the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCharacteristics {
    /// Sensor orientation in degrees, one of {0, 90, 180, 270}
    pub sensor_orientation: u16,
    /// Exposure time range in nanoseconds (min, max), inclusive
    pub exposure_time_range: (i64, i64),
    /// Sensitivity (ISO) range (min, max), inclusive
    pub sensitivity_range: (u32, u32),
}

impl DeviceCharacteristics {
    pub fn is_valid(&self) -> bool {
        matches!(self.sensor_orientation, 0 | 90 | 180 | 270)
            && self.exposure_time_range.0 > 0
            && self.exposure_time_range.0 <= self.exposure_time_range.1
            && self.sensitivity_range.0 > 0
            && self.sensitivity_range.0 <= self.sensitivity_range.1
    }
}

/// One captured sensor image. Data is shared so producers can hand the
/// bytes off without copying.
#[derive(Debug, Clone)]
pub struct SensorImage {
    /// Monotonic capture sequence number
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
}

impl SensorImage {
    pub fn new(sequence: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            width,
            height,
            data: Arc::new(data),
        }
    }
}

/// GPU-importable buffer reference backing one frame slot.
///
/// The underlying platform buffer is released exactly once, when the handle
/// is dropped. An optional release hook lets the owning backend observe the
/// release (the mock backend counts these in tests).
pub struct GpuBufferHandle {
    id: u64,
    width: u32,
    height: u32,
    release_hook: Option<Box<dyn FnOnce() + Send>>,
}

impl GpuBufferHandle {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            release_hook: None,
        }
    }

    pub fn with_release_hook(
        id: u64,
        width: u32,
        height: u32,
        hook: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            id,
            width,
            height,
            release_hook: Some(hook),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for GpuBufferHandle {
    fn drop(&mut self) {
        if let Some(hook) = self.release_hook.take() {
            hook();
        }
        trace!("Released GPU buffer {}", self.id);
    }
}

impl std::fmt::Debug for GpuBufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBufferHandle")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// One in-flight frame: sensor image, its GPU buffer, and the pool permit
/// that marks the slot as occupied.
///
/// Field order is load-bearing: on drop the GPU buffer reference is released
/// before the pool permit, so the slot only becomes reusable after the
/// platform buffer is back. Dropping the slot is the release path on both
/// success and error.
#[derive(Debug)]
pub struct FrameSlot {
    pub image: SensorImage,
    gpu: GpuBufferHandle,
    _permit: OwnedSemaphorePermit,
}

impl FrameSlot {
    pub fn new(image: SensorImage, gpu: GpuBufferHandle, permit: OwnedSemaphorePermit) -> Self {
        Self {
            image,
            gpu,
            _permit: permit,
        }
    }

    /// The GPU-importable buffer backing this frame.
    pub fn gpu_buffer(&self) -> &GpuBufferHandle {
        &self.gpu
    }

    pub fn sequence(&self) -> u64 {
        self.image.sequence
    }
}

/// Select the preview output size for a display hint from the surface's
/// supported size list.
///
/// Candidates are the supported sizes whose area does not exceed the hint's
/// area. Among them the closest aspect-ratio match wins; equal matches fall
/// to the one appearing first in the canonical largest-area-first ordering.
/// When every supported size exceeds the hint's area, the smallest supported
/// size is used rather than failing the session.
pub fn select_preview_size(hint: Size, supported: &[Size]) -> Option<Size> {
    if supported.is_empty() {
        return None;
    }

    // Canonical ordering: largest area first
    let mut canonical: Vec<Size> = supported.to_vec();
    canonical.sort_by(|a, b| b.area().cmp(&a.area()));

    let hint_aspect = hint.aspect_ratio();
    let hint_area = hint.area();

    let mut best: Option<(Size, f64)> = None;
    for candidate in canonical.iter().filter(|s| s.area() <= hint_area) {
        let aspect_diff = (candidate.aspect_ratio() - hint_aspect).abs();
        match best {
            // Strict inequality keeps the earlier (larger-area) candidate on ties
            Some((_, best_diff)) if aspect_diff >= best_diff => {}
            _ => best = Some((*candidate, aspect_diff)),
        }
    }

    if let Some((size, _)) = best {
        return Some(size);
    }

    let fallback = *canonical.last().expect("supported is non-empty");
    warn!(
        "No supported size fits under display hint {}; falling back to smallest size {}",
        hint, fallback
    );
    Some(fallback)
}
