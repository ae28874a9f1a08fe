use crate::error::{CamflowError, Result};
use crate::frame::{FrameSlot, GpuBufferHandle, PreviewGeometry, SensorImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

/// Callback invoked once per produced frame, with the single unreleased slot.
pub type FrameAvailableListener = Arc<dyn Fn(FrameSlot) + Send + Sync>;

/// Fixed-capacity pool of in-flight frame slots shared between the platform
/// producer and the delivery sink.
///
/// At most `capacity` slots are acquired and unreleased at any time. A
/// producer asking for a slot while the pool is exhausted suspends until a
/// consumer drops one; it never fails and never corrupts an occupied slot.
/// Release is the `FrameSlot` drop, so every exit path in the consumer gives
/// the slot back.
pub struct FramePool {
    capacity: usize,
    geometry: PreviewGeometry,
    permits: Arc<Semaphore>,
    listener: Mutex<Option<FrameAvailableListener>>,
    stats: PoolStats,
}

/// Counters for pool monitoring.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Frames produced into the pool
    pub frames_produced: AtomicU64,
    /// Frames dropped because no listener was registered
    pub frames_dropped: AtomicU64,
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone)]
pub struct PoolStatsSnapshot {
    pub frames_produced: u64,
    pub frames_dropped: u64,
    pub in_flight: usize,
}

impl FramePool {
    /// Create a pool of `capacity` pre-allocated slots sized for the
    /// negotiated preview geometry.
    pub fn new(capacity: usize, geometry: PreviewGeometry) -> Self {
        assert!(capacity > 0, "frame pool capacity must be at least 1");

        debug!(
            "Created frame pool: {} slots of {}x{}",
            capacity, geometry.width, geometry.height
        );

        Self {
            capacity,
            geometry,
            permits: Arc::new(Semaphore::new(capacity)),
            listener: Mutex::new(None),
            stats: PoolStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn geometry(&self) -> PreviewGeometry {
        self.geometry
    }

    /// Number of slots currently acquired and unreleased.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            frames_produced: self.stats.frames_produced.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }

    /// Register the frame-available listener. Replaces any previous one.
    pub fn set_listener(&self, listener: FrameAvailableListener) {
        *self.listener.lock() = Some(listener);
    }

    /// Remove the frame-available listener; later frames are dropped (and
    /// their slots released) on arrival.
    pub fn clear_listener(&self) {
        *self.listener.lock() = None;
    }

    /// Produce one completed capture into the pool.
    ///
    /// Suspends while all slots are in flight. The slot is handed to the
    /// registered listener exactly once; without a listener it is released
    /// immediately.
    pub async fn produce(&self, image: SensorImage, gpu: GpuBufferHandle) -> Result<()> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CamflowError::unknown("frame pool permits closed"))?;

        let sequence = image.sequence;
        let slot = FrameSlot::new(image, gpu, permit);
        self.stats.frames_produced.fetch_add(1, Ordering::Relaxed);

        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) => {
                trace!(
                    "Frame {} acquired slot ({}/{} in flight)",
                    sequence,
                    self.in_flight(),
                    self.capacity
                );
                listener(slot);
            }
            None => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                trace!("Frame {} dropped: no listener registered", sequence);
                drop(slot);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Size;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn geometry() -> PreviewGeometry {
        PreviewGeometry::from(Size::new(640, 480))
    }

    fn image(sequence: u64) -> SensorImage {
        SensorImage::new(sequence, 640, 480, vec![0u8; 64])
    }

    fn gpu(id: u64) -> GpuBufferHandle {
        GpuBufferHandle::new(id, 640, 480)
    }

    /// Listener that parks every delivered slot so it stays in flight.
    fn parking_listener() -> (FrameAvailableListener, Arc<Mutex<Vec<FrameSlot>>>) {
        let held: Arc<Mutex<Vec<FrameSlot>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&held);
        let listener: FrameAvailableListener = Arc::new(move |slot| {
            sink.lock().push(slot);
        });
        (listener, held)
    }

    #[tokio::test]
    async fn test_produce_without_listener_releases_slot() {
        let pool = FramePool::new(3, geometry());

        for i in 0..10 {
            pool.produce(image(i), gpu(i)).await.unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.frames_produced, 10);
        assert_eq!(stats.frames_dropped, 10);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_acquire_beyond_capacity_blocks_until_release() {
        let pool = Arc::new(FramePool::new(3, geometry()));
        let (listener, held) = parking_listener();
        pool.set_listener(listener);

        // A, B, C fill the pool
        for i in 0..3 {
            pool.produce(image(i), gpu(i)).await.unwrap();
        }
        assert_eq!(pool.in_flight(), 3);

        // D must suspend, not fail
        let blocked = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.produce(image(3), gpu(3)).await })
        };
        sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        // Releasing A unblocks the pending produce
        let released = held.lock().remove(0);
        drop(released);

        timeout(Duration::from_secs(1), blocked)
            .await
            .expect("produce stayed blocked after a release")
            .unwrap()
            .unwrap();
        assert_eq!(pool.in_flight(), 3);
        assert_eq!(held.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_blocking_holds_for_any_capacity() {
        for capacity in 1..=4usize {
            let pool = Arc::new(FramePool::new(capacity, geometry()));
            let (listener, held) = parking_listener();
            pool.set_listener(listener);

            for i in 0..capacity as u64 {
                pool.produce(image(i), gpu(i)).await.unwrap();
            }

            let extra = {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.produce(image(99), gpu(99)).await })
            };
            sleep(Duration::from_millis(20)).await;
            assert!(!extra.is_finished(), "capacity {} failed to block", capacity);

            held.lock().clear();
            timeout(Duration::from_secs(1), extra)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_listener_receives_each_frame_once() {
        let pool = FramePool::new(3, geometry());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        pool.set_listener(Arc::new(move |slot: FrameSlot| {
            sink.lock().push(slot.sequence());
            // slot drops here, releasing it
        }));

        for i in 0..5 {
            pool.produce(image(i), gpu(i)).await.unwrap();
        }

        assert_eq!(*delivered.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_clear_listener_drops_later_frames() {
        let pool = FramePool::new(2, geometry());
        let (listener, held) = parking_listener();
        pool.set_listener(listener);

        pool.produce(image(0), gpu(0)).await.unwrap();
        assert_eq!(held.lock().len(), 1);

        pool.clear_listener();
        held.lock().clear();
        pool.produce(image(1), gpu(1)).await.unwrap();

        assert_eq!(pool.stats().frames_dropped, 1);
        assert_eq!(pool.in_flight(), 0);
    }
}
