//! Live frame rate logging while a recording is running.
//!
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

/// Frame counters shared between the capture thread and the logger task.
#[derive(Debug, Default)]
pub struct Meter {
    delivered_frames: AtomicU64,
    dropped_frames: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            delivered_frames: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
        }
    }

    pub fn tick_delivered(&self) {
        self.delivered_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dropped(&self, count: u64) {
        if count > 0 {
            self.dropped_frames.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn get_reset_delivered(&self) -> u64 {
        self.delivered_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_dropped(&self) -> u64 {
        self.dropped_frames.swap(0, Ordering::Relaxed)
    }
}

/// Log delivered and dropped frames per second every `period` until the task is aborted.
pub fn spawn_meter_logger(meter: Arc<Meter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut log_interval = interval(period);
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let delivered_frames = meter.get_reset_delivered();
            let dropped_frames = meter.get_reset_dropped();
            let elapsed = start.elapsed().as_secs_f32();
            let fps_delivered = delivered_frames as f32 / elapsed;

            if delivered_frames > 0 {
                log::info!("Delivered frames per second: {fps_delivered:.2}")
            }
            if dropped_frames > 0 {
                log::warn!("Dropped {dropped_frames} frame(s) in the last {elapsed:.1}s")
            }
        }
    })
}
