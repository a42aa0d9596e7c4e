//! Recording loop driving a frame listener.
//!
use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use frame_meter::{meter::Meter, FrameListener};
use thiserror::Error;

use crate::sensors::CaptureFn;

/// Consecutive capture failures after which the source counts as gone.
const MAX_CAPTURE_FAILURES: u32 = 100;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("capture thread panicked")]
    Panicked,
    #[error("recording task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Background capture thread feeding every frame through a listener and into an output.
pub struct Recorder<L> {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<Result<L, RecorderError>>,
}

impl<L: FrameListener + 'static> Recorder<L> {
    /// Start capturing on a dedicated thread.
    ///
    /// For each frame, in capture order: the listener sees (and may rewrite) the frame, the meter
    /// is ticked and the frame data is appended to `output`. A failing output ends the recording
    /// early; the listener is still handed back with everything counted up to then.
    pub fn start(
        mut capture_fn: CaptureFn,
        mut listener: L,
        mut output: Box<dyn Write + Send>,
        meter: Arc<Meter>,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_ = Arc::clone(&stop_flag);

        let handle = std::thread::spawn(move || -> Result<L, RecorderError> {
            log::info!("Recording started");
            let mut failures = 0;

            while !stop_flag_.load(Ordering::Acquire) {
                match capture_fn() {
                    Some(mut frame) => {
                        failures = 0;
                        let dropped_before = listener.tracker().frames_dropped();
                        listener.on_frame(&mut frame);

                        meter.tick_delivered();
                        meter.add_dropped(listener.tracker().frames_dropped() - dropped_before);

                        if let Err(err) = output.write_all(&frame.data) {
                            // Counters so far still make a valid report
                            log::error!(
                                "Failed to write frame to output, stopping capture: {err}"
                            );
                            break;
                        }
                    }
                    None => {
                        failures += 1;
                        if failures >= MAX_CAPTURE_FAILURES {
                            log::warn!(
                                "No frame in {failures} attempts, ending recording early"
                            );
                            break;
                        }
                        log::error!("Unable to capture frame, trying again...");
                    }
                }
            }

            if let Err(err) = output.flush() {
                log::error!("Failed to flush output: {err}");
            }
            log::info!(
                "Recording stopped after {} frames",
                listener.tracker().frames_delivered()
            );

            Ok(listener)
        });

        Self { stop_flag, handle }
    }

    /// Signal the capture thread to stop and hand back the listener with its final state.
    ///
    /// No frame is delivered to the listener after this returns.
    pub fn stop(self) -> Result<L, RecorderError> {
        self.stop_flag.store(true, Ordering::Release);
        self.join()
    }

    /// Wait until the capture source runs dry.
    pub fn join(self) -> Result<L, RecorderError> {
        self.handle.join().map_err(|_| RecorderError::Panicked)?
    }
}

/// Record for a fixed wall-clock `duration`, then stop and return the listener.
pub async fn record_for<L: FrameListener + 'static>(
    capture_fn: CaptureFn,
    listener: L,
    output: Box<dyn Write + Send>,
    meter: Arc<Meter>,
    duration: Duration,
) -> Result<L, RecorderError> {
    let recorder = Recorder::start(capture_fn, listener, output, meter);
    tokio::time::sleep(duration).await;

    tokio::task::spawn_blocking(move || recorder.stop()).await?
}

#[cfg(test)]
mod test {

    use std::sync::Mutex;

    use frame_meter::{CapturedFrame, DropCounter, FrameMetadata, FrameTimingTracker};

    use super::*;

    /// Output that can still be inspected after the recorder consumed it.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Capture function replaying fixed timestamps, each frame carrying one byte.
    fn replay(timestamps_ns: Vec<i64>) -> CaptureFn {
        let mut frames = timestamps_ns.into_iter().enumerate();
        Box::new(move || {
            frames.next().map(|(i, ts)| {
                CapturedFrame::new(FrameMetadata::new(ts, 1000), (1, 1), vec![i as u8])
            })
        })
    }

    #[test]
    fn test_frames_reach_listener_and_output_in_order() -> Result<(), RecorderError> {
        let output = SharedBuf::default();
        let meter = Arc::new(Meter::new());
        let timestamps = vec![1_000_000, 2_000_000, 5_000_000, 0, 6_000_000];

        let recorder = Recorder::start(
            replay(timestamps),
            DropCounter::new(FrameTimingTracker::default()),
            Box::new(output.clone()),
            Arc::clone(&meter),
        );
        let listener = recorder.join()?;

        assert_eq!(listener.tracker().frames_delivered(), 5);
        assert_eq!(listener.tracker().frames_dropped(), 2);
        assert_eq!(*output.0.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(meter.get_reset_delivered(), 5);
        assert_eq!(meter.get_reset_dropped(), 2);

        Ok(())
    }

    /// Output accepting a fixed number of writes, failing afterwards.
    struct FailingAfter(usize);

    impl Write for FailingAfter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.0 == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.0 -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_failure_keeps_counters() -> Result<(), RecorderError> {
        let timestamps = vec![1_000_000, 2_000_000, 4_000_000, 5_000_000, 6_000_000];

        let recorder = Recorder::start(
            replay(timestamps),
            DropCounter::default(),
            Box::new(FailingAfter(2)),
            Arc::new(Meter::new()),
        );
        let listener = recorder.join()?;

        // The third frame was counted before its write failed, then capture stopped
        assert_eq!(listener.tracker().frames_delivered(), 3);
        assert_eq!(listener.tracker().frames_dropped(), 1);
        assert!(listener.tracker().report().is_ok());

        Ok(())
    }

    #[test]
    fn test_stop_hands_back_listener() -> Result<(), RecorderError> {
        let mut timestamp_ns = 0;
        let endless: CaptureFn = Box::new(move || {
            timestamp_ns += 1_000_000;
            std::thread::sleep(Duration::from_millis(1));
            Some(CapturedFrame::new(
                FrameMetadata::new(timestamp_ns, 1000),
                (1, 1),
                vec![],
            ))
        });

        let recorder = Recorder::start(
            endless,
            DropCounter::default(),
            Box::new(std::io::sink()),
            Arc::new(Meter::new()),
        );
        std::thread::sleep(Duration::from_millis(50));
        let listener = recorder.stop()?;

        assert!(listener.tracker().frames_delivered() > 0);
        assert_eq!(listener.tracker().frames_dropped(), 0);

        Ok(())
    }
}
