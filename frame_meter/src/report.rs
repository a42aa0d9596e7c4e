//! End-of-session frame rate report.
//!
use std::fmt;

use thiserror::Error;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    /// Nothing to divide by: no frames arrived, or the measured duration is not positive (e.g.
    /// the last frame carried a broken timestamp).
    #[error(
        "cannot compute frame rates: {total_frames} frames over {duration_us}us \
         (no frames captured or no measurable duration)"
    )]
    DegenerateSession { total_frames: u64, duration_us: i64 },
}

/// Frame counts and rates of a finished recording session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub total_frames: u64,
    pub recorded_frames: u64,
    pub dropped_frames: u64,
    pub duration_s: f64,
    pub sensor_fps: f64,
    pub recorded_fps: f64,
    pub dropped_percent: f64,
}

impl SessionReport {
    /// Compute rates from the final counters.
    ///
    /// Fails instead of producing NaN/infinite rates when no frames were counted or the
    /// measured duration is not positive.
    pub fn new(
        recorded_frames: u64,
        dropped_frames: u64,
        duration_us: i64,
    ) -> Result<Self, ReportError> {
        let total_frames = recorded_frames + dropped_frames;
        if total_frames == 0 || duration_us <= 0 {
            return Err(ReportError::DegenerateSession {
                total_frames,
                duration_us,
            });
        }

        let duration_s = duration_us as f64 / MICROS_PER_SECOND;
        Ok(Self {
            total_frames,
            recorded_frames,
            dropped_frames,
            duration_s,
            sensor_fps: total_frames as f64 / duration_s,
            recorded_fps: recorded_frames as f64 / duration_s,
            dropped_percent: dropped_frames as f64 / total_frames as f64 * 100.0,
        })
    }

    /// Printable summary, given the frame rate that was requested from the camera.
    pub fn summary(&self, requested_fps: u32) -> Summary<'_> {
        Summary {
            report: self,
            requested_fps,
        }
    }
}

pub struct Summary<'a> {
    report: &'a SessionReport,
    requested_fps: u32,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(f, "Total frames {}", report.total_frames)?;
        writeln!(f, "Recorded frames {}", report.recorded_frames)?;
        writeln!(f, "Dropped frames {}", report.dropped_frames)?;
        writeln!(f, "Requested {}fps", self.requested_fps)?;
        writeln!(f, "Sensor provided {:.1}fps", report.sensor_fps)?;
        writeln!(f, "Recorded at {:.1}fps", report.recorded_fps)?;
        writeln!(f, "Dropped {:.1}% of frames", report.dropped_percent)
    }
}
