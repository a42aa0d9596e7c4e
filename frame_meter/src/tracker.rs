//! Frame drop detection from sensor timestamps.
//!
//! The capture pipeline hands every completed frame's metadata to
//! [`FrameTimingTracker::on_frame`]. The tracker predicts when the next frame should arrive and
//! converts the gap between prediction and reality into a number of frames the sensor produced
//! but never delivered.
use std::cmp::Ordering;

use crate::report::{ReportError, SessionReport};

/// Per-frame metadata as reported by the capture pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameMetadata {
    /// Hardware capture time in nanoseconds. Non-positive values are sensor glitches.
    pub sensor_timestamp_ns: i64,
    /// Nominal interval between frames at the configured frame rate, in microseconds.
    pub frame_duration_us: i64,
}

impl FrameMetadata {
    pub fn new(sensor_timestamp_ns: i64, frame_duration_us: i64) -> Self {
        Self {
            sensor_timestamp_ns,
            frame_duration_us,
        }
    }

    /// Sensor timestamp truncated to microseconds.
    pub fn timestamp_us(&self) -> i64 {
        self.sensor_timestamp_ns / 1000
    }

    pub fn has_valid_timestamp(&self) -> bool {
        self.sensor_timestamp_ns > 0
    }
}

/// Rounding applied when converting a timestamp gap into a whole number of frames.
///
/// Only matters when a gap sits exactly halfway between two frame intervals.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Rounding {
    /// Ties go to the even neighbour, `2.5 -> 2`, `3.5 -> 4`.
    #[default]
    HalfToEven,
    /// Ties go away from zero, `2.5 -> 3`, `-2.5 -> -3`.
    HalfAwayFromZero,
}

impl Rounding {
    /// Divide `numerator` by a positive `denominator`, rounding to the nearest integer.
    pub fn div(self, numerator: i64, denominator: i64) -> i64 {
        debug_assert!(denominator > 0);
        let floor = numerator.div_euclid(denominator);
        let remainder = numerator.rem_euclid(denominator);

        // Compare `remainder / denominator` with one half without overflowing
        match remainder.cmp(&(denominator - remainder)) {
            Ordering::Less => floor,
            Ordering::Greater => floor + 1,
            Ordering::Equal => match self {
                Rounding::HalfToEven if floor % 2 == 0 => floor,
                Rounding::HalfToEven => floor + 1,
                // The tie sits at `floor + 0.5`, which is positive iff `floor >= 0`
                Rounding::HalfAwayFromZero if floor >= 0 => floor + 1,
                Rounding::HalfAwayFromZero => floor,
            },
        }
    }
}

/// Frames lost between two delivered frames, by frame number.
///
/// The lost frames are `after + 1 ..= before - 1`, so `before - after - 1 == count`. `after` is
/// the number of the previous valid frame and `before` is counted from it; with timing jitter the
/// current frame's own [`FrameTimingTracker::frame_number_at`] may differ from `before`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DroppedRange {
    pub after: i64,
    pub before: i64,
    pub count: u64,
}

/// Running frame counters for one recording session.
#[derive(Clone, Debug, Default)]
pub struct FrameTimingTracker {
    rounding: Rounding,
    frames_delivered: u64,
    frames_dropped: u64,
    expected_next_timestamp_us: Option<i64>,
    previous_valid_timestamp_us: Option<i64>,
    session_start_us: i64,
    last_timestamp_us: i64,
}

impl FrameTimingTracker {
    pub fn new(rounding: Rounding) -> Self {
        Self {
            rounding,
            ..Default::default()
        }
    }

    /// Account for one delivered frame.
    ///
    /// Returns the range of frame numbers that went missing right before this frame, if any.
    /// Frames with a non-positive sensor timestamp are counted as delivered but take no part in
    /// drop estimation; a gap spanning a run of such frames is folded into the next valid one.
    pub fn on_frame(&mut self, metadata: &FrameMetadata) -> Option<DroppedRange> {
        let timestamp_us = metadata.timestamp_us();
        let frame_duration_us = metadata.frame_duration_us;

        let diff = match self.expected_next_timestamp_us {
            Some(expected) => timestamp_us.saturating_sub(expected),
            None => {
                self.session_start_us = timestamp_us;
                0
            }
        };

        let mut dropped_range = None;
        if metadata.has_valid_timestamp() {
            let dropped = if frame_duration_us > 0 {
                // Early frames are jitter, never negative drops
                self.rounding.div(diff, frame_duration_us).max(0) as u64
            } else {
                0
            };

            if let (true, Some(previous)) = (dropped > 0, self.previous_valid_timestamp_us) {
                let after = self.frame_number_at(previous, frame_duration_us);
                dropped_range = Some(DroppedRange {
                    after,
                    before: after + dropped as i64 + 1,
                    count: dropped,
                });
            }

            self.frames_dropped += dropped;
            self.expected_next_timestamp_us = Some(timestamp_us.saturating_add(frame_duration_us));
            self.previous_valid_timestamp_us = Some(timestamp_us);
        } else {
            log::trace!(
                "Skipping drop estimation for invalid sensor timestamp {}",
                metadata.sensor_timestamp_ns
            );
        }

        self.frames_delivered += 1;
        self.last_timestamp_us = timestamp_us;

        dropped_range
    }

    /// Sequential number of the frame captured at `timestamp_us`, starting at 1 for the first
    /// frame of the session.
    ///
    /// Uses the same rounding as drop counting. A non-positive `frame_duration_us` numbers every
    /// frame as 1.
    pub fn frame_number_at(&self, timestamp_us: i64, frame_duration_us: i64) -> i64 {
        if frame_duration_us <= 0 {
            return 1;
        }
        self.rounding.div(
            timestamp_us.saturating_sub(self.session_start_us),
            frame_duration_us,
        ) + 1
    }

    /// Summarize the session. Call once the pipeline has stopped delivering frames.
    pub fn report(&self) -> Result<SessionReport, ReportError> {
        SessionReport::new(
            self.frames_delivered,
            self.frames_dropped,
            self.last_timestamp_us - self.session_start_us,
        )
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn expected_next_timestamp_us(&self) -> Option<i64> {
        self.expected_next_timestamp_us
    }

    pub fn session_start_us(&self) -> i64 {
        self.session_start_us
    }

    pub fn last_timestamp_us(&self) -> i64 {
        self.last_timestamp_us
    }
}
