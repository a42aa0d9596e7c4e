//! Per-frame callbacks invoked by the capture pipeline.
//!
use rusttype::Font;

use crate::{
    overlay::{annotate_jpeg, OverlayStyle},
    tracker::{DroppedRange, FrameMetadata, FrameTimingTracker},
};

/// A frame handed over by the capture pipeline before it is written out.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub metadata: FrameMetadata,
    pub resolution: (u32, u32),
    /// JPEG compressed image.
    pub data: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(metadata: FrameMetadata, resolution: (u32, u32), data: Vec<u8>) -> Self {
        Self {
            metadata,
            resolution,
            data,
        }
    }
}

/// Called once per completed frame, in capture order, on the capture thread.
///
/// Implementations must not fail or block for long: a slow callback makes the pipeline drop
/// frames itself.
pub trait FrameListener: Send {
    /// Inspect and optionally modify the frame before it is written out.
    fn on_frame(&mut self, frame: &mut CapturedFrame);

    fn tracker(&self) -> &FrameTimingTracker;
}

/// Counts delivered and dropped frames, leaves frames untouched.
#[derive(Debug, Default)]
pub struct DropCounter {
    tracker: FrameTimingTracker,
}

impl DropCounter {
    pub fn new(tracker: FrameTimingTracker) -> Self {
        Self { tracker }
    }
}

impl FrameListener for DropCounter {
    fn on_frame(&mut self, frame: &mut CapturedFrame) {
        if let Some(range) = self.tracker.on_frame(&frame.metadata) {
            log::debug!("{}", drop_message(&range, None));
        }
    }

    fn tracker(&self) -> &FrameTimingTracker {
        &self.tracker
    }
}

/// Describe a drop by the range counted from the previous frame's number.
///
/// Timing jitter can make the number drawn on the current frame differ from `range.before`, so
/// the drawn number is named separately.
fn drop_message(range: &DroppedRange, frame_number: Option<i64>) -> String {
    let mut message = format!(
        "Dropped {} frame(s) after frame {} (expected next: frame {})",
        range.count, range.after, range.before
    );
    if let Some(frame_number) = frame_number {
        if frame_number != range.before {
            message.push_str(&format!(", this frame is labelled {frame_number}"));
        }
    }
    message
}

/// Counts frames like [`DropCounter`] and burns the frame number into every frame.
pub struct FrameNumberOverlay {
    tracker: FrameTimingTracker,
    font: Font<'static>,
    style: OverlayStyle,
}

impl FrameNumberOverlay {
    pub fn new(tracker: FrameTimingTracker, font: Font<'static>, style: OverlayStyle) -> Self {
        Self {
            tracker,
            font,
            style,
        }
    }
}

impl FrameListener for FrameNumberOverlay {
    fn on_frame(&mut self, frame: &mut CapturedFrame) {
        let dropped = self.tracker.on_frame(&frame.metadata);

        // Without a timestamp there is no frame number to show
        let frame_number = frame.metadata.has_valid_timestamp().then(|| {
            self.tracker.frame_number_at(
                frame.metadata.timestamp_us(),
                frame.metadata.frame_duration_us,
            )
        });

        if let Some(range) = dropped {
            log::warn!("{}", drop_message(&range, frame_number));
        }

        let Some(frame_number) = frame_number else {
            return;
        };
        let label = frame_number.to_string();
        match annotate_jpeg(&frame.data, &self.font, &self.style, &label) {
            Ok(data) => frame.data = data,
            Err(err) => log::error!("Unable to annotate frame {frame_number}: {err}"),
        }
    }

    fn tracker(&self) -> &FrameTimingTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod test {

    use image::{Rgb, RgbImage};

    use super::*;
    use crate::overlay::{load_font, DEFAULT_FONT_PATH};

    const DURATION_US: i64 = 10_000;

    fn jpeg_frame(timestamp_ns: i64) -> CapturedFrame {
        let image = RgbImage::from_pixel(160, 120, Rgb([0, 0, 0]));
        let jpeg = turbojpeg::compress_image(&image, 95, turbojpeg::Subsamp::Sub2x2)
            .expect("compress test image");
        CapturedFrame::new(
            FrameMetadata::new(timestamp_ns, DURATION_US),
            (160, 120),
            jpeg.to_vec(),
        )
    }

    #[test]
    fn test_drop_counter_leaves_frames_alone() {
        let mut counter = DropCounter::default();
        let mut frames: Vec<_> = [1, 2, 5, 6]
            .iter()
            .map(|slot| {
                CapturedFrame::new(
                    FrameMetadata::new(slot * DURATION_US * 1000, DURATION_US),
                    (1, 1),
                    vec![*slot as u8],
                )
            })
            .collect();

        for frame in frames.iter_mut() {
            counter.on_frame(frame);
        }

        assert_eq!(counter.tracker().frames_delivered(), 4);
        assert_eq!(counter.tracker().frames_dropped(), 2);
        assert_eq!(frames[2].data, vec![5]);
    }

    #[test]
    fn test_drop_message_names_drawn_number_under_jitter() {
        let mut tracker = FrameTimingTracker::default();
        let start_us = 1_000_000;
        let duration_us = 20_000;
        let mut range = None;
        for offset_us in [0, 20_000, 40_000, 68_000, 132_000] {
            range = tracker.on_frame(&FrameMetadata::new(
                (start_us + offset_us) * 1000,
                duration_us,
            ));
        }
        let range = range.expect("gap before the last frame");
        let drawn = tracker.frame_number_at(start_us + 132_000, duration_us);

        assert_eq!(range.before - range.after - 1, range.count as i64);
        assert_ne!(drawn, range.before);

        let message = drop_message(&range, Some(drawn));
        assert!(message.contains(&format!("after frame {}", range.after)));
        assert!(message.contains(&format!("labelled {drawn}")));
    }

    #[test]
    fn test_drop_message_without_jitter() {
        let range = DroppedRange {
            after: 3,
            before: 6,
            count: 2,
        };
        assert_eq!(
            drop_message(&range, Some(6)),
            "Dropped 2 frame(s) after frame 3 (expected next: frame 6)"
        );
        assert_eq!(drop_message(&range, None), drop_message(&range, Some(6)));
    }

    #[test]
    fn test_overlay_annotates_valid_frames() {
        let font = match load_font(DEFAULT_FONT_PATH) {
            Ok(font) => font,
            Err(err) => {
                println!("Could not load font (maybe not installed): {err}");
                return;
            }
        };
        let mut overlay =
            FrameNumberOverlay::new(FrameTimingTracker::default(), font, OverlayStyle::default());

        let mut valid = jpeg_frame(DURATION_US * 1000);
        let original = valid.data.clone();
        overlay.on_frame(&mut valid);
        assert_ne!(valid.data, original);

        let mut invalid = jpeg_frame(0);
        let original = invalid.data.clone();
        overlay.on_frame(&mut invalid);
        assert_eq!(invalid.data, original);

        // Undecodable payloads pass through and are still counted
        let mut broken = CapturedFrame::new(
            FrameMetadata::new(4 * DURATION_US * 1000, DURATION_US),
            (160, 120),
            b"broken".to_vec(),
        );
        overlay.on_frame(&mut broken);
        assert_eq!(broken.data, b"broken".to_vec());

        assert_eq!(overlay.tracker().frames_delivered(), 3);
        assert_eq!(overlay.tracker().frames_dropped(), 2);
    }
}
