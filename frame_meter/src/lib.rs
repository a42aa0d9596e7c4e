//! Measure dropped frames and the delivered frame rate of a camera recording from the sensor
//! timestamps of the frames that made it through.
pub mod listener;
pub mod meter;
pub mod overlay;
pub mod report;
pub mod tracker;

pub use listener::{CapturedFrame, DropCounter, FrameListener, FrameNumberOverlay};
pub use report::{ReportError, SessionReport};
pub use tracker::{DroppedRange, FrameMetadata, FrameTimingTracker, Rounding};
