//! Sensors module.
//!
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use frame_meter::{CapturedFrame, FrameMetadata};
use image::{Rgb, RgbImage};
use rscam::{Camera, Config};

pub type CaptureFn = Box<dyn FnMut() -> Option<CapturedFrame> + Send>;

/// Nominal frame duration in microseconds for a V4L2 frame interval `(numerator, denominator)`
/// given in seconds.
pub fn frame_duration_us(interval: (u32, u32)) -> Result<i64> {
    let (numerator, denominator) = interval;
    if numerator == 0 || denominator == 0 {
        bail!("Invalid frame interval {numerator}/{denominator}");
    }
    Ok(1_000_000 * numerator as i64 / denominator as i64)
}

/// Get a capture function to a video device on a Linux machine.
///
/// Frames are tagged with the driver's capture timestamp and the nominal frame duration of the
/// configured interval.
pub fn get_capture_fn_linux(
    device_name: &str,
    format: &str,
    resolution: Option<(u32, u32)>,
    frame_rate: Option<(u32, u32)>,
) -> Result<CaptureFn> {
    let mut cam =
        Camera::new(device_name).with_context(|| format!("Failed to open {device_name}"))?;
    log_supported_formats(&cam, format);
    let format = format.as_bytes();

    log::info!("Using camera {}", device_name);

    let resolution = resolution
        .map(Ok)
        .unwrap_or_else(|| get_max_resolution(&cam, format))?;

    let interval = frame_rate
        .map(Ok)
        .unwrap_or_else(|| get_max_frame_rate(&cam, format, resolution))?;
    let duration_us = frame_duration_us(interval)?;

    cam.start(&Config {
        interval,
        resolution,
        format,
        ..Default::default()
    })
    .with_context(|| format!("Failed to start streaming from {device_name}"))?;

    log::info!(
        "Streaming {}x{} with a frame interval of {}/{}s",
        resolution.0,
        resolution.1,
        interval.0,
        interval.1
    );

    let callback = move || match cam.capture() {
        Ok(frame) => {
            // The driver reports microseconds
            let timestamp_ns = frame.get_timestamp() as i64 * 1000;
            Some(CapturedFrame::new(
                FrameMetadata::new(timestamp_ns, duration_us),
                frame.resolution,
                frame[..].to_vec(),
            ))
        }
        Err(err) => {
            log::debug!("Capture failed: {err}");
            None
        }
    };
    Ok(Box::new(callback))
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32)> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .into_iter()
            // Get the highest resolution in terms of number of pixels
            .max_by_key(|res| res.0 * res.1),
        rscam::ResolutionInfo::Stepwise {
            min: _,
            max,
            step: _,
        } => Some(max),
    }
    .ok_or_else(|| anyhow!("No resolution found"))
}

/// Get the shortest supported frame interval, i.e. the highest frame rate, for the given format
/// and resolution.
fn get_max_frame_rate(cam: &Camera, format: &[u8], resolution: (u32, u32)) -> Result<(u32, u32)> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame intervals: {:?}", &interval_info);
    match interval_info {
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .into_iter()
            .filter(|(numerator, _)| *numerator > 0)
            // Frame rate is denominator / numerator for an interval in seconds
            .max_by(|a, b| (a.1 as u64 * b.0 as u64).cmp(&(b.1 as u64 * a.0 as u64))),
        rscam::IntervalInfo::Stepwise {
            min,
            max: _,
            step: _,
        } => Some(min),
    }
    .ok_or_else(|| anyhow!("No frame rate found"))
}

fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam
        .formats()
        .map(|fmt| match fmt {
            Ok(fmt) => Some(fmt),
            Err(_) => None,
        })
        .collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}

/// Settings of a [`SyntheticCamera`].
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub resolution: (u32, u32),
    pub frame_duration_us: i64,
    /// Timestamp of the first frame.
    pub start_timestamp_ns: i64,
    /// Lose every n-th frame before it is delivered, `n >= 2`.
    pub drop_every: Option<u64>,
    /// Deliver every n-th frame with a zero timestamp.
    pub invalid_every: Option<u64>,
    /// Stop delivering after this many frames.
    pub limit: Option<u64>,
    /// Sleep one frame duration per produced frame.
    pub realtime: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            resolution: (640, 480),
            frame_duration_us: 20_000,
            start_timestamp_ns: 1_000_000_000,
            drop_every: None,
            invalid_every: None,
            limit: None,
            realtime: false,
        }
    }
}

/// Camera stand-in producing a grey JPEG with perfectly periodic timestamps, apart from the
/// drops and glitches it is told to inject.
pub struct SyntheticCamera {
    config: SyntheticConfig,
    jpeg: Vec<u8>,
    /// Frames produced by the sensor, including lost ones.
    produced: u64,
    delivered: u64,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.frame_duration_us <= 0 {
            bail!("Frame duration must be positive");
        }
        if config.drop_every == Some(1) {
            bail!("Losing every frame leaves nothing to deliver");
        }
        let (width, height) = config.resolution;
        let image = RgbImage::from_pixel(width, height, Rgb([96, 96, 96]));
        let jpeg = turbojpeg::compress_image(&image, 90, turbojpeg::Subsamp::Sub2x2)
            .context("Failed to encode synthetic frame")?
            .to_vec();

        Ok(Self {
            config,
            jpeg,
            produced: 0,
            delivered: 0,
        })
    }

    /// Produce the next delivered frame, or `None` once the limit is reached.
    pub fn next_frame(&mut self) -> Option<CapturedFrame> {
        if matches!(self.config.limit, Some(limit) if self.delivered >= limit) {
            return None;
        }

        loop {
            let slot = self.produced;
            self.produced += 1;
            if self.config.realtime {
                std::thread::sleep(Duration::from_micros(self.config.frame_duration_us as u64));
            }

            match self.config.drop_every {
                Some(n) if n > 1 && (slot + 1) % n == 0 => {
                    log::trace!("Synthetic camera lost frame {slot}");
                    continue;
                }
                _ => break,
            }
        }

        self.delivered += 1;
        let timestamp_ns = match self.config.invalid_every {
            Some(n) if n > 0 && self.delivered % n == 0 => 0,
            _ => {
                self.config.start_timestamp_ns
                    + (self.produced as i64 - 1) * self.config.frame_duration_us * 1000
            }
        };

        Some(CapturedFrame::new(
            FrameMetadata::new(timestamp_ns, self.config.frame_duration_us),
            self.config.resolution,
            self.jpeg.clone(),
        ))
    }

    pub fn into_capture_fn(mut self) -> CaptureFn {
        Box::new(move || self.next_frame())
    }
}
