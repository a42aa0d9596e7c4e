//! Command line options shared by the recording binaries.
//!
use std::{fs::File, io::BufWriter, io::Write, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use env_logger::TimestampPrecision;
use frame_meter::Rounding;

use crate::sensors::{
    frame_duration_us, get_capture_fn_linux, CaptureFn, SyntheticCamera, SyntheticConfig,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RoundingArg {
    HalfToEven,
    HalfAwayFromZero,
}

impl From<RoundingArg> for Rounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::HalfToEven => Rounding::HalfToEven,
            RoundingArg::HalfAwayFromZero => Rounding::HalfAwayFromZero,
        }
    }
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Video device to record from
    #[clap(long, default_value = "/dev/video0")]
    pub device: String,

    /// Frame rate to request from the camera
    #[clap(long, default_value_t = 50)]
    pub fps: u32,

    /// Recording duration in seconds
    #[clap(long, default_value_t = 5.0)]
    pub duration: f64,

    /// Frame width, experiment with how resolution affects frame drops
    #[clap(long, default_value_t = 1920)]
    pub width: u32,

    /// Frame height
    #[clap(long, default_value_t = 1080)]
    pub height: u32,

    /// FourCC pixel format to request
    #[clap(long, default_value = "MJPG")]
    pub format: String,

    /// File the recorded Motion-JPEG stream is written to
    #[clap(long, default_value = "test.mjpeg")]
    pub output: PathBuf,

    /// How a gap of exactly half a frame interval is rounded
    #[clap(long, value_enum, default_value = "half-to-even")]
    pub rounding: RoundingArg,

    /// Record from a synthetic camera instead of a video device
    #[clap(long)]
    pub synthetic: bool,

    /// Let the synthetic camera lose every n-th frame
    #[clap(long, requires = "synthetic", value_parser = clap::value_parser!(u64).range(2..))]
    pub drop_every: Option<u64>,
}

impl RecordArgs {
    pub fn capture_fn(&self) -> Result<CaptureFn> {
        let resolution = (self.width, self.height);
        let interval = (1, self.fps);

        if self.synthetic {
            let camera = SyntheticCamera::new(SyntheticConfig {
                resolution,
                frame_duration_us: frame_duration_us(interval)?,
                drop_every: self.drop_every,
                realtime: true,
                ..Default::default()
            })?;
            log::info!("Using synthetic camera");
            Ok(camera.into_capture_fn())
        } else {
            get_capture_fn_linux(&self.device, &self.format, Some(resolution), Some(interval))
        }
    }

    pub fn output(&self) -> Result<Box<dyn Write + Send>> {
        let file = File::create(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    pub fn duration(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.duration).context("Invalid recording duration")
    }
}

/// Setup logger
pub fn init_logger() {
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();
}
