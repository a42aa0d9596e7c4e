//! Record at a requested frame rate with the frame number burnt into every frame, so dropped
//! frames show up as gaps in the numbering of the recorded video.
//!
use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use cam_recorder::{
    cli::{init_logger, RecordArgs},
    recorder::record_for,
};
use clap::Parser;
use frame_meter::{
    meter::{spawn_meter_logger, Meter},
    overlay::{load_font, OverlayStyle, DEFAULT_FONT_PATH},
    FrameListener, FrameNumberOverlay, FrameTimingTracker,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    #[clap(flatten)]
    record: RecordArgs,

    /// TrueType font used for the frame number
    #[clap(long, default_value = DEFAULT_FONT_PATH)]
    font: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger();

    if args.record.format != "MJPG" {
        log::warn!(
            "Frame numbers can only be drawn on MJPG frames, {} frames pass through untouched",
            args.record.format
        );
    }

    let font = load_font(&args.font).context("Failed to load overlay font")?;
    let capture_fn = args.record.capture_fn()?;
    let listener = FrameNumberOverlay::new(
        FrameTimingTracker::new(args.record.rounding.into()),
        font,
        OverlayStyle::default(),
    );

    log::info!(
        "Recording {}s at a requested {}fps to {}",
        args.record.duration,
        args.record.fps,
        args.record.output.display()
    );

    let meter = Arc::new(Meter::new());
    let meter_logger = spawn_meter_logger(Arc::clone(&meter), Duration::from_secs(2));

    let listener = record_for(
        capture_fn,
        listener,
        args.record.output()?,
        meter,
        args.record.duration()?,
    )
    .await?;
    meter_logger.abort();

    let report = listener.tracker().report()?;
    print!("{}", report.summary(args.record.fps));

    Ok(())
}
