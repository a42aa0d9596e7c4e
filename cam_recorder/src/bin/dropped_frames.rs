//! Record at a requested frame rate and measure dropped frames and the actual frame rate.
//!
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use cam_recorder::{
    cli::{init_logger, RecordArgs},
    recorder::record_for,
};
use clap::Parser;
use frame_meter::{
    meter::{spawn_meter_logger, Meter},
    DropCounter, FrameListener, FrameTimingTracker,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    #[clap(flatten)]
    record: RecordArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger();

    log::info!(
        "Recording {}s at a requested {}fps to {}",
        args.record.duration,
        args.record.fps,
        args.record.output.display()
    );

    let capture_fn = args.record.capture_fn()?;
    let listener = DropCounter::new(FrameTimingTracker::new(args.record.rounding.into()));

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
