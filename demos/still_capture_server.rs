//! Low-resolution video with high-resolution snapshots
//!
//! Run with: cargo run --example still_capture_server [BIND_ADDR]
//!
//! The live stream is a small square-cropped test pattern; every snapshot
//! request captures and encodes a separate full-size still. Routes are
//! mounted under `/camera`:
//!
//!   http://localhost:8000/camera/video
//!   http://localhost:8000/camera/snapshot

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use framecast::{
    CaptureAndEncode, Captured, FrameBroadcaster, FrameSource, JpegEncoder, MjpegServer,
    PacingConfig, Producer, ProducerConfig, ServerConfig, SnapshotStrategy, SyntheticSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = match std::env::args().nth(1) {
        Some(arg) => arg.replace("localhost", "127.0.0.1").parse::<SocketAddr>()?,
        None => SocketAddr::from(([0, 0, 0, 0], 8000)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framecast=debug".parse()?)
                .add_directive("still_capture_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr)
        .path_prefix("/camera")
        .include_content_length(true)
        .max_streams(8)
        .pacing(PacingConfig::default().fixed_rate(15.0));

    let broadcaster = Arc::new(FrameBroadcaster::new());

    let producer = Producer::new(SyntheticSource::new(480, 360).fps(15.0), Arc::clone(&broadcaster))
        .with_encoder(Arc::new(JpegEncoder::new(60)))
        .with_config(ProducerConfig::default().square_crop(true))
        .spawn()?;

    let still_source = Mutex::new(SyntheticSource::new(1920, 1080));
    let still = CaptureAndEncode::new(
        move || match still_source.lock().ok()?.acquire()? {
            Captured::Raw(image) => Some(image),
            Captured::Encoded(_) => None,
        },
        Arc::new(JpegEncoder::new(90)),
    );

    let server = MjpegServer::new(config, broadcaster)?
        .snapshot_strategy(SnapshotStrategy::Capture(Arc::new(still)));

    println!("Video:    http://{}/camera/video", server.bind_addr());
    println!("Snapshot: http://{}/camera/snapshot", server.bind_addr());

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    producer.stop();

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
