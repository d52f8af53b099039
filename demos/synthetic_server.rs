//! MJPEG server fed by a synthetic test pattern
//!
//! Run with: cargo run --example synthetic_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example synthetic_server                    # binds to 0.0.0.0:8000
//!   cargo run --example synthetic_server localhost          # binds to 127.0.0.1:8000
//!   cargo run --example synthetic_server 127.0.0.1:8081     # binds to 127.0.0.1:8081
//!
//! ## Watching
//!
//! Open http://localhost:8000/video in a browser, or embed it with
//! `<img src="http://localhost:8000/video">`.
//!
//! Grab one frame:
//!   curl -o snap.jpg http://localhost:8000/snap
//!
//! ## Features
//!
//! - Capture rate measured at startup and used to pace every stream
//! - Slow clients skip frames instead of buffering
//! - Ctrl+C disconnects all clients and stops the producer

use std::net::SocketAddr;
use std::sync::Arc;

use framecast::{
    FrameBroadcaster, JpegEncoder, MjpegServer, PacingConfig, Producer, ServerConfig,
    SyntheticSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 8000)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framecast=debug".parse()?)
                .add_directive("synthetic_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr).pacing(PacingConfig::default().measured(10, 60));
    let broadcaster = Arc::new(FrameBroadcaster::new());

    let source = SyntheticSource::new(640, 480).fps(25.0);
    let mut producer = Producer::new(source, Arc::clone(&broadcaster))
        .with_encoder(Arc::new(JpegEncoder::new(75)));

    // Measure before spawning so the producer thread owns the source afterwards
    let rate = producer.resolve_rate(config.pacing.rate);
    let producer = producer.spawn()?;

    let server = MjpegServer::new(config, broadcaster)?.frame_rate(rate);

    println!("Streaming at {} on http://{}/video", rate, server.bind_addr());
    println!("Snapshots on http://{}/snap", server.bind_addr());
    println!();

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    let stats = producer.stats().snapshot();
    producer.stop();

    println!(
        "Stats: published={} missed={} encode_failures={} fps={:.1} bitrate={}",
        stats.published,
        stats.missed,
        stats.encode_failures,
        stats.publish_rate(),
        stats.bitrate(),
    );

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8000;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: synthetic_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8000)");
}
