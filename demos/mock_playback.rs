//! Drive several mock decode streams and consume their frames
//!
//! Run with: cargo run --example mock_playback [STREAMS]
//!
//! Examples:
//!   cargo run --example mock_playback              # 3 streams
//!   RUST_LOG=decode_hub=debug cargo run --example mock_playback 5
//!
//! Each stream runs its own engine-owned decode thread. Stream 0 delivers
//! through a broadcast channel consumed on a tokio task; the rest use a
//! plain closure sink. Stream 1 is restarted halfway through with a forced
//! output size.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use decode_hub::engine::MockEngine;
use decode_hub::host::{ChannelSink, FrameView, NativeRuntime};
use decode_hub::{Registry, RegistryConfig, SinkError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("decode_hub=info")),
        )
        .init();

    let streams: usize = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(3)
        .max(2);

    let config = RegistryConfig::default().drain_timeout(Duration::from_millis(500));
    let registry = Registry::<MockEngine>::init_with_config(
        &["--no-audio".to_string(), "--quiet".to_string()],
        Arc::new(NativeRuntime),
        config,
    )?;

    // Stream 0: async consumer
    let channel = Arc::new(ChannelSink::new(8));
    let mut frames = channel.subscribe();
    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Ok(frame) = frames.recv().await {
            received += 1;
            if received % 10 == 0 {
                println!(
                    "[async] frame #{} {}x{} {} bytes",
                    frame.sequence,
                    frame.width,
                    frame.height,
                    frame.data.len()
                );
            }
        }
        received
    });
    registry.start("mock://stream-0", channel.clone(), 0, 0, &[])
        .then_some(())
        .ok_or("stream-0 failed to start")?;

    // Remaining streams: closure sinks counting frames
    let counters: Vec<Arc<AtomicU64>> = (1..streams).map(|_| Arc::new(AtomicU64::new(0))).collect();
    for (i, counter) in counters.iter().enumerate() {
        let id = format!("mock://stream-{}", i + 1);
        let counter = Arc::clone(counter);
        let sink = Arc::new(move |_frame: FrameView<'_>| -> Result<(), SinkError> {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        if !registry.start(&id, sink, 0, 0, &[":network-caching=150".to_string()]) {
            eprintln!("{} failed to start", id);
        }
    }

    for i in 0..streams {
        if let Some(player) = registry.engine().player(&format!("mock://stream-{}", i)) {
            player.spawn_decoder(320 + 160 * i as u32, 240, 60, Duration::from_millis(5));
        }
    }

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Restart stream 1 at a forced size
    let restarted = Arc::new(AtomicU64::new(0));
    {
        let restarted = Arc::clone(&restarted);
        let sink = Arc::new(move |frame: FrameView<'_>| -> Result<(), SinkError> {
            assert_eq!((frame.width(), frame.height()), (128, 72));
            restarted.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        registry.start("mock://stream-1", sink, 128, 72, &[]);
    }
    if let Some(player) = registry.engine().player("mock://stream-1") {
        player.spawn_decoder(1920, 1080, 20, Duration::from_millis(5));
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    for id in registry.stream_ids() {
        if let Some(info) = registry.session_info(&id) {
            println!(
                "{:<18} {:?} {}x{} delivered={} dropped={} failed={}",
                info.stream_id,
                info.phase,
                info.width,
                info.height,
                info.stats.frames_delivered,
                info.stats.deliveries_dropped,
                info.stats.deliveries_failed
            );
        }
    }
    println!("stream-1 after restart: {} frames", restarted.load(Ordering::Relaxed));

    registry.release_all();
    drop(channel);
    let received = consumer.await?;
    println!("[async] consumer received {} frames", received);

    Ok(())
}
