//! Example: Follow a simulated transport clock
//!
//! Usage: cargo run --example follow_clock <video_file>
//!
//! Loads a video and drives the playhead from a simulated rolling
//! transport clock for a few seconds, printing the frame index and
//! buffering state each tick. Rendering is out of scope here; the frame
//! returned by `current_frame()` is what a renderer would upload.

use std::env;
use std::path::Path;
use std::time::{Duration, Instant};

use lockstep_player::{
    init_logging, LogConfig, PlayerSettings, TransportSnapshot, VideoPlayer,
};

const SAMPLE_RATE: u32 = 48_000;

fn main() {
    let _guard = init_logging(&LogConfig::default()).expect("Failed to initialize logging");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <video_file>", args[0]);
        std::process::exit(1);
    }

    let video_path = Path::new(&args[1]);
    let settings = PlayerSettings::default();

    let player = match VideoPlayer::load_video(video_path, &settings) {
        Ok(player) => player,
        Err(e) => {
            eprintln!("Failed to load video: {e}");
            std::process::exit(1);
        }
    };

    println!(
        "Video: {}x{} @ {:.2}fps, {:.2}s ({} frames)",
        player.width(),
        player.height(),
        player.fps(),
        player.duration(),
        player.frame_count(),
    );

    // Simulate a rolling transport: the sample counter advances with wall
    // time, wrapping at the file duration like a looping timeline would.
    let loop_samples = (player.duration() * SAMPLE_RATE as f64) as u64;
    let started = Instant::now();

    while started.elapsed() < Duration::from_secs(5) {
        let elapsed_samples = (started.elapsed().as_secs_f64() * SAMPLE_RATE as f64) as u64;
        let clock = TransportSnapshot {
            rolling: true,
            frame: elapsed_samples % loop_samples.max(1),
            sample_rate: SAMPLE_RATE,
        };

        player.sync_to_transport(&clock);
        player.update();

        let frame = player.current_frame();
        println!(
            "frame {:>4}  buffered {:>3}  {}",
            player.current_frame_index(),
            player.buffered_frame_count(player.current_frame_index(), 150),
            if frame.is_some() { "ok" } else { "underrun" },
        );

        std::thread::sleep(Duration::from_millis(40));
    }

    let stats = player.metrics().snapshot();
    println!(
        "decoded {} frames, {} seeks, read hit rate {:.1}%",
        stats.frames_decoded,
        stats.seeks,
        stats.hit_rate() * 100.0,
    );
}
