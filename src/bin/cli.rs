//! Cosmic Explorer soundtrack CLI: live playback and WAV export.
//!
//! Usage:
//!   ce-cli tracks
//!   ce-cli play combat --seconds 30
//!   ce-cli render danger --out danger.wav --seconds 60
//!   ce-cli scenario --step 10:100:combat --step 25:20 --out run.wav

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ce_engine::EngineConfig;
use ce_master::{Controller, Rendered, ScenarioStep};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;

#[derive(Parser)]
#[command(name = "ce-cli", about = "Adaptive procedural soundtrack for Cosmic Explorer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the track catalogue
    Tracks,
    /// Play a track on the default output device
    Play {
        #[arg(default_value = "exploration")]
        track: String,
        /// Stop after this many seconds (runs until killed if omitted)
        #[arg(long)]
        seconds: Option<f64>,
        #[arg(long, default_value_t = 0.5)]
        volume: f32,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Render a track offline to a WAV file
    Render {
        track: String,
        #[arg(long, short)]
        out: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Render a scripted sequence of game states to a WAV file
    Scenario {
        /// SECONDS:HEALTH[:pod|repair|combat], repeatable
        #[arg(long = "step", required = true)]
        steps: Vec<ScenarioStep>,
        #[arg(long, short)]
        out: PathBuf,
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Offline render sample rate (live playback uses the device rate)
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    /// Fix the random seed for repeatable output
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 5.0)]
    reverb_seconds: f32,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        let config = EngineConfig::default()
            .with_sample_rate(self.sample_rate)
            .with_reverb_seconds(self.reverb_seconds);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Tracks => list_tracks(),
        Command::Play { track, seconds, volume, engine } => {
            play_audio(engine.config(), &track, seconds, volume)
        }
        Command::Render { track, out, seconds, engine } => {
            let rendered = ce_master::render_track(engine.config(), &track, seconds);
            write_rendered(rendered, &out);
        }
        Command::Scenario { steps, out, seconds, engine } => {
            let rendered = ce_master::render_scenario(engine.config(), &steps, seconds);
            write_rendered(rendered, &out);
        }
    }
}

fn list_tracks() {
    for track in ce_ir::tracks() {
        println!(
            "{:<12} {:<26} {:<11} {} layers",
            track.key,
            track.title,
            track.mood.name(),
            track.layers.len()
        );
    }
}

fn play_audio(config: EngineConfig, track: &str, seconds: Option<f64>, volume: f32) {
    if ce_ir::track(track).is_none() {
        eprintln!("Unknown track {:?}; try `ce-cli tracks`", track);
        std::process::exit(1);
    }

    let mut ctrl = Controller::new(config);
    ctrl.set_music_volume(volume);
    if let Err(e) = ctrl.start() {
        eprintln!("Failed to start audio: {}", e);
        std::process::exit(1);
    }
    ctrl.play(track);
    println!("Playing {}...", track);
    println!();

    let started = Instant::now();
    let limit = seconds.map(Duration::from_secs_f64);
    while limit.map_or(true, |l| started.elapsed() < l) {
        if let Some(snapshot) = ctrl.poll() {
            print!(
                "\r{:<12} | layers {:>2} | {}",
                snapshot.info.name,
                snapshot.info.active_layer_count,
                spectrum_bar(&snapshot.bins)
            );
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    ctrl.stop();
    // let the fade-out play
    std::thread::sleep(Duration::from_secs(2));
    ctrl.shutdown();
    println!("\rDone.{:<60}", "");
}

/// Coarse text meter: 16 bands, one glyph each.
fn spectrum_bar(bins: &[u8]) -> String {
    const GLYPHS: [char; 8] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇'];
    bins.chunks(bins.len().div_ceil(16).max(1))
        .map(|band| {
            let level = band.iter().map(|b| *b as usize).max().unwrap_or(0);
            GLYPHS[level * GLYPHS.len() / 256]
        })
        .collect()
}

fn write_rendered(rendered: Result<Rendered, ce_master::ControllerError>, path: &Path) {
    let rendered = rendered.unwrap_or_else(|e| {
        eprintln!("Render failed: {}", e);
        std::process::exit(1);
    });
    for (at, track) in &rendered.track_changes {
        println!("{:>7.1}s  {}", at, track);
    }

    let wav = rendered.to_wav().unwrap_or_else(|e| {
        eprintln!("Failed to encode WAV: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = std::fs::write(path, &wav) {
        eprintln!("Failed to write {}: {}", path.display(), e);
        std::process::exit(1);
    }

    let seconds = rendered.frames.len() as f64 / rendered.sample_rate as f64;
    println!(
        "Wrote {} ({:.1}s at {} Hz, {} bytes, peak {:.3})",
        path.display(),
        seconds,
        rendered.sample_rate,
        wav.len(),
        rendered.peak()
    );
}
