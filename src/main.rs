//! Spacetime slicer CLI - play and export re-sliced animations.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use clap::Parser;
use crossbeam_channel::{Receiver, at, never, select};
use log::{info, warn};

use spacetime_slicer::{
    animation::{
        Command, ExportJob, ExportStage, FrameView, Outcome, PlaybackController, PlaybackError,
        PlaybackState, RecorderConfig, Renderer, open_source,
    },
    schema::{ViewMode, ViewerConfig, is_valid_rate},
};

/// Replay a video or animated image along any pair of its space-time axes.
#[derive(Parser, Debug)]
#[command(name = "spacetime-slicer", version, about)]
struct Args {
    /// Video or animated image to load
    #[arg(required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// View mode: x-y-t, y-t-x or t-x-y
    #[arg(long)]
    view: Option<ViewMode>,

    /// Slice along the fixed axis of the view
    #[arg(long)]
    index: Option<usize>,

    /// Playback rate (frames/second); defaults to the source's own rate
    #[arg(long)]
    fps: Option<f32>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Export the selected view to this GIF and exit
    #[arg(long)]
    export: Option<PathBuf>,

    /// Export rate; defaults to the playback rate
    #[arg(long, requires = "export")]
    export_fps: Option<f32>,

    /// Play this many ticks without reading stdin, then exit
    #[arg(long)]
    ticks: Option<u64>,

    /// Do not start playing after loading
    #[arg(long)]
    paused: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

/// Single status line on stderr, redrawn for every frame.
struct StatusLine;

impl Renderer for StatusLine {
    fn present(&mut self, view: FrameView<'_>) {
        let shape = view.frame.shape();
        let mut err = io::stderr().lock();
        // A closed stderr only loses the status line.
        let _ = write!(
            err,
            "\r{} [{}/{}] {} {:>3.0}%   ",
            view.mode.frame_title(view.index),
            view.index + 1,
            view.len,
            shape,
            view.plane_position * 100.0
        );
        let _ = err.flush();
    }
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path),
        None => ViewerConfig::default(),
    };
    if let Some(view) = args.view {
        config.playback.default_view = view;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if args.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing config: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // clap enforces the input unless --print-config was given
    let Some(input) = args.input.clone() else {
        eprintln!("No input given");
        std::process::exit(2);
    };

    let autoplay = config.playback.autoplay && !args.paused;
    let mut player = PlaybackController::new(config, Box::new(StatusLine));
    if let Err(e) = setup(&mut player, &input, &args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Some(dest) = &args.export {
        let fps = args
            .export_fps
            .unwrap_or_else(|| player.default_export_rate());
        match player.request_export(fps, dest) {
            Ok(stats) => println!("Exported {}", stats),
            Err(e) => {
                eprintln!("Export failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if autoplay {
        player.play();
    }
    player.refresh();

    match args.ticks {
        Some(ticks) => run_headless(&mut player, ticks),
        None => run_interactive(&mut player),
    }
    eprintln!();
}

fn load_config(path: &Path) -> ViewerConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

/// Load `input` and apply the rate and slice given on the command line.
fn setup(
    player: &mut PlaybackController,
    input: &Path,
    args: &Args,
) -> Result<(), PlaybackError> {
    let mut source = open_source(input, &player.config().playback)?;
    let start = Instant::now();
    player.load_from(source.as_mut())?;

    if let Some(volume) = player.volume() {
        println!("Spacetime Slicer");
        println!("================");
        println!("Source: {}", input.display());
        println!(
            "Volume: {} frames of {}",
            volume.time(),
            volume.frame_shape()
        );
        println!("Loaded in {:.2}s", start.elapsed().as_secs_f32());
    }

    if let Some(fps) = args.fps {
        player.set_frame_rate(fps)?;
    }
    if let Some(index) = args.index {
        player.set_fixed_index(index)?;
    }

    if let Some(mode) = player.view_mode() {
        println!("View: {} at {:.1} FPS", mode, player.frame_rate());
    }
    Ok(())
}

fn run_headless(player: &mut PlaybackController, ticks: u64) {
    for _ in 0..ticks {
        thread::sleep(player.interval());
        player.tick();
    }
}

/// Read commands from stdin on a separate thread.
fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("\n{}", e),
            }
        }
    });
    rx
}

fn run_interactive(player: &mut PlaybackController) {
    let commands = spawn_stdin_reader();
    let mut job: Option<ExportJob> = None;
    let mut next_tick = Instant::now() + player.interval();

    loop {
        let timer = if player.state() == PlaybackState::Playing {
            at(next_tick)
        } else {
            never()
        };
        let progress = job
            .as_ref()
            .map(|j| j.progress().clone())
            .unwrap_or_else(never);

        select! {
            recv(commands) -> msg => {
                let Ok(command) = msg else { break };
                let resets_timer = matches!(
                    command,
                    Command::SetFrameRate(_) | Command::Play | Command::Toggle
                );
                if !apply(player, &mut job, command) {
                    break;
                }
                if resets_timer {
                    next_tick = Instant::now() + player.interval();
                }
            }
            recv(timer) -> _ => {
                player.tick();
                next_tick += player.interval();
                let now = Instant::now();
                if next_tick < now {
                    next_tick = now + player.interval();
                }
            }
            recv(progress) -> msg => match msg {
                Ok(p) if p.stage == ExportStage::Encoding => {
                    info!("Exporting frame {}/{}", p.current_frame, p.total_frames);
                }
                Ok(_) => {}
                Err(_) => {
                    if let Some(finished) = job.take() {
                        report_export(finished);
                    }
                }
            },
        }
    }

    if let Some(running) = job.take() {
        eprintln!("\nWaiting for export to finish...");
        report_export(running);
    }
}

/// Apply one command; returns `false` when the loop should stop.
fn apply(player: &mut PlaybackController, job: &mut Option<ExportJob>, command: Command) -> bool {
    match command {
        Command::Export { fps, path } => {
            if job.is_some() {
                warn!("An export is already running");
                return true;
            }
            match start_export(player, fps, path) {
                Ok(started) => *job = Some(started),
                Err(e) => eprintln!("\nExport failed: {}", e),
            }
        }
        Command::CancelExport => match job {
            Some(running) => running.cancel(),
            None => eprintln!("\nNo export running"),
        },
        other => match player.handle(other) {
            Ok(Outcome::Quit) => return false,
            Ok(_) => player.refresh(),
            Err(e) => eprintln!("\nError: {}", e),
        },
    }
    true
}

/// Snapshot the current view and encode it on a background thread.
fn start_export(
    player: &PlaybackController,
    fps: Option<f32>,
    path: Option<PathBuf>,
) -> Result<ExportJob, PlaybackError> {
    let fps = fps.unwrap_or_else(|| player.default_export_rate());
    if !is_valid_rate(fps) {
        return Err(PlaybackError::InvalidRate(fps));
    }
    let snapshot = player.export_snapshot()?;
    let destination = match path {
        Some(p) => p,
        None => player.default_export_path(fps)?,
    };
    info!("Exporting to {}", destination.display());
    Ok(ExportJob::spawn(
        RecorderConfig::from(&player.config().export),
        snapshot,
        fps,
        destination,
    ))
}

fn report_export(job: ExportJob) {
    match job.join() {
        Ok(stats) => eprintln!("\nExported {}", stats),
        Err(e) => eprintln!("\nExport failed: {}", e),
    }
}
