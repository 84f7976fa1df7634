mod capture;
mod display;
mod keys;

use anyhow::{Context, Result};
use blobwatch::{Command, DetectionMode, FilePlayback, LiveCapture, Session, VideoSource};
use capture::{OpenCvDecoder, OpenCvGrabber};
use clap::{Parser, ValueEnum};
use display::{Status, WINDOW};
use keys::Action;
use opencv::highgui;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Live camera (`webcam.*` settings)
    Webcam,
    /// Recorded file (`player.filename` setting)
    Player,
}

#[derive(Parser)]
#[command(
    name = "blobwatch_cam",
    version,
    about = "Real-time motion and color-blob detector",
    long_about = None
)]
struct Cli {
    /// Settings document; created on save if missing
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Where frames come from
    #[arg(long, value_enum, default_value_t = SourceKind::Webcam)]
    source: SourceKind,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Stop at the end of the recording instead of looping
    #[arg(long)]
    no_loop: bool,
}

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // --- 1. Source Selection ---
    let source: Box<dyn VideoSource> = match cli.source {
        SourceKind::Webcam => Box::new(LiveCapture::new(OpenCvGrabber::default())),
        SourceKind::Player => {
            let mut player = FilePlayback::new(OpenCvDecoder::default());
            player.set_looping(!cli.no_loop);
            Box::new(player)
        }
    };

    // --- 2. Session Startup ---
    let mut session = Session::open(source, &cli.settings)
        .with_context(|| format!("failed to start with settings {}", cli.settings.display()))?;

    // --- 3. Main Loop ---
    let outcome = if cli.headless {
        run_headless(&mut session)
    } else {
        run_window(&mut session)
    };

    session.close();
    outcome
}

fn run_headless(session: &mut Session<Box<dyn VideoSource>>) -> Result<()> {
    info!("Running headless");
    while !session.source().is_finished() {
        session.tick().context("tick failed")?;
    }
    info!("Recording finished");
    Ok(())
}

fn run_window(session: &mut Session<Box<dyn VideoSource>>) -> Result<()> {
    highgui::named_window(WINDOW, highgui::WINDOW_AUTOSIZE)?;

    let clicks: Arc<Mutex<Option<(i32, i32)>>> = Arc::new(Mutex::new(None));
    let pending = Arc::clone(&clicks);
    highgui::set_mouse_callback(
        WINDOW,
        Some(Box::new(move |event, x, y, _flags| {
            if event == highgui::EVENT_LBUTTONDOWN {
                *pending.lock() = Some((x, y));
            }
        })),
    )?;

    loop {
        session.tick().context("tick failed")?;

        // --- Preview ---
        let frame = session.source().frame();
        if !frame.is_empty() {
            let status = Status {
                params: session.parameters().params(),
                sink: session.sink(),
                paused: session.source().is_paused(),
            };
            let canvas = display::render(&frame.image, session.pipeline(), &status, keys::HELP)?;
            highgui::imshow(WINDOW, &canvas)?;
        }

        // --- Input ---
        let key = keys::decode_key(highgui::wait_key(1)?);
        match key.and_then(keys::action_for_key) {
            Some(Action::Quit) => break,
            Some(Action::Run(command)) => apply(session, command),
            None => {}
        }

        let click = clicks.lock().take();
        if let Some((x, y)) = click {
            if session.parameters().params().mode == DetectionMode::Color && x >= 0 && y >= 0 {
                apply(session, Command::PickColor { x: x as u32, y: y as u32 });
            }
        }
    }

    highgui::destroy_all_windows()?;
    Ok(())
}

/// Commands that fail (a save to a read-only directory, say) are reported and the
/// session carries on.
fn apply(session: &mut Session<Box<dyn VideoSource>>, command: Command) {
    if let Err(err) = session.apply(command) {
        warn!(?command, %err, "command failed");
    }
}
