//! Headless sketchwire client.
//!
//! `watch` joins a room and keeps a PNG of the shared canvas up to date;
//! `replay` renders a recorded message journal.

use clap::{Parser, Subcommand};
use kurbo::{Point, Size};
use sketchwire_app::{Board, BoardResult, replay_journal};
use sketchwire_core::{CoordinateMapper, NativeWebSocket, Notification, Rgb};
use sketchwire_render::{FillTolerance, RenderConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

/// Roughly one display frame.
const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Canvas background color.
    #[arg(long, default_value = "#ffffff")]
    background: Rgb,
    /// Disable anti-aliasing of stroke edges.
    #[arg(long)]
    no_anti_alias: bool,
    /// Fill only pixels that exactly match the seed color.
    #[arg(long)]
    exact_fill: bool,
}

impl RenderArgs {
    fn config(&self) -> RenderConfig {
        let mut config = RenderConfig::default()
            .with_background(self.background)
            .with_anti_alias(!self.no_anti_alias);
        if self.exact_fill {
            config = config.with_fill_tolerance(FillTolerance::EXACT);
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    /// Connect to a relay and mirror the canvas into a PNG file.
    Watch {
        #[arg(long, default_value = "ws://127.0.0.1:3030/ws/lobby")]
        url: String,
        #[arg(long, default_value = "canvas.png")]
        out: PathBuf,
        /// Displayed canvas width in CSS pixels.
        #[arg(long, default_value_t = 400.0)]
        width: f64,
        #[arg(long, default_value_t = 300.0)]
        height: f64,
        /// Stop after this many seconds (runs until disconnect if omitted).
        #[arg(long)]
        seconds: Option<u64>,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Render a JSON-lines message journal to a PNG file.
    Replay {
        journal: PathBuf,
        #[arg(long, default_value = "canvas.png")]
        out: PathBuf,
        #[arg(long, default_value_t = 400.0)]
        width: f64,
        #[arg(long, default_value_t = 300.0)]
        height: f64,
        #[command(flatten)]
        render: RenderArgs,
    },
}

fn mapper(width: f64, height: f64) -> CoordinateMapper {
    CoordinateMapper::new(Point::ORIGIN, Size::new(width, height))
}

fn watch(
    url: &str,
    out: PathBuf,
    mapper: CoordinateMapper,
    config: RenderConfig,
    seconds: Option<u64>,
) -> BoardResult<()> {
    let mut board = Board::new(NativeWebSocket::new(), mapper, config)?;
    board.connect(url)?;

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let mut written = None;
    loop {
        board.pump();
        if written != Some(board.revision()) {
            board.export_png(&out)?;
            written = Some(board.revision());
        }

        let mut done = false;
        for notification in board.take_notifications() {
            match notification {
                Notification::Disconnected => done = true,
                Notification::ConnectionError(message) => {
                    log::error!("connection error: {message}");
                    done = true;
                }
                Notification::ServerError(message) => log::warn!("server: {message}"),
                Notification::Connected | Notification::Reconnected => {}
            }
        }
        if done || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(FRAME);
    }

    board.disconnect();
    log::info!("{} elements at exit", board.state().len());
    Ok(())
}

fn replay(
    journal: PathBuf,
    out: PathBuf,
    mapper: CoordinateMapper,
    config: RenderConfig,
) -> BoardResult<()> {
    let text = std::fs::read_to_string(&journal)?;
    let board = replay_journal(&text, mapper, config)?;
    board.export_png(&out)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Command::Watch {
            url,
            out,
            width,
            height,
            seconds,
            render,
        } => watch(&url, out, mapper(width, height), render.config(), seconds),
        Command::Replay {
            journal,
            out,
            width,
            height,
            render,
        } => replay(journal, out, mapper(width, height), render.config()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_flags_build_config() {
        let args = Args::try_parse_from([
            "sketchwire",
            "replay",
            "log.jsonl",
            "--background",
            "#102030",
            "--no-anti-alias",
            "--exact-fill",
        ])
        .unwrap();
        let Command::Replay { render, .. } = args.command else {
            panic!("expected replay");
        };
        let config = render.config();
        assert_eq!(config.background, Rgb::new(0x10, 0x20, 0x30));
        assert!(!config.anti_alias);
        assert_eq!(config.fill_tolerance, FillTolerance::EXACT);
    }

    #[test]
    fn test_render_defaults() {
        let args = Args::try_parse_from(["sketchwire", "watch"]).unwrap();
        let Command::Watch { render, .. } = args.command else {
            panic!("expected watch");
        };
        let config = render.config();
        assert_eq!(config.background, Rgb::WHITE);
        assert!(config.anti_alias);
        assert_eq!(config.fill_tolerance, FillTolerance::default());
    }
}
