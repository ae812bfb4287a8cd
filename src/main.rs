use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use fullcap::config::{ViewerConfig, write_sample_config};
use fullcap::device::Device;
use fullcap::headless::HeadlessPlatform;
use fullcap::interaction::{ClickTarget, InputEvent, Key};
use fullcap::orchestrator::LoadingEvent;
use fullcap::platform::OriginKind;
use fullcap::presenter::TerminalPresenter;
use fullcap::viewer::Viewer;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const COMMAND_HELP: &str = "move | leave | up | down | left | right | enter | space | esc | f | \
                            select | fullscreen | outside | modal | item N | quit";

#[derive(Debug, Parser)]
#[command(name = "fullcap")]
#[command(version)]
#[command(about = "Full-screen capture card viewer, simulated against a scripted platform")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the startup sequence, optionally followed by interactive input
    Run(RunArgs),
    /// Print the effective configuration or write a sample file
    Config(ConfigArgs),
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device label to expose; repeat for several devices
    #[arg(long = "device", default_value = "USB Video Capture")]
    devices: Vec<String>,

    /// Enumeration attempt on which device labels first appear
    #[arg(long)]
    labels_after: Option<u32>,

    /// Host the viewer from a local file, which withholds device labels
    #[arg(long, action = ArgAction::SetTrue)]
    insecure: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    deny_fullscreen: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    no_fullscreen_api: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    interactive: bool,
}

#[derive(Debug, Args, Clone)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    write_sample: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("fullcap={level}")
                    .parse()
                    .context("invalid log directive")?,
            ),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => run_viewer(args).await,
        Commands::Config(args) => show_config(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::load(path),
        None => Ok(ViewerConfig::default()),
    }
}

fn show_config(args: ConfigArgs) -> Result<()> {
    if let Some(path) = args.write_sample {
        write_sample_config(&path)?;
        println!("sample config at {}", path.display());
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn build_platform(args: &RunArgs) -> HeadlessPlatform {
    let devices: Vec<Device> = args
        .devices
        .iter()
        .enumerate()
        .map(|(index, label)| Device::video_input(format!("device-{}", index + 1), label.clone()))
        .collect();
    let labels_after = args.labels_after;
    let deny_fullscreen = args.deny_fullscreen;
    let no_fullscreen_api = args.no_fullscreen_api;

    HeadlessPlatform::builder()
        .devices(move |scripted| match labels_after {
            Some(attempt) => scripted.with_labels_from_attempt(devices, attempt),
            None => scripted.with_devices(devices),
        })
        .fullscreen(move |fullscreen| {
            let fullscreen = if deny_fullscreen {
                fullscreen.rejecting()
            } else {
                fullscreen
            };
            if no_fullscreen_api {
                fullscreen.unsupported()
            } else {
                fullscreen
            }
        })
        .origin(if args.insecure {
            OriginKind::LocalFile
        } else {
            OriginKind::Secure
        })
        .build()
}

async fn run_viewer(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let headless = build_platform(&args);
    let mut viewer = Viewer::new(config, headless.platform(), Arc::new(TerminalPresenter))
        .context("failed to initialize viewer")?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let event_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                LoadingEvent::StageFailed { index, message } => {
                    eprintln!("stage #{index} failed: {message}")
                }
                LoadingEvent::Fatal { index, message } => {
                    eprintln!("stage #{index} halted startup: {message}")
                }
                LoadingEvent::Ready => println!("viewer ready"),
                LoadingEvent::StageStarted { .. }
                | LoadingEvent::StageCompleted { .. }
                | LoadingEvent::StageSkipped { .. } => {}
            }
        }
    });

    let summary = viewer.start(Some(event_tx)).await;
    event_handle.await.context("event task failed")?;

    if summary.fatal {
        anyhow::bail!(
            "startup halted after {} stages; no capture device could be resolved",
            summary.completed
        );
    }
    if summary.failed > 0 {
        eprintln!("startup finished with {} failed stages", summary.failed);
    }

    if args.interactive {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            eprintln!("interactive controls: {COMMAND_HELP}");
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(Command::Input(event))) => {
                        if input_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(Some(Command::Quit)) => break,
                    Ok(None) => {}
                    Err(message) => eprintln!("{message}. use: {COMMAND_HELP}"),
                }
            }
        });
        viewer.run_interaction(input_rx).await;
    }

    viewer.shutdown();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Input(InputEvent),
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let line = line.trim().to_ascii_lowercase();
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let event = match head {
        "move" => InputEvent::PointerMove,
        "leave" => InputEvent::PointerLeave,
        "up" => InputEvent::Key(Key::ArrowUp),
        "down" => InputEvent::Key(Key::ArrowDown),
        "left" => InputEvent::Key(Key::ArrowLeft),
        "right" => InputEvent::Key(Key::ArrowRight),
        "enter" => InputEvent::Key(Key::Enter),
        "space" => InputEvent::Key(Key::Space),
        "esc" | "escape" => InputEvent::Key(Key::Escape),
        "f" => InputEvent::Key(Key::Char('f')),
        "select" => InputEvent::Click(ClickTarget::DeviceSelector),
        "fullscreen" => InputEvent::Click(ClickTarget::FullscreenButton),
        "outside" => InputEvent::Click(ClickTarget::Outside),
        "modal" => InputEvent::Click(ClickTarget::ModalButton),
        "item" => {
            let index = words
                .next()
                .ok_or_else(|| "item needs an index".to_string())?
                .parse::<usize>()
                .map_err(|e| format!("invalid item index: {e}"))?;
            InputEvent::Click(ClickTarget::DropdownItem(index))
        }
        "quit" | "exit" => return Ok(Some(Command::Quit)),
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(Command::Input(event)))
}
