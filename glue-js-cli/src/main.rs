use clap::{Args, Parser, Subcommand};
use glue_js::{ConsoleMessage, GlueStats};
use glue_js_cli::{RunConfig, Runtime};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Run WebAssembly modules against the glue-js value bridge")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Instantiate a module, run its `main`, then drive its frame loop.
  Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
  /// Module to run (`.wasm` or `.wat`).
  module: PathBuf,

  /// Stop after this many frames.
  #[arg(long)]
  frames: Option<u64>,

  /// Target frame rate; 0 runs frames back to back.
  #[arg(long)]
  fps: Option<f64>,

  /// Value table slots allocated up front.
  #[arg(long)]
  initial_capacity: Option<u32>,

  /// Upper bound on value table slots.
  #[arg(long)]
  max_slots: Option<u32>,

  /// JSON run configuration; flags take precedence.
  #[arg(long)]
  config: Option<PathBuf>,

  /// Print the run report as JSON.
  #[arg(long)]
  json: bool,

  /// Emit tracing spans (JSON) for debugging.
  #[arg(long)]
  trace: bool,
}

#[derive(Serialize)]
struct RunReport {
  frames: u64,
  stats: GlueStats,
  console: Vec<ConsoleMessage>,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  match cli.command {
    Commands::Run(args) => run(args),
  }
}

fn run(args: RunArgs) -> ExitCode {
  init_tracing(args.trace);

  let mut config = match &args.config {
    Some(path) => match RunConfig::load(path) {
      Ok(config) => config,
      Err(err) => {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
      }
    },
    None => RunConfig::default(),
  };
  if args.frames.is_some() {
    config.frames = args.frames;
  }
  if let Some(fps) = args.fps {
    config.fps = fps;
  }
  if let Some(initial_capacity) = args.initial_capacity {
    config.glue.initial_capacity = initial_capacity;
  }
  if args.max_slots.is_some() {
    config.glue.max_slots = args.max_slots;
  }

  let mut runtime = match Runtime::from_file(&args.module, config.glue) {
    Ok(runtime) => runtime,
    Err(err) => {
      eprintln!("{err:#}");
      return ExitCode::FAILURE;
    }
  };

  let frames = runtime
    .run_main()
    .and_then(|()| runtime.run_frames(config.frames, config.frame_interval()));
  let frames = match frames {
    Ok(frames) => frames,
    Err(err) => {
      eprintln!("error: {err:#}");
      return ExitCode::FAILURE;
    }
  };

  let report = RunReport {
    frames,
    stats: runtime.stats(),
    console: runtime.glue().console().messages(),
  };
  if args.json {
    match serde_json::to_string_pretty(&report) {
      Ok(json) => println!("{json}"),
      Err(err) => {
        eprintln!("failed to serialize report: {err}");
        return ExitCode::FAILURE;
      }
    }
  } else {
    for message in &report.console {
      println!("{}", message.text);
    }
    let table = report.stats.table;
    println!(
      "frames: {}  slots: {} live / {} capacity  memory revalidations: {}",
      report.frames, table.live, table.capacity, report.stats.memory_revalidations
    );
  }
  ExitCode::SUCCESS
}

fn init_tracing(trace: bool) {
  if trace {
    let _ = tracing_subscriber::fmt()
      .with_span_events(FmtSpan::CLOSE)
      .with_max_level(Level::TRACE)
      .json()
      .with_ansi(false)
      .with_writer(std::io::stderr)
      .try_init();
    return;
  }
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}
