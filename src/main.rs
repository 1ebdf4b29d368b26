//! dstat command line
//!
//! Without client flags the process becomes the server. With `-m` or `-d`
//! it delivers one message to the running server and exits.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::warn;

use dstat::client::{self, Intent};
use dstat::config::{self, Config, OverrideMode};
use dstat::display::{DisplaySink, RootWindow, StdoutSink};
use dstat::error::EXIT_FAILURE;
use dstat::logging::{self, LogConfig};
use dstat::metrics::ProcMetrics;
use dstat::server::{self, Server, MAX_OVERRIDE};
use dstat::Result;

#[derive(Parser, Debug)]
#[command(name = "dstat", version)]
#[command(about = "Status line daemon for the X root window", long_about = None)]
struct Cli {
    /// Print the status line once to stdout and exit
    #[arg(short, long)]
    stdout: bool,

    /// Show TEXT on the running server's status line
    #[arg(short, long, value_name = "TEXT", conflicts_with_all = ["die", "stdout"])]
    message: Option<String>,

    /// Seconds the message stays visible
    #[arg(short, long, value_name = "N", requires = "message")]
    idle: Option<u64>,

    /// Stop the running server
    #[arg(short, long, conflicts_with = "stdout")]
    die: bool,

    /// Where the server renders the status line
    #[arg(long, value_enum, default_value_t = SinkArg::Root, env = "DSTAT_SINK")]
    sink: SinkArg,

    /// Seconds between status refreshes
    #[arg(long, value_name = "SECS", value_parser = parse_interval, env = "DSTAT_INTERVAL")]
    interval: Option<Duration>,

    /// Progress bar width in characters
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..=100))]
    bar_width: Option<u16>,

    /// Mixer control queried with amixer
    #[arg(long, value_name = "NAME", env = "DSTAT_DEVICE")]
    device: Option<String>,

    /// Process whose presence lights the lock indicator
    #[arg(long, value_name = "NAME")]
    lock_process: Option<String>,

    /// File holding the sleep daemon status
    #[arg(long, value_name = "PATH")]
    sleep_file: Option<PathBuf>,

    /// Whether new messages may cut an override short
    #[arg(long, value_enum, default_value_t = OverrideModeArg::Blocking)]
    override_mode: OverrideModeArg,

    /// Directory for the pid file and the channel
    #[arg(long, value_name = "DIR", env = "DSTAT_RUNTIME_DIR")]
    runtime_dir: Option<PathBuf>,

    /// Append logs to PATH instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum SinkArg {
    /// X root window name via xsetroot
    Root,
    /// One line per update on stdout
    Stdout,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum OverrideModeArg {
    Blocking,
    Interruptible,
}

impl From<OverrideModeArg> for OverrideMode {
    fn from(mode: OverrideModeArg) -> Self {
        match mode {
            OverrideModeArg::Blocking => OverrideMode::Blocking,
            OverrideModeArg::Interruptible => OverrideMode::Interruptible,
        }
    }
}

fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be positive, got {}", s));
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(interval) if interval <= MAX_OVERRIDE => Ok(interval),
        _ => Err(format!(
            "interval must be at most {} seconds, got {}",
            MAX_OVERRIDE.as_secs(),
            s
        )),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // clap's own code 2 would read as "display dependency missing"
            process::exit(if e.use_stderr() { EXIT_FAILURE } else { 0 });
        }
    };

    let config = build_config(&cli);
    let client_mode = cli.message.is_some() || cli.die;

    let log_config = if client_mode || cli.stdout {
        LogConfig::client(cli.log_file.clone())
    } else {
        LogConfig::server(cli.log_file.clone())
    };
    if let Err(e) = logging::init_logging(log_config) {
        eprintln!("{}: {}", config.program_name, e);
    }

    let result = if let Some(text) = cli.message {
        client::send(
            &config,
            Intent::SendMessage {
                text,
                delay: cli.idle,
            },
        )
    } else if cli.die {
        client::send(&config, Intent::SendTerminate)
    } else if cli.stdout {
        let provider = ProcMetrics::new(&config.proc_root, &config.volume_device);
        server::render_once(&config, provider, StdoutSink)
    } else {
        run_server(config.clone(), cli.sink)
    };

    if let Err(e) = result {
        eprintln!("{}: {}", config.program_name, e);
        process::exit(e.exit_code());
    }
}

fn build_config(cli: &Cli) -> Config {
    let argv0 = std::env::args_os().next();
    let name = config::program_name_from(argv0.as_deref().map(Path::new));
    let runtime_dir = cli.runtime_dir.clone().unwrap_or_else(std::env::temp_dir);

    let mut config = Config::new(&name, runtime_dir);
    if let Some(interval) = cli.interval {
        config = config.with_tick_interval(interval);
    }
    if let Some(width) = cli.bar_width {
        config.bar_width = usize::from(width);
    }
    if let Some(device) = &cli.device {
        config.volume_device = device.clone();
    }
    if let Some(process) = &cli.lock_process {
        config.lock_process = process.clone();
    }
    if let Some(path) = &cli.sleep_file {
        config.sleep_status_file = path.clone();
    }
    config.override_mode = cli.override_mode.into();
    config
}

fn run_server(config: Config, sink: SinkArg) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    // SIGINT, SIGTERM and SIGHUP all end up on the same cleanup path
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Cannot install signal handler: {}", e);
    }

    let provider = ProcMetrics::new(&config.proc_root, &config.volume_device);
    let sink: Box<dyn DisplaySink> = match sink {
        SinkArg::Root => Box::new(RootWindow::new()),
        SinkArg::Stdout => Box::new(StdoutSink),
    };

    Server::start(config, provider, sink, shutdown)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_idle_requires_message() {
        assert!(Cli::try_parse_from(["dstat", "-i", "3"]).is_err());
        let cli = Cli::try_parse_from(["dstat", "-m", "hello", "-i", "3"]).unwrap();
        assert_eq!(cli.message.as_deref(), Some("hello"));
        assert_eq!(cli.idle, Some(3));
    }

    #[test]
    fn test_message_conflicts_with_die() {
        assert!(Cli::try_parse_from(["dstat", "-m", "x", "-d"]).is_err());
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert_eq!(parse_interval("0.5"), Ok(Duration::from_millis(500)));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("fast").is_err());
        assert!(parse_interval("1e19").is_err());
        assert!(parse_interval("1e30").is_err());
        assert_eq!(parse_interval("86400"), Ok(MAX_OVERRIDE));
        assert!(Cli::try_parse_from(["dstat", "--interval", "1e30"]).is_err());
    }
}
