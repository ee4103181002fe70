/// Replays a recorded viewer session and prints the result (native builds)
#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use std::path::PathBuf;
    use std::process::ExitCode;

    use clap::Parser;
    use labelview::config::{AppConfig, LogLevel};
    use labelview::session::{self, SessionError, SessionScript};
    use labelview::viewer::ViewerConfig;

    #[derive(Parser)]
    #[command(name = "labelview-replay", about = "Replay a label viewer session")]
    #[command(version)]
    struct Cli {
        /// Session script (JSON)
        session: PathBuf,

        /// Configuration file; defaults to the user config directory
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured log level
        #[arg(short, long, value_enum)]
        log_level: Option<CliLogLevel>,

        /// Write the effective configuration to the default config path
        #[arg(long)]
        save_config: bool,
    }

    #[derive(Clone, Copy, clap::ValueEnum)]
    enum CliLogLevel {
        Error,
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl From<CliLogLevel> for LogLevel {
        fn from(level: CliLogLevel) -> Self {
            match level {
                CliLogLevel::Error => LogLevel::Error,
                CliLogLevel::Warn => LogLevel::Warn,
                CliLogLevel::Info => LogLevel::Info,
                CliLogLevel::Debug => LogLevel::Debug,
                CliLogLevel::Trace => LogLevel::Trace,
            }
        }
    }

    fn run(path: &std::path::Path, config: &AppConfig) -> Result<String, SessionError> {
        let script = SessionScript::load(path)?;
        let report = session::replay(&script, ViewerConfig::from(config))?;
        Ok(serde_json::to_string_pretty(&report)?)
    }

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match AppConfig::load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::load_from_default_path().unwrap_or_default(),
    };

    // A level given on the command line overrides the configured one
    let level = cli
        .log_level
        .map(LogLevel::from)
        .unwrap_or(config.preferences.log_level);
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();

    if cli.save_config {
        match config.save_to_default_path() {
            Ok(path) => eprintln!("Configuration saved to {}", path.display()),
            Err(e) => {
                eprintln!("Config error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    match run(&cli.session, &config) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Replay error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// WASM hosts drive the library directly
#[cfg(target_arch = "wasm32")]
fn main() {}
