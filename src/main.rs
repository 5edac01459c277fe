use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dlguard::config::{default_config_path, Config, LogFormat, Overrides};
use dlguard::{AgentConfig, AgentController, Pipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dlguard", version)]
#[command(about = "Downloads folder guard - quarantines risky new files")]
#[command(long_about = r#"
Watches your downloads directory. Every new file is given time to finish
writing, then scored on its extension, name and size. Files that reach the
threshold are moved into a quarantine directory. Every decision is appended
to a JSON-lines audit log.
"#)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Quarantine threshold (overrides file and DLGUARD_THRESHOLD)
    #[arg(long, global = true)]
    threshold: Option<u32>,

    /// Directory to watch
    #[arg(long, global = true)]
    watch_dir: Option<PathBuf>,

    /// Root for quarantine and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch until Ctrl+C (default)
    Run,
    /// Score one file and print the decision; nothing is moved or logged
    Scan {
        path: PathBuf,
    },
    /// Show the most recent quarantine records
    Recent {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Print resolved paths and settings
    Paths,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            threshold: self.threshold,
            watch_dir: self.watch_dir.clone(),
            data_dir: self.data_dir.clone(),
        }
    }
}

/// Read the config file. An explicit `--config` must parse; the default
/// location falls back to defaults with a warning.
fn load_config(args: &Args) -> Result<(Config, PathBuf, Option<String>)> {
    match &args.config {
        Some(path) => {
            let config = Config::load_or_default(path)?;
            Ok((config, path.clone(), None))
        }
        None => {
            let path = default_config_path();
            match Config::load_or_default(&path) {
                Ok(config) => Ok((config, path, None)),
                Err(e) => Ok((Config::default(), path, Some(format!("{:#}", e)))),
            }
        }
    }
}

fn init_tracing(args: &Args, config: &Config) {
    let level = match args.verbose {
        0 => config.general.log_level.parse().unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if args.json || config.general.log_format == LogFormat::Json {
        subscriber.json().init();
    } else {
        subscriber.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_path, config_warning) = load_config(&args)?;
    init_tracing(&args, &config);
    if let Some(warning) = config_warning {
        warn!("Ignoring config file, using defaults: {}", warning);
    }

    let agent_config = config
        .resolve(&args.overrides())
        .context("Failed to resolve configuration")?;

    match args.command {
        None | Some(Command::Run) => run(agent_config, config_path, args.overrides()).await,
        Some(Command::Scan { ref path }) => scan(agent_config, path),
        Some(Command::Recent { count }) => recent(agent_config, count),
        Some(Command::Paths) => paths(&agent_config, &config_path),
    }
}

async fn run(agent_config: AgentConfig, config_path: PathBuf, overrides: Overrides) -> Result<()> {
    info!("Config: {}", config_path.display());
    info!("Watching: {}", agent_config.watch_dir.display());
    info!("Quarantine: {}", agent_config.quarantine_dir.display());
    info!("Audit log: {}", agent_config.log_path.display());
    info!("Threshold: {}", agent_config.threshold);

    let mut controller = AgentController::new(agent_config);
    controller.start().context("Failed to start agent")?;

    info!("dlguard running. Press Ctrl+C to stop.");

    wait_for_shutdown(&mut controller, &config_path, &overrides).await?;

    info!("Shutting down...");
    tokio::task::block_in_place(|| controller.stop()).context("Failed to stop agent")?;
    info!("dlguard stopped.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(
    controller: &mut AgentController,
    config_path: &Path,
    overrides: &Overrides,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(sig) => Some(sig),
        Err(e) => {
            error!("Failed to set up SIGHUP handler: {}", e);
            None
        }
    };

    loop {
        let reload = async {
            match hangup.as_mut() {
                Some(sig) => sig.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                return Ok(());
            }
            _ = reload => {
                info!("Received SIGHUP, reloading config...");
                tokio::task::block_in_place(|| reload_controller(controller, config_path, overrides));
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(
    _controller: &mut AgentController,
    _config_path: &Path,
    _overrides: &Overrides,
) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Swap in a controller built from the re-read config. On any failure the
/// current controller is kept (and restarted if it had been stopped).
#[cfg(unix)]
fn reload_controller(controller: &mut AgentController, config_path: &Path, overrides: &Overrides) {
    let new_config = match Config::load(config_path)
        .and_then(|c| c.resolve(overrides).map_err(anyhow::Error::from))
    {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Failed to reload config: {:#}", e);
            return;
        }
    };

    if &new_config == controller.config() {
        info!("Config unchanged");
        return;
    }

    if let Err(e) = controller.stop() {
        warn!("Error stopping agent for reload: {}", e);
    }

    let replacement = AgentController::new(new_config);
    match replacement.start() {
        Ok(()) => {
            *controller = replacement;
            info!("Config reloaded successfully");
        }
        Err(e) => {
            error!("Reloaded config failed to start, keeping previous: {}", e);
            if let Err(e) = controller.start() {
                error!("Failed to restart previous agent: {}", e);
            }
        }
    }
}

fn scan(agent_config: AgentConfig, path: &Path) -> Result<()> {
    let threshold = agent_config.threshold;
    let pipeline = Pipeline::new(Arc::new(agent_config));
    let (result, verdict) = pipeline.evaluate(path);

    let out = serde_json::json!({
        "path": result.path.display().to_string(),
        "sha256": result.content_hash,
        "score": result.score,
        "threshold": threshold,
        "reasons": result.reasons,
        "rules": result.rules,
        "verdict": verdict,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn recent(agent_config: AgentConfig, count: usize) -> Result<()> {
    let log = dlguard::AuditLog::new(&agent_config.log_path);
    for record in log.recent_quarantines(count) {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn paths(agent_config: &AgentConfig, config_path: &Path) -> Result<()> {
    println!("config:      {}", config_path.display());
    println!("watch_dir:   {}", agent_config.watch_dir.display());
    println!("quarantine:  {}", agent_config.quarantine_dir.display());
    println!("audit_log:   {}", agent_config.log_path.display());
    println!("threshold:   {}", agent_config.threshold);
    println!("backend:     {:?}", agent_config.backend);
    println!(
        "stability:   {} x {}ms",
        agent_config.stability.max_attempts,
        agent_config.stability.interval.as_millis()
    );
    Ok(())
}
