use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scanner_api::report::render_text;
use scanner_api::{analyze_with_fallback, router, serve, RemoteBackend};
use scanner_core::settings::{self, Settings};
use scanner_engine::{Analyzer, LlmClient};

#[derive(Parser)]
#[command(name = "scanner", version, about = "Audit independence risk scanner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (POST /analyze, GET /health)
    Serve {
        /// Address to bind, e.g. 0.0.0.0:8000
        #[arg(long)]
        bind: Option<String>,
    },
    /// Analyze a scenario, via the backend when it is up, locally otherwise
    Analyze {
        /// Scenario text; read from stdin when omitted or "-"
        scenario: Option<String>,
        /// Backend base URL (defaults to BACKEND_URL / settings)
        #[arg(long)]
        backend: Option<String>,
        /// Skip the backend and run the pipeline in-process
        #[arg(long)]
        local: bool,
        /// Print the JSON report instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Persist the effective configuration to the settings file. An API key
        /// taken from the environment is not written.
        #[arg(long)]
        write: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_scenario(arg: Option<String>) -> anyhow::Result<String> {
    let scenario = match arg.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read scenario from stdin")?;
            buf
        }
        Some(text) => text.to_string(),
    };
    if scenario.trim().is_empty() {
        bail!("시나리오를 입력해주세요.");
    }
    Ok(scenario)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Command::Serve { bind } => {
            if !settings.ai_configured() {
                tracing::warn!(provider = %settings.provider, "no API key configured; /analyze calls will fail");
            }
            let bind = bind.unwrap_or_else(|| settings.bind_address.clone());
            let analyzer = Analyzer::new(LlmClient::new(&settings), &settings);
            serve(router(Arc::new(analyzer)), &bind)
                .await
                .with_context(|| format!("server on {bind} stopped"))?;
        }
        Command::Analyze {
            scenario,
            backend,
            local,
            json,
        } => {
            let scenario = read_scenario(scenario)?;
            let analyzer = Analyzer::new(LlmClient::new(&settings), &settings);
            let remote = (!local).then(|| {
                RemoteBackend::new(backend.as_deref().unwrap_or(&settings.backend_url))
            });

            let (report, source) = analyze_with_fallback(remote.as_ref(), &analyzer, &scenario)
                .await
                .context("분석 중 오류가 발생했습니다")?;
            tracing::info!(?source, status = %report.status, "report ready");

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_text(&report));
            }
        }
        Command::Config { write } => {
            let path = settings::settings_path();
            println!("settings file: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
            if write {
                let stored = if path.exists() {
                    settings::read_settings(&path)?
                } else {
                    Settings::default()
                };
                let to_write = settings.for_file(&stored, |key| std::env::var(key).ok());
                settings::write_settings(&path, &to_write)?;
                println!("wrote {}", path.display());
            }
        }
    }

    Ok(())
}
