mod config;
mod coordinator;
mod render;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use depotsync_installer::{SteamCmd, UpdateEngine};
use depotsync_resolver::{KubeClusterApi, WorkloadRestarter};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ControllerConfig;
use crate::coordinator::Coordinator;
use crate::render::{
    current_output_style, format_apply_lines, format_check_line, format_restart_lines,
    render_section_header, render_status_line,
};

#[derive(Parser, Debug)]
#[command(name = "depotsync", version)]
#[command(
    about = "Keeps a shared game server install on the latest build and restarts its workloads",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    config: ControllerConfig,

    /// Tracing filter directives, e.g. `info` or `depotsync_installer=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll for updates, apply them and restart affected workloads until stopped.
    Run,
    /// Compare the installed build against the latest published build.
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Download and install the latest build.
    Apply {
        #[arg(long)]
        skip_validate: bool,
    },
    /// Restart every workload owning a pod that matches the selector.
    Restart,
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "depotsync", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&cli.log_filter)?;
    cli.config.validate()?;
    run_command(cli.command, &cli.config).await
}

fn init_tracing(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .with_context(|| format!("invalid log filter: {filter}"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn run_command(command: Commands, config: &ControllerConfig) -> Result<()> {
    let output_style = current_output_style();

    match command {
        Commands::Run => {
            info!(
                app = %config.steam_app,
                app_id = %config.steam_app_id,
                check_interval = %humantime::format_duration(config.check_interval),
                namespace = %config.namespace,
                pod_selector = %config.pod_selector,
                "starting update controller"
            );
            let engine = build_engine(config)?;
            let restarter = build_restarter(config).await?;
            let mut coordinator = Coordinator::new(
                engine,
                restarter,
                config.pod_selector.clone(),
                config.retry_policy(),
            );
            coordinator
                .run(config.check_interval, shutdown_signal())
                .await;
            info!("shutdown complete");
        }
        Commands::Check { json } => {
            let engine = build_engine(config)?;
            let check = engine
                .check_update()
                .await
                .context("failed to check for updates")?;
            if json {
                let rendered = serde_json::to_string_pretty(&check)
                    .context("failed to serialize update check")?;
                println!("{rendered}");
            } else {
                println!("{}", format_check_line(&check, output_style));
            }
        }
        Commands::Apply { skip_validate } => {
            let engine = build_engine(config)?;
            if let Some(header) = render_section_header(output_style, "apply") {
                println!("{header}");
            }
            let report = engine
                .apply_update()
                .await
                .context("failed to apply update")?;
            if !skip_validate {
                engine
                    .validate_update()
                    .await
                    .context("failed to validate update")?;
            }
            for line in format_apply_lines(&report, !skip_validate, output_style) {
                println!("{line}");
            }
        }
        Commands::Restart => {
            let restarter = build_restarter(config).await?;
            if let Some(header) = render_section_header(output_style, "restart") {
                println!("{header}");
            }
            match restarter.restart_matching(&config.pod_selector).await {
                Ok(report) => {
                    for line in format_restart_lines(&report, output_style) {
                        println!("{line}");
                    }
                }
                Err(depotsync_resolver::RestartError::NothingRestarted { report }) => {
                    for line in format_restart_lines(&report, output_style) {
                        println!("{line}");
                    }
                    println!(
                        "{}",
                        render_status_line(output_style, "err", "no workloads were restarted")
                    );
                    anyhow::bail!("failed to restart any workloads");
                }
                Err(err) => return Err(err).context("failed to restart workloads"),
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn build_engine(config: &ControllerConfig) -> Result<UpdateEngine<SteamCmd>> {
    Ok(UpdateEngine::new(
        config.layout(),
        config.app_id()?,
        config.update_script.clone(),
        SteamCmd::new(&config.steamcmd_path),
    ))
}

async fn build_restarter(config: &ControllerConfig) -> Result<WorkloadRestarter<KubeClusterApi>> {
    let client_config = match &config.kubeconfig {
        Some(path) => {
            info!(path = %path.display(), "using kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| format!("failed to load kubeconfig {}", path.display()))?
        }
        None => {
            info!("using in-cluster configuration");
            kube::Config::infer()
                .await
                .context("failed to infer cluster configuration")?
        }
    };
    let client = Client::try_from(client_config).context("failed to create cluster client")?;
    let api = KubeClusterApi::new(client, &config.namespace);
    Ok(WorkloadRestarter::new(api).with_scale_grace(config.scale_grace))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
