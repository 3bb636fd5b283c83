//! Skyblock Installer CLI
//!
//! Command-line front-end for the install pipeline: lists the remote
//! catalogs and runs install operations with per-option toggles.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use skyblock_installer::commands;
use skyblock_installer::core::orchestrator::{EventSink, InstallEvent, PipelineState};
use skyblock_installer::core::state::{default_settings_path, InstallerSettings};
use skyblock_installer::Operation;

#[derive(Parser)]
#[command(name = "skyblock-installer")]
#[command(about = "Install curated Skyblock mods, resource packs and Forge", long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform data directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Remote folder holding manifests and artifacts
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Folder receiving `mods/` and `resourcepacks/`
    #[arg(long, global = true)]
    install_root: Option<PathBuf>,

    /// Minecraft game directory checked before running Forge
    #[arg(long, global = true)]
    minecraft_root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available options
    List {
        /// Include hidden library options
        #[arg(long)]
        all: bool,
    },
    /// Install the selected mods
    Mods(Toggles),
    /// Install the selected resource packs
    Packs(Toggles),
    /// Run the Forge installer
    Forge,
    /// Run the Forge installer and install mods at the same time
    ForgeAndMods(Toggles),
    /// Forge, mods and resource packs together
    All(Toggles),
    /// Write the effective settings to the settings file
    SaveSettings,
}

#[derive(Args, Default)]
struct Toggles {
    /// Enable an option on top of the manifest defaults (repeatable)
    #[arg(long = "enable", value_name = "ID")]
    enable: Vec<String>,

    /// Disable an option that is on by default (repeatable)
    #[arg(long = "disable", value_name = "ID")]
    disable: Vec<String>,
}

fn load_settings(cli: &Cli) -> (PathBuf, InstallerSettings) {
    let path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = InstallerSettings::load_or_default(&path);

    if let Some(base_url) = &cli.base_url {
        settings.remote_base_url = base_url.clone();
    }
    if let Some(root) = &cli.install_root {
        settings.install_root = Some(root.clone());
    }
    if let Some(root) = &cli.minecraft_root {
        settings.minecraft_root = root.clone();
    }
    (path, settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    skyblock_installer::init_tracing();
    let cli = Cli::parse();
    let (settings_path, settings) = load_settings(&cli);

    let (operation, toggles) = match cli.command {
        Command::SaveSettings => {
            settings
                .save(&settings_path)
                .with_context(|| format!("saving {}", settings_path.display()))?;
            println!("Saved {}", settings_path.display());
            return Ok(());
        }
        Command::List { all } => {
            let session = commands::open_session(settings, None)
                .await
                .context("loading catalogs")?;
            let options = commands::list_options(&session.catalogs, all);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                for option in options {
                    let marker = if option.enabled_by_default { "x" } else { " " };
                    println!("[{}] {:<13} {:<24} {}", marker, option.kind, option.id, option.display);
                }
            }
            return Ok(());
        }
        Command::Mods(t) => (Operation::Mods, t),
        Command::Packs(t) => (Operation::Resourcepacks, t),
        Command::Forge => (Operation::Forge, Toggles::default()),
        Command::ForgeAndMods(t) => (Operation::ForgeAndMods, t),
        Command::All(t) => (Operation::All, t),
    };

    let (sink, mut rx) = EventSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                InstallEvent::Info(message) => println!("{message}"),
                InstallEvent::Error(message) => eprintln!("{message}"),
                InstallEvent::StateChanged { .. } => {}
                InstallEvent::Completed(message) => println!("Completed: {message}"),
            }
        }
    });

    let session = commands::open_session(settings, Some(sink))
        .await
        .context("loading catalogs")?;
    let selections = commands::build_selections(&session.catalogs, &toggles.enable, &toggles.disable)?;
    let report = commands::run_install(&session, operation, &selections).await;

    // Dropping the session closes the event channel so the printer drains.
    let failed = report.state == PipelineState::Failed;
    drop(session);
    let _ = printer.await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if failed {
        anyhow::bail!(
            "operation did not start: {}",
            report.failure.unwrap_or_default()
        );
    }
    Ok(())
}
