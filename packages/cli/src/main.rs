#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for the Tableau export backend.
//!
//! ```text
//! tableau_export list
//! tableau_export show <name>
//! tableau_export import <name> <config.json> [--force]
//! tableau_export delete <name>
//! tableau_export test-connection <name>
//! tableau_export views <name>
//! tableau_export run <name> [--excel <file.xlsx>] [--sheet <sheet>]
//! ```
//!
//! Running with no subcommand enters the interactive editor.
//!
//! Uses `indicatif-log-bridge` (via [`tableau_export_cli_utils::init_logger`])
//! so log lines and the export progress bar never fight for the terminal.

mod interactive;
mod report;
mod session;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tableau_export::LifecycleState;
use tableau_export_config::snapshot;

use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "tableau_export",
    about = "Export Tableau workbook views through the export backend"
)]
struct Cli {
    /// Settings file (defaults to ./tableau_export.toml when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Backend base URL, overriding the settings file
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved configurations
    List,
    /// Show a saved configuration (secret masked)
    Show {
        /// Configuration name
        name: String,
    },
    /// Save a configuration from a JSON file
    Import {
        /// Name to save under
        name: String,
        /// JSON file in the backend's configuration format
        file: PathBuf,
        /// Overwrite an existing configuration without asking
        #[arg(long)]
        force: bool,
    },
    /// Delete a saved configuration
    Delete {
        /// Configuration name
        name: String,
    },
    /// Check the PAT of a saved configuration against the server
    TestConnection {
        /// Configuration name
        name: String,
    },
    /// List the workbook views of a saved configuration
    Views {
        /// Configuration name
        name: String,
    },
    /// Run an export from a saved configuration
    Run {
        /// Configuration name
        name: String,
        /// Source spreadsheet (required in automate mode)
        #[arg(long)]
        excel: Option<PathBuf>,
        /// Sheet to use instead of the first one
        #[arg(long)]
        sheet: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tableau_export_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut settings = settings::load(cli.settings.as_deref())?;
    if let Some(url) = cli.backend_url {
        settings.backend_url = url;
    }
    let mut session = Session::open(settings)?;

    let Some(command) = cli.command else {
        return interactive::run(&mut session, &multi).await;
    };

    match command {
        Commands::List => {
            let names = session.store.list_names();
            if names.is_empty() {
                println!("No saved configurations.");
                return Ok(());
            }
            for name in &names {
                println!("{name}");
            }
            println!("\n{} configuration(s)", names.len());
        }
        Commands::Show { name } => {
            let config = session.store.load(&name)?;
            print!("{}", report::config_summary(&config));
        }
        Commands::Import { name, file, force } => {
            let text = std::fs::read_to_string(&file)?;
            let raw: serde_json::Value = serde_json::from_str(&text)?;
            let config = snapshot::upgrade(&name, raw)?.config;

            if session.store.contains(&name)
                && !force
                && !tableau_export_cli_utils::confirm(
                    &format!("Overwrite configuration '{name}'?"),
                    false,
                )?
            {
                println!("Not saved.");
                return Ok(());
            }
            session.store.save(&name, &config)?;
            println!("Saved configuration: {name}");
        }
        Commands::Delete { name } => {
            if session.store.delete(&name)? {
                println!("Deleted configuration: {name}");
            } else {
                eprintln!("Configuration not found: {name}");
                std::process::exit(1);
            }
        }
        Commands::TestConnection { name } => {
            let ctl = session.load_controller(&name)?;
            match ctl.test_connection().await {
                Ok(message) => println!("{message}"),
                Err(e) => {
                    eprintln!("Connection failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Views { name } => {
            let mut ctl = session.load_controller(&name)?;
            let views = ctl.load_views().await?.to_vec();
            if views.is_empty() {
                println!("No views found in workbook '{}'.", ctl.config().workbook_name);
                return Ok(());
            }
            for view in &views {
                let marker = if ctl.config().is_view_excluded(view) {
                    " (excluded)"
                } else {
                    ""
                };
                println!("{view}{marker}");
            }
        }
        Commands::Run { name, excel, sheet } => {
            let mut ctl = session.load_controller(&name)?;
            if ctl.config().is_automate() && excel.is_none() {
                eprintln!("Automate mode needs a source spreadsheet: pass --excel <file.xlsx>");
                std::process::exit(2);
            }
            session::prepare_source(&mut ctl, excel.as_deref(), sheet.as_deref()).await?;

            let state = session::run_export(&mut ctl, &multi).await?;
            if state != LifecycleState::Completed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
