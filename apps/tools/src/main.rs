use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use form_step::{default_registry, WizardDefinition};
use shared::domain::SessionId;
use storage::Storage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/forms.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a wizard definition and build every step.
    CheckWizard {
        #[arg(default_value = "wizard.toml")]
        path: PathBuf,
    },
    /// Delete flash entries older than the given age.
    PurgeFlash {
        #[arg(long, default_value_t = 3600)]
        older_than_seconds: i64,
    },
    /// Print the values a session saved, step by step.
    ShowSession { session_id: String },
    /// Drop a session's flash entries and saved values.
    ClearSession { session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::CheckWizard { path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            for line in check_wizard(&raw)? {
                println!("{line}");
            }
        }
        Command::PurgeFlash { older_than_seconds } => {
            let storage = Storage::new(&cli.database_url).await?;
            let age = chrono::Duration::try_seconds(older_than_seconds)
                .context("flash age out of range")?;
            let purged = storage.purge_expired_flash(chrono::Utc::now() - age).await?;
            info!(purged, older_than_seconds, "purged expired flash entries");
            println!("purged {purged} flash entries");
        }
        Command::ShowSession { session_id } => {
            let storage = Storage::new(&cli.database_url).await?;
            let steps = storage
                .load_session_values(&SessionId(session_id.clone()))
                .await?;
            if steps.is_empty() {
                warn!(%session_id, "no saved values for session");
            }
            for step in steps {
                println!(
                    "{} (saved {}): {}",
                    step.step_path,
                    step.updated_at.to_rfc3339(),
                    serde_json::to_string(&step.values)?
                );
            }
        }
        Command::ClearSession { session_id } => {
            let storage = Storage::new(&cli.database_url).await?;
            let removed = storage.clear_session(&SessionId(session_id)).await?;
            println!("removed {removed} rows");
        }
    }

    Ok(())
}

/// One line per step, plus a note for each `next` that leaves the wizard.
fn check_wizard(raw: &str) -> Result<Vec<String>> {
    let wizard = WizardDefinition::from_toml_str(raw)?;
    let steps = wizard.build(default_registry())?;

    let mut report: Vec<String> = steps
        .iter()
        .map(|(path, controller)| {
            format!(
                "{path}: template={} fields={} next={}",
                controller.template(),
                controller.fields().len(),
                controller.next().unwrap_or("-")
            )
        })
        .collect();
    report.extend(
        wizard
            .external_next_pages()
            .into_iter()
            .map(|(step, next)| format!("note: {step} continues outside the wizard at {next}")),
    );
    Ok(report)
}
