//! Hub file export/import.

use crate::app::App;
use clap::Subcommand;
use hearth_memory::hub::{export_hub, import_hub};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum HubAction {
    /// Write a chat to a hub file
    Export {
        /// Chat identifier
        #[arg(short, long, default_value = "default")]
        chat: String,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Title stored in the hub metadata
        #[arg(short, long, default_value = "Chat export")]
        title: String,
    },

    /// Read a hub file into a chat
    Import {
        /// Destination chat identifier
        #[arg(short, long)]
        chat: String,

        /// Hub file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

pub async fn run(action: HubAction) -> anyhow::Result<()> {
    let app = App::bootstrap().await?;

    match action {
        HubAction::Export { chat, output, title } => {
            let hub = export_hub(&app.log, &chat, &title).await?;
            let json = serde_json::to_string_pretty(&hub)?;
            tokio::fs::write(&output, json).await?;
            println!(
                "Exported {} message(s) from '{chat}' to {}",
                hub.metadata.message_count,
                output.display()
            );
        }
        HubAction::Import { chat, input } => {
            let raw = tokio::fs::read_to_string(&input).await?;
            let payload: serde_json::Value = serde_json::from_str(&raw)?;
            let imported = import_hub(&app.log, &chat, &payload).await?;
            println!("Imported {imported} message(s) into '{chat}'");
        }
    }

    Ok(())
}
