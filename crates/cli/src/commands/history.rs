//! Print a chat's persisted transcript.

use crate::app::App;

pub async fn run(chat: String) -> anyhow::Result<()> {
    let app = App::bootstrap().await?;
    let transcript = app.log.transcript(&chat).await?;

    if transcript.is_empty() {
        println!("No history for chat '{chat}'.");
    } else {
        println!("{transcript}");
    }
    Ok(())
}
