//! List models available on the configured Ollama server.

use crate::app::App;

pub async fn run() -> anyhow::Result<()> {
    let app = App::bootstrap().await?;
    let models = app.provider.list_models().await?;

    if models.is_empty() {
        println!(
            "No models reported by {} — is Ollama running?",
            app.config.provider.base_url
        );
    } else {
        for model in models {
            println!("{model}");
        }
    }
    Ok(())
}
