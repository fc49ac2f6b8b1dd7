//! Interactive chat (or one-shot message) against the turn pipeline.

use crate::app::App;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub async fn run(
    message: Option<String>,
    session: String,
    ingest: Vec<PathBuf>,
    no_enhance: bool,
) -> anyhow::Result<()> {
    let app = App::bootstrap().await?;

    if !ingest.is_empty() {
        let chunks = app.ingest(&ingest).await?;
        println!("Ingested {} file(s) into {} chunk(s).", ingest.len(), chunks);
    }

    let engine = app.engine();
    let enhance = !no_enhance;

    if let Some(message) = message {
        let outcome = engine.handle_turn(&session, &message, enhance).await;
        println!("{}", outcome.response);
        return Ok(());
    }

    println!("Hearth interactive chat — model {} (/memory, /quit)", app.config.provider.model);
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/memory" => {
                if let Some(live) = engine.sessions().get(&session).await {
                    let stats = live.memory.stats().await;
                    println!("short-term: {} message(s)", stats.short_term_count);
                    println!("topics: {}", stats.topics.join(", "));
                    println!("facts: {}", stats.fact_count);
                    match stats.latest_summary {
                        Some(summary) => println!("summary: {summary}"),
                        None => println!("summary: (none yet)"),
                    }
                } else {
                    println!("No memory yet — say something first.");
                }
            }
            _ => {
                let outcome = engine.handle_turn(&session, line, enhance).await;
                if outcome.retrieved > 0 {
                    println!("[{} document chunk(s) consulted]", outcome.retrieved);
                }
                println!("{}", outcome.response);
            }
        }
    }

    // Abort in-flight background work before the process exits.
    if let Some(live) = engine.sessions().get(&session).await {
        live.tasks.shutdown();
    }
    Ok(())
}
