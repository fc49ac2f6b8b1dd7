//! Document analysis from the command line.

use crate::app::App;
use anyhow::bail;
use hearth_analysis::sandbox::ProcessSandbox;
use hearth_analysis::synthesis::{
    analyze_documents, analyze_documents_with_code, analyze_hierarchical,
};
use std::path::PathBuf;
use std::time::Duration;

pub async fn run(
    files: Vec<PathBuf>,
    question: String,
    code: bool,
    deep: bool,
) -> anyhow::Result<()> {
    if code && deep {
        bail!("--code and --deep are mutually exclusive");
    }

    let app = App::bootstrap().await?;
    app.ingest(&files).await?;

    let names: Vec<String> = files
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();

    let report = if code {
        let sandbox = ProcessSandbox::new(&app.config.analysis.python_bin).with_timeouts(
            Duration::from_secs(app.config.analysis.exec_timeout_secs),
            Duration::from_secs(app.config.analysis.install_timeout_secs),
        );
        let report = analyze_documents_with_code(
            app.provider.as_ref(),
            &sandbox,
            &app.store,
            &names,
            &question,
            app.config.analysis.max_attempts,
        )
        .await?;
        report.answer
    } else if deep {
        let Some(name) = names.first() else {
            bail!("--deep needs at least one file");
        };
        analyze_hierarchical(
            app.provider.as_ref(),
            &app.store,
            app.index.as_ref(),
            app.embedder.as_ref(),
            name,
            &question,
            app.config.retrieval.top_k,
        )
        .await?
    } else {
        analyze_documents(app.provider.as_ref(), &app.store, &names, &question).await?
    };

    println!("{report}");
    Ok(())
}
