//! `docmind ingest` and `docmind wipe-index`.

use std::io::Write;
use std::path::Path;

use docmind_core::retrieval::WipeOutcome;

pub async fn run(path: &Path, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Not a file path: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;

    let (_, services) = super::load_services().await?;

    eprint!("  Processing {filename}...");
    let result = services.ingestor.ingest_pdf(&filename, bytes, user).await;
    eprint!("\r{}\r", " ".repeat(filename.len() + 16));

    let report = result?;
    println!("{} ({} chunks for user {user})", report.message(), report.chunks);
    Ok(())
}

pub async fn wipe(yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !yes {
        print!("This deletes every indexed passage for ALL users. Continue? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let (_, services) = super::load_services().await?;
    match services.ingestor.wipe_index().await? {
        WipeOutcome::Deleted => println!("Vector index deleted."),
        WipeOutcome::AlreadyEmpty => println!("Vector index was already empty."),
    }
    Ok(())
}
