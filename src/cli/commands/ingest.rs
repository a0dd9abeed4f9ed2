//! Ingest command.

use std::path::Path;

use chrono::NaiveDate;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::models::JobStatus;
use crate::services::{IngestEvent, IngestRequest, IngestService};

/// Ingest one PDF as an issue of `newspaper` published on `date`.
pub async fn cmd_ingest(
    settings: &Settings,
    file: &Path,
    newspaper: &str,
    date: NaiveDate,
    key: Option<String>,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let document = tokio::fs::read(file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let key = key.unwrap_or_else(|| default_key(newspaper, date, file));

    let ctx = super::open_db(settings)?;
    ctx.init_schema().await?;
    let service = IngestService::from_settings(settings, ctx)?;

    println!(
        "{} Ingesting {} ({} {})",
        style("→").cyan(),
        file.display(),
        newspaper,
        date
    );

    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
        .progress_chars("█▓░");

    let (event_tx, mut event_rx) = mpsc::channel::<IngestEvent>(100);

    let event_handler = tokio::spawn(async move {
        let mut progress: Option<ProgressBar> = None;

        while let Some(event) = event_rx.recv().await {
            match event {
                IngestEvent::Rendered { issue_id, pages } => {
                    println!(
                        "  {} Rendered {} pages for issue {}",
                        style("✓").green(),
                        pages,
                        issue_id
                    );
                    let pb = ProgressBar::new(pages as u64);
                    pb.set_style(bar_style.clone());
                    pb.set_message("Running OCR...");
                    progress = Some(pb);
                }
                IngestEvent::PageCompleted { .. } => {
                    if let Some(ref pb) = progress {
                        pb.inc(1);
                    }
                }
                IngestEvent::PageFailed { error, .. } => match progress {
                    Some(ref pb) => {
                        pb.println(format!("  {} {}", style("!").yellow(), error));
                        pb.inc(1);
                    }
                    None => println!("  {} {}", style("!").yellow(), error),
                },
                IngestEvent::Finished { .. } => {
                    if let Some(pb) = progress.take() {
                        pb.finish_and_clear();
                    }
                }
                IngestEvent::JobCreated { .. } | IngestEvent::Duplicate { .. } => {}
            }
        }
    });

    let outcome = service.ingest(request(key, newspaper, date, document), Some(event_tx)).await;
    let _ = event_handler.await;
    let outcome = outcome?;

    let job = outcome.job;
    if outcome.duplicate {
        println!(
            "{} Already submitted as job {} ({})",
            style("!").yellow(),
            job.id,
            job.status
        );
        return Ok(());
    }

    let p = &job.progress;
    match job.status {
        JobStatus::Completed => {
            println!(
                "{} Job {} completed: {}/{} pages succeeded",
                style("✓").green(),
                job.id,
                p.pages_succeeded,
                p.pages_total
            );
            if let Some(ref issue_id) = job.issue_id {
                println!("  Issue: {}", issue_id);
            }
            Ok(())
        }
        _ => {
            eprintln!(
                "{} Job {} {}: {}",
                style("✗").red(),
                job.id,
                job.status,
                job.error_message.as_deref().unwrap_or("unknown error")
            );
            Err(anyhow::anyhow!("Ingest failed"))
        }
    }
}

fn request(key: String, newspaper: &str, date: NaiveDate, document: Vec<u8>) -> IngestRequest {
    IngestRequest {
        idempotency_key: key,
        newspaper: newspaper.to_string(),
        issue_date: date,
        document,
        source_external_id: None,
    }
}

/// Key used when none is given, so re-running the same command is a no-op.
fn default_key(newspaper: &str, date: NaiveDate, file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}/{}", newspaper.trim().to_lowercase(), date, name)
}
