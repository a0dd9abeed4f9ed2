//! Ingest job listing.

use console::style;

use crate::config::Settings;
use crate::models::{IngestJob, JobStatus};

pub async fn cmd_jobs(settings: &Settings, status: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let ctx = super::open_db(settings)?;
    let repo = ctx.ingest_jobs();

    let jobs = match status {
        Some(s) => {
            let status = JobStatus::from_str(s).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown status '{}' (expected one of: {})",
                    s,
                    JobStatus::ALL.map(|s| s.as_str()).join(", ")
                )
            })?;
            repo.list_by_status(status, limit, 0).await?
        }
        None => repo.list_recent(limit).await?,
    };

    if jobs.is_empty() {
        println!("{} No ingest jobs", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>9}  {}",
        style("JOB").bold(),
        style("STATUS").bold(),
        style("PAGES").bold(),
        style("KEY").bold()
    );
    for job in &jobs {
        print_job(job);
    }

    Ok(())
}

fn print_job(job: &IngestJob) {
    let status = match job.status {
        JobStatus::Completed => style(job.status.as_str()).green(),
        JobStatus::Failed => style(job.status.as_str()).red(),
        JobStatus::Processing => style(job.status.as_str()).cyan(),
        JobStatus::Pending => style(job.status.as_str()).dim(),
    };
    let pages = format!(
        "{}/{}",
        job.progress.pages_succeeded, job.progress.pages_total
    );

    println!(
        "{:<36}  {:<10}  {:>9}  {}",
        job.id, status, pages, job.idempotency_key
    );
    if let Some(ref error) = job.error_message {
        println!("    {} {}", style("✗").red(), error);
    }
}
