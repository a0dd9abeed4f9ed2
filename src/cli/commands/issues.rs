//! Issue listing.

use std::collections::HashMap;

use chrono::NaiveDate;
use console::style;

use crate::config::Settings;

pub async fn cmd_issues(
    settings: &Settings,
    newspaper_id: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: i64,
) -> anyhow::Result<()> {
    let ctx = super::open_db(settings)?;

    let issues = ctx
        .issues()
        .list_by_date_range(from, to, newspaper_id, limit)
        .await?;

    if issues.is_empty() {
        println!("{} No issues found", style("!").yellow());
        return Ok(());
    }

    let newspapers = ctx.newspapers();
    let mut names: HashMap<String, String> = HashMap::new();
    for issue in &issues {
        if names.contains_key(&issue.newspaper_id) {
            continue;
        }
        let name = newspapers
            .get_by_id(&issue.newspaper_id)
            .await?
            .map(|n| n.name)
            .unwrap_or_else(|| "(missing newspaper)".to_string());
        names.insert(issue.newspaper_id.clone(), name);
    }

    for issue in &issues {
        println!(
            "{}  {:<30}  {:>3} pages  {}",
            style(issue.issue_date).cyan(),
            names
                .get(&issue.newspaper_id)
                .map(String::as_str)
                .unwrap_or_default(),
            issue.num_pages,
            style(&issue.id).dim()
        );
    }
    println!("{} {} issue(s)", style("✓").green(), issues.len());

    Ok(())
}
