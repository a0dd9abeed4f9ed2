//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::services::PdftoppmRasterizer;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = super::open_db(settings)?;
    ctx.init_schema().await?;

    println!(
        "{} Initialized Time Browser in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database: {}", settings.display_database_url());
    println!("  Page images: {}", settings.images_dir().display());

    if !PdftoppmRasterizer::is_available() {
        println!(
            "{} pdftoppm not found; install poppler-utils before ingesting",
            style("!").yellow()
        );
    }

    Ok(())
}
