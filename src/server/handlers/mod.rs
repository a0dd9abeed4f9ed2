//! HTTP request handlers for the web server.

mod issues;
mod jobs;
mod pages;
mod static_files;
mod types;

// Re-export handlers for use by the router
pub use issues::{get_issue, list_issues};
pub use jobs::{get_job, list_jobs, ADMIN_KEY_HEADER};
pub use pages::get_page;
pub use static_files::{health, root, serve_file};
