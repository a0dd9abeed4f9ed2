//! Time Browser - historical newspaper archive.
//!
//! Ingests scanned newspaper issues from PDF, tracks per-page OCR, and serves
//! a read-only browse API over newspapers, issues and pages.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod schema;
pub mod server;
pub mod services;
pub mod storage;
