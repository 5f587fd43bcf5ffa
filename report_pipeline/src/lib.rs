//! Automated retrieval and ingestion of the daily sales export from the
//! restaurant-management portal.
//!
//! The portal exposes no API, so a headless browser drives the report UI:
//! compute the business-day window, log in, configure a "Sales" report in
//! JSON format, trigger generation, recover the generated file's URL from
//! the portal's own task-status traffic, download and parse it, then write
//! one aggregated row (plus the verbatim payload) into Postgres.

pub mod config;
pub mod errors;
pub mod fetcher;
pub mod ingest;
pub mod listener;
pub mod navigator;
pub mod pipeline;
pub mod portal;
pub mod window;
