//! Vetrina — a small catalog-display backend.
//!
//! Serves a static entry page, JSON endpoints for a spreadsheet-sourced
//! product catalog and an on-disk image gallery, a remote-image proxy,
//! and a server-sent-events channel that nudges connected clients to
//! re-fetch when the gallery directory changes.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
