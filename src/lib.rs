#![deny(missing_docs)]

//! Core library for the Bindery upload and enrichment server.

/// HTTP routing and REST/SSE handlers.
pub mod api;
/// Persistent per-document catalog records.
pub mod catalog;
/// Environment-driven configuration management.
pub mod config;
/// Streaming enrichment client.
pub mod enrich;
/// Chunk table export and read-back.
pub mod export;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload metrics helpers.
pub mod metrics;
/// Per-owner progress broadcast registry.
pub mod notify;
/// Upload pipeline orchestration.
pub mod pipeline;
/// PDF text extraction and sentence-window chunking.
pub mod segment;
/// Upload folder layout and preview artifacts.
pub mod storage;
