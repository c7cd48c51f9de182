#![deny(missing_docs)]

//! Core library for the document reader: extraction dispatch, readability scoring, and topic
//! relevance aggregation.

/// HTTP routing and REST handlers.
pub mod api;
/// Naive Bayes topic classifier with atomic model swaps.
pub mod classifier;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Job counters.
pub mod metrics;
/// Normalization, segmentation, readability, and job orchestration.
pub mod processing;
/// Format readers and the tag registry.
pub mod readers;
/// Spell/grammar checker clients.
pub mod spellcheck;
/// Document record stores.
pub mod store;
/// Classifier training from labelled rules.
pub mod training;
