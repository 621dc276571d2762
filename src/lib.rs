//! AutoVolt Advisor API Library
//!
//! This library provides the core functionality for the AutoVolt advisor API: a set of
//! AI-assisted vehicle features (conversational search, maintenance prediction,
//! environmental impact, price analysis and vehicle comparison) backed by a vehicle
//! inventory in Postgres and a hosted language model.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `ai_models`: Typed records produced by the language model, one per feature.
//! - `circuit_breaker`: Circuit breaker around the language model.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Append-only analysis records and best-effort persistence.
//! - `decoder`: Strict JSON decoding of sanitized model output.
//! - `errors`: Error handling types.
//! - `features`: The feature services.
//! - `gemini_client`: Gemini language model client with timeout and retries.
//! - `handlers`: HTTP request handlers.
//! - `identity`: Requester resolution.
//! - `lenient_serde`: Forgiving deserializers for model output.
//! - `metrics`: Depreciation, price distribution and cost calculations.
//! - `models`: Core data models and the response envelope.
//! - `pipeline`: The shared model stage (generate, sanitize, decode, validate).
//! - `pricing`: Display currency and price formatting.
//! - `prompts`: Prompt templates.
//! - `query`: Typed vehicle queries compiled to parameterized SQL.
//! - `sanitizer`: Cleanup of raw model text.
//! - `validator`: Required-field checks and typed record construction.
//! - `vehicles`: Vehicle inventory access.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and other binaries
pub mod ai_models;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod decoder;
pub mod errors;
pub mod features;
pub mod gemini_client;
pub mod handlers;
pub mod identity;
pub mod lenient_serde;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod pricing;
pub mod prompts;
pub mod query;
pub mod sanitizer;
pub mod validator;
pub mod vehicles;
