//! linkshortener - a URL shortener on pluggable document storage
//!
//! The same link workflow runs on a MongoDB deployment or on an embedded
//! RocksDB directory; the backend is picked by configuration.
//!
//! # Architecture
//! - `storage`: document store front, key codec, filter matcher and backends
//! - `services`: short hash generation and the link workflow
//! - `config`: TOML + environment configuration
//! - `interfaces`: command-line interface
//! - `runtime`: startup and shutdown
//! - `system`: logging

pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
