//! Shared types, error model, and configuration for contentimport.
//!
//! This crate is the foundation depended on by all other contentimport crates.
//! It provides:
//! - [`ImportError`] the unified error type
//! - Domain and wire types ([`ImportRecord`], [`ContentRecord`], [`ImportResult`], [`ImportOptions`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_MAX_IMAGE_BYTES, EndpointsConfig, HttpConfig, ImportDefaultsConfig, StorageConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, parse_endpoint,
};
pub use error::{FETCH_FALLBACK_MESSAGE, ImportError, Result};
pub use types::{
    ChunkRequest, ChunkResponse, ChunkSummary, ContentRecord, ErrorBody, FetchResponse,
    ImportOptions, ImportRecord, ImportResult, ImportStatus, ImportSummary, parse_publish_date,
};
