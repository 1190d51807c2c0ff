//! Engine Configuration Module
//!
//! Provides the engine configuration loaded from TOML, replacing every
//! hardcoded threshold with an operator-tunable value.
//!
//! ## Loading Order
//!
//! 1. `POSEGUARD_CONFIG` environment variable (path to TOML file)
//! 2. `poseguard.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Configuration is read once at session start and shared read-only with the
//! session through an `Arc`. Sessions never observe changes made after they
//! start:
//!
//! ```ignore
//! let config = Arc::new(EngineConfig::load());
//! let library = Arc::new(PoseLibrary::builtin()?);
//! let session = PoseSession::start(library, "pranamasana", profile, Arc::clone(&config))?;
//! ```

pub mod defaults;
mod engine_config;
pub mod validation;

pub use engine_config::*;
