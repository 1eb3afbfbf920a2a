//! Application state management for the pixelforge server.
//!
//! This module handles:
//! - Global application state
//! - Thread-safe state sharing across handlers
//!
//! All pipeline collaborators (database pool, sandbox engine, generation
//! client, smoke runner) are constructed once at startup and injected here,
//! so handlers never build their own and tests can substitute fakes.

use std::sync::Arc;

use getset::Getters;
use sqlx::SqlitePool;

use pixelforge_core::{
    config::CreditPolicy,
    generation::GenerationClient,
    sandbox::SandboxEngine,
    smoke::SmokeTestRunner,
};

use crate::config::Config;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Application state structure
#[derive(Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AppState {
    /// The application configuration
    config: Arc<Config>,

    /// Project database pool
    pool: SqlitePool,

    /// Sandbox execution engine
    engine: Arc<SandboxEngine>,

    /// Text-generation provider client
    codegen: Arc<GenerationClient>,

    /// Smoke test runner
    smoke: Arc<SmokeTestRunner>,

    /// Credit amounts charged and split by the pipeline
    policy: CreditPolicy,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AppState {
    /// Create a new application state instance
    pub fn new(
        config: Arc<Config>,
        pool: SqlitePool,
        engine: Arc<SandboxEngine>,
        codegen: Arc<GenerationClient>,
        policy: CreditPolicy,
    ) -> Self {
        let smoke = Arc::new(SmokeTestRunner::new(Arc::clone(&engine)));

        Self {
            config,
            pool,
            engine,
            codegen,
            smoke,
            policy,
        }
    }
}
