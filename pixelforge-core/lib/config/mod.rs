//! Configuration types for the pixelforge pipeline.
//!
//! Every knob the pipeline reads is carried by one of these structs and
//! injected at construction time. Nothing in the pipeline reads environment
//! variables ad hoc; callers that want environment-driven settings build the
//! structs through the `from_env` constructors once, at startup, so tests can
//! substitute arbitrary configurations (including a fake sandbox backend).

use std::{path::PathBuf, time::Duration};

use getset::Getters;
use typed_builder::TypedBuilder;

use pixelforge_utils::{
    get_env_or, get_pixelforge_home_path, DEFAULT_CREATOR_SHARE_PERCENT, DEFAULT_GENERATION_COST,
    DEFAULT_JAIL_EXE, DEFAULT_NODE_EXE, DEFAULT_PROVIDER_BASE_URL, DEFAULT_PROVIDER_MODEL,
    DEFAULT_REFINEMENT_COST, DEFAULT_SANDBOX_TIMEOUT_SECS, JAIL_EXE_ENV_VAR, NODE_EXE_ENV_VAR,
    PROVIDER_API_KEY_ENV_VAR, PROVIDER_BASE_URL_ENV_VAR, SCRATCH_SUBDIR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Which sandbox backend the execution engine uses.
///
/// The backend is an explicit configuration value selected once at engine
/// construction, never by call-site logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBackendKind {
    /// Development backend: a plain subprocess per call, no OS-level isolation
    Unconfined,

    /// Production backend: the subprocess runs under an OS-level isolation
    /// wrapper (dedicated user, read-only mounts, no network, seccomp)
    Jailed,
}

/// Settings for the sandbox execution engine
#[derive(Debug, Clone, Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct SandboxSettings {
    /// The backend implementation to use
    backend: SandboxBackendKind,

    /// Root directory under which per-call scratch directories are created
    scratch_root: PathBuf,

    /// Hard wall-clock limit on a single sandboxed execution
    #[builder(default = Duration::from_secs(DEFAULT_SANDBOX_TIMEOUT_SECS))]
    timeout: Duration,

    /// Executable used to run the candidate code
    #[builder(default = DEFAULT_NODE_EXE.to_string())]
    node_exe: String,

    /// OS-level isolation tool required by the jailed backend
    #[builder(default = DEFAULT_JAIL_EXE.to_string())]
    jail_exe: String,

    /// Uid the jailed subprocess runs as
    #[builder(default = 65534)]
    jail_uid: u32,

    /// Gid the jailed subprocess runs as
    #[builder(default = 65534)]
    jail_gid: u32,
}

/// Settings for the text-generation provider client
#[derive(Debug, Clone, Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct ProviderConfig {
    /// Credential for the provider. `None` means unconfigured; the client
    /// refuses to make any network call without it.
    #[builder(default)]
    api_key: Option<String>,

    /// Base URL of the provider API
    #[builder(default = DEFAULT_PROVIDER_BASE_URL.to_string())]
    base_url: String,

    /// Model requested from the provider
    #[builder(default = DEFAULT_PROVIDER_MODEL.to_string())]
    model: String,

    /// Upper bound on tokens requested per completion
    #[builder(default = 8192)]
    max_tokens: u32,
}

/// Credit amounts charged and split by the lifecycle pipeline
#[derive(Debug, Clone, Copy, Getters)]
#[getset(get = "pub with_prefix")]
pub struct CreditPolicy {
    /// Credits a newly generated version costs if accepted
    generation_cost: i64,

    /// Credits a refinement version costs if accepted
    refinement_cost: i64,

    /// Percentage of a hosted charge credited to the creator
    creator_share_percent: i64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxSettings {
    /// Creates settings from environment variables, for the given backend.
    ///
    /// The backend itself is always an explicit argument; only the tool paths
    /// and the scratch root come from the environment.
    pub fn from_env(backend: SandboxBackendKind) -> Self {
        Self::builder()
            .backend(backend)
            .scratch_root(get_pixelforge_home_path().join(SCRATCH_SUBDIR))
            .node_exe(get_env_or(NODE_EXE_ENV_VAR, DEFAULT_NODE_EXE))
            .jail_exe(get_env_or(JAIL_EXE_ENV_VAR, DEFAULT_JAIL_EXE))
            .build()
    }
}

impl ProviderConfig {
    /// Creates a provider configuration from environment variables.
    ///
    /// A missing credential is not an error here; the client reports a
    /// configuration error at call time, before any network traffic.
    pub fn from_env() -> Self {
        Self::builder()
            .api_key(std::env::var(PROVIDER_API_KEY_ENV_VAR).ok())
            .base_url(get_env_or(
                PROVIDER_BASE_URL_ENV_VAR,
                DEFAULT_PROVIDER_BASE_URL,
            ))
            .build()
    }
}

impl CreditPolicy {
    /// Creates a credit policy with explicit amounts.
    pub fn new(generation_cost: i64, refinement_cost: i64, creator_share_percent: i64) -> Self {
        Self {
            generation_cost,
            refinement_cost,
            creator_share_percent,
        }
    }
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_GENERATION_COST,
            DEFAULT_REFINEMENT_COST,
            DEFAULT_CREATOR_SHARE_PERCENT,
        )
    }
}
