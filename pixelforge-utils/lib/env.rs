//! Utility functions for working with environment variables.

use std::path::PathBuf;

use crate::defaults::DEFAULT_PIXELFORGE_HOME;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable for the pixelforge home directory
pub const PIXELFORGE_HOME_ENV_VAR: &str = "PIXELFORGE_HOME";

/// Environment variable for the text-generation provider credential
pub const PROVIDER_API_KEY_ENV_VAR: &str = "PIXELFORGE_PROVIDER_API_KEY";

/// Environment variable for the text-generation provider base URL
pub const PROVIDER_BASE_URL_ENV_VAR: &str = "PIXELFORGE_PROVIDER_BASE_URL";

/// Environment variable for the internal service credential used by hosted invocations
pub const SERVICE_CREDENTIAL_ENV_VAR: &str = "PIXELFORGE_SERVICE_CREDENTIAL";

/// Environment variable overriding the node executable used by the sandbox
pub const NODE_EXE_ENV_VAR: &str = "PIXELFORGE_NODE_EXE";

/// Environment variable overriding the isolation tool used by the jailed backend
pub const JAIL_EXE_ENV_VAR: &str = "PIXELFORGE_JAIL_EXE";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the path to the pixelforge home directory.
/// If the PIXELFORGE_HOME environment variable is set, returns that path.
/// Otherwise, returns the default pixelforge home path.
pub fn get_pixelforge_home_path() -> PathBuf {
    if let Ok(pixelforge_home) = std::env::var(PIXELFORGE_HOME_ENV_VAR) {
        PathBuf::from(pixelforge_home)
    } else {
        DEFAULT_PIXELFORGE_HOME.to_owned()
    }
}

/// Returns the value of an environment variable, or the given default when it
/// is unset or empty.
pub fn get_env_or(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}
