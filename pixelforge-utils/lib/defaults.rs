//! Default values and constants shared across the pixelforge project.

use std::{path::PathBuf, sync::LazyLock};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default pixelforge home directory
pub static DEFAULT_PIXELFORGE_HOME: LazyLock<PathBuf> = LazyLock::new(|| {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pixelforge")
});

/// Subdirectory of the pixelforge home holding the project database
pub const DATA_SUBDIR: &str = "data";

/// Subdirectory of the pixelforge home used for per-call sandbox scratch directories
pub const SCRATCH_SUBDIR: &str = "scratch";

/// Filename of the project database
pub const PROJECT_DB_FILENAME: &str = "pixelforge.db";

/// Marker token a sandboxed runner prints on its final relevant stdout line.
///
/// The token is immediately followed, with no separator, by one JSON object
/// `{"statusCode":<int>,"headers":{...},"body":"<base64>"}`. The body is always
/// base64 so it can never contain this token or a raw newline.
pub const SANDBOX_RESULT_MARKER: &str = "__SANDBOX_RESULT__";

/// Canonical entry file expected in a generated file map
pub const CANONICAL_ENTRY_FILE: &str = "server.js";

/// Default hard wall-clock timeout for a single sandbox execution, in seconds
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 30;

/// Default credit cost of generating a new server
pub const DEFAULT_GENERATION_COST: i64 = 20;

/// Default credit cost of refining an existing server
pub const DEFAULT_REFINEMENT_COST: i64 = 10;

/// Default percentage of a hosted charge credited to the creator
pub const DEFAULT_CREATOR_SHARE_PERCENT: i64 = 50;

/// Default port the pixelforge server listens on
pub const DEFAULT_SERVER_PORT: u16 = 7070;

/// Default executable used to run sandboxed code
pub const DEFAULT_NODE_EXE: &str = "node";

/// Default OS-level isolation tool used by the jailed sandbox backend
pub const DEFAULT_JAIL_EXE: &str = "nsjail";

/// Default base URL of the text-generation provider
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model requested from the text-generation provider
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4o";

/// User id that unauthenticated requests resolve to in dev mode
pub const DEFAULT_DEV_USER_ID: &str = "dev";
