//! Request and response payloads for the text-generation provider and the
//! structured bundles the client returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

//--------------------------------------------------------------------------------------------------
// Types: Provider Wire Format
//--------------------------------------------------------------------------------------------------

/// A single chat message sent to or received from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (`system`, `user`, `assistant`)
    pub role: String,

    /// Message text
    pub content: String,
}

/// Chat completion request sent to the provider
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model to complete with
    pub model: String,

    /// Upper bound on completion tokens
    pub max_tokens: u32,

    /// Conversation so far
    pub messages: Vec<ChatMessage>,
}

/// One completion choice returned by the provider
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The completed message
    pub message: ChatMessage,
}

/// Chat completion response returned by the provider
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Completion choices; the first one is used
    pub choices: Vec<ChatChoice>,
}

//--------------------------------------------------------------------------------------------------
// Types: Structured Bundles
//--------------------------------------------------------------------------------------------------

/// A freshly generated server bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedServer {
    /// Content of the canonical entry file
    pub code: String,

    /// Server configuration object
    pub config: Value,

    /// Full file map keyed by canonical path
    pub files: BTreeMap<String, String>,

    /// Name the provider suggests for the project
    pub suggested_name: Option<String>,

    /// Description the provider suggests for the project
    pub suggested_description: Option<String>,
}

/// A refined server bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinedServer {
    /// Content of the canonical entry file after refinement
    pub code: String,

    /// Server configuration object after refinement
    pub config: Value,

    /// Full file map keyed by canonical path
    pub files: BTreeMap<String, String>,

    /// Human-readable summary of what changed
    pub changes: Vec<String>,
}
