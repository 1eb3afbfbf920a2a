//! Code generation via an external text-generation provider.
//!
//! This module handles:
//! - Building generate/refine requests against the provider's chat API
//! - Parsing free-form responses into structured server bundles
//! - Distinguishing provider failures from malformed payloads

mod client;
mod payload;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use client::*;
pub use payload::*;
