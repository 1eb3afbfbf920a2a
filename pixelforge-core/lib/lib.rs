//! `pixelforge` turns natural-language descriptions into hosted image-generation servers.
//!
//! # Overview
//!
//! pixelforge lets a user describe a desired image-generation server, has a
//! text-generation provider produce runnable server code, validates and
//! smoke-tests that code in an isolated sandbox, and gates acceptance against
//! a credit balance. Accepted code can be deployed on the platform, where
//! every public invocation re-executes it in isolation and splits charged
//! credits between creator and platform. This crate handles:
//! - Turning free-text prompts into structured code bundles
//! - Static validation of machine-generated code
//! - Process-isolated execution with timeouts and structured result extraction
//! - The per-version accept/reject state machine tied to credits
//! - Royalty recording for hosted invocations
//!
//! # Architecture
//!
//! pixelforge-core consists of several key components:
//!
//! - **Generation**: client for the external text-generation provider
//! - **Validator**: pure static scan for syntax errors and disallowed patterns
//! - **Sandbox**: process-isolation engine with unconfined and jailed backends
//! - **Smoke**: the fixed four-check battery run before acceptance
//! - **Management**: project/version lifecycle, credits, and royalties
//! - **Models**: database rows and status enums
//!
//! # Modules
//!
//! - [`config`] - Configuration types for the engine, provider, and credit policy
//! - [`generation`] - Code generation client and provider payloads
//! - [`management`] - Lifecycle management, persistence, credits, royalties
//! - [`models`] - Database models and status enums
//! - [`sandbox`] - Sandbox execution engine and backends
//! - [`smoke`] - Smoke test runner
//! - [`validator`] - Static validator

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod config;
pub mod generation;
pub mod management;
pub mod models;
pub mod sandbox;
pub mod smoke;
pub mod validator;

pub use error::*;
