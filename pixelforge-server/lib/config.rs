//! Configuration module for the pixelforge server.
//!
//! This module handles server configuration including:
//! - Server settings and environment variables
//! - JWT API key generation and verification
//! - Development and production mode settings
//!
//! The module provides:
//! - Configuration structure for server settings
//! - Default values for server configuration
//! - API key helpers built on the server key

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use chrono::{Duration, Utc};
use getset::Getters;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use pixelforge_utils::get_pixelforge_home_path;

use crate::{ServerError, ServerResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Address the server binds to
pub const LOCALHOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Length of a generated server key
const SERVER_KEY_LENGTH: usize = 32;

/// Default lifetime of an issued API key, in days
pub const DEFAULT_API_KEY_DAYS: i64 = 30;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Configuration structure that holds all the application settings
#[derive(Debug, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Config {
    /// Secret key used for API key generation and validation
    key: Option<String>,

    /// Pixelforge home directory (database, scratch space)
    home_dir: PathBuf,

    /// Whether to run the server in development mode
    dev_mode: bool,

    /// Address to listen on
    addr: SocketAddr,

    /// Internal credential attached to hosted invocations. Creator-supplied
    /// secrets are never forwarded into sandboxed code.
    service_credential: Option<String>,
}

/// Claims carried by an issued API key
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user this key authenticates
    pub sub: String,

    /// Expiry as a unix timestamp
    pub exp: i64,
}

//--------------------------------------------------------------------------------------------------
// Implementations
//--------------------------------------------------------------------------------------------------

impl Config {
    /// Create a new configuration
    pub fn new(
        key: Option<String>,
        port: u16,
        home_dir: Option<PathBuf>,
        dev_mode: bool,
        service_credential: Option<String>,
    ) -> ServerResult<Self> {
        // Check key requirement based on dev mode
        let key = match key {
            Some(k) => Some(k),
            None if dev_mode => None,
            None => {
                return Err(ServerError::ConfigError(
                    "No key provided. A key is required when not in dev mode".to_string(),
                ));
            }
        };

        let addr = SocketAddr::new(LOCALHOST_IP, port);
        let home_dir = home_dir.unwrap_or_else(get_pixelforge_home_path);

        Ok(Self {
            key,
            home_dir,
            dev_mode,
            addr,
            service_credential,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a random server key.
pub fn generate_server_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SERVER_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Issues an API key for a user, signed with the server key.
pub fn generate_api_key(server_key: &str, user_id: &str, days: i64) -> ServerResult<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::days(days)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(server_key.as_bytes()),
    )
    .map_err(|e| ServerError::InternalError(format!("failed to sign API key: {}", e)))
}

/// Verifies an API key and returns the authenticated user id.
pub fn verify_api_key(server_key: &str, token: &str) -> ServerResult<String> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(server_key.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServerError::AuthError(format!("invalid API key: {}", e)))?;

    Ok(data.claims.sub)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
