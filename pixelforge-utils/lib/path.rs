//! Utility functions for working with request paths.

use crate::{PixelforgeUtilsError, PixelforgeUtilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a forwarded request path into a rooted, dot-free form.
///
/// The path a hosted invocation forwards into a sandboxed server is attacker
/// controlled, so `.` and empty segments are collapsed and any `..` segment is
/// rejected outright rather than resolved.
pub fn normalize_request_path(requested: &str) -> PixelforgeUtilsResult<String> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in requested.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(PixelforgeUtilsError::PathValidation(format!(
                    "request path '{}' contains a parent-directory segment",
                    requested
                )));
            }
            other => segments.push(other),
        }
    }

    Ok(format!("/{}", segments.join("/")))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
