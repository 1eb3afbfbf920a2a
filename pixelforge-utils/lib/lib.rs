//! `pixelforge_utils` is a library containing general utilities for the pixelforge project.

#![warn(missing_docs)]

mod defaults;
mod env;
mod error;
mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use env::*;
pub use error::*;
pub use path::*;
