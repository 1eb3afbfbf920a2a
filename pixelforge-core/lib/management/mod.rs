//! Central management for projects, versions, credits, and royalties.
//!
//! This module owns the version/project state machine that gates credit
//! deduction and royalty splitting. All mutating operations verify ownership
//! of the target project, and every money-adjacent transition runs as an
//! atomic compare-and-swap inside a single database transaction, so a
//! concurrent double-accept can never charge twice.

pub mod credits;
pub mod db;
pub mod project;
pub mod royalty;
pub mod version;
