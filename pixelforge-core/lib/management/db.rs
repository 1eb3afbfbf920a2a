//! Database pool management and row-level queries.
//!
//! The persistence layer is deliberately thin: get/insert/update single
//! records by id, plus list-by-parent for a project's versions. Everything
//! with state-machine semantics lives in the sibling modules and goes through
//! guarded UPDATE statements there.

use std::path::Path;

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tokio::fs;

use crate::{
    models::{Project, Royalty, ServerRecord, Version},
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Migrator for the pixelforge project database
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

//--------------------------------------------------------------------------------------------------
// Functions: Pool
//--------------------------------------------------------------------------------------------------

/// Opens (creating if necessary) the project database at the given path and
/// applies pending migrations.
pub async fn get_or_create_pool(db_path: &Path) -> PixelforgeResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}

//--------------------------------------------------------------------------------------------------
// Functions: Queries
//--------------------------------------------------------------------------------------------------

/// Fetches a project by id.
pub async fn get_project(pool: &SqlitePool, id: &str) -> PixelforgeResult<Project> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PixelforgeError::NotFound {
            entity: "project".to_string(),
            id: id.to_string(),
        })
}

/// Fetches a version by id.
pub async fn get_version(pool: &SqlitePool, id: &str) -> PixelforgeResult<Version> {
    sqlx::query_as::<_, Version>("SELECT * FROM versions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PixelforgeError::NotFound {
            entity: "version".to_string(),
            id: id.to_string(),
        })
}

/// Lists a project's versions, newest first.
pub async fn list_project_versions(
    pool: &SqlitePool,
    project_id: &str,
) -> PixelforgeResult<Vec<Version>> {
    let versions = sqlx::query_as::<_, Version>(
        "SELECT * FROM versions WHERE project_id = ? ORDER BY version_number DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(versions)
}

/// Returns the next version number for a project.
///
/// Numbers are unique and increasing per project; gaps are permitted.
pub async fn next_version_number(pool: &SqlitePool, project_id: &str) -> PixelforgeResult<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version_number) FROM versions WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(pool)
            .await?;

    Ok(max.unwrap_or(0) + 1)
}

/// Fetches the hosted server record for a project, if one exists.
pub async fn get_server_for_project(
    pool: &SqlitePool,
    project_id: &str,
) -> PixelforgeResult<Option<ServerRecord>> {
    let server = sqlx::query_as::<_, ServerRecord>("SELECT * FROM servers WHERE project_id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    Ok(server)
}

/// Fetches the royalty recorded for a created image, if any.
pub async fn get_royalty_for_image(
    pool: &SqlitePool,
    image_id: &str,
) -> PixelforgeResult<Option<Royalty>> {
    let royalty = sqlx::query_as::<_, Royalty>("SELECT * FROM royalties WHERE image_id = ?")
        .bind(image_id)
        .fetch_optional(pool)
        .await?;

    Ok(royalty)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Current time in the stored RFC 3339 form.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
