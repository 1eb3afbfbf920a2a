//! Project operations: generation, forking, deployment, and branding.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::CreditPolicy,
    generation::{GeneratedServer, GenerationClient},
    management::{credits, db},
    models::{HostingType, Project, ProjectStatus, ServerRecord, Version, VersionStatus},
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a new project from a free-text description.
///
/// The balance must cover the generation cost before the provider is called,
/// but nothing is charged here; charging happens once, at acceptance. On
/// success a draft project exists with version 1 pending.
pub async fn generate(
    pool: &SqlitePool,
    client: &GenerationClient,
    policy: &CreditPolicy,
    owner_id: &str,
    description: &str,
) -> PixelforgeResult<(Project, Version)> {
    credits::ensure_can_afford(pool, owner_id, *policy.get_generation_cost()).await?;

    let bundle = client.generate(description).await?;

    create_from_generation(
        pool,
        owner_id,
        description,
        &bundle,
        *policy.get_generation_cost(),
    )
    .await
}

/// Persists a generated bundle as a new draft project with version 1.
///
/// Split out from [`generate`] so the provider call can be bypassed where a
/// bundle is already at hand.
pub async fn create_from_generation(
    pool: &SqlitePool,
    owner_id: &str,
    description: &str,
    bundle: &GeneratedServer,
    generation_cost: i64,
) -> PixelforgeResult<(Project, Version)> {
    let project_id = Uuid::new_v4().to_string();
    let version_id = Uuid::new_v4().to_string();
    let now = db::now();

    let name = bundle
        .suggested_name
        .clone()
        .unwrap_or_else(|| fallback_name(description));
    let project_description = bundle
        .suggested_description
        .clone()
        .unwrap_or_else(|| description.to_string());

    sqlx::query(
        "INSERT INTO projects (id, owner_id, name, description, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&project_id)
    .bind(owner_id)
    .bind(&name)
    .bind(&project_description)
    .bind(ProjectStatus::Draft.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO versions (id, project_id, version_number, user_prompt, generated_code, \
         generated_config, generation_cost, status, created_at) \
         VALUES (?, ?, 1, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&version_id)
    .bind(&project_id)
    .bind(description)
    .bind(&bundle.code)
    .bind(bundle.config.to_string())
    .bind(generation_cost)
    .bind(VersionStatus::Pending.as_str())
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(project = %project_id, version = %version_id, "generated new project");

    let project = db::get_project(pool, &project_id).await?;
    let version = db::get_version(pool, &version_id).await?;

    Ok((project, version))
}

/// Forks a project for a new owner.
///
/// If the source has a live version, it is copied as version 1 of the fork
/// with zero generation cost, already accepted, and immediately live — the
/// content was already paid for once, so no charge and no balance change.
pub async fn fork(
    pool: &SqlitePool,
    owner_id: &str,
    source_project_id: &str,
) -> PixelforgeResult<(Project, Option<Version>)> {
    let source = db::get_project(pool, source_project_id).await?;

    let project_id = Uuid::new_v4().to_string();
    let now = db::now();

    let live = match &source.live_version_id {
        Some(live_id) => Some(db::get_version(pool, live_id).await?),
        None => None,
    };

    let status = if live.is_some() {
        ProjectStatus::Ready
    } else {
        ProjectStatus::Draft
    };

    sqlx::query(
        "INSERT INTO projects (id, owner_id, name, description, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&project_id)
    .bind(owner_id)
    .bind(&source.name)
    .bind(&source.description)
    .bind(status.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let copied = match live {
        Some(live) => {
            let version_id = Uuid::new_v4().to_string();

            sqlx::query(
                "INSERT INTO versions (id, project_id, version_number, user_prompt, \
                 generated_code, generated_config, generation_cost, parent_version_id, status, \
                 test_result, created_at) VALUES (?, ?, 1, ?, ?, ?, 0, ?, ?, ?, ?)",
            )
            .bind(&version_id)
            .bind(&project_id)
            .bind(&live.user_prompt)
            .bind(&live.generated_code)
            .bind(&live.generated_config)
            .bind(&live.id)
            .bind(VersionStatus::Accepted.as_str())
            .bind(&live.test_result)
            .bind(&now)
            .execute(pool)
            .await?;

            sqlx::query("UPDATE projects SET live_version_id = ?, updated_at = ? WHERE id = ?")
                .bind(&version_id)
                .bind(&now)
                .bind(&project_id)
                .execute(pool)
                .await?;

            Some(db::get_version(pool, &version_id).await?)
        }
        None => None,
    };

    tracing::info!(source = %source_project_id, fork = %project_id, "forked project");

    let project = db::get_project(pool, &project_id).await?;

    Ok((project, copied))
}

/// Deploys a project's live version for hosted invocation.
///
/// Requires a live version. Creates or updates the project's hosted server
/// record carrying the live version's config, then marks the project
/// deployed with platform hosting.
pub async fn deploy(
    pool: &SqlitePool,
    acting_user: &str,
    project_id: &str,
) -> PixelforgeResult<(Project, ServerRecord)> {
    let project = db::get_project(pool, project_id).await?;
    ensure_owner(&project, acting_user)?;

    let live_version_id = project.live_version_id.as_deref().ok_or_else(|| {
        PixelforgeError::InvalidState {
            entity: "project".to_string(),
            current: project.status.clone(),
            attempted: "deploy without an accepted live version".to_string(),
        }
    })?;

    let live = db::get_version(pool, live_version_id).await?;
    let now = db::now();
    let server_id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO servers (id, project_id, version_id, config, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (project_id) DO UPDATE SET version_id = excluded.version_id, \
         config = excluded.config, updated_at = excluded.updated_at",
    )
    .bind(&server_id)
    .bind(project_id)
    .bind(&live.id)
    .bind(&live.generated_config)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let server = db::get_server_for_project(pool, project_id)
        .await?
        .ok_or_else(|| PixelforgeError::NotFound {
            entity: "server".to_string(),
            id: project_id.to_string(),
        })?;

    sqlx::query(
        "UPDATE projects SET status = ?, hosting_type = ?, deployed_server_id = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(ProjectStatus::Deployed.as_str())
    .bind(HostingType::Platform.as_str())
    .bind(&server.id)
    .bind(&now)
    .bind(project_id)
    .execute(pool)
    .await?;

    tracing::info!(project = %project_id, server = %server.id, "deployed project");

    let project = db::get_project(pool, project_id).await?;

    Ok((project, server))
}

/// Updates a project's branding fields used by the hosted GET overlay.
pub async fn update_branding(
    pool: &SqlitePool,
    acting_user: &str,
    project_id: &str,
    icon_url: Option<String>,
    banner_url: Option<String>,
) -> PixelforgeResult<Project> {
    let project = db::get_project(pool, project_id).await?;
    ensure_owner(&project, acting_user)?;

    sqlx::query("UPDATE projects SET icon_url = ?, banner_url = ?, updated_at = ? WHERE id = ?")
        .bind(&icon_url)
        .bind(&banner_url)
        .bind(db::now())
        .bind(project_id)
        .execute(pool)
        .await?;

    db::get_project(pool, project_id).await
}

/// Verifies that the acting user owns the project.
pub(crate) fn ensure_owner(project: &Project, acting_user: &str) -> PixelforgeResult<()> {
    if project.owner_id != acting_user {
        return Err(PixelforgeError::Forbidden(format!(
            "user '{}' does not own project '{}'",
            acting_user, project.id
        )));
    }

    Ok(())
}

fn fallback_name(description: &str) -> String {
    let words: Vec<&str> = description.split_whitespace().take(4).collect();
    if words.is_empty() {
        "untitled-server".to_string()
    } else {
        words.join(" ")
    }
}
