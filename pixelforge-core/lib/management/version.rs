//! The per-version lifecycle state machine.
//!
//! States: `pending → testing → accepted | rejected`. Accepted and rejected
//! are terminal; `testing → pending` does not exist. Acceptance is the only
//! transition that touches money: it deducts exactly the version's
//! generation cost and wires the project's live pointer, all inside one
//! transaction. Every transition is an atomic compare-and-swap on the stored
//! status (the UPDATE only succeeds while the row still holds an expected
//! pre-transition state), so concurrent double-accepts cannot both charge.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::CreditPolicy,
    generation::GenerationClient,
    management::{credits, db, project::ensure_owner},
    models::{Project, ProjectStatus, Version, VersionStatus},
    smoke::{SmokeReport, SmokeTestRunner},
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Refines a project's current code with a follow-up prompt.
///
/// The refinement cost must be affordable *before* the provider is called;
/// an insufficient balance means no provider traffic and no new version row.
/// Nothing is charged here either way.
pub async fn refine(
    pool: &SqlitePool,
    client: &GenerationClient,
    policy: &CreditPolicy,
    acting_user: &str,
    project_id: &str,
    prompt: &str,
) -> PixelforgeResult<Version> {
    let project = db::get_project(pool, project_id).await?;
    ensure_owner(&project, acting_user)?;

    let parent = latest_version(pool, &project).await?;

    credits::ensure_can_afford(pool, acting_user, *policy.get_refinement_cost()).await?;

    let config: serde_json::Value = serde_json::from_str(&parent.generated_config)?;
    let bundle = client
        .refine(&parent.generated_code, &config, prompt)
        .await?;

    let version_id = Uuid::new_v4().to_string();
    let number = db::next_version_number(pool, project_id).await?;

    sqlx::query(
        "INSERT INTO versions (id, project_id, version_number, user_prompt, refinement_prompt, \
         generated_code, generated_config, generation_cost, parent_version_id, status, \
         created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&version_id)
    .bind(project_id)
    .bind(number)
    .bind(&parent.user_prompt)
    .bind(prompt)
    .bind(&bundle.code)
    .bind(bundle.config.to_string())
    .bind(policy.get_refinement_cost())
    .bind(&parent.id)
    .bind(VersionStatus::Pending.as_str())
    .bind(db::now())
    .execute(pool)
    .await?;

    tracing::info!(project = %project_id, version = %version_id, number, "refined project");

    db::get_version(pool, &version_id).await
}

/// Runs the smoke test battery against a version.
///
/// Moves `pending → testing` and stores the report as the version's test
/// result. Idempotent: re-running on a testing version replaces the stored
/// report without changing state. Terminal versions are immutable, so
/// testing one is an invalid transition.
pub async fn run_tests(
    pool: &SqlitePool,
    runner: &SmokeTestRunner,
    acting_user: &str,
    version_id: &str,
) -> PixelforgeResult<(Version, SmokeReport)> {
    let version = db::get_version(pool, version_id).await?;
    let project = db::get_project(pool, &version.project_id).await?;
    ensure_owner(&project, acting_user)?;

    if version.parsed_status()?.is_terminal() {
        return Err(invalid_transition(&version, "run tests"));
    }

    let report = runner.run(&version.generated_code).await;
    let serialized = serde_json::to_string(&report)?;

    let updated = sqlx::query(
        "UPDATE versions SET status = ?, test_result = ? \
         WHERE id = ? AND status IN ('pending', 'testing')",
    )
    .bind(VersionStatus::Testing.as_str())
    .bind(&serialized)
    .bind(version_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(invalid_transition(&version, "run tests"));
    }

    tracing::info!(version = %version_id, passed = report.passed(), "smoke tests recorded");

    Ok((db::get_version(pool, version_id).await?, report))
}

/// Accepts a version, charging its generation cost.
///
/// Requires `balance >= generation_cost`; deducts exactly that amount, sets
/// the project's live pointer to this version, and marks the project ready.
/// The status CAS, the guarded deduction, and the project update commit
/// together or not at all — a failed balance check leaves no partial charge.
pub async fn accept(
    pool: &SqlitePool,
    acting_user: &str,
    version_id: &str,
) -> PixelforgeResult<(Version, Project)> {
    let version = db::get_version(pool, version_id).await?;
    let project = db::get_project(pool, &version.project_id).await?;
    ensure_owner(&project, acting_user)?;

    // Terminal states are rejected before any side effect.
    if version.parsed_status()?.is_terminal() {
        return Err(invalid_transition(&version, "accept"));
    }

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE versions SET status = ? WHERE id = ? AND status IN ('pending', 'testing')",
    )
    .bind(VersionStatus::Accepted.as_str())
    .bind(version_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(invalid_transition(&version, "accept"));
    }

    if version.generation_cost > 0
        && !credits::try_deduct(&mut *tx, acting_user, version.generation_cost).await?
    {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT credits FROM credit_balances WHERE user_id = ?")
                .bind(acting_user)
                .fetch_optional(&mut *tx)
                .await?;

        return Err(PixelforgeError::InsufficientCredits {
            required: version.generation_cost,
            available: available.unwrap_or(0),
        });
    }

    sqlx::query("UPDATE projects SET live_version_id = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(version_id)
        .bind(ProjectStatus::Ready.as_str())
        .bind(db::now())
        .bind(&version.project_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        version = %version_id,
        cost = version.generation_cost,
        "version accepted and charged"
    );

    Ok((
        db::get_version(pool, version_id).await?,
        db::get_project(pool, &version.project_id).await?,
    ))
}

/// Rejects a version. No balance check, no charge.
pub async fn reject(
    pool: &SqlitePool,
    acting_user: &str,
    version_id: &str,
) -> PixelforgeResult<Version> {
    let version = db::get_version(pool, version_id).await?;
    let project = db::get_project(pool, &version.project_id).await?;
    ensure_owner(&project, acting_user)?;

    if version.parsed_status()?.is_terminal() {
        return Err(invalid_transition(&version, "reject"));
    }

    let updated = sqlx::query(
        "UPDATE versions SET status = ? WHERE id = ? AND status IN ('pending', 'testing')",
    )
    .bind(VersionStatus::Rejected.as_str())
    .bind(version_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(invalid_transition(&version, "reject"));
    }

    db::get_version(pool, version_id).await
}

/// Lists a project's versions for its owner, newest first.
pub async fn list(
    pool: &SqlitePool,
    acting_user: &str,
    project_id: &str,
) -> PixelforgeResult<Vec<Version>> {
    let project = db::get_project(pool, project_id).await?;
    ensure_owner(&project, acting_user)?;

    db::list_project_versions(pool, project_id).await
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// The version a refinement starts from: the live version when set,
/// otherwise the newest version.
async fn latest_version(pool: &SqlitePool, project: &Project) -> PixelforgeResult<Version> {
    if let Some(live_id) = &project.live_version_id {
        return db::get_version(pool, live_id).await;
    }

    db::list_project_versions(pool, &project.id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PixelforgeError::NotFound {
            entity: "version".to_string(),
            id: format!("latest of project {}", project.id),
        })
}

fn invalid_transition(version: &Version, attempted: &str) -> PixelforgeError {
    PixelforgeError::InvalidState {
        entity: format!("version {}", version.id),
        current: version.status.clone(),
        attempted: attempted.to_string(),
    }
}
