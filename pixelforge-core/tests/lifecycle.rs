//! End-to-end lifecycle tests: generate, test, accept, deploy, fork, refine,
//! and royalty recording against a real on-disk database.
//!
//! The provider and the node runtime are never touched: bundles are staged
//! directly and the sandbox engine runs its unconfined backend, whose GET
//! probe is structure-only.

use std::sync::Arc;

use pixelforge_core::{
    config::{CreditPolicy, ProviderConfig, SandboxBackendKind, SandboxSettings},
    generation::{GeneratedServer, GenerationClient},
    management::{credits, db, project, royalty, version},
    models::VersionStatus,
    sandbox::SandboxEngine,
    smoke::{SmokeReport, SmokeTestRunner},
    PixelforgeError,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

const HANDLER: &str = r#"
    module.exports = async function handler(req, res) {
        if (req.method === 'GET') {
            res.setHeader('Content-Type', 'application/json');
            res.end(JSON.stringify({ name: 'pixel-avatar-server', formats: ['png'] }));
        } else if (req.method === 'POST') {
            res.setHeader('Content-Type', 'image/png');
            res.end('not-really-a-png');
        }
    };
"#;

struct Harness {
    _dir: TempDir,
    pool: SqlitePool,
    policy: CreditPolicy,
    runner: SmokeTestRunner,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::get_or_create_pool(&dir.path().join("pixelforge.db"))
        .await
        .unwrap();

    let settings = SandboxSettings::builder()
        .backend(SandboxBackendKind::Unconfined)
        .scratch_root(dir.path().join("scratch"))
        .build();
    let runner = SmokeTestRunner::new(Arc::new(SandboxEngine::new(settings).unwrap()));

    Harness {
        _dir: dir,
        pool,
        policy: CreditPolicy::default(),
        runner,
    }
}

fn bundle() -> GeneratedServer {
    GeneratedServer {
        code: HANDLER.to_string(),
        config: serde_json::json!({"formats": ["png"], "maxSize": 256}),
        files: [("server.js".to_string(), HANDLER.to_string())]
            .into_iter()
            .collect(),
        suggested_name: Some("pixel avatar generator".to_string()),
        suggested_description: Some("Generates pixel-art avatars".to_string()),
    }
}

/// A client with no credential; any provider call through it fails with a
/// configuration error, which the ordering tests rely on.
fn unconfigured_client() -> GenerationClient {
    GenerationClient::new(ProviderConfig::builder().build())
}

#[test_log::test(tokio::test)]
async fn test_generate_test_accept_deploy_scenario() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 25).await.unwrap();

    // Generation stages a pending version and charges nothing.
    let (project_row, version_row) = project::create_from_generation(
        &h.pool,
        "alice",
        "pixel avatar generator",
        &bundle(),
        *h.policy.get_generation_cost(),
    )
    .await
    .unwrap();

    assert_eq!(version_row.status, VersionStatus::Pending.as_str());
    assert_eq!(version_row.version_number, 1);
    assert_eq!(version_row.generation_cost, 20);
    assert_eq!(project_row.status, "draft");
    assert_eq!(credits::get_balance(&h.pool, "alice").await.unwrap(), 25);

    // Smoke testing moves pending to testing and stores four named results.
    let (version_row, report) = version::run_tests(&h.pool, &h.runner, "alice", &version_row.id)
        .await
        .unwrap();
    assert_eq!(version_row.status, VersionStatus::Testing.as_str());
    assert!(report.passed());

    let stored: SmokeReport =
        serde_json::from_str(version_row.test_result.as_deref().unwrap()).unwrap();
    assert!(stored.syntax.passed);
    assert!(stored.structure.passed);
    assert!(stored.get_endpoint.passed);
    assert!(stored.post_endpoint.passed);

    // Acceptance charges exactly the generation cost and wires the live pointer.
    let (version_row, project_row) = version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap();
    assert_eq!(version_row.status, VersionStatus::Accepted.as_str());
    assert_eq!(project_row.status, "ready");
    assert_eq!(
        project_row.live_version_id.as_deref(),
        Some(version_row.id.as_str())
    );
    assert_eq!(credits::get_balance(&h.pool, "alice").await.unwrap(), 5);

    // Deployment creates a server record carrying the live version's config.
    let (project_row, server) = project::deploy(&h.pool, "alice", &project_row.id)
        .await
        .unwrap();
    assert_eq!(project_row.status, "deployed");
    assert_eq!(project_row.hosting_type.as_deref(), Some("platform"));
    assert_eq!(
        project_row.deployed_server_id.as_deref(),
        Some(server.id.as_str())
    );
    assert_eq!(server.version_id, version_row.id);
    assert_eq!(server.config, version_row.generated_config);
}

#[test_log::test(tokio::test)]
async fn test_accept_requires_sufficient_balance_and_charges_nothing_partially() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 5).await.unwrap();

    let (_, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    let error = version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap_err();
    assert!(error.is_insufficient_credits());

    // No partial charge, and the failed CAS rolled back with it.
    assert_eq!(credits::get_balance(&h.pool, "alice").await.unwrap(), 5);
    let version_row = db::get_version(&h.pool, &version_row.id).await.unwrap();
    assert_eq!(version_row.status, VersionStatus::Pending.as_str());
}

#[test_log::test(tokio::test)]
async fn test_accept_succeeds_iff_balance_covers_cost() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 20).await.unwrap();

    let (_, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    // Exact balance is enough, and the new balance is exactly b - g.
    version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap();
    assert_eq!(credits::get_balance(&h.pool, "alice").await.unwrap(), 0);
}

#[test_log::test(tokio::test)]
async fn test_accepted_is_terminal() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 40).await.unwrap();

    let (_, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();
    version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap();

    // Re-accepting must fail before any side effect: no second charge.
    let error = version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap_err();
    assert!(error.is_invalid_state());
    assert_eq!(credits::get_balance(&h.pool, "alice").await.unwrap(), 20);

    // Reject-after-accept is equally illegal.
    let error = version::reject(&h.pool, "alice", &version_row.id)
        .await
        .unwrap_err();
    assert!(error.is_invalid_state());

    // And a terminal version can no longer be tested.
    let error = version::run_tests(&h.pool, &h.runner, "alice", &version_row.id)
        .await
        .unwrap_err();
    assert!(error.is_invalid_state());
}

#[test_log::test(tokio::test)]
async fn test_rerunning_tests_is_idempotent_and_never_returns_to_pending() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 25).await.unwrap();

    let (_, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    let (first, _) = version::run_tests(&h.pool, &h.runner, "alice", &version_row.id)
        .await
        .unwrap();
    let (second, _) = version::run_tests(&h.pool, &h.runner, "alice", &version_row.id)
        .await
        .unwrap();

    assert_eq!(first.status, VersionStatus::Testing.as_str());
    assert_eq!(second.status, VersionStatus::Testing.as_str());
    assert!(second.test_result.is_some());
}

#[test_log::test(tokio::test)]
async fn test_reject_charges_nothing() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 25).await.unwrap();

    let (_, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    let rejected = version::reject(&h.pool, "alice", &version_row.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, VersionStatus::Rejected.as_str());
    assert_eq!(credits::get_balance(&h.pool, "alice").await.unwrap(), 25);
}

#[test_log::test(tokio::test)]
async fn test_fork_copies_live_version_for_free() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 25).await.unwrap();

    let (project_row, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();
    version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap();

    let bob_balance_before = credits::get_balance(&h.pool, "bob").await.unwrap();
    let (fork, copied) = project::fork(&h.pool, "bob", &project_row.id).await.unwrap();
    let copied = copied.expect("live version should be copied");

    assert_eq!(fork.owner_id, "bob");
    assert_eq!(copied.generation_cost, 0);
    assert_eq!(copied.status, VersionStatus::Accepted.as_str());
    assert_eq!(copied.version_number, 1);
    assert_eq!(copied.parent_version_id.as_deref(), Some(version_row.id.as_str()));
    assert_eq!(fork.live_version_id.as_deref(), Some(copied.id.as_str()));
    assert_eq!(
        credits::get_balance(&h.pool, "bob").await.unwrap(),
        bob_balance_before
    );
}

#[test_log::test(tokio::test)]
async fn test_fork_without_live_version_copies_nothing() {
    let h = harness().await;
    let (project_row, _) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    let (fork, copied) = project::fork(&h.pool, "bob", &project_row.id).await.unwrap();
    assert!(copied.is_none());
    assert!(fork.live_version_id.is_none());
    assert_eq!(fork.status, "draft");
}

#[test_log::test(tokio::test)]
async fn test_refine_with_insufficient_credits_never_calls_the_provider() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 5).await.unwrap();

    let (project_row, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    // The unconfigured client fails with a configuration error if it is ever
    // invoked, so an insufficient-credits error proves the balance check ran
    // first and no provider call was made.
    let error = version::refine(
        &h.pool,
        &unconfigured_client(),
        &h.policy,
        "alice",
        &project_row.id,
        "add a border",
    )
    .await
    .unwrap_err();
    assert!(error.is_insufficient_credits());

    // No new version row was created.
    let versions = db::list_project_versions(&h.pool, &project_row.id)
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].id, version_row.id);
}

#[test_log::test(tokio::test)]
async fn test_deploy_requires_live_version() {
    let h = harness().await;
    let (project_row, _) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    let error = project::deploy(&h.pool, "alice", &project_row.id)
        .await
        .unwrap_err();
    assert!(error.is_invalid_state());
}

#[test_log::test(tokio::test)]
async fn test_mutations_require_ownership() {
    let h = harness().await;
    credits::credit(&h.pool, "mallory", 100).await.unwrap();

    let (project_row, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    let error = version::accept(&h.pool, "mallory", &version_row.id)
        .await
        .unwrap_err();
    assert!(matches!(error, PixelforgeError::Forbidden(_)));

    let error = project::deploy(&h.pool, "mallory", &project_row.id)
        .await
        .unwrap_err();
    assert!(matches!(error, PixelforgeError::Forbidden(_)));
}

#[test_log::test(tokio::test)]
async fn test_royalty_split_credits_creator_once() {
    let h = harness().await;
    credits::credit(&h.pool, "alice", 25).await.unwrap();

    let (project_row, version_row) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();
    version::accept(&h.pool, "alice", &version_row.id)
        .await
        .unwrap();

    let balance_before = credits::get_balance(&h.pool, "alice").await.unwrap();
    let royalty_row = royalty::record_royalty(&h.pool, &h.policy, &project_row.id, "image-1", 9)
        .await
        .unwrap();

    assert_eq!(
        royalty_row.creator_share + royalty_row.platform_share,
        royalty_row.credits_charged
    );
    assert_eq!(
        credits::get_balance(&h.pool, "alice").await.unwrap(),
        balance_before + royalty_row.creator_share
    );

    // At most once per confirmed charge: the same image cannot be recorded
    // twice, and the failed attempt credits nothing.
    let error = royalty::record_royalty(&h.pool, &h.policy, &project_row.id, "image-1", 9)
        .await
        .unwrap_err();
    assert!(error.is_invalid_state());
    assert_eq!(
        credits::get_balance(&h.pool, "alice").await.unwrap(),
        balance_before + royalty_row.creator_share
    );
}

#[test_log::test(tokio::test)]
async fn test_version_numbers_increase_per_project() {
    let h = harness().await;
    let (project_row, _) =
        project::create_from_generation(&h.pool, "alice", "avatars", &bundle(), 20)
            .await
            .unwrap();

    assert_eq!(
        db::next_version_number(&h.pool, &project_row.id).await.unwrap(),
        2
    );
    assert_eq!(db::next_version_number(&h.pool, "no-such").await.unwrap(), 1);
}
