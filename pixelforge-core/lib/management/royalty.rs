//! The royalty ledger for hosted invocations.
//!
//! Royalty recording is invoked by the billing path only after it has
//! confirmed that an end-user charge succeeded. Each confirmed charge is
//! split by the configured percentage into a creator share and a platform
//! share, persisted as one append-only ledger row, and the creator's balance
//! is credited — the row insert and the balance credit commit in one
//! transaction. A unique index on the triggering image id enforces the
//! at-most-once rule.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::CreditPolicy,
    management::{credits, db},
    models::Royalty,
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Splits a charged amount into creator and platform shares.
///
/// The shares always sum to the charged amount; on an odd split the creator
/// share is rounded down and the platform keeps the remainder.
pub fn split_charge(policy: &CreditPolicy, credits_charged: i64) -> (i64, i64) {
    let creator_share = credits_charged * policy.get_creator_share_percent() / 100;
    let platform_share = credits_charged - creator_share;

    (creator_share, platform_share)
}

/// Records the royalty for one confirmed hosted charge.
///
/// Persists the ledger row and credits the creator's balance atomically.
/// Recording the same image twice fails without any balance change.
pub async fn record_royalty(
    pool: &SqlitePool,
    policy: &CreditPolicy,
    project_id: &str,
    image_id: &str,
    credits_charged: i64,
) -> PixelforgeResult<Royalty> {
    let project = db::get_project(pool, project_id).await?;
    let (creator_share, platform_share) = split_charge(policy, credits_charged);

    let royalty_id = Uuid::new_v4().to_string();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO royalties (id, project_id, image_id, credits_charged, creator_share, \
         platform_share, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&royalty_id)
    .bind(project_id)
    .bind(image_id)
    .bind(credits_charged)
    .bind(creator_share)
    .bind(platform_share)
    .bind(db::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(dbe) if dbe.is_unique_violation() => PixelforgeError::InvalidState {
            entity: format!("royalty for image {}", image_id),
            current: "recorded".to_string(),
            attempted: "record again".to_string(),
        },
        _ => PixelforgeError::Database(e),
    })?;

    credits::credit(&mut *tx, &project.owner_id, creator_share).await?;

    tx.commit().await?;

    tracing::info!(
        project = %project_id,
        image = %image_id,
        creator_share,
        platform_share,
        "royalty recorded"
    );

    let royalty = db::get_royalty_for_image(pool, image_id)
        .await?
        .ok_or_else(|| PixelforgeError::NotFound {
            entity: "royalty".to_string(),
            id: image_id.to_string(),
        })?;

    Ok(royalty)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_shares_sum_to_charge() {
        let policy = CreditPolicy::default();

        for charge in [0, 1, 2, 3, 10, 99, 100, 12345] {
            let (creator, platform) = split_charge(&policy, charge);
            assert_eq!(creator + platform, charge, "charge {}", charge);
            assert!(creator >= 0 && platform >= 0);
        }
    }

    #[test]
    fn test_split_default_is_even() {
        let policy = CreditPolicy::default();
        assert_eq!(split_charge(&policy, 10), (5, 5));

        // Odd charges round the creator share down.
        assert_eq!(split_charge(&policy, 11), (5, 6));
    }

    #[test]
    fn test_split_respects_configured_percent() {
        let policy = CreditPolicy::new(20, 10, 70);
        assert_eq!(split_charge(&policy, 10), (7, 3));
    }
}
