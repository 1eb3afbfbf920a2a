//! Per-user credit balances.
//!
//! Balances are mutated only through the explicit deduct/credit operations
//! here and can never go negative: deduction is a single guarded UPDATE whose
//! affected-row count tells the caller whether the balance covered the
//! amount, so there is no read-then-write window to race through.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::{PixelforgeError, PixelforgeResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns a user's current balance; users without a row have zero credits.
pub async fn get_balance(pool: &SqlitePool, user_id: &str) -> PixelforgeResult<i64> {
    let credits: Option<i64> =
        sqlx::query_scalar("SELECT credits FROM credit_balances WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(credits.unwrap_or(0))
}

/// Fails with `InsufficientCredits` unless the user's balance covers
/// `amount`. Performs no mutation; callers use this to reject an operation
/// before doing any expensive or external work on its behalf.
pub async fn ensure_can_afford(
    pool: &SqlitePool,
    user_id: &str,
    amount: i64,
) -> PixelforgeResult<()> {
    let available = get_balance(pool, user_id).await?;
    if available < amount {
        return Err(PixelforgeError::InsufficientCredits {
            required: amount,
            available,
        });
    }

    Ok(())
}

/// Adds credits to a user's balance, creating the row if needed.
pub async fn credit<'e, E>(executor: E, user_id: &str, amount: i64) -> PixelforgeResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO credit_balances (user_id, credits) VALUES (?, ?) \
         ON CONFLICT (user_id) DO UPDATE SET credits = credits + excluded.credits",
    )
    .bind(user_id)
    .bind(amount)
    .execute(executor)
    .await?;

    Ok(())
}

/// Attempts to deduct `amount` from a user's balance.
///
/// Returns true when the deduction happened; false when the balance (or the
/// row) did not cover it. The guard is the WHERE clause itself, making the
/// deduction atomic with its balance check.
pub async fn try_deduct<'e, E>(executor: E, user_id: &str, amount: i64) -> PixelforgeResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE credit_balances SET credits = credits - ? WHERE user_id = ? AND credits >= ?",
    )
    .bind(amount)
    .bind(user_id)
    .bind(amount)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::db;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::get_or_create_pool(&dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_missing_row_reads_as_zero() {
        let (_dir, pool) = test_pool().await;
        assert_eq!(get_balance(&pool, "nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_and_deduct() {
        let (_dir, pool) = test_pool().await;

        credit(&pool, "alice", 25).await.unwrap();
        assert_eq!(get_balance(&pool, "alice").await.unwrap(), 25);

        assert!(try_deduct(&pool, "alice", 20).await.unwrap());
        assert_eq!(get_balance(&pool, "alice").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_deduct_never_goes_negative() {
        let (_dir, pool) = test_pool().await;
        credit(&pool, "alice", 5).await.unwrap();

        assert!(!try_deduct(&pool, "alice", 10).await.unwrap());
        assert_eq!(get_balance(&pool, "alice").await.unwrap(), 5);

        assert!(!try_deduct(&pool, "nobody", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_can_afford() {
        let (_dir, pool) = test_pool().await;
        credit(&pool, "alice", 5).await.unwrap();

        assert!(ensure_can_afford(&pool, "alice", 5).await.is_ok());

        let error = ensure_can_afford(&pool, "alice", 10).await.unwrap_err();
        match error {
            PixelforgeError::InsufficientCredits {
                required,
                available,
            } => {
                assert_eq!(required, 10);
                assert_eq!(available, 5);
            }
            other => panic!("expected insufficient credits, got {}", other),
        }
    }
}
