use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::models::{Contract, ContractShare};

/// key: billing-shares -> cross-account contract grants
///
/// A share lets a non-owning account pull the contract into its consolidated
/// billing. Sharing with the owner is rejected outright; the (contract,
/// account) pair is unique, so a repeat grant surfaces as a conflict.
pub async fn create_share(
    pool: &PgPool,
    contract_id: Uuid,
    account_id: Uuid,
    notes: Option<String>,
) -> AppResult<ContractShare> {
    let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
        .bind(contract_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("contract"))?;

    let account_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?;
    if account_exists.is_none() {
        return Err(AppError::NotFound("account"));
    }

    if contract.account_id == account_id {
        return Err(AppError::BadRequest(
            "cannot share a contract with its owning account".to_string(),
        ));
    }

    let share = sqlx::query_as::<_, ContractShare>(
        r#"
        INSERT INTO contract_shares (id, contract_id, account_id, notes)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(contract_id)
    .bind(account_id)
    .bind(notes)
    .fetch_one(pool)
    .await?;

    Ok(share)
}

pub async fn remove_share(pool: &PgPool, contract_id: Uuid, account_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM contract_shares WHERE contract_id = $1 AND account_id = $2")
        .bind(contract_id)
        .bind(account_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("contract share"));
    }
    Ok(())
}

pub async fn list_shares_for_account(
    pool: &PgPool,
    account_id: Uuid,
) -> AppResult<Vec<ContractShare>> {
    let shares = sqlx::query_as::<_, ContractShare>(
        "SELECT * FROM contract_shares WHERE account_id = $1 ORDER BY created_at",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(shares)
}
