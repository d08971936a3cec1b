use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::assembler::{persist_invoice, NewInvoice, PricedLine};
use super::models::{Account, Contract, VolumeTier};
use super::numbering;
use super::period::{period_amount, BillingFrequency};
use super::pricing::price_seats;

/// Hierarchy traversal stops after this many levels below the parent. The cap
/// is the only cycle guard; cycles are not detected separately.
const MAX_HIERARCHY_DEPTH: u32 = 5;

/// key: billing-consolidation -> subtree aggregation into one invoice
#[derive(Clone)]
pub struct ConsolidationService {
    pool: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedInvoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub total: Decimal,
    pub subsidiaries_included: usize,
}

impl ConsolidationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn generate(
        &self,
        parent_account_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        include_children: bool,
    ) -> AppResult<ConsolidatedInvoice> {
        if period_end <= period_start {
            return Err(AppError::BadRequest(
                "period_end must be after period_start".to_string(),
            ));
        }

        let parent = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(parent_account_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("account"))?;

        if parent.credit_hold {
            return Err(AppError::CreditHold);
        }

        let descendants = if include_children {
            collect_descendants(&self.pool, parent.id).await?
        } else {
            Vec::new()
        };

        let mut scope: Vec<Uuid> = Vec::with_capacity(descendants.len() + 1);
        scope.push(parent.id);
        scope.extend(descendants.iter().copied());

        // Owned by anyone in scope, or shared into scope, active, and
        // overlapping the billing window.
        let contracts = sqlx::query_as::<_, Contract>(
            r#"
            SELECT DISTINCT c.*
            FROM contracts c
            LEFT JOIN contract_shares s ON s.contract_id = c.id
            WHERE (c.account_id = ANY($1) OR s.account_id = ANY($1))
              AND c.status = 'active'
              AND c.start_date <= $3
              AND (c.end_date IS NULL OR c.end_date >= $2)
            "#,
        )
        .bind(&scope)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?;

        if contracts.is_empty() {
            return Err(AppError::NoContracts);
        }

        let mut lines: Vec<PricedLine> = Vec::new();
        for contract in &contracts {
            let line = self.price_contract(contract).await?;
            if line.amount > Decimal::ZERO {
                lines.push(line);
            }
        }

        if lines.is_empty() {
            return Err(AppError::NoBillableItems);
        }

        let subtotal: Decimal = lines.iter().map(|line| line.amount).sum();
        let tax = Decimal::ZERO;
        let discount = Decimal::ZERO;
        let total = subtotal + tax - discount;

        let issue_date = Utc::now();
        let due_date = issue_date + Duration::days(i64::from(parent.payment_terms_days));

        let mut tx = self.pool.begin().await?;
        let invoice_number = numbering::next_invoice_number(&mut tx, issue_date.year()).await?;
        let invoice_id = persist_invoice(
            &mut tx,
            &NewInvoice {
                account_id: parent.id,
                contract_id: None,
                invoice_number: &invoice_number,
                period_start,
                period_end,
                issue_date,
                due_date,
                currency: &parent.currency,
                subtotal,
                tax,
                discount,
                total,
                consolidated: true,
            },
            &lines,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            %invoice_number,
            parent_account_id = %parent.id,
            subsidiaries = descendants.len(),
            contracts = contracts.len(),
            %total,
            "generated consolidated invoice"
        );

        Ok(ConsolidatedInvoice {
            invoice_id,
            invoice_number,
            total,
            subsidiaries_included: descendants.len(),
        })
    }

    /// Same seat/fixed-value pricing as the single-contract path. Setup fees
    /// and charge-type suppression deliberately do not apply on the
    /// consolidated path.
    async fn price_contract(&self, contract: &Contract) -> AppResult<PricedLine> {
        let frequency = BillingFrequency::parse(&contract.billing_frequency);

        if contract.is_seat_based() {
            let seat_count = contract.seat_count.unwrap_or_default();
            let seat_price = contract.seat_price.unwrap_or_default();
            let tiers = sqlx::query_as::<_, VolumeTier>(
                "SELECT * FROM contract_volume_tiers WHERE contract_id = $1 ORDER BY min_seats",
            )
            .bind(contract.id)
            .fetch_all(&self.pool)
            .await?;

            let priced = price_seats(seat_count, seat_price, &tiers);
            return Ok(PricedLine {
                contract_id: Some(contract.id),
                description: format!(
                    "{} - {} subscription, {} seats",
                    contract.name,
                    frequency.label(),
                    seat_count
                ),
                quantity: Decimal::from(seat_count),
                unit_price: priced.unit_price,
                amount: priced.subtotal,
            });
        }

        let amount = period_amount(contract.contract_value.unwrap_or_default(), frequency);
        Ok(PricedLine {
            contract_id: Some(contract.id),
            description: format!("{} - {} subscription", contract.name, frequency.label()),
            quantity: Decimal::ONE,
            unit_price: amount,
            amount,
        })
    }
}

/// Collects every account below `root`, breadth-first with an explicit
/// frontier, one batched child query per level, capped at
/// `MAX_HIERARCHY_DEPTH` levels.
pub async fn collect_descendants(pool: &PgPool, root: Uuid) -> AppResult<Vec<Uuid>> {
    let mut descendants: Vec<Uuid> = Vec::new();
    let mut frontier: Vec<Uuid> = vec![root];
    let mut depth = 0;

    while !frontier.is_empty() && depth < MAX_HIERARCHY_DEPTH {
        let children: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE parent_account_id = ANY($1)")
                .bind(&frontier)
                .fetch_all(pool)
                .await?;

        descendants.extend(children.iter().copied());
        frontier = children;
        depth += 1;
    }

    Ok(descendants)
}
