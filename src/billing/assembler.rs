use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::models::{Account, BillableProduct, Contract, VolumeTier};
use super::numbering;
use super::period::{billing_period, period_amount, BillingFrequency};
use super::policy;
use super::pricing::price_seats;

/// key: billing-assembler -> single-contract invoice generation
#[derive(Clone)]
pub struct InvoiceAssembler {
    pool: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedInvoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub total: Decimal,
}

pub(super) struct PricedLine {
    pub(super) contract_id: Option<Uuid>,
    pub(super) description: String,
    pub(super) quantity: Decimal,
    pub(super) unit_price: Decimal,
    pub(super) amount: Decimal,
}

impl InvoiceAssembler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch -> Validate -> Price -> Number -> Persist. The invoice and its
    /// line items are written in one transaction; the invoice-number claim
    /// rides in the same transaction so an aborted run leaves no gap behind.
    pub async fn generate(
        &self,
        contract_id: Uuid,
        period_start: Option<DateTime<Utc>>,
        period_end: Option<DateTime<Utc>>,
    ) -> AppResult<GeneratedInvoice> {
        let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
            .bind(contract_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("contract"))?;

        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(contract.account_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("account"))?;

        if !contract.is_active() {
            return Err(AppError::InvalidState(format!(
                "contract status is {}",
                contract.status
            )));
        }

        // Validated after resolution so an explicit end earlier than the
        // defaulted start is caught too.
        let (start, end) = billing_period(&contract, period_start, period_end);
        if end <= start {
            return Err(AppError::BadRequest(
                "period_end must be after period_start".to_string(),
            ));
        }

        // Contracts do not carry a product link yet; the policy gate runs with
        // no product resolved, which bills unconditionally today. The skip
        // branch stays a hard failure so product linkage lands on a decided
        // contract rather than a silent no-op.
        let product: Option<BillableProduct> = None;
        if !policy::should_bill(product.as_ref(), contract.start_date, start) {
            return Err(AppError::PolicySkip(format!(
                "charge-type policy suppressed billing for period starting {start}"
            )));
        }

        let frequency = BillingFrequency::parse(&contract.billing_frequency);
        let mut lines: Vec<PricedLine> = Vec::new();

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
            lines.push(PricedLine {
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
        } else {
            let amount = period_amount(contract.contract_value.unwrap_or_default(), frequency);
            lines.push(PricedLine {
                contract_id: Some(contract.id),
                description: format!("{} - {} subscription", contract.name, frequency.label()),
                quantity: Decimal::ONE,
                unit_price: amount,
                amount,
            });
        }

        let fee = policy::setup_fee(product.as_ref(), contract.start_date, start);
        if fee > Decimal::ZERO {
            lines.push(PricedLine {
                contract_id: Some(contract.id),
                description: format!("{} - one-time setup fee", contract.name),
                quantity: Decimal::ONE,
                unit_price: fee,
                amount: fee,
            });
        }

        let subtotal: Decimal = lines.iter().map(|line| line.amount).sum();
        let tax = Decimal::ZERO;
        let discount = Decimal::ZERO;
        let total = subtotal + tax - discount;

        let issue_date = Utc::now();
        let due_date = issue_date + Duration::days(i64::from(account.payment_terms_days));

        let mut tx = self.pool.begin().await?;
        let invoice_number = numbering::next_invoice_number(&mut tx, issue_date.year()).await?;
        let invoice_id = persist_invoice(
            &mut tx,
            &NewInvoice {
                account_id: account.id,
                contract_id: Some(contract.id),
                invoice_number: &invoice_number,
                period_start: start,
                period_end: end,
                issue_date,
                due_date,
                currency: &account.currency,
                subtotal,
                tax,
                discount,
                total,
                consolidated: false,
            },
            &lines,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            %invoice_number,
            %contract_id,
            account_id = %account.id,
            %total,
            "generated contract invoice"
        );

        Ok(GeneratedInvoice {
            invoice_id,
            invoice_number,
            total,
        })
    }
}

pub(super) struct NewInvoice<'a> {
    pub account_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub invoice_number: &'a str,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub currency: &'a str,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub consolidated: bool,
}

/// Writes the invoice header and all line items on the given transaction.
pub(super) async fn persist_invoice(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    invoice: &NewInvoice<'_>,
    lines: &[PricedLine],
) -> AppResult<Uuid> {
    let invoice_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, account_id, contract_id, invoice_number,
            period_start, period_end, issue_date, due_date,
            currency, subtotal, tax, discount, total, consolidated
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(invoice_id)
    .bind(invoice.account_id)
    .bind(invoice.contract_id)
    .bind(invoice.invoice_number)
    .bind(invoice.period_start)
    .bind(invoice.period_end)
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.currency)
    .bind(invoice.subtotal)
    .bind(invoice.tax)
    .bind(invoice.discount)
    .bind(invoice.total)
    .bind(invoice.consolidated)
    .execute(&mut *tx)
    .await?;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (id, invoice_id, contract_id, description, quantity, unit_price, amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(line.contract_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.amount)
        .execute(&mut *tx)
        .await?;
    }

    Ok(invoice_id)
}
