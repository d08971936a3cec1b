use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// key: billing-models -> accounts,contracts,shares,invoices
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub parent_account_id: Option<Uuid>,
    pub credit_hold: bool,
    pub currency: String,
    pub payment_terms_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub status: String,
    pub billing_frequency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub contract_value: Option<Decimal>,
    pub seat_count: Option<i32>,
    pub seat_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// Seat pricing applies only when both the count and the per-seat price
    /// are present; otherwise the contract bills its fixed value.
    pub fn is_seat_based(&self) -> bool {
        self.seat_count.is_some() && self.seat_price.is_some()
    }
}

/// key: billing-share-model -> cross-account contract visibility
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContractShare {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub account_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// key: billing-product-model -> charge-type policy inputs
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BillableProduct {
    pub id: Uuid,
    pub name: String,
    pub charge_type: String,
    pub setup_fee: Option<Decimal>,
    pub trial_period_days: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VolumeTier {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub min_seats: i32,
    pub max_seats: Option<i32>,
    pub unit_price: Decimal,
}

impl VolumeTier {
    pub fn contains(&self, seat_count: i32) -> bool {
        seat_count >= self.min_seats && self.max_seats.map_or(true, |max| seat_count <= max)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub account_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub invoice_number: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub consolidated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}
