use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;

use super::models::Contract;

/// key: billing-period -> window math and proration

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    Annual,
}

impl BillingFrequency {
    /// Unrecognized frequencies degrade to monthly rather than failing the
    /// billing run; the degradation is logged so operators can spot bad data.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "monthly" => BillingFrequency::Monthly,
            "quarterly" => BillingFrequency::Quarterly,
            "annual" | "yearly" => BillingFrequency::Annual,
            other => {
                tracing::warn!(frequency = %other, "unknown billing frequency, falling back to monthly");
                BillingFrequency::Monthly
            }
        }
    }

    pub fn months(self) -> u32 {
        match self {
            BillingFrequency::Monthly => 1,
            BillingFrequency::Quarterly => 3,
            BillingFrequency::Annual => 12,
        }
    }

    pub fn periods_per_year(self) -> u32 {
        match self {
            BillingFrequency::Monthly => 12,
            BillingFrequency::Quarterly => 4,
            BillingFrequency::Annual => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BillingFrequency::Monthly => "Monthly",
            BillingFrequency::Quarterly => "Quarterly",
            BillingFrequency::Annual => "Annual",
        }
    }
}

/// Billing window for a contract. Explicit bounds are used verbatim; a missing
/// start defaults to now, a missing end is the start advanced by one
/// billing-frequency period.
pub fn billing_period(
    contract: &Contract,
    explicit_start: Option<DateTime<Utc>>,
    explicit_end: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = explicit_start.unwrap_or_else(Utc::now);
    let end = explicit_end.unwrap_or_else(|| {
        let frequency = BillingFrequency::parse(&contract.billing_frequency);
        start
            .checked_add_months(Months::new(frequency.months()))
            .unwrap_or(start)
    });
    (start, end)
}

/// Portion of an annual contract value attributable to one billing period.
pub fn period_amount(contract_value: Decimal, frequency: BillingFrequency) -> Decimal {
    contract_value / Decimal::from(frequency.periods_per_year())
}

/// Scales a full-period amount by the fraction of the period actually used.
/// Non-positive day counts yield zero instead of dividing by zero.
pub fn prorate(full_amount: Decimal, total_days: i64, used_days: i64) -> Decimal {
    if total_days <= 0 || used_days <= 0 {
        return Decimal::ZERO;
    }
    full_amount * Decimal::from(used_days) / Decimal::from(total_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn contract_with_frequency(frequency: &str) -> Contract {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        Contract {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            name: "Platform".to_string(),
            status: "active".to_string(),
            billing_frequency: frequency.to_string(),
            start_date: start,
            end_date: None,
            contract_value: Some(dec!(1200)),
            seat_count: None,
            seat_price: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn explicit_bounds_are_used_verbatim() {
        let contract = contract_with_frequency("monthly");
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 20, 0, 0, 0).unwrap();
        assert_eq!(
            billing_period(&contract, Some(start), Some(end)),
            (start, end)
        );
    }

    #[test]
    fn end_advances_by_frequency_months() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();

        let (_, monthly_end) =
            billing_period(&contract_with_frequency("monthly"), Some(start), None);
        assert_eq!(monthly_end, Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap());

        let (_, quarterly_end) =
            billing_period(&contract_with_frequency("quarterly"), Some(start), None);
        assert_eq!(quarterly_end, Utc.with_ymd_and_hms(2026, 4, 30, 0, 0, 0).unwrap());

        let (_, annual_end) =
            billing_period(&contract_with_frequency("annual"), Some(start), None);
        assert_eq!(annual_end, Utc.with_ymd_and_hms(2027, 1, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn unknown_frequency_falls_back_to_monthly() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let (_, end) = billing_period(&contract_with_frequency("biweekly"), Some(start), None);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn period_amount_reconstructs_contract_value() {
        let value = dec!(1200);
        assert_eq!(
            period_amount(value, BillingFrequency::Monthly) * dec!(12),
            value
        );
        assert_eq!(
            period_amount(value, BillingFrequency::Quarterly) * dec!(4),
            value
        );
        assert_eq!(period_amount(value, BillingFrequency::Annual), value);
    }

    #[test]
    fn prorate_scales_by_used_days() {
        assert_eq!(prorate(dec!(300), 30, 10), dec!(100));
        assert_eq!(prorate(dec!(300), 30, 30), dec!(300));
    }

    #[test]
    fn prorate_guards_non_positive_day_counts() {
        assert_eq!(prorate(dec!(300), 0, 10), Decimal::ZERO);
        assert_eq!(prorate(dec!(300), 30, 0), Decimal::ZERO);
        assert_eq!(prorate(dec!(300), -5, 10), Decimal::ZERO);
    }
}
