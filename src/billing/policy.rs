use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;

use super::models::BillableProduct;

/// key: billing-policy -> charge-type and trial gating

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeType {
    Recurring,
    OneTime,
    UsageBased,
}

impl ChargeType {
    /// Unknown charge types are treated as recurring for backward
    /// compatibility with contracts created before products carried one.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "one_time" => ChargeType::OneTime,
            "usage_based" => ChargeType::UsageBased,
            _ => ChargeType::Recurring,
        }
    }
}

/// Whether the billing period starting at `period_start` should be charged for
/// the product attached to a line item.
///
/// A line with no resolved product bills unconditionally. Usage-based
/// products never bill here (metered billing is a deferred capability).
/// Trial suppression applies to every charge type, including one-time fees.
pub fn should_bill(
    product: Option<&BillableProduct>,
    contract_start: DateTime<Utc>,
    period_start: DateTime<Utc>,
) -> bool {
    let Some(product) = product else {
        return true;
    };

    let charge_type = ChargeType::parse(&product.charge_type);
    if charge_type == ChargeType::UsageBased {
        return false;
    }

    if let Some(trial_days) = product.trial_period_days {
        if trial_days > 0 && period_start < contract_start + Duration::days(i64::from(trial_days)) {
            return false;
        }
    }

    match charge_type {
        ChargeType::OneTime => is_first_billing_period(contract_start, period_start),
        ChargeType::Recurring | ChargeType::UsageBased => true,
    }
}

/// First-period test is deliberately coarse: same calendar year and month,
/// ignoring day-of-month.
pub fn is_first_billing_period(contract_start: DateTime<Utc>, period_start: DateTime<Utc>) -> bool {
    contract_start.year() == period_start.year() && contract_start.month() == period_start.month()
}

/// One-time setup fee, charged only in the contract's first billing period.
pub fn setup_fee(
    product: Option<&BillableProduct>,
    contract_start: DateTime<Utc>,
    period_start: DateTime<Utc>,
) -> Decimal {
    let Some(fee) = product.and_then(|p| p.setup_fee) else {
        return Decimal::ZERO;
    };
    if is_first_billing_period(contract_start, period_start) {
        fee
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn product(
        charge_type: &str,
        setup_fee: Option<Decimal>,
        trial_period_days: Option<i32>,
    ) -> BillableProduct {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        BillableProduct {
            id: Uuid::new_v4(),
            name: "Workspace".to_string(),
            charge_type: charge_type.to_string(),
            setup_fee,
            trial_period_days,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn missing_product_always_bills() {
        assert!(should_bill(None, date(2026, 1, 15), date(2027, 6, 1)));
    }

    #[test]
    fn usage_based_never_bills_regardless_of_dates() {
        let metered = product("usage_based", None, None);
        assert!(!should_bill(Some(&metered), date(2026, 1, 15), date(2026, 1, 15)));
        assert!(!should_bill(Some(&metered), date(2026, 1, 15), date(2030, 1, 1)));
    }

    #[test]
    fn recurring_without_trial_always_bills() {
        let recurring = product("recurring", None, None);
        assert!(should_bill(Some(&recurring), date(2026, 1, 15), date(2026, 1, 15)));
        assert!(should_bill(Some(&recurring), date(2026, 1, 15), date(2028, 7, 1)));
    }

    #[test]
    fn trial_suppresses_every_charge_type() {
        let recurring = product("recurring", None, Some(30));
        let one_time = product("one_time", None, Some(30));
        let start = date(2026, 1, 15);
        let inside_trial = date(2026, 2, 1);
        let after_trial = date(2026, 2, 20);

        assert!(!should_bill(Some(&recurring), start, inside_trial));
        assert!(!should_bill(Some(&one_time), start, inside_trial));
        assert!(should_bill(Some(&recurring), start, after_trial));
        // Past the trial but also past the first calendar month.
        assert!(!should_bill(Some(&one_time), start, after_trial));
    }

    #[test]
    fn one_time_bills_only_in_first_calendar_month() {
        let one_time = product("one_time", None, None);
        assert!(should_bill(Some(&one_time), date(2026, 1, 15), date(2026, 1, 1)));
        assert!(!should_bill(Some(&one_time), date(2026, 1, 15), date(2026, 2, 1)));
    }

    #[test]
    fn first_billing_period_ignores_day_of_month() {
        assert!(is_first_billing_period(date(2026, 1, 15), date(2026, 1, 1)));
        assert!(is_first_billing_period(date(2026, 1, 30), date(2026, 1, 1)));
        assert!(!is_first_billing_period(date(2026, 1, 15), date(2026, 2, 1)));
        assert!(!is_first_billing_period(date(2026, 1, 15), date(2027, 1, 15)));
    }

    #[test]
    fn setup_fee_applies_only_in_first_period() {
        let with_fee = product("recurring", Some(dec!(250)), None);
        assert_eq!(
            setup_fee(Some(&with_fee), date(2026, 1, 15), date(2026, 1, 1)),
            dec!(250)
        );
        assert_eq!(
            setup_fee(Some(&with_fee), date(2026, 1, 15), date(2026, 2, 1)),
            Decimal::ZERO
        );
        assert_eq!(setup_fee(None, date(2026, 1, 15), date(2026, 1, 1)), Decimal::ZERO);

        let without_fee = product("recurring", None, None);
        assert_eq!(
            setup_fee(Some(&without_fee), date(2026, 1, 15), date(2026, 1, 1)),
            Decimal::ZERO
        );
    }
}
