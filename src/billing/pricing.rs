use rust_decimal::Decimal;
use serde::Serialize;

use super::models::VolumeTier;

/// key: billing-pricing -> seat/volume tier selection

#[derive(Debug, Clone, Serialize)]
pub struct SeatPricing {
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub applied_tier: Option<VolumeTier>,
}

/// Prices a seat count against an optional volume-tier table.
///
/// Tiers are sorted ascending by `min_seats` and the first tier whose range
/// contains the seat count wins; `max_seats = NULL` means unbounded. Ranges
/// are expected not to overlap. When nothing matches, the base per-seat price
/// applies as if no tiers existed.
pub fn price_seats(seat_count: i32, base_price: Decimal, tiers: &[VolumeTier]) -> SeatPricing {
    let mut sorted: Vec<&VolumeTier> = tiers.iter().collect();
    sorted.sort_by_key(|tier| tier.min_seats);

    for tier in sorted {
        if tier.contains(seat_count) {
            return SeatPricing {
                unit_price: tier.unit_price,
                subtotal: tier.unit_price * Decimal::from(seat_count),
                applied_tier: Some(tier.clone()),
            };
        }
    }

    SeatPricing {
        unit_price: base_price,
        subtotal: base_price * Decimal::from(seat_count),
        applied_tier: None,
    }
}
