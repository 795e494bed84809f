//! Immutable lookup tables (C1).
//!
//! Every lookup here is total: an unknown key returns the declared default
//! rather than failing. Tables are `lazy_static!` so they initialize once at
//! process start and are read lock-free for the crate's whole lifetime.

use std::collections::HashMap;

use lazy_static::lazy_static;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{BookingChannel, FareClass, LoyaltyTier};

/// Base fare used when a route has no entry in [`ROUTE_FARES`].
pub const DEFAULT_BASE_FARE: Decimal = dec!(500.00);
/// Floor every `finalFare` must respect.
pub const MINIMUM_FARE: Decimal = dec!(50.00);
/// Ceiling every `finalFare` must respect.
pub const MAXIMUM_FARE: Decimal = dec!(5000.00);
/// Value returned by the T4 emergency tier; always succeeds.
pub const EMERGENCY_FALLBACK_FARE: Decimal = dec!(300.00);

/// Flat per-passenger fees added on top of the final fare.
pub const FIXED_FEES: Decimal = dec!(25.00);

/// Cap on total discount adjustments, as a fraction of `baseFare`. Enforced
/// as the final-fare floor in step 9 of the rules engine.
pub const MAX_DISCOUNT_PERCENT: Decimal = dec!(0.40);
/// Cap on total surcharge adjustments, as a fraction of `baseFare`. Set well
/// above the largest legitimate multiplier stack (first class alone is
/// +350%) so it backstops runaway combinations without clipping ordinary
/// class/seasonal/demand stacking — `MaximumFare` is the tight ceiling for
/// that. Enforced as the final-fare ceiling in step 9.
pub const MAX_SURCHARGE_PERCENT: Decimal = dec!(8.00);
/// Minimum profit margin over base fare the engine must preserve.
pub const MIN_PROFIT_MARGIN: Decimal = dec!(0.05);

/// Seasonal adjustment clamp, as a fraction of `baseFare`.
pub const SEASONAL_MIN_PCT: Decimal = dec!(-0.25);
pub const SEASONAL_MAX_PCT: Decimal = dec!(0.35);

/// Default corporate discount applied to corporate-flagged bookings.
pub const CORPORATE_DISCOUNT: Decimal = dec!(0.10);

/// Booking-window thresholds.
pub const EARLY_BOOKING_DAYS: i64 = 60;
pub const EARLY_BOOKING_DISCOUNT: Decimal = dec!(0.15);
pub const LAST_MINUTE_DAYS: i64 = 14;
pub const LAST_MINUTE_SURCHARGE: Decimal = dec!(0.25);

/// Timing constants.
pub const CACHE_VALIDITY_MINUTES: i64 = 15;
pub const PRICE_VALIDITY_MINUTES: i64 = 15;
pub const FALLBACK_TIMEOUT_MS: u64 = 5_000;
/// Default per-call deadline when a caller doesn't supply one. Distinct from
/// [`FALLBACK_TIMEOUT_MS`]: that constant bounds the live-tier attempt
/// itself; this one bounds the whole `price()` call end to end.
pub const DEFAULT_DEADLINE_MS: u64 = 10_000;

/// Default regional tax rate applied when an origin has no entry in
/// [`REGIONAL_TAX_RATES`].
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.07);

/// Flat fuel surcharge rate, applied only when `fuel_surcharge` is present
/// in the configured adjustment chain (inactive by default).
pub const FUEL_SURCHARGE_RATE: Decimal = dec!(0.03);

lazy_static! {
    /// Route ("ORIGIN-DEST") -> base fare.
    pub static ref ROUTE_FARES: HashMap<&'static str, Decimal> = {
        let mut m = HashMap::new();
        m.insert("NYC-LON", dec!(650.00));
        m.insert("NYC-PAR", dec!(680.00));
        m.insert("LAX-TOK", dec!(820.00));
        m.insert("SFO-SIN", dec!(950.00));
        m.insert("ORD-FRA", dec!(710.00));
        m.insert("MIA-GRU", dec!(590.00));
        m.insert("ATL-DXB", dec!(890.00));
        m
    };

    /// Route -> multiplier applied by the route-multiplier adjustment.
    /// Unknown route defaults to `1.0` (no-op).
    pub static ref ROUTE_MULTIPLIERS: HashMap<&'static str, Decimal> = {
        let mut m = HashMap::new();
        m.insert("LAX-TOK", dec!(1.08));
        m.insert("SFO-SIN", dec!(1.12));
        m.insert("ATL-DXB", dec!(1.10));
        m
    };

    /// Demand level bucket -> factor, descriptive only; the actual
    /// thresholds live in `rules::demand_adjustment`.
    pub static ref DEMAND_ADJUSTMENTS: HashMap<&'static str, Decimal> = {
        let mut m = HashMap::new();
        m.insert("HIGH", dec!(0.30));
        m.insert("MEDIUM", dec!(0.0));
        m.insert("LOW", dec!(-0.10));
        m
    };

    /// Competitor factor table, keyed by route, used by the (inactive by
    /// default) `competitor_adjustment` tag.
    pub static ref COMPETITOR_FACTORS: HashMap<&'static str, Decimal> = {
        let mut m = HashMap::new();
        m.insert("NYC-LON", dec!(0.02));
        m.insert("LAX-TOK", dec!(0.015));
        m
    };

    /// Origin -> coarse region, used as the geo-cache tier's key. Unknown
    /// origin defaults to "UNKNOWN".
    pub static ref ORIGIN_REGIONS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("NYC", "NA_EAST");
        m.insert("ATL", "NA_EAST");
        m.insert("MIA", "NA_EAST");
        m.insert("ORD", "NA_CENTRAL");
        m.insert("LAX", "NA_WEST");
        m.insert("SFO", "NA_WEST");
        m
    };

    /// Origin -> regional tax rate, applied when finalizing a response.
    /// Unknown origin defaults to [`DEFAULT_TAX_RATE`].
    pub static ref REGIONAL_TAX_RATES: HashMap<&'static str, Decimal> = {
        let mut m = HashMap::new();
        m.insert("NYC", dec!(0.07));
        m.insert("LAX", dec!(0.065));
        m.insert("SFO", dec!(0.07));
        m.insert("ORD", dec!(0.06));
        m.insert("MIA", dec!(0.08));
        m.insert("ATL", dec!(0.055));
        m
    };

    /// Loyalty tier -> discount rate applied by the loyalty-discount
    /// adjustment.
    pub static ref LOYALTY_DISCOUNTS: HashMap<LoyaltyTierKey, Decimal> = {
        let mut m = HashMap::new();
        m.insert(LoyaltyTierKey(LoyaltyTier::None), dec!(0.0));
        m.insert(LoyaltyTierKey(LoyaltyTier::Silver), dec!(0.03));
        m.insert(LoyaltyTierKey(LoyaltyTier::Gold), dec!(0.08));
        m.insert(LoyaltyTierKey(LoyaltyTier::Platinum), dec!(0.12));
        m.insert(LoyaltyTierKey(LoyaltyTier::Diamond), dec!(0.18));
        m
    };
}

/// Newtype so `LoyaltyTier` (defined in `types.rs`, no `Hash` impl needed
/// elsewhere) can key a `HashMap` without leaking `Hash`/`Eq` onto the public
/// enum's derive list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoyaltyTierKey(pub LoyaltyTier);

/// Class -> multiplier applied by the class-multiplier adjustment. Total
/// function, no lookup failure possible since `FareClass` is a closed enum.
pub fn class_multiplier(class: FareClass) -> Decimal {
    match class {
        FareClass::Economy => dec!(1.0),
        FareClass::PremiumEconomy => dec!(1.6),
        FareClass::Business => dec!(3.0),
        FareClass::First => dec!(4.5),
    }
}

/// Channel -> adjustment factor applied by the channel adjustment.
pub fn channel_factor(channel: BookingChannel) -> Decimal {
    match channel {
        BookingChannel::Web => dec!(0.0),
        BookingChannel::Mobile => dec!(-0.02),
        BookingChannel::Agent => dec!(0.05),
        BookingChannel::Gds => dec!(0.03),
        BookingChannel::Api => dec!(-0.01),
    }
}

/// Total lookup: route -> base fare, defaulting to [`DEFAULT_BASE_FARE`].
pub fn route_base_fare(route: &str) -> Decimal {
    ROUTE_FARES.get(route).copied().unwrap_or(DEFAULT_BASE_FARE)
}

/// Total lookup: route -> multiplier, defaulting to `1.0` (no-op).
pub fn route_multiplier(route: &str) -> Decimal {
    ROUTE_MULTIPLIERS.get(route).copied().unwrap_or(Decimal::ONE)
}

/// Total lookup: route -> competitor factor, defaulting to `0.0`.
pub fn competitor_factor(route: &str) -> Decimal {
    COMPETITOR_FACTORS.get(route).copied().unwrap_or(Decimal::ZERO)
}

/// Total lookup: loyalty tier -> discount rate.
pub fn loyalty_discount(tier: LoyaltyTier) -> Decimal {
    LOYALTY_DISCOUNTS
        .get(&LoyaltyTierKey(tier))
        .copied()
        .unwrap_or(Decimal::ZERO)
}

/// Total lookup: airport code -> coarse region, defaulting to "UNKNOWN".
pub fn origin_region(origin: &str) -> String {
    ORIGIN_REGIONS
        .get(origin)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Total lookup: airport code -> regional tax rate, defaulting to
/// [`DEFAULT_TAX_RATE`].
pub fn regional_tax_rate(origin: &str) -> Decimal {
    REGIONAL_TAX_RATES
        .get(origin)
        .copied()
        .unwrap_or(DEFAULT_TAX_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FareClass;

    #[test]
    fn unknown_route_uses_default_base_fare() {
        assert_eq!(route_base_fare("XXX-YYY"), DEFAULT_BASE_FARE);
    }

    #[test]
    fn unknown_route_multiplier_is_noop() {
        assert_eq!(route_multiplier("XXX-YYY"), Decimal::ONE);
    }

    #[test]
    fn known_route_fare_matches_table() {
        assert_eq!(route_base_fare("NYC-LON"), dec!(650.00));
    }

    #[test]
    fn class_multiplier_is_total() {
        assert_eq!(class_multiplier(FareClass::Economy), dec!(1.0));
        assert_eq!(class_multiplier(FareClass::Business), dec!(3.0));
    }

    #[test]
    fn unknown_origin_region_is_unknown() {
        assert_eq!(origin_region("ZZZ"), "UNKNOWN");
    }

    #[test]
    fn unknown_origin_tax_rate_defaults() {
        assert_eq!(regional_tax_rate("ZZZ"), DEFAULT_TAX_RATE);
    }
}
