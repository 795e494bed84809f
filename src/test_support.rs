//! Shared fixtures for unit and integration tests. Not part of the public
//! API; compiled only under `#[cfg(test)]`.

use chrono::{NaiveDate, Utc};

use crate::types::{
    BookingChannel, FareClass, LoyaltyTier, MarketData, PricingRequest,
};

/// A minimal, valid, happy-path `PricingRequest` for tests that don't care
/// about the specific numbers.
pub fn sample_request() -> PricingRequest {
    PricingRequest {
        route: "NYC-LON".to_string(),
        origin: "NYC".to_string(),
        destination: "LON".to_string(),
        departure_date: (Utc::now() + chrono::Duration::days(90)).date_naive(),
        return_date: None,
        passengers: 1,
        class: FareClass::Economy,
        customer_id: None,
        corporate_id: None,
        loyalty_tier: LoyaltyTier::None,
        booking_channel: BookingChannel::Web,
        market_data: MarketData {
            demand_level: Some(rust_decimal_macros::dec!(0.5)),
            season_factor: Some(rust_decimal_macros::dec!(1.0)),
            competitor_avg: None,
        },
        request_id: "req-1".to_string(),
        timestamp: Utc::now(),
        deadline_ms: None,
    }
}

/// Builds a request with an explicit departure date, for early-booking /
/// last-minute boundary tests.
pub fn request_with_departure(days_out: i64) -> PricingRequest {
    let mut req = sample_request();
    req.departure_date = (Utc::now() + chrono::Duration::days(days_out)).date_naive();
    req
}

#[allow(dead_code)]
pub fn date_days_from_now(days: i64) -> NaiveDate {
    (Utc::now() + chrono::Duration::days(days)).date_naive()
}
