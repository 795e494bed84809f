//! Core data model: requests, responses, adjustments, cache entries, and the
//! internal rule context threaded through the adjustment chain.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DEADLINE_MS;
use crate::error::PricingError;

/// Fare class. Unrecognized wire values are rejected at validation (they
/// never reach this type as anything other than one of these variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FareClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

/// Loyalty tier. Any unrecognized value on the wire is coerced to `None`
/// before it reaches this type: `#[serde(other)]` makes deserialization
/// total for this field rather than rejecting the whole request, unlike
/// `class`/`booking_channel`, whose enumerations must be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    #[default]
    #[serde(other)]
    None,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Booking channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingChannel {
    Web,
    Mobile,
    Agent,
    Gds,
    Api,
}

/// Closed, validated form of a loosely-typed market-data payload. Unknown
/// keys are rejected at the edge, before a value of this type is
/// constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    /// `[0, 1]`. Drives the demand surge/discount adjustment.
    pub demand_level: Option<Decimal>,
    /// `[0.5, 2.0]`. Drives the seasonal adjustment.
    pub season_factor: Option<Decimal>,
    /// Competitor's average fare on the route, if known.
    pub competitor_avg: Option<Decimal>,
}

/// A request to price one route/class/passenger context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub route: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passengers: u8,
    pub class: FareClass,
    pub customer_id: Option<String>,
    pub corporate_id: Option<String>,
    pub loyalty_tier: LoyaltyTier,
    pub booking_channel: BookingChannel,
    pub market_data: MarketData,
    /// Unique per request. May arrive blank on the wire, in which case the
    /// transport layer is expected to assign one before calling `price()`.
    #[serde(default)]
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied deadline for this call, in milliseconds, per
    /// spec.md §5 "Cancellation & timeouts". Absent on the wire defaults to
    /// [`DEFAULT_DEADLINE_MS`] (10 s), not to any fallback-ladder constant.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl PricingRequest {
    /// Structural validation. Does not touch constants tables or cache —
    /// purely checks the shape of the request.
    pub fn validate(&self) -> Result<(), PricingError> {
        if self.route != format!("{}-{}", self.origin, self.destination) {
            return Err(PricingError::InvalidRequest(format!(
                "route {} does not match origin/destination {}-{}",
                self.route, self.origin, self.destination
            )));
        }
        if self.departure_date < self.timestamp.date_naive() {
            return Err(PricingError::InvalidRequest(
                "departureDate precedes timestamp".to_string(),
            ));
        }
        if self.passengers == 0 || self.passengers > 9 {
            return Err(PricingError::InvalidRequest(format!(
                "passengers {} out of range [1, 9]",
                self.passengers
            )));
        }
        Ok(())
    }

    /// Deterministic cache fingerprint.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{}|{:?}",
            self.route,
            class_tag(self.class),
            self.departure_date,
            self.loyalty_tier,
            self.corporate_id.as_deref().unwrap_or(""),
            self.booking_channel,
        )
    }

    /// Coarse origin region used as the geo-cache tier's key.
    pub fn origin_region(&self) -> String {
        crate::constants::origin_region(&self.origin)
    }

    /// The deadline this call must complete within, client-supplied or the
    /// 10 s default.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms.unwrap_or(DEFAULT_DEADLINE_MS))
    }
}

fn class_tag(class: FareClass) -> &'static str {
    match class {
        FareClass::Economy => "economy",
        FareClass::PremiumEconomy => "premium_economy",
        FareClass::Business => "business",
        FareClass::First => "first",
    }
}

/// One named, signed modification to the running fare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAdjustment {
    #[serde(rename = "type")]
    pub kind: AdjustmentKind,
    pub description: String,
    pub amount: Decimal,
    pub percentage: Decimal,
    pub applied: bool,
}

/// Closed set of adjustment tags. The default chain runs the first eight in
/// a fixed order; `competitor_adjustment` and `fuel_surcharge` are available
/// but inactive unless configured into the chain at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    DemandSurge,
    DemandDiscount,
    Seasonal,
    RouteMultiplier,
    ClassMultiplier,
    LoyaltyDiscount,
    CorporateDiscount,
    ChannelAdjustment,
    AdvanceBooking,
    CompetitorAdjustment,
    FuelSurcharge,
}

/// Source tier a response was ultimately priced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Live,
    Cache,
    Historical,
    StaticFloor,
    Emergency,
}

impl PriceSource {
    /// Confidence score for this tier.
    pub fn confidence(self) -> Decimal {
        use rust_decimal_macros::dec;
        match self {
            PriceSource::Live => dec!(1.0),
            PriceSource::Cache => dec!(0.9),
            PriceSource::Historical => dec!(0.7),
            PriceSource::StaticFloor => dec!(0.5),
            PriceSource::Emergency => dec!(0.3),
        }
    }
}

/// A breakdown of how the final fare was assembled, kept alongside the flat
/// `adjustments` list for callers that want the running totals rather than
/// per-step deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_fare: Decimal,
    pub total_adjustment: Decimal,
    pub pre_tax_fare: Decimal,
    pub taxes: Decimal,
    pub fees: Decimal,
}

/// The priced response for a `PricingRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResponse {
    pub route: String,
    pub request_id: String,
    pub base_fare: Decimal,
    pub final_fare: Decimal,
    pub currency: String,
    pub taxes: Decimal,
    pub fees: Decimal,
    pub total: Decimal,
    pub adjustments: Vec<PriceAdjustment>,
    pub breakdown: PriceBreakdown,
    pub valid_until: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub source: PriceSource,
    pub confidence_score: Decimal,
}

/// A cached response plus its lifecycle bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: PricingResponse,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Mutable snapshot threaded through the rules engine's adjustment chain.
pub struct RuleContext<'a> {
    pub request: &'a PricingRequest,
    pub current_fare: Decimal,
    pub base_fare: Decimal,
    pub adjustments: Vec<PriceAdjustment>,
    pub discount_sum: Decimal,
    pub surcharge_sum: Decimal,
}

impl<'a> RuleContext<'a> {
    pub fn new(request: &'a PricingRequest, base_fare: Decimal) -> Self {
        Self {
            request,
            current_fare: base_fare,
            base_fare,
            adjustments: Vec::with_capacity(8),
            discount_sum: Decimal::ZERO,
            surcharge_sum: Decimal::ZERO,
        }
    }
}

/// An append-only record of one pricing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub route: String,
    pub source: PriceSource,
    pub latency_ms: u64,
    pub rules_applied: Vec<AdjustmentKind>,
    pub final_fare: Decimal,
    pub fallback_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}
