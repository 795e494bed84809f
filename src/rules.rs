//! Rules engine (C6): deterministic composition of adjustments over a base
//! fare, in a fixed step order.
//!
//! Each step operates on `ctx.current_fare` as it stands at the moment of
//! application — order is part of the contract, not an implementation
//! detail. The net discount/surcharge against the base fare is bounded once,
//! at the end of the chain, rather than per step.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::{self, CORPORATE_DISCOUNT, EARLY_BOOKING_DAYS, EARLY_BOOKING_DISCOUNT,
    FIXED_FEES, LAST_MINUTE_DAYS, LAST_MINUTE_SURCHARGE, MAXIMUM_FARE, MAX_DISCOUNT_PERCENT,
    MAX_SURCHARGE_PERCENT, MINIMUM_FARE, SEASONAL_MAX_PCT, SEASONAL_MIN_PCT};
use crate::error::PricingError;
use crate::types::{
    AdjustmentKind, PriceAdjustment, PriceBreakdown, PricingRequest, PricingResponse, PriceSource,
    RuleContext,
};

/// The default, fixed adjustment chain, in order. Bound enforcement and
/// tax & fees always run last and are not part of this configurable list:
/// they finalize the response rather than adjust the fare.
pub const DEFAULT_CHAIN: &[AdjustmentKind] = &[
    AdjustmentKind::DemandSurge, // DemandSurge and DemandDiscount share one dispatch slot
    AdjustmentKind::Seasonal,
    AdjustmentKind::RouteMultiplier,
    AdjustmentKind::ClassMultiplier,
    AdjustmentKind::LoyaltyDiscount,
    AdjustmentKind::CorporateDiscount,
    AdjustmentKind::ChannelAdjustment,
    AdjustmentKind::AdvanceBooking,
];

/// Applies `raw_amount` to `ctx.current_fare` and records the resulting
/// [`PriceAdjustment`]. Per-adjustment amounts are not individually capped —
/// the discount/surcharge bounds are enforced once, on the net result, in
/// `price_from_base`'s bound-enforcement pass; capping each step
/// independently would clip legitimate class/route multiplier stacking that
/// routinely exceeds either single-step bound on its own.
fn apply(ctx: &mut RuleContext, kind: AdjustmentKind, description: String, raw_amount: Decimal) {
    if raw_amount.is_sign_negative() {
        ctx.discount_sum += -raw_amount;
    } else if raw_amount.is_sign_positive() {
        ctx.surcharge_sum += raw_amount;
    }

    ctx.current_fare += raw_amount;

    let percentage = if ctx.base_fare.is_zero() {
        Decimal::ZERO
    } else {
        (raw_amount / ctx.base_fare * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven)
    };

    ctx.adjustments.push(PriceAdjustment {
        kind,
        description,
        amount: raw_amount,
        percentage,
        applied: !raw_amount.is_zero(),
    });
}

/// Demand-level adjustment: surge on high demand, discount on low demand.
fn demand_adjustment(ctx: &mut RuleContext) {
    let Some(demand_level) = ctx.request.market_data.demand_level else {
        return;
    };
    if demand_level >= Decimal::new(8, 1) {
        let amount = ctx.current_fare * Decimal::new(30, 2);
        apply(ctx, AdjustmentKind::DemandSurge, "demand surge (+30%)".to_string(), amount);
    } else if demand_level < Decimal::new(3, 1) {
        let amount = ctx.current_fare * Decimal::new(-10, 2);
        apply(ctx, AdjustmentKind::DemandDiscount, "low demand discount (-10%)".to_string(), amount);
    }
}

/// Seasonal adjustment, clamped to `[-25%, +35%]` of the base fare.
fn seasonal_adjustment(ctx: &mut RuleContext) {
    let Some(season_factor) = ctx.request.market_data.season_factor else {
        return;
    };
    if season_factor == Decimal::ONE {
        return;
    }
    let raw = (season_factor - Decimal::ONE) * ctx.base_fare;
    let floor = SEASONAL_MIN_PCT * ctx.base_fare;
    let ceiling = SEASONAL_MAX_PCT * ctx.base_fare;
    let clamped = raw.clamp(floor, ceiling);
    apply(ctx, AdjustmentKind::Seasonal, format!("seasonal factor {season_factor}"), clamped);
}

/// Route multiplier.
fn route_multiplier_adjustment(ctx: &mut RuleContext) {
    let mult = constants::route_multiplier(&ctx.request.route);
    if mult == Decimal::ONE {
        return;
    }
    let amount = (mult - Decimal::ONE) * ctx.base_fare;
    apply(ctx, AdjustmentKind::RouteMultiplier, format!("route multiplier {mult}"), amount);
}

/// Class multiplier. Always evaluated; the adjustment amount is zero (and
/// `applied = false`) for classes whose multiplier is `1.0`.
fn class_multiplier_adjustment(ctx: &mut RuleContext) {
    let mult = constants::class_multiplier(ctx.request.class);
    let amount = (mult - Decimal::ONE) * ctx.base_fare;
    apply(ctx, AdjustmentKind::ClassMultiplier, format!("class multiplier {mult}"), amount);
}

/// Loyalty discount.
fn loyalty_discount_adjustment(ctx: &mut RuleContext) {
    let rate = constants::loyalty_discount(ctx.request.loyalty_tier);
    if rate.is_zero() {
        return;
    }
    let amount = -rate * ctx.current_fare;
    apply(ctx, AdjustmentKind::LoyaltyDiscount, format!("loyalty discount ({:?})", ctx.request.loyalty_tier), amount);
}

/// Corporate discount.
fn corporate_discount_adjustment(ctx: &mut RuleContext) {
    let Some(corporate_id) = ctx.request.corporate_id.as_ref() else {
        return;
    };
    if corporate_id.is_empty() {
        return;
    }
    let amount = -CORPORATE_DISCOUNT * ctx.current_fare;
    apply(ctx, AdjustmentKind::CorporateDiscount, "corporate discount".to_string(), amount);
}

/// Channel adjustment. Always evaluated; `web` contributes zero.
fn channel_adjustment(ctx: &mut RuleContext) {
    let factor = constants::channel_factor(ctx.request.booking_channel);
    let amount = ctx.current_fare * factor;
    apply(ctx, AdjustmentKind::ChannelAdjustment, format!("channel factor {factor}"), amount);
}

/// Advance-booking adjustment. Early (`>= 60` days out) or last-minute
/// (`< 14` days out); mutually exclusive with each other but composes
/// sequentially (multiplicatively against the running fare) with every
/// earlier step rather than against the base fare alone.
fn advance_booking_adjustment(ctx: &mut RuleContext) {
    let days_out = (ctx.request.departure_date - ctx.request.timestamp.date_naive()).num_days();
    if days_out >= EARLY_BOOKING_DAYS {
        let amount = -EARLY_BOOKING_DISCOUNT * ctx.current_fare;
        apply(ctx, AdjustmentKind::AdvanceBooking, "early booking discount (-15%)".to_string(), amount);
    } else if days_out < LAST_MINUTE_DAYS {
        let amount = LAST_MINUTE_SURCHARGE * ctx.current_fare;
        apply(ctx, AdjustmentKind::AdvanceBooking, "last-minute surcharge (+25%)".to_string(), amount);
    }
}

/// Competitor adjustment. Inactive by default; nudges the fare toward the
/// competitor average by the route's competitor factor when enabled.
fn competitor_adjustment(ctx: &mut RuleContext) {
    let Some(competitor_avg) = ctx.request.market_data.competitor_avg else {
        return;
    };
    let factor = constants::competitor_factor(&ctx.request.route);
    if factor.is_zero() || competitor_avg.is_zero() {
        return;
    }
    let delta = (competitor_avg - ctx.current_fare) * factor;
    apply(ctx, AdjustmentKind::CompetitorAdjustment, "competitor adjustment".to_string(), delta);
}

/// Fuel surcharge. Inactive by default; a flat surcharge rate when enabled.
fn fuel_surcharge_adjustment(ctx: &mut RuleContext) {
    let amount = constants::FUEL_SURCHARGE_RATE * ctx.current_fare;
    apply(ctx, AdjustmentKind::FuelSurcharge, "fuel surcharge".to_string(), amount);
}

fn dispatch(kind: AdjustmentKind, ctx: &mut RuleContext) {
    match kind {
        AdjustmentKind::DemandSurge | AdjustmentKind::DemandDiscount => demand_adjustment(ctx),
        AdjustmentKind::Seasonal => seasonal_adjustment(ctx),
        AdjustmentKind::RouteMultiplier => route_multiplier_adjustment(ctx),
        AdjustmentKind::ClassMultiplier => class_multiplier_adjustment(ctx),
        AdjustmentKind::LoyaltyDiscount => loyalty_discount_adjustment(ctx),
        AdjustmentKind::CorporateDiscount => corporate_discount_adjustment(ctx),
        AdjustmentKind::ChannelAdjustment => channel_adjustment(ctx),
        AdjustmentKind::AdvanceBooking => advance_booking_adjustment(ctx),
        AdjustmentKind::CompetitorAdjustment => competitor_adjustment(ctx),
        AdjustmentKind::FuelSurcharge => fuel_surcharge_adjustment(ctx),
    }
}

/// Rounds a currency amount half-even to 2 fractional digits.
fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Runs the adjustment chain over `base_fare` and finalizes a full
/// [`PricingResponse`] for the given `source`/`request`.
///
/// `chain` is the ordered list of adjustment tags to run; pass
/// [`DEFAULT_CHAIN`] for the standard behavior.
pub fn price_from_base(
    request: &PricingRequest,
    base_fare: Decimal,
    source: PriceSource,
    chain: &[AdjustmentKind],
) -> Result<PricingResponse, PricingError> {
    if base_fare <= Decimal::ZERO {
        return Err(PricingError::InvalidBase(base_fare));
    }

    let mut ctx = RuleContext::new(request, base_fare);
    for kind in chain {
        dispatch(*kind, &mut ctx);
    }

    // Bound enforcement. Never drop the final fare below
    // baseFare * (1 - MaxDiscountPercent), never push it above
    // baseFare * (1 + MaxSurchargePercent), then clamp to the global
    // [MinimumFare, MaximumFare] band.
    let margin_floor = base_fare * (Decimal::ONE - MAX_DISCOUNT_PERCENT);
    let surcharge_ceiling = base_fare * (Decimal::ONE + MAX_SURCHARGE_PERCENT);
    let mut final_fare = ctx.current_fare.clamp(margin_floor, surcharge_ceiling);
    final_fare = final_fare.clamp(MINIMUM_FARE, MAXIMUM_FARE);
    final_fare = round_currency(final_fare);

    // Tax & fees.
    let tax_rate = constants::regional_tax_rate(&request.origin);
    let taxes = round_currency(final_fare * tax_rate);
    let fees = FIXED_FEES;
    let total = round_currency(final_fare + taxes + fees);

    let now = Utc::now();
    let total_adjustment = round_currency(final_fare - base_fare);

    Ok(PricingResponse {
        route: request.route.clone(),
        request_id: request.request_id.clone(),
        base_fare: round_currency(base_fare),
        final_fare,
        currency: "USD".to_string(),
        taxes,
        fees,
        total,
        adjustments: ctx.adjustments,
        breakdown: PriceBreakdown {
            base_fare: round_currency(base_fare),
            total_adjustment,
            pre_tax_fare: final_fare,
            taxes,
            fees,
        },
        valid_until: now + chrono::Duration::minutes(constants::PRICE_VALIDITY_MINUTES),
        timestamp: now,
        source,
        confidence_score: source.confidence(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{request_with_departure, sample_request};
    use crate::types::{BookingChannel, FareClass, LoyaltyTier, MarketData};
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_non_positive_base_fare() {
        let request = sample_request();
        let result = price_from_base(&request, dec!(0), PriceSource::Live, DEFAULT_CHAIN);
        assert!(matches!(result, Err(PricingError::InvalidBase(_))));
    }

    #[test]
    fn happy_path_early_booking_discount_only() {
        let request = request_with_departure(90);
        let response =
            price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();

        assert_eq!(response.adjustments.iter().filter(|a| a.applied).count(), 1);
        assert_eq!(response.final_fare, dec!(552.50));
        assert_eq!(response.taxes, dec!(38.68)); // NYC tax rate 7%
        assert_eq!(response.fees, dec!(25.00));
        assert_eq!(response.total, dec!(616.18));
        assert_eq!(response.confidence_score, dec!(1.0));
    }

    #[test]
    fn demand_level_exactly_point_eight_triggers_surge() {
        let mut request = sample_request();
        request.market_data.demand_level = Some(dec!(0.8));
        request.market_data.season_factor = None;
        let response =
            price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();
        let surge = response
            .adjustments
            .iter()
            .find(|a| a.kind == AdjustmentKind::DemandSurge)
            .unwrap();
        assert!(surge.applied);
        assert_eq!(surge.amount, dec!(195.0000)); // 650 * 0.30
    }

    #[test]
    fn surge_and_class_and_loyalty_stack_in_order() {
        // demand_surge (+30%), seasonal (+25% of base), class_multiplier
        // (x3.0 -> +200% of base), loyalty (-8%), channel (+5%), applied
        // sequentially against the running fare.
        let mut request = sample_request();
        request.class = FareClass::Business;
        request.market_data.demand_level = Some(dec!(0.85));
        request.market_data.season_factor = Some(dec!(1.25));
        request.booking_channel = BookingChannel::Agent;
        request.loyalty_tier = LoyaltyTier::Gold;
        request.departure_date = request.timestamp.date_naive() + chrono::Duration::days(30);

        let response =
            price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();

        // 650 -> +195 (surge) -> +162.50 (seasonal) -> +1300 (class) ->
        // -184.60 (loyalty 8% of 2307.50) -> +106.145 (channel 5% of
        // 2122.90) = 2229.045, half-even rounded to 2229.04.
        assert_eq!(response.final_fare, dec!(2229.04));
        assert!(response.final_fare <= MAXIMUM_FARE);
    }

    #[test]
    fn final_fare_never_below_minimum_discount_floor() {
        let mut request = sample_request();
        request.market_data.demand_level = Some(dec!(0.1)); // -10% discount
        request.market_data.season_factor = Some(dec!(0.5)); // clamps to -25%
        request.loyalty_tier = LoyaltyTier::Diamond; // -18%
        request.corporate_id = Some("ACME".to_string()); // -10%
        request.departure_date = request.timestamp.date_naive() + chrono::Duration::days(90); // -15%

        let response =
            price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();

        let floor = dec!(650.00) * (Decimal::ONE - MAX_DISCOUNT_PERCENT);
        assert!(response.final_fare >= floor);
    }

    #[test]
    fn total_equals_final_fare_plus_taxes_plus_fees() {
        let request = sample_request();
        let response =
            price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();
        assert_eq!(response.total, response.final_fare + response.taxes + response.fees);
    }

    #[test]
    fn sum_of_adjustments_equals_final_minus_base() {
        let request = sample_request();
        let response =
            price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();
        let sum: Decimal = response.adjustments.iter().map(|a| a.amount).sum();
        assert_eq!(round_currency(response.base_fare + sum), response.final_fare);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let request = sample_request();
        let a = price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();
        let b = price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN).unwrap();
        assert_eq!(a.final_fare, b.final_fare);
        assert_eq!(a.adjustments.len(), b.adjustments.len());
    }

    #[test]
    fn unrecognized_enumerations_are_total_and_never_panic() {
        let mut request = sample_request();
        request.market_data = MarketData::default();
        let result = price_from_base(&request, dec!(650.00), PriceSource::Live, DEFAULT_CHAIN);
        assert!(result.is_ok());
    }
}
