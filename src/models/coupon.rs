// Loyalty Coupon Database Model
// One coupon per customer; visits count 1..=8 and the discount tier follows the count

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::coupons;

/// Highest visit count before the card starts over
pub const MAX_VISITS: i16 = 8;

/// Visits 1..=4 earn the lower discount, 5..=8 the higher one
const MIN_TIER_LAST_VISIT: i16 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscountTier {
    Min,
    Max,
}

impl DiscountTier {
    pub fn for_visits(visit_count: i16) -> Self {
        if visit_count > MIN_TIER_LAST_VISIT {
            DiscountTier::Max
        } else {
            DiscountTier::Min
        }
    }
}

/// Discount percentages behind each tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountRates {
    pub min: i16,
    pub max: i16,
}

impl Default for DiscountRates {
    fn default() -> Self {
        Self { min: 25, max: 50 }
    }
}

impl DiscountRates {
    pub fn rate(&self, tier: DiscountTier) -> i16 {
        match tier {
            DiscountTier::Min => self.min,
            DiscountTier::Max => self.max,
        }
    }
}

/// Coupon database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = coupons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Coupon {
    pub id: i32,
    pub customer_id: i32,
    pub discount: i16,
    pub visit_count: i16,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = coupons)]
pub struct NewCoupon {
    pub customer_id: i32,
    pub discount: i16,
    pub visit_count: i16,
}

impl NewCoupon {
    /// A fresh card: no visits, lower discount
    pub fn fresh(customer_id: i32, rates: &DiscountRates) -> Self {
        Self {
            customer_id,
            discount: rates.rate(DiscountTier::Min),
            visit_count: 0,
        }
    }
}

impl Coupon {
    pub fn tier(&self) -> DiscountTier {
        DiscountTier::for_visits(self.visit_count)
    }

    /// Record one completed visit
    pub fn increase(&mut self, rates: &DiscountRates) {
        self.visit_count += 1;
        if self.visit_count > MAX_VISITS {
            self.visit_count = 1;
        }
        self.discount = rates.rate(self.tier());
    }
}
