// Loyalty Coupon Ledger
// Runs inside the caller's transaction so the visit count moves with the booking change

use tracing::debug;

use crate::db::BookingTx;
use crate::models::{Coupon, DiscountRates, NewCoupon};
use crate::utils::BookingResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct CouponLedger {
    rates: DiscountRates,
}

impl CouponLedger {
    pub fn new(rates: DiscountRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> DiscountRates {
        self.rates
    }

    /// The customer's coupon, created on first use
    pub async fn get_or_create(&self, tx: &mut dyn BookingTx, customer_id: i32) -> BookingResult<Coupon> {
        if let Some(coupon) = tx.lock_coupon(customer_id).await? {
            return Ok(coupon);
        }
        debug!("Creating coupon for customer {}", customer_id);
        tx.insert_coupon(NewCoupon::fresh(customer_id, &self.rates)).await
    }

    /// Record one completed visit for the customer
    pub async fn increase(&self, tx: &mut dyn BookingTx, customer_id: i32) -> BookingResult<Coupon> {
        let mut coupon = self.get_or_create(tx, customer_id).await?;
        coupon.increase(&self.rates);
        let coupon = tx.update_coupon(&coupon).await?;
        debug!(
            "Coupon for customer {} now at {} visit(s), {}% off",
            customer_id, coupon.visit_count, coupon.discount
        );
        Ok(coupon)
    }
}
