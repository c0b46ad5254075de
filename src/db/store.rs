// Transactional storage session for the booking core
//
// A `BookingStore` hands out one `BookingTx` per unit of work. The work either
// returns Ok and commits, or returns Err and everything it wrote is rolled back.
// Every booking row the work inserts, updates or deletes is recorded so the
// caller can broadcast after commit.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::future::BoxFuture;

use crate::models::{
    Action, ActionType, Booking, BookingNote, Confirmation, ConfirmationType, Coupon, NewAction,
    NewBooking, NewConfirmation, NewCoupon, NewErrorRecord, NewOutboundMail, NewUser,
    OutboundMail, ReloadEvent, Role, User, UserNote,
};
use crate::utils::BookingResult;

/// Future returned by a unit of work, borrowing the transaction for `'t`
pub type TxFuture<'t, T> = BoxFuture<'t, BookingResult<T>>;

/// Result of a committed unit of work
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Booking rows written by the transaction, in write order
    pub touched: Vec<ReloadEvent>,
}

#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    /// Run `work` inside one transaction; commit on Ok, roll back on Err
    async fn transaction<T, F>(&self, work: F) -> BookingResult<Committed<T>>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn BookingTx) -> TxFuture<'t, T> + Send + 'static;
}

/// Operations available inside a transaction.
///
/// `lock_*` methods take a row lock held until the transaction ends, so two
/// transactions touching the same booking, token or coupon are serialized.
#[async_trait]
pub trait BookingTx: Send {
    // Bookings
    async fn find_booking(&mut self, id: i32) -> BookingResult<Option<Booking>>;
    async fn lock_booking(&mut self, id: i32) -> BookingResult<Option<Booking>>;
    async fn insert_booking(&mut self, new_booking: NewBooking) -> BookingResult<Booking>;
    async fn update_booking(&mut self, booking: &Booking) -> BookingResult<Booking>;
    async fn delete_booking(&mut self, booking: &Booking) -> BookingResult<()>;
    /// Bookings with `from <= date < until`, in no particular order
    async fn bookings_between(&mut self, from: NaiveDate, until: NaiveDate) -> BookingResult<Vec<Booking>>;
    async fn customer_bookings(&mut self, customer_id: i32) -> BookingResult<Vec<Booking>>;
    /// Locks CONFIRMED bookings whose end has passed at `now`
    async fn lock_due_confirmed(&mut self, now: NaiveDateTime) -> BookingResult<Vec<Booking>>;

    // Users
    async fn find_user(&mut self, id: i32) -> BookingResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> BookingResult<Option<User>>;
    async fn insert_user(&mut self, new_user: NewUser) -> BookingResult<User>;
    async fn set_user_role(&mut self, id: i32, role: Role) -> BookingResult<User>;

    // Confirmation tokens
    async fn insert_confirmation(&mut self, new_confirmation: NewConfirmation) -> BookingResult<Confirmation>;
    async fn booking_confirmations(
        &mut self,
        booking_id: i32,
        confirmation_type: Option<ConfirmationType>,
    ) -> BookingResult<Vec<Confirmation>>;
    async fn lock_confirmation(
        &mut self,
        code: &str,
        confirmation_type: ConfirmationType,
    ) -> BookingResult<Option<Confirmation>>;
    async fn delete_confirmations(&mut self, ids: &[i32]) -> BookingResult<usize>;
    async fn lock_unmailed_confirmations(
        &mut self,
        confirmation_type: ConfirmationType,
    ) -> BookingResult<Vec<Confirmation>>;
    async fn set_confirmation_mail(&mut self, id: i32, mail_id: i32) -> BookingResult<()>;

    // Action tokens
    async fn insert_action(&mut self, new_action: NewAction) -> BookingResult<Action>;
    async fn lock_action(&mut self, code: &str, action_type: ActionType) -> BookingResult<Option<Action>>;
    async fn delete_action(&mut self, id: i32) -> BookingResult<()>;
    async fn lock_unmailed_actions(&mut self) -> BookingResult<Vec<Action>>;
    async fn set_action_mail(&mut self, id: i32, mail_id: i32) -> BookingResult<()>;
    /// Retention purge of both token kinds created before `cutoff`
    async fn purge_tokens_before(&mut self, cutoff: DateTime<Utc>) -> BookingResult<usize>;

    // Outbound mail
    async fn insert_mail(&mut self, new_mail: NewOutboundMail) -> BookingResult<OutboundMail>;
    /// Deletes the given mails unless already delivered
    async fn delete_undelivered_mails(&mut self, ids: &[i32]) -> BookingResult<usize>;
    async fn deliverable_mails(&mut self, max_attempts: i32) -> BookingResult<Vec<OutboundMail>>;

    // Coupons
    async fn lock_coupon(&mut self, customer_id: i32) -> BookingResult<Option<Coupon>>;
    async fn insert_coupon(&mut self, new_coupon: NewCoupon) -> BookingResult<Coupon>;
    async fn update_coupon(&mut self, coupon: &Coupon) -> BookingResult<Coupon>;

    // Internal notes
    async fn booking_note(&mut self, booking_id: i32) -> BookingResult<Option<BookingNote>>;
    async fn upsert_booking_note(&mut self, booking_id: i32, note: &str) -> BookingResult<BookingNote>;
    async fn delete_booking_note(&mut self, booking_id: i32) -> BookingResult<()>;
    async fn upsert_user_note(&mut self, user_id: i32, note: &str) -> BookingResult<UserNote>;

    // Error sink
    async fn insert_error(&mut self, record: NewErrorRecord) -> BookingResult<()>;
}
