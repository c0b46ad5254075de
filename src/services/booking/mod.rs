// Booking Lifecycle Service
// Role-guarded state transitions over the booking store, with mails and
// reload notices emitted only after the owning transaction commits

pub mod command;
mod queries;
mod sweeps;
mod tokens;
mod transitions;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Map;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub use command::{
    BookingCommand, BookingEdit, BookingFilter, CommandOutcome, GuestDetails, RedeemKind,
};

use crate::app_config::BookingSettings;
use crate::db::{BookingStore, BookingTx, TxFuture};
use crate::models::{Actor, Booking, ConfirmationType, Envelope, MailType, Reply, User};
use crate::services::broadcast::ChangeBroadcaster;
use crate::services::coupon::CouponLedger;
use crate::services::notification::{MailComposer, MailParams, MailRequest, NotificationEngine};
use crate::utils::{messages, BookingError, BookingResult, Clock};

/// Value of a unit of work plus the mails to queue once it commits
pub(crate) struct Outcome<T> {
    value: T,
    mails: Vec<MailRequest>,
}

impl<T> Outcome<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            mails: Vec::new(),
        }
    }

    fn with_mail(mut self, mail: MailRequest) -> Self {
        self.mails.push(mail);
        self
    }
}

pub struct BookingService<S: BookingStore> {
    store: Arc<S>,
    notifier: NotificationEngine<S>,
    broadcaster: ChangeBroadcaster,
    ledger: CouponLedger,
    clock: Arc<dyn Clock>,
    settings: BookingSettings,
}

impl<S: BookingStore> BookingService<S> {
    pub fn new(
        store: Arc<S>,
        broadcaster: ChangeBroadcaster,
        clock: Arc<dyn Clock>,
        settings: BookingSettings,
    ) -> Self {
        let composer = MailComposer::new(settings.business_email.clone());
        Self {
            notifier: NotificationEngine::new(store.clone(), composer),
            ledger: CouponLedger::new(settings.discount_rates),
            store,
            broadcaster,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &BookingSettings {
        &self.settings
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.clock.timestamp()
    }

    /// Run one unit of work, then broadcast what it touched and queue its mails
    async fn commit<T, F>(&self, work: F) -> BookingResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn BookingTx) -> TxFuture<'t, Outcome<T>> + Send + 'static,
    {
        let committed = self.store.transaction(work).await?;
        self.broadcaster.broadcast(&committed.touched);

        let Outcome { value, mails } = committed.value;
        if !mails.is_empty() {
            self.notifier.notify(mails).await;
        }
        Ok(value)
    }

    /// Map an operation result onto the response envelope.
    ///
    /// System failures are logged and written to the error sink; the caller
    /// only sees a generic message unless verbose errors are enabled.
    pub async fn respond(&self, operation: &str, result: BookingResult<Reply>) -> Envelope {
        match &result {
            Err(e) if e.is_system() => {
                error!("{} failed: {}", operation, e);
                self.notifier.record_error(operation, e.to_string()).await;
            },
            Err(BookingError::PermissionDenied) => warn!("{} denied", operation),
            Err(e) => debug!("{} rejected: {}", operation, e),
            Ok(_) => {},
        }
        Envelope::from_result(&result, self.settings.verbose_errors)
    }

    /// Dispatch a boundary command for an already resolved actor
    pub async fn execute(&self, actor: &Actor, command: BookingCommand) -> CommandOutcome {
        let operation = command.name();
        let result = match command {
            BookingCommand::BookSlot { id, note, guest } => {
                match self.book_slot(actor, id, note, guest).await {
                    Ok((reply, promoted)) => {
                        return CommandOutcome {
                            envelope: self.respond(operation, Ok(reply)).await,
                            promoted,
                        }
                    },
                    Err(e) => Err(e),
                }
            },
            BookingCommand::AcceptBooking { id } => self.accept_booking(actor, id).await,
            BookingCommand::ConfirmBooking { id } => self.confirm_booking(actor, id).await,
            BookingCommand::CancelBooking { id } => self.cancel_booking(actor, id).await,
            BookingCommand::EditBooking {
                id,
                date,
                start,
                end,
                status,
                note,
                internal_note,
            } => {
                let edit = BookingEdit {
                    date,
                    start,
                    end,
                    status,
                    note,
                    internal_note,
                };
                self.edit_booking(actor, id, edit).await
            },
            BookingCommand::DeleteBooking { id } => self.delete_booking(actor, id).await,
            BookingCommand::CreateSlot { date, start, end } => {
                self.create_slot(actor, date, start, end).await
            },
            BookingCommand::RequestBooking {
                date,
                start,
                end,
                note,
            } => self.request_booking(actor, date, start, end, note).await,
            BookingCommand::GetCalendar { year, month } => {
                self.get_calendar(actor, year, month).await
            },
            BookingCommand::GetBooking { id } => self.get_booking(actor, id).await,
            BookingCommand::GetAllBookingData { id } => self.get_all_booking_data(actor, id).await,
            BookingCommand::ListBookings { year, month, day } => {
                self.list_bookings(actor, BookingFilter { year, month, day })
                    .await
            },
            BookingCommand::UpsertBookingNote { id, note } => {
                self.upsert_booking_note(actor, id, note).await
            },
            BookingCommand::UpsertUserNote { user_id, note } => {
                self.upsert_user_note(actor, user_id, note).await
            },
            BookingCommand::GetCoupon { user_id } => self.get_coupon(actor, user_id).await,
            BookingCommand::AnonymizeCustomer { user_id } => {
                match require_admin(actor) {
                    Ok(()) => self.anonymize_customer(user_id).await,
                    Err(e) => Err(e),
                }
            },
        };
        self.respond(operation, result).await.into()
    }

    /// Redeem a single-use link
    pub async fn redeem(&self, kind: RedeemKind, code: &str) -> Envelope {
        let result = match kind {
            RedeemKind::Accept => self.redeem_accept(code).await,
            RedeemKind::Confirm => self.redeem_confirm(code).await,
            RedeemKind::NewBooking => self.redeem_new_booking(code).await,
            RedeemKind::RequestNewBooking => self.redeem_request_new_booking(code).await,
        };
        self.respond(kind.as_str(), result).await
    }
}

fn require_admin(actor: &Actor) -> BookingResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BookingError::PermissionDenied)
    }
}

async fn locked_booking(tx: &mut dyn BookingTx, id: i32) -> BookingResult<Booking> {
    tx.lock_booking(id)
        .await?
        .ok_or_else(BookingError::booking_not_found)
}

async fn load_user(tx: &mut dyn BookingTx, id: Option<i32>) -> BookingResult<Option<User>> {
    match id {
        Some(id) => tx.find_user(id).await,
        None => Ok(None),
    }
}

/// The user whose fields accompany a diff: the business account when the
/// customer acts on their own booking, the customer otherwise
async fn counterpart(
    tx: &mut dyn BookingTx,
    actor: &Actor,
    booking: &Booking,
    customer: Option<&User>,
    business_email: &str,
) -> BookingResult<Option<User>> {
    if actor.owns(booking.customer_id) {
        tx.find_user_by_email(business_email).await
    } else {
        Ok(customer.cloned())
    }
}

/// Delete a booking's tokens of one type (or all) and any mails they queued
/// that were not delivered yet
async fn release_tokens(
    tx: &mut dyn BookingTx,
    booking_id: i32,
    confirmation_type: Option<ConfirmationType>,
) -> BookingResult<usize> {
    let tokens = tx.booking_confirmations(booking_id, confirmation_type).await?;
    if tokens.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i32> = tokens.iter().map(|t| t.id).collect();
    let mail_ids: Vec<i32> = tokens.iter().filter_map(|t| t.mail_id).collect();
    let released = tx.delete_confirmations(&ids).await?;
    if !mail_ids.is_empty() {
        tx.delete_undelivered_mails(&mail_ids).await?;
    }
    Ok(released)
}

fn diff_mail(
    mail_type: MailType,
    subject: &'static str,
    before: Map<String, Value>,
    booking: Booking,
    customer: Option<User>,
    counterpart: Option<&User>,
) -> MailRequest {
    let after = booking.projection_with(counterpart);
    MailRequest::new(
        mail_type,
        subject,
        booking,
        customer,
        MailParams::Diff { before, after },
    )
}

fn rules_mail(booking: Booking, customer: User) -> MailRequest {
    let snapshot = booking.projection_with(Some(&customer));
    let receiver = customer.email.clone();
    MailRequest::new(
        MailType::Rules,
        messages::MAIL_RULES,
        booking,
        Some(customer),
        MailParams::Snapshot(snapshot),
    )
    .to(receiver)
}
