// Actor-initiated state transitions

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::{info, instrument};
use validator::Validate;

use super::{
    counterpart, diff_mail, load_user, locked_booking, release_tokens, require_admin, rules_mail,
    BookingEdit, BookingService, GuestDetails, Outcome,
};
use crate::db::{BookingStore, BookingTx};
use crate::models::{
    ActionType, Actor, BookingStatus, ConfirmationType, MailType, NewAction, NewBooking,
    NewConfirmation, NewUser, Reply, Role, User,
};
use crate::services::notification::{MailParams, MailRequest};
use crate::utils::{messages, trim_optional_field, validate_time_range, BookingError, BookingResult};

/// Find or create the Anonymous account behind a guest's email
async fn promote_guest(tx: &mut dyn BookingTx, details: GuestDetails) -> BookingResult<User> {
    let email = details.email.trim().to_lowercase();
    match tx.find_user_by_email(&email).await? {
        Some(user) if matches!(user.role, Role::Registered | Role::Admin) => {
            Err(BookingError::precondition(messages::EMAIL_REGISTERED))
        },
        Some(user) if user.role == Role::Guest => tx.set_user_role(user.id, Role::Anonymous).await,
        Some(user) => Ok(user),
        None => {
            tx.insert_user(NewUser {
                email,
                role: Role::Anonymous,
                name: trim_optional_field(details.name.as_deref()),
                surname: trim_optional_field(details.surname.as_deref()),
                phone: trim_optional_field(details.phone.as_deref()),
            })
            .await
        },
    }
}

/// Admin status overrides still respect the pause rules and the customer requirement
fn check_status_change(
    from: BookingStatus,
    to: BookingStatus,
    has_customer: bool,
) -> BookingResult<()> {
    if from != to {
        if to == BookingStatus::Paused
            && !matches!(from, BookingStatus::Free | BookingStatus::Cancelled)
        {
            return Err(BookingError::precondition(messages::INVALID_PAUSE));
        }
        if from == BookingStatus::Paused && to != BookingStatus::Free {
            return Err(BookingError::precondition(messages::PAUSED_SLOT));
        }
    }
    if to.requires_customer() && !has_customer {
        return Err(BookingError::precondition(messages::CUSTOMER_REQUIRED));
    }
    Ok(())
}

impl<S: BookingStore> BookingService<S> {
    /// Claim a FREE slot; guests are promoted to an Anonymous account first
    #[instrument(skip(self, actor, note, guest), fields(actor = ?actor.id))]
    pub async fn book_slot(
        &self,
        actor: &Actor,
        booking_id: i32,
        note: Option<String>,
        guest: Option<GuestDetails>,
    ) -> BookingResult<(Reply, Option<Actor>)> {
        let note = trim_optional_field(note.as_deref());
        let guest = match (actor.is_guest(), guest) {
            (true, Some(details)) => {
                details.validate()?;
                Some(details)
            },
            (true, None) => {
                return Err(BookingError::validation("guest", "contact details are required"))
            },
            (false, _) => None,
        };
        let actor = actor.clone();
        let now = self.now();
        let stamped = self.timestamp();

        let (content, promoted) = self
            .commit(move |tx| {
                Box::pin(async move {
                    let (customer, promoted) = match guest {
                        Some(details) => {
                            let user = promote_guest(tx, details).await?;
                            let promoted = Actor::from(&user);
                            (user, Some(promoted))
                        },
                        None => {
                            let user = load_user(tx, actor.id)
                                .await?
                                .ok_or_else(|| BookingError::NotFound(messages::NO_USER.into()))?;
                            (user, None)
                        },
                    };

                    let mut booking = locked_booking(tx, booking_id).await?;
                    if booking.status != BookingStatus::Free
                        || booking.customer_id.is_some()
                        || booking.starts_at() < now
                    {
                        return Err(BookingError::precondition(messages::SLOT_UNAVAILABLE));
                    }

                    booking.status = BookingStatus::Pending;
                    booking.note = note;
                    booking.customer_id = Some(customer.id);
                    booking.updated_by = Some(customer.id);
                    let booking = tx.update_booking(&booking).await?;

                    tx.insert_confirmation(NewConfirmation::new(
                        ConfirmationType::AcceptBooking,
                        booking.id,
                        stamped,
                    ))
                    .await?;
                    tx.insert_confirmation(NewConfirmation::new(
                        ConfirmationType::ConfirmBooking,
                        booking.id,
                        stamped,
                    ))
                    .await?;

                    info!("Booking {} requested by user {}", booking.id, customer.id);

                    let content = json!({"id": booking.id, "email": customer.email});
                    let receiver = customer.email.clone();
                    let mail = MailRequest::new(
                        MailType::BookBooking,
                        messages::MAIL_BOOKING,
                        booking.clone(),
                        Some(customer),
                        MailParams::Snapshot(booking.projection()),
                    )
                    .to(receiver);
                    Ok(Outcome::new((content, promoted)).with_mail(mail))
                })
            })
            .await?;

        Ok((Reply::new(messages::BOOKED, content), promoted))
    }

    /// PENDING -> BOOKED by an admin
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn accept_booking(&self, actor: &Actor, booking_id: i32) -> BookingResult<Reply> {
        require_admin(actor)?;
        let actor = actor.clone();
        let business_email = self.settings.business_email.clone();

        self.commit(move |tx| {
            Box::pin(async move {
                let mut booking = locked_booking(tx, booking_id).await?;
                match booking.status {
                    BookingStatus::Pending => {},
                    BookingStatus::Confirmed => {
                        return Err(BookingError::precondition(messages::ALREADY_CONFIRMED))
                    },
                    _ => return Err(BookingError::precondition(messages::NOT_PENDING)),
                }

                let customer = load_user(tx, booking.customer_id).await?;
                let other =
                    counterpart(tx, &actor, &booking, customer.as_ref(), &business_email).await?;
                let before = booking.projection_with(other.as_ref());

                booking.status = BookingStatus::Booked;
                booking.updated_by = actor.id;
                let booking = tx.update_booking(&booking).await?;
                release_tokens(tx, booking.id, Some(ConfirmationType::AcceptBooking)).await?;

                info!("Booking {} accepted", booking.id);

                let reply = Reply::new(messages::ACCEPTED, json!({"id": booking.id}));
                let mail = diff_mail(
                    MailType::Update,
                    messages::MAIL_UPDATE,
                    before,
                    booking,
                    customer,
                    other.as_ref(),
                );
                Ok(Outcome::new(reply).with_mail(mail))
            })
        })
        .await
    }

    /// BOOKED -> CONFIRMED; customers only inside the grace window
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn confirm_booking(&self, actor: &Actor, booking_id: i32) -> BookingResult<Reply> {
        let actor = actor.clone();
        let business_email = self.settings.business_email.clone();
        let grace = self.settings.confirm_grace;
        let now = self.now();

        self.commit(move |tx| {
            Box::pin(async move {
                let mut booking = locked_booking(tx, booking_id).await?;
                if !actor.is_admin() && !actor.owns(booking.customer_id) {
                    return Err(BookingError::booking_not_found());
                }
                match booking.status {
                    BookingStatus::Booked => {},
                    BookingStatus::Confirmed => {
                        return Err(BookingError::precondition(messages::ALREADY_CONFIRMED))
                    },
                    _ => return Err(BookingError::precondition(messages::NOT_BOOKED)),
                }
                if !booking.is_confirmable(&actor, now, grace) {
                    return Err(BookingError::precondition(messages::CONFIRM_TOO_EARLY));
                }

                let customer = load_user(tx, booking.customer_id).await?;
                let other =
                    counterpart(tx, &actor, &booking, customer.as_ref(), &business_email).await?;
                let before = booking.projection_with(other.as_ref());

                booking.status = BookingStatus::Confirmed;
                booking.updated_by = actor.id;
                let booking = tx.update_booking(&booking).await?;
                release_tokens(tx, booking.id, Some(ConfirmationType::ConfirmBooking)).await?;

                info!("Booking {} confirmed", booking.id);

                let reply = Reply::new(messages::CONFIRMED, json!({"id": booking.id}));
                let Some(customer) = customer else {
                    return Ok(Outcome::new(reply));
                };
                let update = diff_mail(
                    MailType::Update,
                    messages::MAIL_UPDATE,
                    before,
                    booking.clone(),
                    Some(customer.clone()),
                    other.as_ref(),
                );
                Ok(Outcome::new(reply)
                    .with_mail(update)
                    .with_mail(rules_mail(booking, customer)))
            })
        })
        .await
    }

    /// Any live status -> CANCELLED; customers only on their own booking
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn cancel_booking(&self, actor: &Actor, booking_id: i32) -> BookingResult<Reply> {
        let actor = actor.clone();
        let business_email = self.settings.business_email.clone();
        let stamped = self.timestamp();

        self.commit(move |tx| {
            Box::pin(async move {
                let mut booking = locked_booking(tx, booking_id).await?;
                if !actor.is_admin() && !actor.owns(booking.customer_id) {
                    return Err(BookingError::booking_not_found());
                }
                match booking.status {
                    BookingStatus::Cancelled => {
                        return Err(BookingError::precondition(messages::ALREADY_CANCELLED))
                    },
                    BookingStatus::Completed => {
                        return Err(BookingError::precondition(messages::ALREADY_COMPLETED))
                    },
                    _ => {},
                }

                let customer = load_user(tx, booking.customer_id).await?;
                let other =
                    counterpart(tx, &actor, &booking, customer.as_ref(), &business_email).await?;
                let before = booking.projection_with(other.as_ref());

                booking.status = BookingStatus::Cancelled;
                booking.updated_by = actor.id;
                let booking = tx.update_booking(&booking).await?;
                release_tokens(tx, booking.id, None).await?;

                // The business gets a link to reopen the freed time
                if !actor.is_admin() {
                    tx.insert_action(NewAction::new(
                        ActionType::NewBooking,
                        Value::Object(booking.projection()),
                        stamped,
                    ))
                    .await?;
                }

                info!("Booking {} cancelled", booking.id);

                let reply = Reply::new(messages::CANCELLED, json!({"id": booking.id}));
                if customer.is_none() {
                    return Ok(Outcome::new(reply));
                }
                let mail = diff_mail(
                    MailType::Cancel,
                    messages::MAIL_CANCEL,
                    before,
                    booking,
                    customer,
                    other.as_ref(),
                );
                Ok(Outcome::new(reply).with_mail(mail))
            })
        })
        .await
    }

    /// Partial update. Admins may change any field; customers only the note
    /// of their own booking while it is still editable.
    #[instrument(skip(self, actor, edit), fields(actor = ?actor.id))]
    pub async fn edit_booking(
        &self,
        actor: &Actor,
        booking_id: i32,
        edit: BookingEdit,
    ) -> BookingResult<Reply> {
        if !actor.is_admin() && (edit.internal_note.is_some() || edit.touches_schedule()) {
            return Err(BookingError::PermissionDenied);
        }
        let actor = actor.clone();
        let business_email = self.settings.business_email.clone();
        let ledger = self.ledger;
        let now = self.now();

        self.commit(move |tx| {
            Box::pin(async move {
                let mut booking = locked_booking(tx, booking_id).await?;

                if let Some(text) = edit.internal_note.as_deref() {
                    tx.upsert_booking_note(booking.id, text.trim()).await?;
                }
                let reply = Reply::new(messages::EDITED, json!({"id": booking.id}));
                if !edit.touches_booking() {
                    return Ok(Outcome::new(reply));
                }

                if !actor.is_admin() {
                    if !actor.owns(booking.customer_id) {
                        return Err(BookingError::booking_not_found());
                    }
                    if !booking.is_editable(&actor, now) {
                        return Err(BookingError::precondition(messages::NOT_EDITABLE));
                    }
                }

                let customer = load_user(tx, booking.customer_id).await?;
                let other =
                    counterpart(tx, &actor, &booking, customer.as_ref(), &business_email).await?;
                let before = booking.projection_with(other.as_ref());
                let previous = booking.status;

                if let Some(date) = edit.date {
                    booking.date = date;
                }
                if let Some(start) = edit.start {
                    booking.start_time = start;
                }
                if let Some(end) = edit.end {
                    booking.end_time = end;
                }
                if edit.note.is_some() {
                    booking.note = trim_optional_field(edit.note.as_deref());
                }
                if let Some(status) = edit.status {
                    // A freed slot is open for anyone again
                    if status == BookingStatus::Free && previous != BookingStatus::Free {
                        booking.customer_id = None;
                        booking.note = None;
                    }
                    check_status_change(previous, status, booking.customer_id.is_some())?;
                    booking.status = status;
                }
                validate_time_range(booking.start_time, booking.end_time)?;

                booking.updated_by = actor.id;
                let booking = tx.update_booking(&booking).await?;

                // A cancelled or freed slot keeps no links from its previous claim
                let unclaimed =
                    matches!(booking.status, BookingStatus::Cancelled | BookingStatus::Free);
                if unclaimed && booking.status != previous {
                    release_tokens(tx, booking.id, None).await?;
                }
                if booking.status == BookingStatus::Completed && previous != BookingStatus::Completed
                {
                    if let Some(customer_id) = booking.customer_id {
                        ledger.increase(tx, customer_id).await?;
                    }
                }

                info!("Booking {} edited ({} -> {})", booking.id, previous, booking.status);

                let quiet = booking.customer_id.is_none()
                    || customer.is_none()
                    || matches!(
                        booking.status,
                        BookingStatus::Completed | BookingStatus::Paused | BookingStatus::Free
                    );
                if quiet {
                    return Ok(Outcome::new(reply));
                }
                let mail = diff_mail(
                    MailType::Update,
                    messages::MAIL_UPDATE,
                    before,
                    booking,
                    customer,
                    other.as_ref(),
                );
                Ok(Outcome::new(reply).with_mail(mail))
            })
        })
        .await
    }

    /// Remove a booking with its tokens and internal note
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn delete_booking(&self, actor: &Actor, booking_id: i32) -> BookingResult<Reply> {
        require_admin(actor)?;

        self.commit(move |tx| {
            Box::pin(async move {
                let booking = locked_booking(tx, booking_id).await?;
                release_tokens(tx, booking.id, None).await?;
                tx.delete_booking_note(booking.id).await?;
                tx.delete_booking(&booking).await?;

                info!("Booking {} deleted", booking.id);
                Ok(Outcome::new(Reply::new(
                    messages::DELETED,
                    json!({"id": booking.id}),
                )))
            })
        })
        .await
    }

    /// Open a new FREE slot
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn create_slot(
        &self,
        actor: &Actor,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> BookingResult<Reply> {
        require_admin(actor)?;
        validate_time_range(start, end)?;
        let updated_by = actor.id;

        self.commit(move |tx| {
            Box::pin(async move {
                let mut slot = NewBooking::slot(date, start, end);
                slot.updated_by = updated_by;
                let booking = tx.insert_booking(slot).await?;

                info!("Slot {} created on {}", booking.id, booking.date);
                Ok(Outcome::new(Reply::new(
                    messages::SLOT_CREATED,
                    Value::Object(booking.projection()),
                )))
            })
        })
        .await
    }

    /// Ask the business for a time that has no slot yet
    #[instrument(skip(self, actor, note), fields(actor = ?actor.id))]
    pub async fn request_booking(
        &self,
        actor: &Actor,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        note: Option<String>,
    ) -> BookingResult<Reply> {
        if !matches!(actor.role, Role::Admin | Role::Registered) {
            return Err(BookingError::PermissionDenied);
        }
        validate_time_range(start, end)?;
        let note = trim_optional_field(note.as_deref());
        let actor_id = actor.id;
        let stamped = self.timestamp();

        self.commit(move |tx| {
            Box::pin(async move {
                let client = load_user(tx, actor_id)
                    .await?
                    .ok_or_else(|| BookingError::NotFound(messages::NO_USER.into()))?;

                let mut client_fields = client.projection();
                client_fields.insert("id".into(), json!(client.id));
                let params = json!({
                    "date": date.format("%Y-%m-%d").to_string(),
                    "start": start.format("%H:%M").to_string(),
                    "end": end.format("%H:%M").to_string(),
                    "note": note,
                    "status": BookingStatus::Booked.as_str(),
                    "client": client_fields,
                });
                let action = tx
                    .insert_action(NewAction::new(ActionType::RequestNewBooking, params, stamped))
                    .await?;

                info!("New booking request {} from user {}", action.id, client.id);
                Ok(Outcome::new(Reply::message(messages::REQUEST_SENT)))
            })
        })
        .await
    }

    #[instrument(skip(self, actor, note), fields(actor = ?actor.id))]
    pub async fn upsert_booking_note(
        &self,
        actor: &Actor,
        booking_id: i32,
        note: String,
    ) -> BookingResult<Reply> {
        require_admin(actor)?;

        self.commit(move |tx| {
            Box::pin(async move {
                let booking = tx
                    .find_booking(booking_id)
                    .await?
                    .ok_or_else(BookingError::booking_not_found)?;
                tx.upsert_booking_note(booking.id, note.trim()).await?;
                Ok(Outcome::new(Reply::message(messages::NOTE_SAVED)))
            })
        })
        .await
    }

    #[instrument(skip(self, actor, note), fields(actor = ?actor.id))]
    pub async fn upsert_user_note(
        &self,
        actor: &Actor,
        user_id: i32,
        note: String,
    ) -> BookingResult<Reply> {
        require_admin(actor)?;

        self.commit(move |tx| {
            Box::pin(async move {
                let user = tx
                    .find_user(user_id)
                    .await?
                    .ok_or_else(|| BookingError::NotFound(messages::NO_USER.into()))?;
                tx.upsert_user_note(user.id, note.trim()).await?;
                Ok(Outcome::new(Reply::message(messages::NOTE_SAVED)))
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_only_from_free_or_cancelled() {
        assert!(check_status_change(BookingStatus::Free, BookingStatus::Paused, false).is_ok());
        assert!(check_status_change(BookingStatus::Cancelled, BookingStatus::Paused, true).is_ok());
        assert_eq!(
            check_status_change(BookingStatus::Booked, BookingStatus::Paused, true),
            Err(BookingError::precondition(messages::INVALID_PAUSE))
        );
    }

    #[test]
    fn test_paused_slot_only_freed() {
        assert!(check_status_change(BookingStatus::Paused, BookingStatus::Free, false).is_ok());
        assert!(check_status_change(BookingStatus::Paused, BookingStatus::Paused, false).is_ok());
        assert_eq!(
            check_status_change(BookingStatus::Paused, BookingStatus::Booked, true),
            Err(BookingError::precondition(messages::PAUSED_SLOT))
        );
    }

    #[test]
    fn test_customer_required_for_live_statuses() {
        assert_eq!(
            check_status_change(BookingStatus::Free, BookingStatus::Booked, false),
            Err(BookingError::precondition(messages::CUSTOMER_REQUIRED))
        );
        assert!(check_status_change(BookingStatus::Cancelled, BookingStatus::Completed, true).is_ok());
    }
}
