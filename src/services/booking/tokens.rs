// Token redemption
// Single-use links resolved without an actor; the code itself is the credential

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{diff_mail, load_user, locked_booking, rules_mail, BookingService, Outcome};
use crate::db::{BookingStore, BookingTx};
use crate::models::{
    Action, ActionType, BookingStatus, ConfirmationType, MailType, NewAction, NewBooking, Reply,
};
use crate::services::notification::{MailParams, MailRequest};
use crate::utils::{
    messages, parse_date, parse_time, trim_optional_field, validate_time_range, BookingError,
    BookingResult,
};

/// Lock an action token of the given type, or fail as an invalid code
async fn locked_action(
    tx: &mut dyn BookingTx,
    code: &str,
    action_type: ActionType,
) -> BookingResult<Action> {
    tx.lock_action(code, action_type)
        .await?
        .ok_or_else(BookingError::invalid_code)
}

fn param_str<'a>(params: &'a Value, field: &str) -> BookingResult<&'a str> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| BookingError::validation(field, "missing from token parameters"))
}

/// Slot times carried by booking-related action tokens
pub(super) fn slot_times(params: &Value) -> BookingResult<(NaiveDate, NaiveTime, NaiveTime)> {
    let date = parse_date("date", param_str(params, "date")?)?;
    let start = parse_time("start", param_str(params, "start")?)?;
    let end = parse_time("end", param_str(params, "end")?)?;
    validate_time_range(start, end)?;
    Ok((date, start, end))
}

impl<S: BookingStore> BookingService<S> {
    /// Accept link mailed to the business: PENDING -> BOOKED
    #[instrument(skip(self, code))]
    pub async fn redeem_accept(&self, code: &str) -> BookingResult<Reply> {
        let code = code.to_string();
        let business_email = self.settings.business_email.clone();

        self.commit(move |tx| {
            Box::pin(async move {
                let token = tx
                    .lock_confirmation(&code, ConfirmationType::AcceptBooking)
                    .await?
                    .ok_or_else(BookingError::invalid_code)?;
                let mut booking = locked_booking(tx, token.booking_id).await?;
                match booking.status {
                    BookingStatus::Pending => {},
                    BookingStatus::Booked => {
                        return Err(BookingError::precondition(messages::ALREADY_BOOKED))
                    },
                    _ => return Err(BookingError::precondition(messages::NOT_PENDING)),
                }

                let customer = load_user(tx, booking.customer_id).await?;
                let business = tx.find_user_by_email(&business_email).await?;
                let before = booking.projection_with(customer.as_ref());

                booking.status = BookingStatus::Booked;
                booking.updated_by = business.as_ref().map(|user| user.id);
                let booking = tx.update_booking(&booking).await?;
                tx.delete_confirmations(&[token.id]).await?;
                if let Some(mail_id) = token.mail_id {
                    tx.delete_undelivered_mails(&[mail_id]).await?;
                }

                info!("Booking {} accepted by link", booking.id);

                let reply = Reply::new(messages::ACCEPTED, json!({"id": booking.id}));
                let counterpart = customer.clone();
                let mail = diff_mail(
                    MailType::Update,
                    messages::MAIL_UPDATE,
                    before,
                    booking,
                    customer,
                    counterpart.as_ref(),
                );
                Ok(Outcome::new(reply).with_mail(mail))
            })
        })
        .await
    }

    /// Confirm link mailed to the customer: BOOKED -> CONFIRMED.
    ///
    /// Always sends the rules mail, since a redeemed link implies a customer.
    #[instrument(skip(self, code))]
    pub async fn redeem_confirm(&self, code: &str) -> BookingResult<Reply> {
        let code = code.to_string();
        let business_email = self.settings.business_email.clone();

        self.commit(move |tx| {
            Box::pin(async move {
                let token = tx
                    .lock_confirmation(&code, ConfirmationType::ConfirmBooking)
                    .await?
                    .ok_or_else(BookingError::invalid_code)?;
                let mut booking = locked_booking(tx, token.booking_id).await?;
                match booking.status {
                    BookingStatus::Booked => {},
                    BookingStatus::Confirmed => {
                        return Err(BookingError::precondition(messages::ALREADY_CONFIRMED))
                    },
                    _ => return Err(BookingError::precondition(messages::NOT_BOOKED)),
                }

                let customer = load_user(tx, booking.customer_id)
                    .await?
                    .ok_or_else(|| BookingError::NotFound(messages::NO_USER.into()))?;
                let business = tx.find_user_by_email(&business_email).await?;
                let before = booking.projection_with(business.as_ref());

                booking.status = BookingStatus::Confirmed;
                booking.updated_by = Some(customer.id);
                let booking = tx.update_booking(&booking).await?;
                tx.delete_confirmations(&[token.id]).await?;

                info!("Booking {} confirmed by link", booking.id);

                let reply = Reply::new(messages::CONFIRMED, json!({"id": booking.id}));
                let update = diff_mail(
                    MailType::Update,
                    messages::MAIL_UPDATE,
                    before,
                    booking.clone(),
                    Some(customer.clone()),
                    business.as_ref(),
                )
                .to(business_email);
                Ok(Outcome::new(reply)
                    .with_mail(update)
                    .with_mail(rules_mail(booking, customer)))
            })
        })
        .await
    }

    /// Link letting the business reopen a slot a customer cancelled
    #[instrument(skip(self, code))]
    pub async fn redeem_new_booking(&self, code: &str) -> BookingResult<Reply> {
        let code = code.to_string();

        self.commit(move |tx| {
            Box::pin(async move {
                let action = locked_action(tx, &code, ActionType::NewBooking).await?;
                let (date, start, end) = slot_times(&action.params)?;

                let booking = tx.insert_booking(NewBooking::slot(date, start, end)).await?;
                tx.delete_action(action.id).await?;

                info!("Slot {} recreated from action {}", booking.id, action.id);
                Ok(Outcome::new(Reply::new(
                    messages::SLOT_CREATED,
                    Value::Object(booking.projection()),
                )))
            })
        })
        .await
    }

    /// Link letting the business grant a customer's request for a new time
    #[instrument(skip(self, code))]
    pub async fn redeem_request_new_booking(&self, code: &str) -> BookingResult<Reply> {
        let code = code.to_string();
        let business_email = self.settings.business_email.clone();

        self.commit(move |tx| {
            Box::pin(async move {
                let action = locked_action(tx, &code, ActionType::RequestNewBooking).await?;
                let (date, start, end) = slot_times(&action.params)?;
                let client_id = action
                    .params
                    .get("client")
                    .and_then(|client| client.get("id"))
                    .and_then(Value::as_i64)
                    .and_then(|id| i32::try_from(id).ok())
                    .ok_or_else(|| BookingError::validation("client", "missing from token parameters"))?;
                let customer = tx
                    .find_user(client_id)
                    .await?
                    .ok_or_else(|| BookingError::NotFound(messages::NO_USER.into()))?;
                let business = tx.find_user_by_email(&business_email).await?;

                let note = trim_optional_field(action.params.get("note").and_then(Value::as_str));
                let booking = tx
                    .insert_booking(NewBooking {
                        date,
                        start_time: start,
                        end_time: end,
                        status: BookingStatus::Booked,
                        customer_id: Some(customer.id),
                        note,
                        updated_by: business.as_ref().map(|user| user.id),
                    })
                    .await?;
                tx.delete_action(action.id).await?;

                info!("Booking {} created from request {}", booking.id, action.id);

                let receiver = customer.email.clone();
                let mail = MailRequest::new(
                    MailType::BookBooking,
                    messages::MAIL_BOOKING,
                    booking.clone(),
                    Some(customer),
                    MailParams::Snapshot(booking.projection()),
                )
                .to(receiver);
                Ok(Outcome::new(Reply::new(
                    messages::REQUEST_ACCEPTED,
                    json!({"id": booking.id}),
                ))
                .with_mail(mail))
            })
        })
        .await
    }

    /// Issue an account-side action token and return its code.
    ///
    /// The mail itself is produced by the next sweep.
    #[instrument(skip(self, params))]
    pub async fn issue_account_action(
        &self,
        action_type: ActionType,
        params: Value,
    ) -> BookingResult<String> {
        if !action_type.mails_params_email() {
            return Err(BookingError::validation(
                "type",
                messages::UNSUPPORTED_ACTION,
            ));
        }
        param_str(&params, "email")?;
        let stamped = self.timestamp();

        self.commit(move |tx| {
            Box::pin(async move {
                let action = tx
                    .insert_action(NewAction::new(action_type, params, stamped))
                    .await?;
                info!("Issued {} action {}", action_type, action.id);
                Ok(Outcome::new(action.code))
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_times_from_params() {
        let params = json!({"date": "2025-03-10", "start": "09:00", "end": "09:30"});
        let (date, start, end) = slot_times(&params).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn test_slot_times_reject_inverted_range() {
        let params = json!({"date": "2025-03-10", "start": "10:00", "end": "09:30"});
        assert!(matches!(
            slot_times(&params),
            Err(BookingError::Validation { .. })
        ));
    }

    #[test]
    fn test_slot_times_missing_field() {
        let params = json!({"date": "2025-03-10", "start": "10:00"});
        assert!(matches!(
            slot_times(&params),
            Err(BookingError::Validation { field, .. }) if field == "end"
        ));
    }
}
