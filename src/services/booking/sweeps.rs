// Actor-less maintenance operations run by the scheduler and the account collaborator

use chrono::Duration;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use super::tokens::slot_times;
use super::{load_user, release_tokens, BookingService, Outcome};
use crate::db::{BookingStore, BookingTx};
use crate::models::{
    display_name, Action, ActionType, BookingStatus, ConfirmationType, MailType, NewOutboundMail,
    Reply,
};
use crate::services::notification::MailComposer;
use crate::utils::{messages, BookingError, BookingResult};

/// The mail an unmailed action token should produce, if it can be built
fn action_mail(composer: &MailComposer, action: &Action) -> BookingResult<Option<NewOutboundMail>> {
    let params = &action.params;
    match action.action_type {
        ActionType::NewBooking => {
            let (date, start, _) = slot_times(params)?;
            let subject = composer.render_subject(
                messages::MAIL_GENERATE_NEW_BOOKING,
                "",
                Some(date.and_time(start)),
            )?;
            Ok(Some(NewOutboundMail::queued(
                composer.business_email().to_string(),
                subject,
                json!({"code": action.code, "booking": params}),
                MailType::GenerateNewBooking,
            )))
        },
        ActionType::RequestNewBooking => {
            let (date, start, _) = slot_times(params)?;
            let client = params.get("client").cloned().unwrap_or(Value::Null);
            let name = display_name(
                client.get("name").and_then(Value::as_str),
                client.get("surname").and_then(Value::as_str),
            );
            let subject = composer.render_subject(
                messages::MAIL_NEW_BOOKING_REQUEST,
                &name,
                Some(date.and_time(start)),
            )?;
            Ok(Some(NewOutboundMail::queued(
                composer.business_email().to_string(),
                subject,
                json!({"client": client, "code": action.code, "booking": params}),
                MailType::RequestNewBooking,
            )))
        },
        ActionType::ConfirmEmail | ActionType::JoinAccount | ActionType::ForgotPassword => {
            let Some(email) = params.get("email").and_then(Value::as_str) else {
                return Ok(None);
            };
            let (template, mail_type) = match action.action_type {
                ActionType::ConfirmEmail => (messages::MAIL_CONFIRM_EMAIL, MailType::ConfirmEmail),
                ActionType::JoinAccount => (messages::MAIL_JOIN_ACCOUNT, MailType::JoinAccount),
                _ => (messages::MAIL_FORGOT_PASSWORD, MailType::ForgotPassword),
            };
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            let subject = composer.render_subject(template, name, None)?;
            let mut mail_params = params.clone();
            if let Value::Object(fields) = &mut mail_params {
                fields.insert("code".into(), json!(action.code));
            }
            Ok(Some(NewOutboundMail::queued(
                email.to_string(),
                subject,
                mail_params,
                mail_type,
            )))
        },
    }
}

impl<S: BookingStore> BookingService<S> {
    /// CONFIRMED bookings whose end has passed become COMPLETED and earn a visit
    #[instrument(skip(self))]
    pub async fn complete_due_bookings(&self) -> BookingResult<Reply> {
        let now = self.now();
        let ledger = self.ledger;

        self.commit(move |tx| {
            Box::pin(async move {
                let due = tx.lock_due_confirmed(now).await?;
                let mut completed = 0;
                for mut booking in due {
                    booking.status = BookingStatus::Completed;
                    let booking = tx.update_booking(&booking).await?;
                    if let Some(customer_id) = booking.customer_id {
                        ledger.increase(tx, customer_id).await?;
                    }
                    completed += 1;
                }
                if completed > 0 {
                    info!("Completed {} due booking(s)", completed);
                }
                Ok(Outcome::new(Reply::new(
                    messages::COMPLETED,
                    json!({"completed": completed}),
                )))
            })
        })
        .await
    }

    /// Create the mail for every token that has none yet and link it to the token.
    ///
    /// Idempotent: a token with a mail is never mailed again.
    #[instrument(skip(self))]
    pub async fn generate_queued_mails(&self) -> BookingResult<Reply> {
        let composer = self.notifier.composer().clone();
        let grace = self.settings.confirm_grace;
        let now = self.now();

        self.commit(move |tx| {
            Box::pin(async move {
                let mut queued = 0;
                queued += confirm_reminders(tx, &composer, now, grace).await?;
                queued += accept_requests(tx, &composer).await?;

                for action in tx.lock_unmailed_actions().await? {
                    let mail = match action_mail(&composer, &action) {
                        Ok(Some(mail)) => mail,
                        Ok(None) => {
                            warn!("Action {} has no receiver, skipping", action.id);
                            continue;
                        },
                        Err(e @ BookingError::Validation { .. }) => {
                            warn!("Action {} has unusable parameters: {}", action.id, e);
                            continue;
                        },
                        Err(e) => return Err(e),
                    };
                    let mail = tx.insert_mail(mail).await?;
                    tx.set_action_mail(action.id, mail.id).await?;
                    queued += 1;
                }

                if queued > 0 {
                    info!("Generated {} queued mail(s)", queued);
                }
                Ok(Outcome::new(Reply::new(
                    messages::MAILS_GENERATED,
                    json!({"queued": queued}),
                )))
            })
        })
        .await
    }

    /// Mails the delivery worker should (re)try
    #[instrument(skip(self))]
    pub async fn pending_mails(&self) -> BookingResult<Reply> {
        let max_attempts = self.settings.mail_max_attempts;

        self.commit(move |tx| {
            Box::pin(async move {
                let mails = tx.deliverable_mails(max_attempts).await?;
                Ok(Outcome::new(Reply::new(
                    messages::OK,
                    serde_json::to_value(mails)?,
                )))
            })
        })
        .await
    }

    /// Drop tokens older than `max_age_days`, or the configured retention when absent
    #[instrument(skip(self))]
    pub async fn purge_stale_tokens(&self, max_age_days: Option<i64>) -> BookingResult<Reply> {
        let max_age_days = max_age_days.unwrap_or(self.settings.token_retention_days);
        if max_age_days < 0 {
            return Err(BookingError::validation("maxAgeDays", "must not be negative"));
        }
        let cutoff = Duration::try_days(max_age_days)
            .and_then(|age| self.timestamp().checked_sub_signed(age))
            .ok_or_else(|| BookingError::validation("maxAgeDays", "is out of range"))?;

        self.commit(move |tx| {
            Box::pin(async move {
                let purged = tx.purge_tokens_before(cutoff).await?;
                info!("Purged {} stale token(s)", purged);
                Ok(Outcome::new(Reply::new(
                    messages::TOKENS_PURGED,
                    json!({"purged": purged}),
                )))
            })
        })
        .await
    }

    /// Detach a deleted account from its bookings; the coupon row stays
    #[instrument(skip(self))]
    pub async fn anonymize_customer(&self, user_id: i32) -> BookingResult<Reply> {
        self.commit(move |tx| {
            Box::pin(async move {
                let bookings = tx.customer_bookings(user_id).await?;
                let count = bookings.len();
                for mut booking in bookings {
                    release_tokens(tx, booking.id, None).await?;
                    booking.customer_id = None;
                    tx.update_booking(&booking).await?;
                }
                info!("Anonymized {} booking(s) of user {}", count, user_id);
                Ok(Outcome::new(Reply::new(
                    messages::ANONYMIZED,
                    json!({"bookings": count}),
                )))
            })
        })
        .await
    }
}

/// Reminders for BOOKED appointments once the grace window opens
async fn confirm_reminders(
    tx: &mut dyn BookingTx,
    composer: &MailComposer,
    now: chrono::NaiveDateTime,
    grace: Duration,
) -> BookingResult<usize> {
    let mut queued = 0;
    for token in tx
        .lock_unmailed_confirmations(ConfirmationType::ConfirmBooking)
        .await?
    {
        let Some(booking) = tx.find_booking(token.booking_id).await? else {
            continue;
        };
        if booking.status != BookingStatus::Booked || booking.starts_at() - grace > now {
            continue;
        }
        let Some(customer) = load_user(tx, booking.customer_id).await? else {
            continue;
        };

        let subject = composer.render_subject(
            messages::MAIL_CONFIRM,
            &customer.display_name(),
            Some(booking.starts_at()),
        )?;
        let params = json!({
            "code": token.code,
            "booking": booking.projection(),
            "user": customer.projection(),
            "name": customer.display_name(),
        });
        let mail = tx
            .insert_mail(NewOutboundMail::queued(
                customer.email.clone(),
                subject,
                params,
                MailType::ConfirmBooking,
            ))
            .await?;
        tx.set_confirmation_mail(token.id, mail.id).await?;
        queued += 1;
    }
    Ok(queued)
}

/// Accept links for the business, one per PENDING booking
async fn accept_requests(tx: &mut dyn BookingTx, composer: &MailComposer) -> BookingResult<usize> {
    let mut queued = 0;
    for token in tx
        .lock_unmailed_confirmations(ConfirmationType::AcceptBooking)
        .await?
    {
        let Some(booking) = tx.find_booking(token.booking_id).await? else {
            continue;
        };
        if booking.status != BookingStatus::Pending {
            continue;
        }
        let Some(customer) = load_user(tx, booking.customer_id).await? else {
            continue;
        };

        let subject = composer.render_subject(
            messages::MAIL_BOOKING_REQUEST,
            &customer.display_name(),
            Some(booking.starts_at()),
        )?;
        let params = json!({
            "client": customer.projection(),
            "code": token.code,
            "booking": booking.projection(),
        });
        let mail = tx
            .insert_mail(NewOutboundMail::queued(
                composer.business_email().to_string(),
                subject,
                params,
                MailType::RequestBooking,
            ))
            .await?;
        tx.set_confirmation_mail(token.id, mail.id).await?;
        queued += 1;
    }
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generate_code;
    use chrono::Utc;

    fn action(action_type: ActionType, params: Value) -> Action {
        Action {
            id: 1,
            action_type,
            params,
            mail_id: None,
            code: generate_code(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_booking_action_goes_to_business() {
        let composer = MailComposer::new("salon@example.com");
        let action = action(
            ActionType::NewBooking,
            json!({"date": "2025-03-10", "start": "09:00", "end": "09:30"}),
        );
        let mail = action_mail(&composer, &action).unwrap().unwrap();
        assert_eq!(mail.receiver, "salon@example.com");
        assert_eq!(mail.mail_type, MailType::GenerateNewBooking);
        assert!(mail.subject.ends_with(" on 10-03-2025 at 09:00"));
        assert_eq!(mail.params["code"], json!(action.code));
    }

    #[test]
    fn test_account_action_goes_to_params_email() {
        let composer = MailComposer::new("salon@example.com");
        let action = action(
            ActionType::ForgotPassword,
            json!({"email": "ana@example.com", "name": "Ana"}),
        );
        let mail = action_mail(&composer, &action).unwrap().unwrap();
        assert_eq!(mail.receiver, "ana@example.com");
        assert_eq!(mail.mail_type, MailType::ForgotPassword);
        assert_eq!(mail.subject, messages::MAIL_FORGOT_PASSWORD);
        assert_eq!(mail.params["code"], json!(action.code));
    }

    #[test]
    fn test_account_action_without_email_is_skipped() {
        let composer = MailComposer::new("salon@example.com");
        let action = action(ActionType::JoinAccount, json!({"name": "Ana"}));
        assert!(action_mail(&composer, &action).unwrap().is_none());
    }
}
