// Notification/Diff Engine
// Turns committed booking changes into queued OutboundMail rows

use chrono::NaiveDateTime;
use handlebars::Handlebars;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::db::BookingStore;
use crate::models::{Booking, MailType, NewErrorRecord, NewOutboundMail, User};
use crate::utils::messages::MAIL_TIME;
use crate::utils::{BookingError, BookingResult};

/// Mail parameters, either a before/after pair or a plain snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum MailParams {
    Diff {
        before: Map<String, Value>,
        after: Map<String, Value>,
    },
    Snapshot(Map<String, Value>),
}

/// A mail queued by a unit of work, written only after it commits
#[derive(Debug, Clone)]
pub struct MailRequest {
    pub mail_type: MailType,
    /// Handlebars subject template; `{{name}}` is the customer's display name
    pub subject: &'static str,
    /// The booking after the change
    pub booking: Booking,
    pub customer: Option<User>,
    /// Explicit receiver address, overriding resolution
    pub receiver: Option<String>,
    pub params: MailParams,
}

impl MailRequest {
    pub fn new(
        mail_type: MailType,
        subject: &'static str,
        booking: Booking,
        customer: Option<User>,
        params: MailParams,
    ) -> Self {
        Self {
            mail_type,
            subject,
            booking,
            customer,
            receiver: None,
            params,
        }
    }

    pub fn to(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }
}

/// Key-wise diff of two projections.
///
/// Every key of either side maps to `[before, after]` when the values differ
/// and to `[before]` when they are equal. A missing side reads as null.
pub fn diff(before: &Map<String, Value>, after: &Map<String, Value>) -> Map<String, Value> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .map(|key| {
            let old = before.get(key).cloned().unwrap_or(Value::Null);
            let new = after.get(key).cloned().unwrap_or(Value::Null);
            let entry = if old == new {
                json!([old])
            } else {
                json!([old, new])
            };
            (key.clone(), entry)
        })
        .collect()
}

/// Renders subjects and resolves receivers; holds no storage
#[derive(Clone)]
pub struct MailComposer {
    templates: Arc<Handlebars<'static>>,
    business_email: String,
}

impl MailComposer {
    pub fn new(business_email: impl Into<String>) -> Self {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        Self {
            templates: Arc::new(templates),
            business_email: business_email.into(),
        }
    }

    pub fn business_email(&self) -> &str {
        &self.business_email
    }

    /// Subject with the appointment time appended when one is given
    pub fn render_subject(
        &self,
        template: &str,
        name: &str,
        at: Option<NaiveDateTime>,
    ) -> BookingResult<String> {
        let (full, data) = match at {
            Some(at) => (
                format!("{}{}", template, MAIL_TIME),
                json!({
                    "name": name,
                    "date": at.format("%d-%m-%Y").to_string(),
                    "start": at.format("%H:%M").to_string(),
                }),
            ),
            None => (template.to_string(), json!({ "name": name })),
        };
        self.templates
            .render_template(&full, &data)
            .map_err(|e| BookingError::Internal(format!("Subject template failed: {}", e)))
    }

    /// Receiver address plus the user behind it, when it is the customer.
    ///
    /// Without an override, changes made by the customer go to the business
    /// inbox and everything else goes to the customer.
    pub fn resolve_receiver<'r>(&self, request: &'r MailRequest) -> Option<(String, Option<&'r User>)> {
        let customer = request.customer.as_ref();
        if let Some(address) = &request.receiver {
            let user = customer.filter(|user| &user.email == address);
            return Some((address.clone(), user));
        }

        let booking = &request.booking;
        let by_customer = booking.updated_by.is_some() && booking.updated_by == booking.customer_id;
        if by_customer {
            return Some((self.business_email.clone(), None));
        }
        customer.map(|user| (user.email.clone(), Some(user)))
    }

    /// Build the mail row for a request, or None when nobody can receive it
    pub fn compose(&self, request: &MailRequest) -> BookingResult<Option<NewOutboundMail>> {
        let Some((receiver, receiver_user)) = self.resolve_receiver(request) else {
            return Ok(None);
        };

        let name = request
            .customer
            .as_ref()
            .map(User::display_name)
            .unwrap_or_default();
        let subject = self.render_subject(request.subject, &name, Some(request.booking.starts_at()))?;

        let mut params = match &request.params {
            MailParams::Diff { before, after } => diff(before, after),
            MailParams::Snapshot(snapshot) => snapshot.clone(),
        };
        if let Some(user) = receiver_user {
            params.insert("name".into(), json!(user.display_name()));
        }

        Ok(Some(NewOutboundMail::queued(
            receiver,
            subject,
            Value::Object(params),
            request.mail_type,
        )))
    }
}

/// Writes composed mails in their own transaction after the originating commit.
///
/// Failures never reach the caller: they are logged and written to the error sink.
pub struct NotificationEngine<S: BookingStore> {
    store: Arc<S>,
    composer: MailComposer,
}

impl<S: BookingStore> NotificationEngine<S> {
    pub fn new(store: Arc<S>, composer: MailComposer) -> Self {
        Self { store, composer }
    }

    pub fn composer(&self) -> &MailComposer {
        &self.composer
    }

    /// Queue the mails for a committed change; returns how many were written
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn notify(&self, requests: Vec<MailRequest>) -> usize {
        let mut mails = Vec::with_capacity(requests.len());
        for request in &requests {
            match self.composer.compose(request) {
                Ok(Some(mail)) => mails.push(mail),
                Ok(None) => info!(
                    "No receiver for {} mail on booking {}",
                    request.mail_type, request.booking.id
                ),
                Err(e) => {
                    error!("Failed to compose {} mail: {}", request.mail_type, e);
                    self.record_error("notification", e.to_string()).await;
                },
            }
        }

        if mails.is_empty() {
            return 0;
        }

        let result = self
            .store
            .transaction(move |tx| {
                Box::pin(async move {
                    let mut written = 0;
                    for mail in mails {
                        tx.insert_mail(mail).await?;
                        written += 1;
                    }
                    Ok(written)
                })
            })
            .await;

        match result {
            Ok(committed) => {
                info!("Queued {} mail(s)", committed.value);
                committed.value
            },
            Err(e) => {
                error!("Failed to queue mails: {}", e);
                self.record_error("notification", e.to_string()).await;
                0
            },
        }
    }

    /// Durable error sink; a failing sink is only logged
    pub async fn record_error(&self, source: &str, message: String) {
        let record = NewErrorRecord {
            source: source.to_string(),
            message,
        };
        let result = self
            .store
            .transaction(move |tx| Box::pin(async move { tx.insert_error(record).await }))
            .await;
        if let Err(e) = result {
            error!("Failed to record error from {}: {}", source, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, Role};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn booking(customer_id: Option<i32>, updated_by: Option<i32>) -> Booking {
        Booking {
            id: 5,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            status: BookingStatus::Booked,
            customer_id,
            note: None,
            updated_by,
            updated_at: Utc::now(),
        }
    }

    fn customer() -> User {
        User {
            id: 2,
            email: "ana@example.com".into(),
            role: Role::Registered,
            name: Some("Ana".into()),
            surname: Some("Petrova".into()),
            phone: None,
            updated_at: Utc::now(),
        }
    }

    fn request(updated_by: Option<i32>) -> MailRequest {
        let booking = booking(Some(2), updated_by);
        let before = booking.projection();
        let after = booking.projection();
        MailRequest::new(
            MailType::Update,
            "Booking update for {{name}}",
            booking,
            Some(customer()),
            MailParams::Diff { before, after },
        )
    }

    #[test]
    fn test_diff_marks_changed_and_unchanged_keys() {
        let before = json!({"status": "PENDING", "note": "gel", "gone": 1});
        let after = json!({"status": "BOOKED", "note": "gel", "new": true});
        let result = diff(
            before.as_object().unwrap(),
            after.as_object().unwrap(),
        );

        assert_eq!(result["status"], json!(["PENDING", "BOOKED"]));
        assert_eq!(result["note"], json!(["gel"]));
        assert_eq!(result["gone"], json!([1, null]));
        assert_eq!(result["new"], json!([null, true]));
    }

    #[test]
    fn test_customer_change_goes_to_business() {
        let composer = MailComposer::new("salon@example.com");
        let request = request(Some(2));
        let (receiver, user) = composer.resolve_receiver(&request).unwrap();
        assert_eq!(receiver, "salon@example.com");
        assert!(user.is_none());
    }

    #[test]
    fn test_admin_change_goes_to_customer() {
        let composer = MailComposer::new("salon@example.com");
        let request = request(Some(1));
        let (receiver, user) = composer.resolve_receiver(&request).unwrap();
        assert_eq!(receiver, "ana@example.com");
        assert_eq!(user.map(|u| u.id), Some(2));
    }

    #[test]
    fn test_no_customer_means_no_mail() {
        let composer = MailComposer::new("salon@example.com");
        let mut request = request(Some(1));
        request.customer = None;
        request.booking.customer_id = None;
        assert!(composer.compose(&request).unwrap().is_none());
    }

    #[test]
    fn test_override_wins() {
        let composer = MailComposer::new("salon@example.com");
        let request = request(Some(2)).to("ana@example.com");
        let mail = composer.compose(&request).unwrap().unwrap();
        assert_eq!(mail.receiver, "ana@example.com");
        assert_eq!(mail.params["name"], "Ana Petrova");
    }

    #[test]
    fn test_subject_has_time_suffix() {
        let composer = MailComposer::new("salon@example.com");
        let mail = composer.compose(&request(Some(1))).unwrap().unwrap();
        assert_eq!(
            mail.subject,
            "Booking update for Ana Petrova on 10-03-2025 at 09:00"
        );
        assert_eq!(mail.mail_type, MailType::Update);
        assert_eq!(mail.params["status"], json!(["BOOKED"]));
    }

    #[test]
    fn test_subject_without_booking() {
        let composer = MailComposer::new("salon@example.com");
        let subject = composer
            .render_subject("Confirm your email", "Ana", None)
            .unwrap();
        assert_eq!(subject, "Confirm your email");
    }
}
