// Calendar Query/Projection
// Read-side views with per-viewer visibility and capability flags

use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::instrument;
use validator::Validate;

use super::{load_user, require_admin, BookingFilter, BookingService, Outcome};
use crate::db::{BookingStore, BookingTx};
use crate::models::{calendar_order, Actor, Booking, Reply, User};
use crate::utils::validation::validate_month;
use crate::utils::{messages, BookingError, BookingResult};

/// One booking as a viewer sees it
pub(crate) fn booking_view(
    booking: &Booking,
    viewer: &Actor,
    now: NaiveDateTime,
    grace: Duration,
    customer: Option<&User>,
) -> Value {
    let mut view = booking.projection();
    let flags = booking.capabilities(viewer, now, grace);
    view.insert("editable".into(), json!(flags.editable));
    view.insert("acceptable".into(), json!(flags.acceptable));
    view.insert("confirmable".into(), json!(flags.confirmable));
    view.insert("disposable".into(), json!(flags.disposable));
    view.insert("erasable".into(), json!(flags.erasable));
    view.insert("other".into(), json!(flags.other));

    // Customer details only for staff and the customer themselves
    if viewer.is_admin() || viewer.owns(booking.customer_id) {
        let customer = customer.map(|user| {
            let mut fields = user.projection();
            fields.insert("id".into(), json!(user.id));
            Value::Object(fields)
        });
        view.insert("customer".into(), customer.unwrap_or(Value::Null));
    }
    Value::Object(view)
}

/// Customers of the given bookings, keyed by id
async fn customers_of(
    tx: &mut dyn BookingTx,
    bookings: &[Booking],
) -> BookingResult<HashMap<i32, User>> {
    let mut customers = HashMap::new();
    for customer_id in bookings.iter().filter_map(|b| b.customer_id) {
        if customers.contains_key(&customer_id) {
            continue;
        }
        if let Some(user) = tx.find_user(customer_id).await? {
            customers.insert(customer_id, user);
        }
    }
    Ok(customers)
}

fn month_range(year: i32, month: u32) -> BookingResult<(NaiveDate, NaiveDate)> {
    let first = validate_month(year, month)?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| BookingError::validation("month", "out of range"))?;
    Ok((first, next))
}

fn filter_range(filter: &BookingFilter) -> BookingResult<(NaiveDate, NaiveDate)> {
    match (filter.month, filter.day) {
        (Some(month), Some(day)) => {
            let date = NaiveDate::from_ymd_opt(filter.year, month, day)
                .ok_or_else(|| BookingError::validation("day", "not a calendar day"))?;
            let next = date
                .succ_opt()
                .ok_or_else(|| BookingError::validation("day", "out of range"))?;
            Ok((date, next))
        },
        (Some(month), None) => month_range(filter.year, month),
        (None, Some(_)) => Err(BookingError::validation("month", "required with day")),
        (None, None) => {
            let first = validate_month(filter.year, 1)?;
            let next = validate_month(filter.year + 1, 1)?;
            Ok((first, next))
        },
    }
}

impl<S: BookingStore> BookingService<S> {
    /// Month view grouped by day (`%Y%m%d`), each day in calendar order
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn get_calendar(&self, actor: &Actor, year: i32, month: u32) -> BookingResult<Reply> {
        let (first, next) = month_range(year, month)?;
        let viewer = actor.clone();
        let now = self.now();
        let grace = self.settings.confirm_grace;

        self.commit(move |tx| {
            Box::pin(async move {
                let mut bookings: Vec<Booking> = tx
                    .bookings_between(first, next)
                    .await?
                    .into_iter()
                    .filter(|b| b.is_visible_to(&viewer, now.date()))
                    .collect();
                bookings.sort_by(calendar_order);
                let customers = customers_of(tx, &bookings).await?;

                let mut days: Map<String, Value> = Map::new();
                for booking in &bookings {
                    let customer = booking.customer_id.and_then(|id| customers.get(&id));
                    let view = booking_view(booking, &viewer, now, grace, customer);
                    if let Value::Array(list) =
                        days.entry(booking.day_key()).or_insert_with(|| json!([]))
                    {
                        list.push(view);
                    }
                }
                Ok(Outcome::new(Reply::new(messages::OK, Value::Object(days))))
            })
        })
        .await
    }

    /// A single booking; hidden bookings read as not found
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn get_booking(&self, actor: &Actor, booking_id: i32) -> BookingResult<Reply> {
        self.read_booking(actor, booking_id, false).await
    }

    /// A single booking with its internal note
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn get_all_booking_data(&self, actor: &Actor, booking_id: i32) -> BookingResult<Reply> {
        require_admin(actor)?;
        self.read_booking(actor, booking_id, true).await
    }

    async fn read_booking(
        &self,
        actor: &Actor,
        booking_id: i32,
        with_note: bool,
    ) -> BookingResult<Reply> {
        let viewer = actor.clone();
        let now = self.now();
        let grace = self.settings.confirm_grace;

        self.commit(move |tx| {
            Box::pin(async move {
                let booking = tx
                    .find_booking(booking_id)
                    .await?
                    .filter(|b| b.is_readable_by(&viewer))
                    .ok_or_else(BookingError::booking_not_found)?;
                let customer = load_user(tx, booking.customer_id).await?;
                let mut view = booking_view(&booking, &viewer, now, grace, customer.as_ref());

                if with_note {
                    let note = tx.booking_note(booking.id).await?.map(|n| n.note);
                    if let Value::Object(fields) = &mut view {
                        fields.insert("internalNote".into(), json!(note));
                    }
                }
                Ok(Outcome::new(Reply::new(messages::OK, view)))
            })
        })
        .await
    }

    /// Admin listing by year, month or day, in calendar order
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn list_bookings(&self, actor: &Actor, filter: BookingFilter) -> BookingResult<Reply> {
        require_admin(actor)?;
        filter.validate()?;
        let (first, next) = filter_range(&filter)?;
        let viewer = actor.clone();
        let now = self.now();
        let grace = self.settings.confirm_grace;

        self.commit(move |tx| {
            Box::pin(async move {
                let mut bookings = tx.bookings_between(first, next).await?;
                bookings.sort_by(calendar_order);
                let customers = customers_of(tx, &bookings).await?;

                let views: Vec<Value> = bookings
                    .iter()
                    .map(|booking| {
                        let customer = booking.customer_id.and_then(|id| customers.get(&id));
                        booking_view(booking, &viewer, now, grace, customer)
                    })
                    .collect();
                Ok(Outcome::new(Reply::new(messages::OK, Value::Array(views))))
            })
        })
        .await
    }

    /// Loyalty coupon of a customer; admins may read anyone's, others only their own
    #[instrument(skip(self, actor), fields(actor = ?actor.id))]
    pub async fn get_coupon(&self, actor: &Actor, user_id: Option<i32>) -> BookingResult<Reply> {
        let target = match (actor.is_admin(), actor.id, user_id) {
            (true, _, Some(id)) => id,
            (_, Some(me), None) => me,
            (false, Some(me), Some(id)) if me == id => me,
            _ => return Err(BookingError::PermissionDenied),
        };
        let ledger = self.ledger;

        self.commit(move |tx| {
            Box::pin(async move {
                if tx.find_user(target).await?.is_none() {
                    return Err(BookingError::NotFound(messages::NO_USER.into()));
                }
                let coupon = ledger.get_or_create(tx, target).await?;
                Ok(Outcome::new(Reply::new(
                    messages::OK,
                    json!({
                        "discount": coupon.discount,
                        "count": coupon.visit_count,
                        "tier": coupon.tier(),
                    }),
                )))
            })
        })
        .await
    }
}
