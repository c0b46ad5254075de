// PostgreSQL booking store on Diesel-async + bb8
// Each unit of work runs inside `build_transaction().run(..)`; row locks use FOR UPDATE

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use super::diesel_pool::DieselPool;
use super::store::{BookingStore, BookingTx, Committed, TxFuture};
use crate::models::{
    Action, ActionType, Booking, BookingNote, BookingStatus, Confirmation, ConfirmationType,
    Coupon, MailStatus, NewAction, NewBooking, NewBookingNote, NewConfirmation, NewCoupon,
    NewErrorRecord, NewOutboundMail, NewUser, NewUserNote, OutboundMail, ReloadEvent, Role, User,
    UserNote,
};
use crate::schema::{actions, booking, booking_notes, confirmations, coupons, errors, mails, user_notes, users};
use crate::utils::{BookingError, BookingResult};

#[derive(Clone)]
pub struct PgBookingStore {
    pool: DieselPool,
}

impl PgBookingStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DieselPool {
        &self.pool
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn transaction<T, F>(&self, work: F) -> BookingResult<Committed<T>>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn BookingTx) -> TxFuture<'t, T> + Send + 'static,
    {
        let mut conn = self.pool.get().await?;

        conn.build_transaction()
            .run::<_, BookingError, _>(|conn| {
                Box::pin(async move {
                    let mut tx = PgTx {
                        conn,
                        touched: Vec::new(),
                    };
                    let value = work(&mut tx).await?;
                    Ok(Committed {
                        value,
                        touched: tx.touched,
                    })
                })
            })
            .await
    }
}

struct PgTx<'c> {
    conn: &'c mut AsyncPgConnection,
    touched: Vec<ReloadEvent>,
}

#[async_trait]
impl<'c> BookingTx for PgTx<'c> {
    async fn find_booking(&mut self, id: i32) -> BookingResult<Option<Booking>> {
        let found = booking::table
            .find(id)
            .select(Booking::as_select())
            .first(self.conn)
            .await
            .optional()?;
        Ok(found)
    }

    async fn lock_booking(&mut self, id: i32) -> BookingResult<Option<Booking>> {
        use diesel::sql_query;
        use diesel::sql_types::Integer;

        // Raw FOR UPDATE so concurrent transitions on one booking queue up
        let locked = sql_query(
            "SELECT id, date, start_time, end_time, status, customer_id, note, \
             updated_by, updated_at \
             FROM booking \
             WHERE id = $1 \
             FOR UPDATE",
        )
        .bind::<Integer, _>(id)
        .get_result::<Booking>(self.conn)
        .await
        .optional()?;
        Ok(locked)
    }

    async fn insert_booking(&mut self, new_booking: NewBooking) -> BookingResult<Booking> {
        let inserted = diesel::insert_into(booking::table)
            .values(&new_booking)
            .returning(Booking::as_returning())
            .get_result(self.conn)
            .await?;
        self.touched.push(ReloadEvent::from(&inserted));
        Ok(inserted)
    }

    async fn update_booking(&mut self, changed: &Booking) -> BookingResult<Booking> {
        let updated = diesel::update(booking::table.find(changed.id))
            .set((
                booking::date.eq(changed.date),
                booking::start_time.eq(changed.start_time),
                booking::end_time.eq(changed.end_time),
                booking::status.eq(changed.status),
                booking::customer_id.eq(changed.customer_id),
                booking::note.eq(changed.note.as_deref()),
                booking::updated_by.eq(changed.updated_by),
                booking::updated_at.eq(Utc::now()),
            ))
            .returning(Booking::as_returning())
            .get_result(self.conn)
            .await?;
        self.touched.push(ReloadEvent::from(&updated));
        Ok(updated)
    }

    async fn delete_booking(&mut self, target: &Booking) -> BookingResult<()> {
        let deleted = diesel::delete(booking::table.find(target.id))
            .execute(self.conn)
            .await?;
        if deleted == 0 {
            return Err(BookingError::booking_not_found());
        }
        self.touched.push(ReloadEvent::from(target));
        Ok(())
    }

    async fn bookings_between(&mut self, from: NaiveDate, until: NaiveDate) -> BookingResult<Vec<Booking>> {
        Ok(booking::table
            .filter(booking::date.ge(from))
            .filter(booking::date.lt(until))
            .select(Booking::as_select())
            .load(self.conn)
            .await?)
    }

    async fn customer_bookings(&mut self, customer_id: i32) -> BookingResult<Vec<Booking>> {
        Ok(booking::table
            .filter(booking::customer_id.eq(customer_id))
            .select(Booking::as_select())
            .for_update()
            .load(self.conn)
            .await?)
    }

    async fn lock_due_confirmed(&mut self, now: NaiveDateTime) -> BookingResult<Vec<Booking>> {
        let (today, time) = (now.date(), now.time());
        Ok(booking::table
            .filter(booking::status.eq(BookingStatus::Confirmed))
            .filter(
                booking::date
                    .lt(today)
                    .or(booking::date.eq(today).and(booking::end_time.le(time))),
            )
            .select(Booking::as_select())
            .for_update()
            .load(self.conn)
            .await?)
    }

    async fn find_user(&mut self, id: i32) -> BookingResult<Option<User>> {
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .first(self.conn)
            .await
            .optional()?)
    }

    async fn find_user_by_email(&mut self, email: &str) -> BookingResult<Option<User>> {
        Ok(users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(self.conn)
            .await
            .optional()?)
    }

    async fn insert_user(&mut self, new_user: NewUser) -> BookingResult<User> {
        Ok(diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn set_user_role(&mut self, id: i32, role: Role) -> BookingResult<User> {
        Ok(diesel::update(users::table.find(id))
            .set((users::role.eq(role), users::updated_at.eq(Utc::now())))
            .returning(User::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn insert_confirmation(&mut self, new_confirmation: NewConfirmation) -> BookingResult<Confirmation> {
        Ok(diesel::insert_into(confirmations::table)
            .values(&new_confirmation)
            .returning(Confirmation::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn booking_confirmations(
        &mut self,
        booking_id: i32,
        confirmation_type: Option<ConfirmationType>,
    ) -> BookingResult<Vec<Confirmation>> {
        let mut query = confirmations::table
            .filter(confirmations::booking_id.eq(booking_id))
            .select(Confirmation::as_select())
            .into_boxed();
        if let Some(confirmation_type) = confirmation_type {
            query = query.filter(confirmations::confirmation_type.eq(confirmation_type));
        }
        Ok(query.load(self.conn).await?)
    }

    async fn lock_confirmation(
        &mut self,
        code: &str,
        confirmation_type: ConfirmationType,
    ) -> BookingResult<Option<Confirmation>> {
        Ok(confirmations::table
            .filter(confirmations::code.eq(code))
            .filter(confirmations::confirmation_type.eq(confirmation_type))
            .select(Confirmation::as_select())
            .for_update()
            .first(self.conn)
            .await
            .optional()?)
    }

    async fn delete_confirmations(&mut self, ids: &[i32]) -> BookingResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(diesel::delete(confirmations::table.filter(confirmations::id.eq_any(ids)))
            .execute(self.conn)
            .await?)
    }

    async fn lock_unmailed_confirmations(
        &mut self,
        confirmation_type: ConfirmationType,
    ) -> BookingResult<Vec<Confirmation>> {
        Ok(confirmations::table
            .filter(confirmations::confirmation_type.eq(confirmation_type))
            .filter(confirmations::mail_id.is_null())
            .select(Confirmation::as_select())
            .for_update()
            .skip_locked()
            .load(self.conn)
            .await?)
    }

    async fn set_confirmation_mail(&mut self, id: i32, mail_id: i32) -> BookingResult<()> {
        diesel::update(confirmations::table.find(id))
            .set(confirmations::mail_id.eq(mail_id))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn insert_action(&mut self, new_action: NewAction) -> BookingResult<Action> {
        Ok(diesel::insert_into(actions::table)
            .values(&new_action)
            .returning(Action::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn lock_action(&mut self, code: &str, action_type: ActionType) -> BookingResult<Option<Action>> {
        Ok(actions::table
            .filter(actions::code.eq(code))
            .filter(actions::action_type.eq(action_type))
            .select(Action::as_select())
            .for_update()
            .first(self.conn)
            .await
            .optional()?)
    }

    async fn delete_action(&mut self, id: i32) -> BookingResult<()> {
        diesel::delete(actions::table.find(id))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn lock_unmailed_actions(&mut self) -> BookingResult<Vec<Action>> {
        Ok(actions::table
            .filter(actions::mail_id.is_null())
            .select(Action::as_select())
            .for_update()
            .skip_locked()
            .load(self.conn)
            .await?)
    }

    async fn set_action_mail(&mut self, id: i32, mail_id: i32) -> BookingResult<()> {
        diesel::update(actions::table.find(id))
            .set(actions::mail_id.eq(mail_id))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn purge_tokens_before(&mut self, cutoff: DateTime<Utc>) -> BookingResult<usize> {
        let confirmations_purged =
            diesel::delete(confirmations::table.filter(confirmations::created_at.lt(cutoff)))
                .execute(self.conn)
                .await?;
        let actions_purged = diesel::delete(actions::table.filter(actions::created_at.lt(cutoff)))
            .execute(self.conn)
            .await?;
        debug!(
            "Purged {} confirmations and {} actions older than {}",
            confirmations_purged, actions_purged, cutoff
        );
        Ok(confirmations_purged + actions_purged)
    }

    async fn insert_mail(&mut self, new_mail: NewOutboundMail) -> BookingResult<OutboundMail> {
        Ok(diesel::insert_into(mails::table)
            .values(&new_mail)
            .returning(OutboundMail::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn delete_undelivered_mails(&mut self, ids: &[i32]) -> BookingResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(diesel::delete(
            mails::table
                .filter(mails::id.eq_any(ids))
                .filter(mails::status.ne(MailStatus::Complete)),
        )
        .execute(self.conn)
        .await?)
    }

    async fn deliverable_mails(&mut self, max_attempts: i32) -> BookingResult<Vec<OutboundMail>> {
        Ok(mails::table
            .filter(mails::status.eq_any([MailStatus::ToSend, MailStatus::Error]))
            .filter(mails::attempts.le(max_attempts))
            .order(mails::id.asc())
            .select(OutboundMail::as_select())
            .load(self.conn)
            .await?)
    }

    async fn lock_coupon(&mut self, customer_id: i32) -> BookingResult<Option<Coupon>> {
        Ok(coupons::table
            .filter(coupons::customer_id.eq(customer_id))
            .select(Coupon::as_select())
            .for_update()
            .first(self.conn)
            .await
            .optional()?)
    }

    async fn insert_coupon(&mut self, new_coupon: NewCoupon) -> BookingResult<Coupon> {
        Ok(diesel::insert_into(coupons::table)
            .values(&new_coupon)
            .returning(Coupon::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn update_coupon(&mut self, coupon: &Coupon) -> BookingResult<Coupon> {
        Ok(diesel::update(coupons::table.find(coupon.id))
            .set((
                coupons::discount.eq(coupon.discount),
                coupons::visit_count.eq(coupon.visit_count),
                coupons::updated_at.eq(Utc::now()),
            ))
            .returning(Coupon::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn booking_note(&mut self, booking_id: i32) -> BookingResult<Option<BookingNote>> {
        Ok(booking_notes::table
            .filter(booking_notes::booking_id.eq(booking_id))
            .select(BookingNote::as_select())
            .first(self.conn)
            .await
            .optional()?)
    }

    async fn upsert_booking_note(&mut self, booking_id: i32, note: &str) -> BookingResult<BookingNote> {
        let record = NewBookingNote {
            booking_id,
            note: note.to_string(),
        };
        Ok(diesel::insert_into(booking_notes::table)
            .values(&record)
            .on_conflict(booking_notes::booking_id)
            .do_update()
            .set((
                booking_notes::note.eq(note),
                booking_notes::updated_at.eq(Utc::now()),
            ))
            .returning(BookingNote::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn delete_booking_note(&mut self, booking_id: i32) -> BookingResult<()> {
        diesel::delete(booking_notes::table.filter(booking_notes::booking_id.eq(booking_id)))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn upsert_user_note(&mut self, user_id: i32, note: &str) -> BookingResult<UserNote> {
        let record = NewUserNote {
            user_id,
            note: note.to_string(),
        };
        Ok(diesel::insert_into(user_notes::table)
            .values(&record)
            .on_conflict(user_notes::user_id)
            .do_update()
            .set((user_notes::note.eq(note), user_notes::updated_at.eq(Utc::now())))
            .returning(UserNote::as_returning())
            .get_result(self.conn)
            .await?)
    }

    async fn insert_error(&mut self, record: NewErrorRecord) -> BookingResult<()> {
        diesel::insert_into(errors::table)
            .values(&record)
            .execute(self.conn)
            .await?;
        Ok(())
    }
}
