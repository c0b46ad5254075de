// In-process booking store
//
// Holds every table in one mutex-guarded state. A transaction works on a copy
// and swaps it in on success, so a failed unit of work leaves nothing behind
// and concurrent units of work are fully serialized.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::{BookingStore, BookingTx, Committed, TxFuture};
use crate::models::{
    Action, ActionType, Booking, BookingNote, BookingStatus, Confirmation, ConfirmationType,
    Coupon, ErrorRecord, MailStatus, NewAction, NewBooking, NewConfirmation, NewCoupon,
    NewErrorRecord, NewOutboundMail, NewUser, OutboundMail, ReloadEvent, Role, User, UserNote,
};
use crate::utils::{BookingError, BookingResult};

#[derive(Debug, Clone)]
struct Table<T> {
    rows: BTreeMap<i32, T>,
    next_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Table<User>,
    bookings: Table<Booking>,
    confirmations: Table<Confirmation>,
    actions: Table<Action>,
    mails: Table<OutboundMail>,
    coupons: Table<Coupon>,
    booking_notes: Table<BookingNote>,
    user_notes: Table<UserNote>,
    errors: Table<ErrorRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user outside any transaction
    pub async fn seed_user(&self, new_user: NewUser) -> User {
        let mut state = self.state.lock().await;
        insert_user_row(&mut state, new_user)
    }

    /// Insert a booking outside any transaction, without a reload event
    pub async fn seed_booking(&self, new_booking: NewBooking) -> Booking {
        let mut state = self.state.lock().await;
        let id = state.bookings.next_id();
        let booking = Booking {
            id,
            date: new_booking.date,
            start_time: new_booking.start_time,
            end_time: new_booking.end_time,
            status: new_booking.status,
            customer_id: new_booking.customer_id,
            note: new_booking.note,
            updated_by: new_booking.updated_by,
            updated_at: Utc::now(),
        };
        state.bookings.rows.insert(id, booking.clone());
        booking
    }

    pub async fn user(&self, id: i32) -> Option<User> {
        self.state.lock().await.users.rows.get(&id).cloned()
    }

    /// Simulate the delivery worker's bookkeeping on a queued mail
    pub async fn mark_mail(&self, id: i32, status: MailStatus, attempts: i32) {
        if let Some(mail) = self.state.lock().await.mails.rows.get_mut(&id) {
            mail.status = status;
            mail.attempts = attempts;
        }
    }

    pub async fn booking(&self, id: i32) -> Option<Booking> {
        self.state.lock().await.bookings.rows.get(&id).cloned()
    }

    pub async fn confirmations(&self) -> Vec<Confirmation> {
        self.state.lock().await.confirmations.rows.values().cloned().collect()
    }

    pub async fn actions(&self) -> Vec<Action> {
        self.state.lock().await.actions.rows.values().cloned().collect()
    }

    pub async fn mails(&self) -> Vec<OutboundMail> {
        self.state.lock().await.mails.rows.values().cloned().collect()
    }

    pub async fn coupons(&self) -> Vec<Coupon> {
        self.state.lock().await.coupons.rows.values().cloned().collect()
    }

    pub async fn errors(&self) -> Vec<ErrorRecord> {
        self.state.lock().await.errors.rows.values().cloned().collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn transaction<T, F>(&self, work: F) -> BookingResult<Committed<T>>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn BookingTx) -> TxFuture<'t, T> + Send + 'static,
    {
        let mut guard = self.state.lock().await;
        let mut tx = MemoryTx {
            state: guard.clone(),
            touched: Vec::new(),
        };

        let value = work(&mut tx).await?;

        *guard = tx.state;
        Ok(Committed {
            value,
            touched: tx.touched,
        })
    }
}

struct MemoryTx {
    state: MemoryState,
    touched: Vec<ReloadEvent>,
}

fn insert_user_row(state: &mut MemoryState, new_user: NewUser) -> User {
    let id = state.users.next_id();
    let user = User {
        id,
        email: new_user.email,
        role: new_user.role,
        name: new_user.name,
        surname: new_user.surname,
        phone: new_user.phone,
        updated_at: Utc::now(),
    };
    state.users.rows.insert(id, user.clone());
    user
}

#[async_trait]
impl BookingTx for MemoryTx {
    async fn find_booking(&mut self, id: i32) -> BookingResult<Option<Booking>> {
        Ok(self.state.bookings.rows.get(&id).cloned())
    }

    async fn lock_booking(&mut self, id: i32) -> BookingResult<Option<Booking>> {
        Ok(self.state.bookings.rows.get(&id).cloned())
    }

    async fn insert_booking(&mut self, new_booking: NewBooking) -> BookingResult<Booking> {
        let id = self.state.bookings.next_id();
        let booking = Booking {
            id,
            date: new_booking.date,
            start_time: new_booking.start_time,
            end_time: new_booking.end_time,
            status: new_booking.status,
            customer_id: new_booking.customer_id,
            note: new_booking.note,
            updated_by: new_booking.updated_by,
            updated_at: Utc::now(),
        };
        self.state.bookings.rows.insert(id, booking.clone());
        self.touched.push(ReloadEvent::from(&booking));
        Ok(booking)
    }

    async fn update_booking(&mut self, booking: &Booking) -> BookingResult<Booking> {
        let row = self
            .state
            .bookings
            .rows
            .get_mut(&booking.id)
            .ok_or_else(BookingError::booking_not_found)?;
        *row = Booking {
            updated_at: Utc::now(),
            ..booking.clone()
        };
        let updated = row.clone();
        self.touched.push(ReloadEvent::from(&updated));
        Ok(updated)
    }

    async fn delete_booking(&mut self, booking: &Booking) -> BookingResult<()> {
        if self.state.bookings.rows.remove(&booking.id).is_none() {
            return Err(BookingError::booking_not_found());
        }
        // Cascades
        self.state
            .confirmations
            .rows
            .retain(|_, c| c.booking_id != booking.id);
        self.state
            .booking_notes
            .rows
            .retain(|_, n| n.booking_id != booking.id);
        self.touched.push(ReloadEvent::from(booking));
        Ok(())
    }

    async fn bookings_between(&mut self, from: NaiveDate, until: NaiveDate) -> BookingResult<Vec<Booking>> {
        Ok(self
            .state
            .bookings
            .rows
            .values()
            .filter(|b| b.date >= from && b.date < until)
            .cloned()
            .collect())
    }

    async fn customer_bookings(&mut self, customer_id: i32) -> BookingResult<Vec<Booking>> {
        Ok(self
            .state
            .bookings
            .rows
            .values()
            .filter(|b| b.customer_id == Some(customer_id))
            .cloned()
            .collect())
    }

    async fn lock_due_confirmed(&mut self, now: NaiveDateTime) -> BookingResult<Vec<Booking>> {
        Ok(self
            .state
            .bookings
            .rows
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed && b.ends_at() <= now)
            .cloned()
            .collect())
    }

    async fn find_user(&mut self, id: i32) -> BookingResult<Option<User>> {
        Ok(self.state.users.rows.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> BookingResult<Option<User>> {
        Ok(self
            .state
            .users
            .rows
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&mut self, new_user: NewUser) -> BookingResult<User> {
        if self
            .state
            .users
            .rows
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(BookingError::Storage(format!(
                "duplicate key value violates unique constraint on email {}",
                new_user.email
            )));
        }
        Ok(insert_user_row(&mut self.state, new_user))
    }

    async fn set_user_role(&mut self, id: i32, role: Role) -> BookingResult<User> {
        let user = self
            .state
            .users
            .rows
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(crate::utils::messages::NO_USER.to_string()))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn insert_confirmation(&mut self, new_confirmation: NewConfirmation) -> BookingResult<Confirmation> {
        if !self.state.bookings.rows.contains_key(&new_confirmation.booking_id) {
            return Err(BookingError::booking_not_found());
        }
        let id = self.state.confirmations.next_id();
        let confirmation = Confirmation {
            id,
            confirmation_type: new_confirmation.confirmation_type,
            booking_id: new_confirmation.booking_id,
            mail_id: None,
            code: new_confirmation.code,
            created_at: new_confirmation.created_at,
        };
        self.state.confirmations.rows.insert(id, confirmation.clone());
        Ok(confirmation)
    }

    async fn booking_confirmations(
        &mut self,
        booking_id: i32,
        confirmation_type: Option<ConfirmationType>,
    ) -> BookingResult<Vec<Confirmation>> {
        Ok(self
            .state
            .confirmations
            .rows
            .values()
            .filter(|c| c.booking_id == booking_id)
            .filter(|c| confirmation_type.map_or(true, |t| c.confirmation_type == t))
            .cloned()
            .collect())
    }

    async fn lock_confirmation(
        &mut self,
        code: &str,
        confirmation_type: ConfirmationType,
    ) -> BookingResult<Option<Confirmation>> {
        Ok(self
            .state
            .confirmations
            .rows
            .values()
            .find(|c| c.code == code && c.confirmation_type == confirmation_type)
            .cloned())
    }

    async fn delete_confirmations(&mut self, ids: &[i32]) -> BookingResult<usize> {
        let before = self.state.confirmations.rows.len();
        self.state.confirmations.rows.retain(|id, _| !ids.contains(id));
        Ok(before - self.state.confirmations.rows.len())
    }

    async fn lock_unmailed_confirmations(
        &mut self,
        confirmation_type: ConfirmationType,
    ) -> BookingResult<Vec<Confirmation>> {
        Ok(self
            .state
            .confirmations
            .rows
            .values()
            .filter(|c| c.confirmation_type == confirmation_type && c.mail_id.is_none())
            .cloned()
            .collect())
    }

    async fn set_confirmation_mail(&mut self, id: i32, mail_id: i32) -> BookingResult<()> {
        if let Some(confirmation) = self.state.confirmations.rows.get_mut(&id) {
            confirmation.mail_id = Some(mail_id);
        }
        Ok(())
    }

    async fn insert_action(&mut self, new_action: NewAction) -> BookingResult<Action> {
        let id = self.state.actions.next_id();
        let action = Action {
            id,
            action_type: new_action.action_type,
            params: new_action.params,
            mail_id: None,
            code: new_action.code,
            created_at: new_action.created_at,
        };
        self.state.actions.rows.insert(id, action.clone());
        Ok(action)
    }

    async fn lock_action(&mut self, code: &str, action_type: ActionType) -> BookingResult<Option<Action>> {
        Ok(self
            .state
            .actions
            .rows
            .values()
            .find(|a| a.code == code && a.action_type == action_type)
            .cloned())
    }

    async fn delete_action(&mut self, id: i32) -> BookingResult<()> {
        self.state.actions.rows.remove(&id);
        Ok(())
    }

    async fn lock_unmailed_actions(&mut self) -> BookingResult<Vec<Action>> {
        Ok(self
            .state
            .actions
            .rows
            .values()
            .filter(|a| a.mail_id.is_none())
            .cloned()
            .collect())
    }

    async fn set_action_mail(&mut self, id: i32, mail_id: i32) -> BookingResult<()> {
        if let Some(action) = self.state.actions.rows.get_mut(&id) {
            action.mail_id = Some(mail_id);
        }
        Ok(())
    }

    async fn purge_tokens_before(&mut self, cutoff: DateTime<Utc>) -> BookingResult<usize> {
        let before = self.state.confirmations.rows.len() + self.state.actions.rows.len();
        self.state.confirmations.rows.retain(|_, c| c.created_at >= cutoff);
        self.state.actions.rows.retain(|_, a| a.created_at >= cutoff);
        Ok(before - self.state.confirmations.rows.len() - self.state.actions.rows.len())
    }

    async fn insert_mail(&mut self, new_mail: NewOutboundMail) -> BookingResult<OutboundMail> {
        let id = self.state.mails.next_id();
        let mail = OutboundMail {
            id,
            receiver: new_mail.receiver,
            subject: new_mail.subject,
            params: new_mail.params,
            mail_type: new_mail.mail_type,
            status: new_mail.status,
            attempts: new_mail.attempts,
            created_at: Utc::now(),
        };
        self.state.mails.rows.insert(id, mail.clone());
        Ok(mail)
    }

    async fn delete_undelivered_mails(&mut self, ids: &[i32]) -> BookingResult<usize> {
        let before = self.state.mails.rows.len();
        self.state
            .mails
            .rows
            .retain(|id, m| !(ids.contains(id) && m.status != MailStatus::Complete));
        let removed = before - self.state.mails.rows.len();
        // ON DELETE SET NULL
        for confirmation in self.state.confirmations.rows.values_mut() {
            if matches!(confirmation.mail_id, Some(mail_id) if !self.state.mails.rows.contains_key(&mail_id)) {
                confirmation.mail_id = None;
            }
        }
        Ok(removed)
    }

    async fn deliverable_mails(&mut self, max_attempts: i32) -> BookingResult<Vec<OutboundMail>> {
        Ok(self
            .state
            .mails
            .rows
            .values()
            .filter(|m| m.is_deliverable(max_attempts))
            .cloned()
            .collect())
    }

    async fn lock_coupon(&mut self, customer_id: i32) -> BookingResult<Option<Coupon>> {
        Ok(self
            .state
            .coupons
            .rows
            .values()
            .find(|c| c.customer_id == customer_id)
            .cloned())
    }

    async fn insert_coupon(&mut self, new_coupon: NewCoupon) -> BookingResult<Coupon> {
        if self
            .state
            .coupons
            .rows
            .values()
            .any(|c| c.customer_id == new_coupon.customer_id)
        {
            return Err(BookingError::Storage(format!(
                "duplicate coupon for customer {}",
                new_coupon.customer_id
            )));
        }
        let id = self.state.coupons.next_id();
        let coupon = Coupon {
            id,
            customer_id: new_coupon.customer_id,
            discount: new_coupon.discount,
            visit_count: new_coupon.visit_count,
            updated_at: Utc::now(),
        };
        self.state.coupons.rows.insert(id, coupon.clone());
        Ok(coupon)
    }

    async fn update_coupon(&mut self, coupon: &Coupon) -> BookingResult<Coupon> {
        let row = self
            .state
            .coupons
            .rows
            .get_mut(&coupon.id)
            .ok_or_else(|| BookingError::Storage(format!("coupon {} vanished", coupon.id)))?;
        *row = Coupon {
            updated_at: Utc::now(),
            ..coupon.clone()
        };
        Ok(row.clone())
    }

    async fn booking_note(&mut self, booking_id: i32) -> BookingResult<Option<BookingNote>> {
        Ok(self
            .state
            .booking_notes
            .rows
            .values()
            .find(|n| n.booking_id == booking_id)
            .cloned())
    }

    async fn upsert_booking_note(&mut self, booking_id: i32, note: &str) -> BookingResult<BookingNote> {
        if !self.state.bookings.rows.contains_key(&booking_id) {
            return Err(BookingError::booking_not_found());
        }
        if let Some(existing) = self
            .state
            .booking_notes
            .rows
            .values_mut()
            .find(|n| n.booking_id == booking_id)
        {
            existing.note = note.to_string();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let id = self.state.booking_notes.next_id();
        let record = BookingNote {
            id,
            booking_id,
            note: note.to_string(),
            updated_at: Utc::now(),
        };
        self.state.booking_notes.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_booking_note(&mut self, booking_id: i32) -> BookingResult<()> {
        self.state
            .booking_notes
            .rows
            .retain(|_, n| n.booking_id != booking_id);
        Ok(())
    }

    async fn upsert_user_note(&mut self, user_id: i32, note: &str) -> BookingResult<UserNote> {
        if !self.state.users.rows.contains_key(&user_id) {
            return Err(BookingError::NotFound(crate::utils::messages::NO_USER.to_string()));
        }
        if let Some(existing) = self
            .state
            .user_notes
            .rows
            .values_mut()
            .find(|n| n.user_id == user_id)
        {
            existing.note = note.to_string();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let id = self.state.user_notes.next_id();
        let record = UserNote {
            id,
            user_id,
            note: note.to_string(),
            updated_at: Utc::now(),
        };
        self.state.user_notes.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn insert_error(&mut self, record: NewErrorRecord) -> BookingResult<()> {
        let id = self.state.errors.next_id();
        self.state.errors.rows.insert(
            id,
            ErrorRecord {
                id,
                source: record.source,
                message: record.message,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }
}
