// User Database Model
// Customers, the business account and the resolved actor handed to booking operations

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::schema::users;

/// Account role, persisted as a small integer
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::SmallInt)]
pub enum Role {
    Guest,      // Unregistered visitor with a session only
    Anonymous,  // Registered implicitly by booking as a guest
    Registered, // Full account
    Admin,      // Salon staff
}

impl Role {
    pub fn as_i16(&self) -> i16 {
        match self {
            Role::Guest => 0,
            Role::Anonymous => 1,
            Role::Registered => 2,
            Role::Admin => 3,
        }
    }

    pub fn from_i16(value: i16) -> Result<Self, String> {
        match value {
            0 => Ok(Role::Guest),
            1 => Ok(Role::Anonymous),
            2 => Ok(Role::Registered),
            3 => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", value)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::SmallInt, DB> for Role
where
    DB: diesel::backend::Backend,
    i16: diesel::deserialize::FromSql<diesel::sql_types::SmallInt, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        Self::from_i16(value).map_err(|e| e.into())
    }
}

impl diesel::serialize::ToSql<diesel::sql_types::SmallInt, diesel::pg::Pg> for Role {
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
    ) -> diesel::serialize::Result {
        let value = self.as_i16();
        <i16 as diesel::serialize::ToSql<diesel::sql_types::SmallInt, diesel::pg::Pg>>::to_sql(
            &value,
            &mut out.reborrow(),
        )
    }
}

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion (guest promotion)
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub role: Role,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub phone: Option<String>,
}

impl User {
    /// Customer fields merged into booking projections for notification diffs
    pub fn projection(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("email".into(), json!(self.email));
        map.insert("name".into(), json!(self.name));
        map.insert("surname".into(), json!(self.surname));
        map.insert("phone".into(), json!(self.phone));
        map
    }

    pub fn display_name(&self) -> String {
        display_name(self.name.as_deref(), self.surname.as_deref())
    }
}

/// An identity already resolved by the session directory.
///
/// Guests carry no user id; every other role maps to a `users` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: Option<i32>,
    pub role: Role,
    pub email: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
}

impl Actor {
    pub fn guest() -> Self {
        Self {
            id: None,
            role: Role::Guest,
            email: None,
            name: None,
            surname: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_guest(&self) -> bool {
        self.role == Role::Guest
    }

    /// True when this actor is the customer assigned to `customer_id`
    pub fn owns(&self, customer_id: Option<i32>) -> bool {
        matches!((self.id, customer_id), (Some(me), Some(owner)) if me == owner)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id),
            role: user.role,
            email: Some(user.email.clone()),
            name: user.name.clone(),
            surname: user.surname.clone(),
        }
    }
}

pub fn display_name(name: Option<&str>, surname: Option<&str>) -> String {
    [name.unwrap_or_default(), surname.unwrap_or_default()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}
