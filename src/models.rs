use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Tenant,
    Landlord,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Tenant => "tenant",
            UserRole::Landlord => "landlord",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tenant" => Ok(UserRole::Tenant),
            "landlord" => Ok(UserRole::Landlord),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unrecognized user role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum HousingType {
    #[default]
    Apartment,
    House,
    Studio,
}

impl HousingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HousingType::Apartment => "apartment",
            HousingType::House => "house",
            HousingType::Studio => "studio",
        }
    }
}

impl FromStr for HousingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apartment" => Ok(HousingType::Apartment),
            "house" => Ok(HousingType::House),
            "studio" => Ok(HousingType::Studio),
            other => Err(format!("unrecognized housing type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Available,
    Unavailable,
    Maintenance,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Unavailable => "unavailable",
            ListingStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ListingStatus::Available),
            "unavailable" => Ok(ListingStatus::Unavailable),
            "maintenance" => Ok(ListingStatus::Maintenance),
            other => Err(format!("unrecognized listing status: {other}")),
        }
    }
}

/// Booking lifecycle. `Rejected` and `Cancelled` are terminal; `Confirmed`
/// can still move to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses that block the calendar for other bookings.
    pub fn is_busy(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "rejected" => Ok(BookingStatus::Rejected),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unrecognized booking status: {other}")),
        }
    }
}

macro_rules! text_enum_sql {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl ToSql<Text, Pg> for $ty {
                fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                    <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
                }
            }

            impl FromSql<Text, Pg> for $ty {
                fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                    let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                    s.parse::<$ty>().map_err(Into::into)
                }
            }
        )+
    };
}

text_enum_sql!(UserRole, HousingType, ListingStatus, BookingStatus);

#[derive(Debug, Clone, Selectable, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// User representation safe to put on the wire (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(u: User) -> Self {
        UserPublic {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            is_verified: u.is_verified,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChanges {
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub is_verified: Option<bool>,
}

impl UserChanges {
    /// Verification implies the landlord role. Applied on every write path
    /// that touches the profile; admins keep their role.
    pub fn promote_if_verified(mut self, current_role: UserRole, current_verified: bool) -> Self {
        let verified = self.is_verified.unwrap_or(current_verified);
        let role = self.role.unwrap_or(current_role);
        if verified && role == UserRole::Tenant {
            self.role = Some(UserRole::Landlord);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Selectable, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::listings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Listing {
    pub id: i32,
    pub landlord_id: i32,
    pub title: String,
    pub description: String,
    pub location_city: String,
    pub location_district: String,
    pub price: f64,
    pub rooms: i32,
    pub housing_type: HousingType,
    pub status: ListingStatus,
    pub views_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::listings)]
pub struct NewListing {
    pub landlord_id: i32,
    pub title: String,
    pub description: String,
    pub location_city: String,
    pub location_district: String,
    pub price: f64,
    pub rooms: i32,
    pub housing_type: HousingType,
    pub status: ListingStatus,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::listings)]
pub struct ListingChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location_city: Option<String>,
    pub location_district: Option<String>,
    pub price: Option<f64>,
    pub rooms: Option<i32>,
    pub housing_type: Option<HousingType>,
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Clone, Serialize, Selectable, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Booking {
    pub id: i32,
    pub listing_id: i32,
    pub tenant_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
pub struct NewBooking {
    pub listing_id: i32,
    pub tenant_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Selectable, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Review {
    pub id: i32,
    pub listing_id: i32,
    pub tenant_id: i32,
    pub booking_id: i32,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::reviews)]
pub struct NewReview {
    pub listing_id: i32,
    pub tenant_id: i32,
    pub booking_id: i32,
    pub rating: i16,
    pub comment: String,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::reviews)]
pub struct ReviewChanges {
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Selectable, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::listing_views)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ListingView {
    pub id: i32,
    pub user_id: i32,
    pub listing_id: i32,
    pub viewed_on: NaiveDate,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Selectable, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::search_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SearchEntry {
    pub id: i32,
    pub user_id: Option<i32>,
    pub keyword: String,
    pub searched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_text() {
        for s in ["pending", "confirmed", "rejected", "cancelled"] {
            assert_eq!(s.parse::<BookingStatus>().unwrap().as_str(), s);
        }
        assert!("paused".parse::<BookingStatus>().is_err());
        assert_eq!("maintenance".parse::<ListingStatus>().unwrap(), ListingStatus::Maintenance);
        assert_eq!("landlord".parse::<UserRole>().unwrap(), UserRole::Landlord);
    }

    #[test]
    fn busy_statuses_block_the_calendar() {
        assert!(BookingStatus::Pending.is_busy());
        assert!(BookingStatus::Confirmed.is_busy());
        assert!(!BookingStatus::Rejected.is_busy());
        assert!(!BookingStatus::Cancelled.is_busy());
    }

    #[test]
    fn verified_tenant_is_promoted_to_landlord() {
        let changes = UserChanges {
            is_verified: Some(true),
            ..Default::default()
        }
        .promote_if_verified(UserRole::Tenant, false);
        assert_eq!(changes.role, Some(UserRole::Landlord));
    }

    #[test]
    fn already_verified_user_cannot_demote_back_to_tenant() {
        let changes = UserChanges {
            role: Some(UserRole::Tenant),
            ..Default::default()
        }
        .promote_if_verified(UserRole::Landlord, true);
        assert_eq!(changes.role, Some(UserRole::Landlord));
    }

    #[test]
    fn verified_admin_keeps_the_admin_role() {
        let changes = UserChanges {
            is_verified: Some(true),
            ..Default::default()
        }
        .promote_if_verified(UserRole::Admin, false);
        assert_eq!(changes.role, None);
    }
}
