//! Review gating rules, pure over the actor, the referenced booking and
//! today's date. The duplicate-review guard stays at the database (unique
//! `booking_id`); everything else is decided here so the handler only
//! loads and inserts.

use chrono::NaiveDate;
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::errors::ApiError;
use crate::models::{Booking, BookingStatus};

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ReviewRuleError {
    #[error("rating must be between 1 and 5")]
    RatingOutOfRange,
    #[error("you cannot leave a review for your own listing")]
    OwnListing,
    #[error("you can only review your own booking")]
    NotYourBooking,
    #[error("reviews are allowed only for confirmed bookings")]
    NotConfirmed,
    #[error("you can leave a review only after the stay has ended")]
    StayNotEnded,
}

impl From<ReviewRuleError> for ApiError {
    fn from(err: ReviewRuleError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

pub fn validate_rating(rating: i16) -> Result<(), ReviewRuleError> {
    if !(1..=5).contains(&rating) {
        return Err(ReviewRuleError::RatingOutOfRange);
    }
    Ok(())
}

/// The booking-side gates, in order: not the landlord's own listing, the
/// actor is the booking's tenant, the booking is confirmed, and the stay
/// has ended (`end_date <= today`).
pub fn validate_review(
    actor: &CurrentUser,
    booking: &Booking,
    landlord_id: i32,
    today: NaiveDate,
) -> Result<(), ReviewRuleError> {
    if landlord_id == actor.id {
        return Err(ReviewRuleError::OwnListing);
    }
    if booking.tenant_id != actor.id {
        return Err(ReviewRuleError::NotYourBooking);
    }
    if booking.status != BookingStatus::Confirmed {
        return Err(ReviewRuleError::NotConfirmed);
    }
    if booking.end_date > today {
        return Err(ReviewRuleError::StayNotEnded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::models::UserRole;

    const LANDLORD: i32 = 10;
    const TENANT: i32 = 20;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn actor(id: i32) -> CurrentUser {
        CurrentUser {
            id,
            username: format!("u{id}"),
            role: UserRole::Tenant,
            is_verified: false,
        }
    }

    fn booking(status: BookingStatus, end: NaiveDate) -> Booking {
        Booking {
            id: 1,
            listing_id: 1,
            tenant_id: TENANT,
            start_date: day(1),
            end_date: end,
            status,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn tenant_reviews_a_finished_confirmed_stay() {
        let b = booking(BookingStatus::Confirmed, day(10));
        assert!(validate_review(&actor(TENANT), &b, LANDLORD, day(10)).is_ok());
        assert!(validate_review(&actor(TENANT), &b, LANDLORD, day(15)).is_ok());
    }

    #[test]
    fn landlord_cannot_review_own_listing() {
        let b = booking(BookingStatus::Confirmed, day(10));
        assert_eq!(
            validate_review(&actor(LANDLORD), &b, LANDLORD, day(15)),
            Err(ReviewRuleError::OwnListing)
        );
    }

    #[test]
    fn only_the_bookings_tenant_may_review() {
        let b = booking(BookingStatus::Confirmed, day(10));
        assert_eq!(
            validate_review(&actor(77), &b, LANDLORD, day(15)),
            Err(ReviewRuleError::NotYourBooking)
        );
    }

    #[test]
    fn unconfirmed_bookings_are_not_reviewable() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
        ] {
            let b = booking(status, day(10));
            assert_eq!(
                validate_review(&actor(TENANT), &b, LANDLORD, day(15)),
                Err(ReviewRuleError::NotConfirmed)
            );
        }
    }

    #[test]
    fn stay_must_have_ended() {
        // end_date strictly after today is still an ongoing stay.
        let b = booking(BookingStatus::Confirmed, day(16));
        assert_eq!(
            validate_review(&actor(TENANT), &b, LANDLORD, day(15)),
            Err(ReviewRuleError::StayNotEnded)
        );
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert_eq!(validate_rating(0), Err(ReviewRuleError::RatingOutOfRange));
        assert_eq!(validate_rating(6), Err(ReviewRuleError::RatingOutOfRange));
    }
}
