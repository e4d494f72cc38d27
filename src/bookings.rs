//! Booking domain rules: the date-window validator and the status state
//! machine. Both are pure over explicit inputs (actor, dates, current
//! status), so request handlers stay thin and the rules are testable
//! without a database. Persistence-side guards (listing row lock, CAS
//! status update) live in the bookings routes.

use chrono::NaiveDate;
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::errors::ApiError;
use crate::models::{BookingStatus, ListingStatus, UserRole};

#[derive(Debug, PartialEq, Eq, Error)]
pub enum BookingRuleError {
    #[error("this listing is currently not available for booking")]
    ListingUnavailable,
    #[error("start_date must be earlier than end_date")]
    InvalidDateOrder,
    #[error("cannot book past dates (start_date is in the past)")]
    StartInPast,
    #[error("this period overlaps with an existing booking for the listing")]
    Overlap,
}

impl From<BookingRuleError> for ApiError {
    fn from(err: BookingRuleError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`
/// collide iff `a_start < b_end && a_end > b_start`. Touching endpoints do
/// not count.
pub fn overlaps(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 < b.1 && a.1 > b.0
}

/// Checks 1-3 of the conflict validator, in order: listing availability,
/// date order, no past start. The overlap check (4) runs against the busy
/// windows loaded under the listing row lock; see [`check_no_conflict`].
pub fn validate_window(
    listing_status: ListingStatus,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<(), BookingRuleError> {
    if listing_status != ListingStatus::Available {
        return Err(BookingRuleError::ListingUnavailable);
    }
    if start >= end {
        return Err(BookingRuleError::InvalidDateOrder);
    }
    if start < today {
        return Err(BookingRuleError::StartInPast);
    }
    Ok(())
}

/// Check 4: the candidate window against every pending/confirmed window of
/// the same listing (the caller excludes the booking being updated).
pub fn check_no_conflict(
    busy: &[(NaiveDate, NaiveDate)],
    candidate: (NaiveDate, NaiveDate),
) -> Result<(), BookingRuleError> {
    if busy.iter().any(|w| overlaps(*w, candidate)) {
        return Err(BookingRuleError::Overlap);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Confirm,
    Reject,
    Cancel,
}

impl BookingAction {
    pub fn verb(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Reject => "reject",
            BookingAction::Cancel => "cancel",
        }
    }

    /// The status a booking must currently hold for this action, used for
    /// the conditional (compare-and-swap) update.
    pub fn expected_status(&self) -> &'static [BookingStatus] {
        match self {
            BookingAction::Confirm | BookingAction::Reject => &[BookingStatus::Pending],
            BookingAction::Cancel => &[BookingStatus::Pending, BookingStatus::Confirmed],
        }
    }

    pub fn target_status(&self) -> BookingStatus {
        match self {
            BookingAction::Confirm => BookingStatus::Confirmed,
            BookingAction::Reject => BookingStatus::Rejected,
            BookingAction::Cancel => BookingStatus::Cancelled,
        }
    }
}

/// What the state machine needs to know about a booking.
#[derive(Debug, Clone, Copy)]
pub struct BookingFacts {
    pub tenant_id: i32,
    pub landlord_id: i32,
    pub status: BookingStatus,
    pub start_date: NaiveDate,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("you are not allowed to {0} this booking")]
    NotAllowed(&'static str),
    #[error("cannot {action} a booking in status '{current}'")]
    WrongState {
        action: &'static str,
        current: BookingStatus,
    },
    #[error("cannot cancel a booking on or after its check-in date")]
    AlreadyStarted,
    #[error("cancellation deadline has passed ({0} day(s) before check-in)")]
    DeadlinePassed(i64),
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAllowed(_) => ApiError::Forbidden(err.to_string()),
            TransitionError::WrongState { .. } => ApiError::Conflict(err.to_string()),
            TransitionError::AlreadyStarted | TransitionError::DeadlinePassed(_) => {
                ApiError::Validation(err.to_string())
            }
        }
    }
}

/// Decide whether `actor` may apply `action` to a booking, and what the new
/// status is. Confirm/reject are landlord-or-admin; cancel is open to the
/// tenant as well (a confirmed booking included), but non-admins are bound
/// by the cancellation deadline. Re-entry into any state fails rather than
/// no-ops, naming the current status.
pub fn transition(
    action: BookingAction,
    actor: &CurrentUser,
    facts: &BookingFacts,
    today: NaiveDate,
    deadline_days: i64,
) -> Result<BookingStatus, TransitionError> {
    let is_admin = actor.role == UserRole::Admin;
    let is_landlord = actor.id == facts.landlord_id;
    let is_tenant = actor.id == facts.tenant_id;

    let allowed = match action {
        BookingAction::Confirm | BookingAction::Reject => is_admin || is_landlord,
        BookingAction::Cancel => is_admin || is_landlord || is_tenant,
    };
    if !allowed {
        return Err(TransitionError::NotAllowed(action.verb()));
    }

    if !action.expected_status().contains(&facts.status) {
        return Err(TransitionError::WrongState {
            action: action.verb(),
            current: facts.status,
        });
    }

    if action == BookingAction::Cancel && !is_admin {
        if today >= facts.start_date {
            return Err(TransitionError::AlreadyStarted);
        }
        let days_to_start = (facts.start_date - today).num_days();
        if days_to_start < deadline_days {
            return Err(TransitionError::DeadlinePassed(deadline_days));
        }
    }

    Ok(action.target_status())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn actor(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id,
            username: format!("u{id}"),
            role,
            is_verified: false,
        }
    }

    fn facts(status: BookingStatus, start: NaiveDate) -> BookingFacts {
        BookingFacts {
            tenant_id: 20,
            landlord_id: 10,
            status,
            start_date: start,
        }
    }

    mod window {
        use super::*;

        #[test]
        fn rejects_unavailable_listing_first() {
            // Listing status outranks the date errors.
            assert_eq!(
                validate_window(ListingStatus::Maintenance, day(5), day(3), day(10)),
                Err(BookingRuleError::ListingUnavailable)
            );
            assert_eq!(
                validate_window(ListingStatus::Unavailable, day(10), day(12), day(1)),
                Err(BookingRuleError::ListingUnavailable)
            );
        }

        #[test]
        fn rejects_inverted_and_empty_ranges() {
            assert_eq!(
                validate_window(ListingStatus::Available, day(12), day(10), day(1)),
                Err(BookingRuleError::InvalidDateOrder)
            );
            assert_eq!(
                validate_window(ListingStatus::Available, day(10), day(10), day(1)),
                Err(BookingRuleError::InvalidDateOrder)
            );
        }

        #[test]
        fn rejects_past_start_dates() {
            assert_eq!(
                validate_window(ListingStatus::Available, day(9), day(12), day(10)),
                Err(BookingRuleError::StartInPast)
            );
            // Starting today is fine.
            assert!(validate_window(ListingStatus::Available, day(10), day(12), day(10)).is_ok());
        }
    }

    mod overlap {
        use super::*;

        #[test]
        fn touching_ranges_do_not_overlap() {
            assert!(!overlaps((day(10), day(12)), (day(12), day(14))));
            assert!(!overlaps((day(12), day(14)), (day(10), day(12))));
        }

        #[test]
        fn nested_and_straddling_ranges_overlap() {
            assert!(overlaps((day(10), day(20)), (day(12), day(14))));
            assert!(overlaps((day(12), day(14)), (day(10), day(20))));
            assert!(overlaps((day(10), day(13)), (day(12), day(15))));
        }

        #[test]
        fn conflict_check_scans_all_busy_windows() {
            let busy = [(day(1), day(3)), (day(10), day(12))];
            assert!(check_no_conflict(&busy, (day(3), day(10))).is_ok());
            assert_eq!(
                check_no_conflict(&busy, (day(11), day(14))),
                Err(BookingRuleError::Overlap)
            );
        }
    }

    mod transitions {
        use super::*;

        const DEADLINE: i64 = 1;

        #[test]
        fn landlord_confirms_a_pending_booking() {
            let f = facts(BookingStatus::Pending, day(20));
            let got = transition(
                BookingAction::Confirm,
                &actor(10, UserRole::Landlord),
                &f,
                day(1),
                DEADLINE,
            );
            assert_eq!(got, Ok(BookingStatus::Confirmed));
        }

        #[test]
        fn tenant_cannot_confirm_or_reject() {
            let f = facts(BookingStatus::Pending, day(20));
            for action in [BookingAction::Confirm, BookingAction::Reject] {
                let got = transition(action, &actor(20, UserRole::Tenant), &f, day(1), DEADLINE);
                assert_eq!(got, Err(TransitionError::NotAllowed(action.verb())));
            }
        }

        #[test]
        fn confirm_is_not_reentrant() {
            let f = facts(BookingStatus::Confirmed, day(20));
            let got = transition(
                BookingAction::Confirm,
                &actor(10, UserRole::Landlord),
                &f,
                day(1),
                DEADLINE,
            );
            assert_eq!(
                got,
                Err(TransitionError::WrongState {
                    action: "confirm",
                    current: BookingStatus::Confirmed,
                })
            );
        }

        #[test]
        fn reject_after_confirm_fails_naming_current_state() {
            let f = facts(BookingStatus::Confirmed, day(20));
            let got = transition(
                BookingAction::Reject,
                &actor(99, UserRole::Admin),
                &f,
                day(1),
                DEADLINE,
            );
            assert_eq!(
                got,
                Err(TransitionError::WrongState {
                    action: "reject",
                    current: BookingStatus::Confirmed,
                })
            );
        }

        #[test]
        fn tenant_cancels_within_deadline() {
            // Start 3 days out, deadline 2: still allowed.
            let f = facts(BookingStatus::Pending, day(13));
            let got = transition(
                BookingAction::Cancel,
                &actor(20, UserRole::Tenant),
                &f,
                day(10),
                2,
            );
            assert_eq!(got, Ok(BookingStatus::Cancelled));
        }

        #[test]
        fn tenant_may_cancel_a_confirmed_booking() {
            let f = facts(BookingStatus::Confirmed, day(13));
            let got = transition(
                BookingAction::Cancel,
                &actor(20, UserRole::Tenant),
                &f,
                day(10),
                2,
            );
            assert_eq!(got, Ok(BookingStatus::Cancelled));
        }

        #[test]
        fn cancel_on_or_after_checkin_is_rejected() {
            let f = facts(BookingStatus::Confirmed, day(10));
            for today in [day(10), day(11)] {
                let got = transition(
                    BookingAction::Cancel,
                    &actor(20, UserRole::Tenant),
                    &f,
                    today,
                    0,
                );
                assert_eq!(got, Err(TransitionError::AlreadyStarted));
            }
        }

        #[test]
        fn cancel_inside_the_deadline_window_is_rejected() {
            // Start tomorrow, deadline 2 days: too late.
            let f = facts(BookingStatus::Pending, day(11));
            let got = transition(
                BookingAction::Cancel,
                &actor(20, UserRole::Tenant),
                &f,
                day(10),
                2,
            );
            assert_eq!(got, Err(TransitionError::DeadlinePassed(2)));
        }

        #[test]
        fn admin_bypasses_the_cancellation_deadline() {
            let f = facts(BookingStatus::Confirmed, day(10));
            let got = transition(
                BookingAction::Cancel,
                &actor(99, UserRole::Admin),
                &f,
                day(10),
                5,
            );
            assert_eq!(got, Ok(BookingStatus::Cancelled));
        }

        #[test]
        fn terminal_states_cannot_be_cancelled_again() {
            for status in [BookingStatus::Cancelled, BookingStatus::Rejected] {
                let f = facts(status, day(20));
                let got = transition(
                    BookingAction::Cancel,
                    &actor(99, UserRole::Admin),
                    &f,
                    day(1),
                    DEADLINE,
                );
                assert_eq!(
                    got,
                    Err(TransitionError::WrongState {
                        action: "cancel",
                        current: status,
                    })
                );
            }
        }

        #[test]
        fn stale_date_update_reports_the_committed_status() {
            // A date update whose pending precondition was beaten by a
            // concurrent transition fails like any other lost CAS: a
            // conflict naming the status that actually committed.
            let err = ApiError::from(TransitionError::WrongState {
                action: "modify",
                current: BookingStatus::Confirmed,
            });
            assert!(matches!(err, ApiError::Conflict(_)));
            assert_eq!(
                err.to_string(),
                "cannot modify a booking in status 'confirmed'"
            );
        }

        #[test]
        fn outsider_cannot_cancel_someone_elses_booking() {
            let f = facts(BookingStatus::Pending, day(20));
            let got = transition(
                BookingAction::Cancel,
                &actor(77, UserRole::Tenant),
                &f,
                day(1),
                DEADLINE,
            );
            assert_eq!(got, Err(TransitionError::NotAllowed("cancel")));
        }
    }
}
