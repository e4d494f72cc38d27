use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::bookings::{
    check_no_conflict, transition, validate_window, BookingAction, BookingFacts, TransitionError,
};
use crate::models::{Booking, BookingStatus, Listing, NewBooking};
use crate::permissions::{can_view_booking, is_admin};
use crate::prelude::*;
use crate::schema::{bookings, listings};

pub async fn list_bookings(
    State(ctx): State<Context>,
    user: CurrentUser,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let admin = is_admin(&user);
    let rows = ctx
        .db(move |conn| {
            let mut query = bookings::table
                .inner_join(listings::table)
                .select(Booking::as_select())
                .order(bookings::created_at.desc())
                .into_boxed();
            if !admin {
                query = query.filter(
                    bookings::tenant_id
                        .eq(user.id)
                        .or(listings::landlord_id.eq(user.id)),
                );
            }
            query.load::<Booking>(conn).map_err(Into::into)
        })
        .await?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub listing_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Booking creation runs its whole conflict check inside one transaction
/// holding a `FOR UPDATE` lock on the listing row, so two simultaneous
/// attempts for overlapping ranges serialize: the loser re-validates
/// against the winner's committed booking and fails the overlap check.
pub async fn create_booking(
    State(ctx): State<Context>,
    user: CurrentUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let today = Utc::now().date_naive();

    let row = ctx
        .db(move |conn| {
            conn.transaction(|conn| {
                let listing = listings::table
                    .find(req.listing_id)
                    .for_update()
                    .first::<Listing>(conn)
                    .optional()?
                    .ok_or(ApiError::NotFound)?;

                if listing.landlord_id == user.id {
                    return Err(ApiError::Validation(
                        "you cannot book your own listing".into(),
                    ));
                }

                validate_window(listing.status, req.start_date, req.end_date, today)?;

                let busy = bookings::table
                    .filter(bookings::listing_id.eq(listing.id))
                    .filter(bookings::status.eq_any([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                    ]))
                    .select((bookings::start_date, bookings::end_date))
                    .load::<(NaiveDate, NaiveDate)>(conn)?;
                check_no_conflict(&busy, (req.start_date, req.end_date))?;

                let new_booking = NewBooking {
                    listing_id: listing.id,
                    tenant_id: user.id,
                    start_date: req.start_date,
                    end_date: req.end_date,
                    status: BookingStatus::Pending,
                };
                diesel::insert_into(bookings::table)
                    .values(&new_booking)
                    .returning(Booking::as_returning())
                    .get_result(conn)
                    .map_err(Into::into)
            })
        })
        .await?;

    tracing::info!(booking_id = row.id, listing_id = row.listing_id, "booking created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// Loads a booking together with its listing's landlord, disguising
/// non-visible bookings as 404.
fn load_visible_booking(
    conn: &mut diesel::PgConnection,
    user: &CurrentUser,
    booking_id: i32,
) -> Result<(Booking, i32), ApiError> {
    let (booking, landlord_id) = bookings::table
        .inner_join(listings::table)
        .filter(bookings::id.eq(booking_id))
        .select((Booking::as_select(), listings::landlord_id))
        .first::<(Booking, i32)>(conn)
        .optional()?
        .ok_or(ApiError::NotFound)?;

    if !can_view_booking(user, &booking, landlord_id) {
        return Err(ApiError::NotFound);
    }
    Ok((booking, landlord_id))
}

pub async fn get_booking(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<Booking>, ApiError> {
    let (booking, _) = ctx
        .db(move |conn| load_visible_booking(conn, &user, booking_id))
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Date changes are only allowed while the booking is still pending, and
/// re-run the full conflict check (excluding the booking itself) under the
/// same listing row lock as creation.
pub async fn update_booking(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let today = Utc::now().date_naive();

    let row = ctx
        .db(move |conn| {
            conn.transaction(|conn| {
                let (booking, _) = load_visible_booking(conn, &user, booking_id)?;

                if !is_admin(&user) && booking.tenant_id != user.id {
                    return Err(ApiError::Forbidden(
                        "only the tenant or an admin can modify a booking".into(),
                    ));
                }
                if booking.status != BookingStatus::Pending {
                    return Err(TransitionError::WrongState {
                        action: "modify",
                        current: booking.status,
                    }
                    .into());
                }

                let start = req.start_date.unwrap_or(booking.start_date);
                let end = req.end_date.unwrap_or(booking.end_date);

                let listing = listings::table
                    .find(booking.listing_id)
                    .for_update()
                    .first::<Listing>(conn)?;
                validate_window(listing.status, start, end, today)?;

                let busy = bookings::table
                    .filter(bookings::listing_id.eq(listing.id))
                    .filter(bookings::id.ne(booking.id))
                    .filter(bookings::status.eq_any([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                    ]))
                    .select((bookings::start_date, bookings::end_date))
                    .load::<(NaiveDate, NaiveDate)>(conn)?;
                check_no_conflict(&busy, (start, end))?;

                // Conditional on the status we validated against: a concurrent
                // confirm/reject that commits first must fail this write, not
                // silently have its dates rewritten.
                let updated = diesel::update(
                    bookings::table
                        .find(booking.id)
                        .filter(bookings::status.eq(BookingStatus::Pending)),
                )
                .set((bookings::start_date.eq(start), bookings::end_date.eq(end)))
                .returning(Booking::as_returning())
                .get_result::<Booking>(conn)
                .optional()?;

                match updated {
                    Some(row) => Ok(row),
                    None => {
                        let current = bookings::table
                            .find(booking.id)
                            .select(bookings::status)
                            .first::<BookingStatus>(conn)?;
                        Err(TransitionError::WrongState {
                            action: "modify",
                            current,
                        }
                        .into())
                    }
                }
            })
        })
        .await?;

    Ok(Json(row))
}

pub async fn confirm_booking(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<Booking>, ApiError> {
    apply_transition(ctx, user, booking_id, BookingAction::Confirm).await
}

pub async fn reject_booking(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<Booking>, ApiError> {
    apply_transition(ctx, user, booking_id, BookingAction::Reject).await
}

pub async fn cancel_booking(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<Booking>, ApiError> {
    apply_transition(ctx, user, booking_id, BookingAction::Cancel).await
}

/// Guards are decided by the pure state machine, then persisted with a
/// conditional update (`WHERE status = <expected>`), so two concurrent
/// transition attempts cannot both win: the loser sees zero updated rows
/// and reports a conflict naming the now-current status.
async fn apply_transition(
    ctx: Context,
    user: CurrentUser,
    booking_id: i32,
    action: BookingAction,
) -> Result<Json<Booking>, ApiError> {
    let today = Utc::now().date_naive();
    let deadline_days = ctx.config.booking_cancel_deadline_days;

    let row = ctx
        .db(move |conn| {
            conn.transaction(|conn| {
                let (booking, landlord_id) = load_visible_booking(conn, &user, booking_id)?;

                let facts = BookingFacts {
                    tenant_id: booking.tenant_id,
                    landlord_id,
                    status: booking.status,
                    start_date: booking.start_date,
                };
                let new_status = transition(action, &user, &facts, today, deadline_days)?;

                let updated = diesel::update(
                    bookings::table
                        .find(booking_id)
                        .filter(bookings::status.eq(booking.status)),
                )
                .set(bookings::status.eq(new_status))
                .returning(Booking::as_returning())
                .get_result::<Booking>(conn)
                .optional()?;

                match updated {
                    Some(row) => Ok(row),
                    None => {
                        // Lost the race: report the status that won.
                        let current = bookings::table
                            .find(booking_id)
                            .select(bookings::status)
                            .first::<BookingStatus>(conn)?;
                        Err(TransitionError::WrongState {
                            action: action.verb(),
                            current,
                        }
                        .into())
                    }
                }
            })
        })
        .await?;

    tracing::info!(
        booking_id = row.id,
        status = %row.status,
        "booking status changed"
    );
    Ok(Json(row))
}
