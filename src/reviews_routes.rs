use chrono::Utc;
use serde::Deserialize;

use crate::errors::is_unique_violation;
use crate::models::{Booking, NewReview, Review, ReviewChanges};
use crate::permissions::can_mutate_review;
use crate::prelude::*;
use crate::reviews::{validate_rating, validate_review};
use crate::schema::{bookings, listings, reviews};

pub async fn list_reviews(State(ctx): State<Context>) -> Result<Json<Vec<Review>>, ApiError> {
    let rows = ctx
        .db(|conn| {
            reviews::table
                .order(reviews::created_at.desc())
                .load::<Review>(conn)
                .map_err(Into::into)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn get_review(
    State(ctx): State<Context>,
    Path(review_id): Path<i32>,
) -> Result<Json<Review>, ApiError> {
    let row = ctx
        .db(move |conn| {
            reviews::table
                .find(review_id)
                .first::<Review>(conn)
                .optional()
                .map_err(Into::into)
        })
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: i32,
    #[serde(default = "default_rating")]
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

fn default_rating() -> i16 {
    3
}

/// Review creation is gated on the booking: it must belong to the caller,
/// be confirmed, and have ended. The listing reference is copied from the
/// booking, never taken from the client.
pub async fn create_review(
    State(ctx): State<Context>,
    user: CurrentUser,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    validate_rating(req.rating)?;
    let today = Utc::now().date_naive();

    let row = ctx
        .db(move |conn| {
            let (booking, landlord_id) = bookings::table
                .inner_join(listings::table)
                .filter(bookings::id.eq(req.booking_id))
                .select((Booking::as_select(), listings::landlord_id))
                .first::<(Booking, i32)>(conn)
                .optional()?
                .ok_or_else(|| ApiError::Validation("booking does not exist".into()))?;

            validate_review(&user, &booking, landlord_id, today)?;

            let new_review = NewReview {
                listing_id: booking.listing_id,
                tenant_id: user.id,
                booking_id: booking.id,
                rating: req.rating,
                comment: req.comment,
            };
            diesel::insert_into(reviews::table)
                .values(&new_review)
                .returning(Review::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    if is_unique_violation(&e, "") {
                        ApiError::Conflict(
                            "a review for this booking has already been submitted".into(),
                        )
                    } else {
                        e.into()
                    }
                })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

async fn load_own_review(
    ctx: &Context,
    user: &CurrentUser,
    review_id: i32,
) -> Result<Review, ApiError> {
    let review = ctx
        .db(move |conn| {
            reviews::table
                .find(review_id)
                .first::<Review>(conn)
                .optional()
                .map_err(Into::into)
        })
        .await?
        .ok_or(ApiError::NotFound)?;

    if !can_mutate_review(user, review.tenant_id) {
        return Err(ApiError::Forbidden(
            "only the author or an admin can modify a review".into(),
        ));
    }
    Ok(review)
}

pub async fn update_review(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(review_id): Path<i32>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    let current = load_own_review(&ctx, &user, review_id).await?;
    if let Some(rating) = req.rating {
        validate_rating(rating)?;
    }

    let changes = ReviewChanges {
        rating: req.rating,
        comment: req.comment,
    };
    if changes.rating.is_none() && changes.comment.is_none() {
        return Ok(Json(current));
    }

    let row = ctx
        .db(move |conn| {
            diesel::update(reviews::table.find(review_id))
                .set(&changes)
                .returning(Review::as_returning())
                .get_result(conn)
                .map_err(Into::into)
        })
        .await?;

    Ok(Json(row))
}

pub async fn delete_review(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(review_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    load_own_review(&ctx, &user, review_id).await?;

    ctx.db(move |conn| {
        diesel::delete(reviews::table.find(review_id))
            .execute(conn)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
