use chrono::Utc;
use serde::Deserialize;

use crate::analytics::record_listing_view;
use crate::models::{ListingView, SearchEntry};
use crate::prelude::*;
use crate::schema::{listing_views, listings, search_history};

pub async fn list_search_history(
    State(ctx): State<Context>,
    user: CurrentUser,
) -> Result<Json<Vec<SearchEntry>>, ApiError> {
    let rows = ctx
        .db(move |conn| {
            search_history::table
                .filter(search_history::user_id.eq(user.id))
                .order(search_history::searched_at.desc())
                .load::<SearchEntry>(conn)
                .map_err(Into::into)
        })
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateSearchRequest {
    pub keyword: String,
}

pub async fn create_search_entry(
    State(ctx): State<Context>,
    user: CurrentUser,
    Json(req): Json<CreateSearchRequest>,
) -> Result<(StatusCode, Json<SearchEntry>), ApiError> {
    let keyword = req.keyword.trim().to_string();
    if keyword.is_empty() {
        return Err(ApiError::Validation("keyword must not be empty".into()));
    }

    let row = ctx
        .db(move |conn| {
            diesel::insert_into(search_history::table)
                .values((
                    search_history::user_id.eq(Some(user.id)),
                    search_history::keyword.eq(keyword),
                ))
                .returning(SearchEntry::as_returning())
                .get_result(conn)
                .map_err(Into::into)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_listing_views(
    State(ctx): State<Context>,
    user: CurrentUser,
) -> Result<Json<Vec<ListingView>>, ApiError> {
    let rows = ctx
        .db(move |conn| {
            listing_views::table
                .filter(listing_views::user_id.eq(user.id))
                .order(listing_views::viewed_at.desc())
                .load::<ListingView>(conn)
                .map_err(Into::into)
        })
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateListingViewRequest {
    pub listing_id: i32,
}

/// Idempotent per calendar day: the first request creates the view row
/// (201) and bumps the listing counter once; repeats the same day re-affirm
/// the existing row (200) and only refresh its timestamp.
pub async fn create_listing_view(
    State(ctx): State<Context>,
    user: CurrentUser,
    Json(req): Json<CreateListingViewRequest>,
) -> Result<(StatusCode, Json<ListingView>), ApiError> {
    let today = Utc::now().date_naive();

    let (row, created) = ctx
        .db(move |conn| {
            let exists = diesel::select(diesel::dsl::exists(
                listings::table.find(req.listing_id),
            ))
            .get_result::<bool>(conn)?;
            if !exists {
                return Err(ApiError::Validation("listing does not exist".into()));
            }

            record_listing_view(conn, user.id, req.listing_id, today).map_err(Into::into)
        })
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(row)))
}
