use chrono::Utc;
use diesel::pg::Pg;
use serde::Deserialize;

use crate::analytics::{record_listing_view, record_search};
use crate::errors::{is_foreign_key_violation, is_unique_violation};
use crate::models::{HousingType, Listing, ListingChanges, ListingStatus, NewListing};
use crate::permissions::{can_create_listing, can_mutate_listing, is_admin};
use crate::prelude::*;
use crate::schema::listings;

#[derive(Debug, Default, Deserialize)]
pub struct ListingFilter {
    /// Intersects with the hard-wired `available` filter of the public
    /// list, so any other value yields an empty result set.
    pub status: Option<ListingStatus>,
    pub location_city: Option<String>,
    pub location_district: Option<String>,
    pub housing_type: Option<HousingType>,
    pub rooms_gte: Option<i32>,
    pub rooms_lte: Option<i32>,
    pub price_gte: Option<f64>,
    pub price_lte: Option<f64>,
    pub search: Option<String>,
    pub q: Option<String>,
    pub ordering: Option<String>,
}

impl ListingFilter {
    fn keyword(&self) -> Option<String> {
        let raw = self.search.as_deref().or(self.q.as_deref())?.trim();
        (!raw.is_empty()).then(|| raw.to_string())
    }
}

type BoxedListingQuery<'a> = listings::BoxedQuery<'a, Pg>;

fn filtered_query(filter: &ListingFilter) -> BoxedListingQuery<'static> {
    // The public endpoint only ever exposes available listings; any status
    // filter intersects with that.
    let mut query = listings::table
        .into_boxed()
        .filter(listings::status.eq(ListingStatus::Available));

    if let Some(status) = filter.status {
        query = query.filter(listings::status.eq(status));
    }
    if let Some(city) = filter.location_city.clone() {
        query = query.filter(listings::location_city.eq(city));
    }
    if let Some(district) = filter.location_district.clone() {
        query = query.filter(listings::location_district.eq(district));
    }
    if let Some(housing_type) = filter.housing_type {
        query = query.filter(listings::housing_type.eq(housing_type));
    }
    if let Some(rooms) = filter.rooms_gte {
        query = query.filter(listings::rooms.ge(rooms));
    }
    if let Some(rooms) = filter.rooms_lte {
        query = query.filter(listings::rooms.le(rooms));
    }
    if let Some(price) = filter.price_gte {
        query = query.filter(listings::price.ge(price));
    }
    if let Some(price) = filter.price_lte {
        query = query.filter(listings::price.le(price));
    }

    if let Some(keyword) = filter.keyword() {
        let pattern = format!("%{keyword}%");
        query = query.filter(
            listings::title
                .ilike(pattern.clone())
                .or(listings::description.ilike(pattern.clone()))
                .or(listings::location_city.ilike(pattern.clone()))
                .or(listings::location_district.ilike(pattern)),
        );
    }

    match filter.ordering.as_deref() {
        Some("price") => query.order(listings::price.asc()),
        Some("-price") => query.order(listings::price.desc()),
        Some("views_count") => query.order(listings::views_count.asc()),
        Some("-views_count") => query.order(listings::views_count.desc()),
        Some("created_at") => query.order(listings::created_at.asc()),
        _ => query.order(listings::created_at.desc()),
    }
}

pub async fn list_listings(
    State(ctx): State<Context>,
    MaybeUser(user): MaybeUser,
    Query(filter): Query<ListingFilter>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let searcher_id = user.map(|u| u.id);
    let keyword = filter.keyword();

    let rows = ctx
        .db(move |conn| {
            if let Some(keyword) = &keyword {
                record_search(conn, searcher_id, keyword);
            }
            filtered_query(&filter)
                .load::<Listing>(conn)
                .map_err(Into::into)
        })
        .await?;

    Ok(Json(rows))
}

pub async fn get_listing(
    State(ctx): State<Context>,
    MaybeUser(user): MaybeUser,
    Path(listing_id): Path<i32>,
) -> Result<Json<Listing>, ApiError> {
    let today = Utc::now().date_naive();
    let viewer_id = user.map(|u| u.id);

    let row = ctx
        .db(move |conn| {
            let listing = listings::table
                .find(listing_id)
                .filter(listings::status.eq(ListingStatus::Available))
                .first::<Listing>(conn)
                .optional()?
                .ok_or(ApiError::NotFound)?;

            // Best effort: a failed view record must not fail the read.
            if let Some(viewer_id) = viewer_id {
                if let Err(e) = record_listing_view(conn, viewer_id, listing.id, today) {
                    tracing::warn!(error = %e, listing_id, "failed to record listing view");
                }
            }

            listings::table
                .find(listing_id)
                .first::<Listing>(conn)
                .map_err(Into::into)
        })
        .await?;

    Ok(Json(row))
}

pub async fn my_listings(
    State(ctx): State<Context>,
    user: CurrentUser,
) -> Result<Json<Vec<Listing>>, ApiError> {
    if !can_create_listing(&user) {
        return Err(ApiError::Forbidden("landlord role required".into()));
    }

    let admin = is_admin(&user);
    let rows = ctx
        .db(move |conn| {
            let mut query = listings::table
                .order(listings::created_at.desc())
                .into_boxed();
            if !admin {
                query = query.filter(listings::landlord_id.eq(user.id));
            }
            query.load::<Listing>(conn).map_err(Into::into)
        })
        .await?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub location_city: String,
    pub location_district: String,
    pub price: f64,
    #[serde(default = "default_rooms")]
    pub rooms: i32,
    #[serde(default)]
    pub housing_type: HousingType,
    #[serde(default)]
    pub status: ListingStatus,
}

fn default_rooms() -> i32 {
    1
}

fn validate_listing_fields(price: f64, rooms: i32, title: Option<&str>) -> Result<(), ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::Validation("price must be zero or positive".into()));
    }
    if rooms < 1 {
        return Err(ApiError::Validation("rooms must be at least 1".into()));
    }
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("title must not be empty".into()));
        }
    }
    Ok(())
}

pub async fn create_listing(
    State(ctx): State<Context>,
    user: CurrentUser,
    Json(req): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    if !can_create_listing(&user) {
        return Err(ApiError::Forbidden("landlord role required".into()));
    }
    validate_listing_fields(req.price, req.rooms, Some(&req.title))?;

    let new_listing = NewListing {
        landlord_id: user.id,
        title: req.title.trim().to_string(),
        description: req.description,
        location_city: req.location_city,
        location_district: req.location_district,
        price: req.price,
        rooms: req.rooms,
        housing_type: req.housing_type,
        status: req.status,
    };

    let row = ctx
        .db(move |conn| {
            diesel::insert_into(listings::table)
                .values(&new_listing)
                .returning(Listing::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    if is_unique_violation(&e, "") {
                        ApiError::Validation("a listing with that title already exists".into())
                    } else {
                        e.into()
                    }
                })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

async fn load_owned_listing(
    ctx: &Context,
    user: &CurrentUser,
    listing_id: i32,
) -> Result<Listing, ApiError> {
    let listing = ctx
        .db(move |conn| {
            listings::table
                .find(listing_id)
                .first::<Listing>(conn)
                .optional()
                .map_err(Into::into)
        })
        .await?
        .ok_or(ApiError::NotFound)?;

    if !can_mutate_listing(user, &listing) {
        return Err(ApiError::Forbidden(
            "you do not have access to this listing".into(),
        ));
    }
    Ok(listing)
}

pub async fn get_my_listing(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(listing_id): Path<i32>,
) -> Result<Json<Listing>, ApiError> {
    let listing = load_owned_listing(&ctx, &user, listing_id).await?;
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location_city: Option<String>,
    pub location_district: Option<String>,
    pub price: Option<f64>,
    pub rooms: Option<i32>,
    pub housing_type: Option<HousingType>,
    pub status: Option<ListingStatus>,
}

pub async fn update_listing(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(listing_id): Path<i32>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    let current = load_owned_listing(&ctx, &user, listing_id).await?;
    validate_listing_fields(
        req.price.unwrap_or(current.price),
        req.rooms.unwrap_or(current.rooms),
        req.title.as_deref(),
    )?;

    let changes = ListingChanges {
        title: req.title,
        description: req.description,
        location_city: req.location_city,
        location_district: req.location_district,
        price: req.price,
        rooms: req.rooms,
        housing_type: req.housing_type,
        status: req.status,
    };

    let no_changes = changes.title.is_none()
        && changes.description.is_none()
        && changes.location_city.is_none()
        && changes.location_district.is_none()
        && changes.price.is_none()
        && changes.rooms.is_none()
        && changes.housing_type.is_none()
        && changes.status.is_none();
    if no_changes {
        return Ok(Json(current));
    }

    let row = ctx
        .db(move |conn| {
            diesel::update(listings::table.find(listing_id))
                .set(&changes)
                .returning(Listing::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    if is_unique_violation(&e, "") {
                        ApiError::Validation("a listing with that title already exists".into())
                    } else {
                        e.into()
                    }
                })
        })
        .await?;

    Ok(Json(row))
}

pub async fn delete_listing(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(listing_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    load_owned_listing(&ctx, &user, listing_id).await?;

    ctx.db(move |conn| {
        diesel::delete(listings::table.find(listing_id))
            .execute(conn)
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    ApiError::Protected {
                        blocked_by: vec!["reviewed bookings".into()],
                    }
                } else {
                    e.into()
                }
            })
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
