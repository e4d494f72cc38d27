//! Best-effort analytics side effects: per-user-per-day view dedup feeding
//! the listing view counter, and the search keyword log. Neither may fail
//! the read that triggered it; callers log and move on.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::PgConnection;

use crate::models::ListingView;
use crate::schema::{listing_views, listings, search_history};

/// Record one deduplicated view. The unique key on
/// `(user_id, listing_id, viewed_on)` arbitrates concurrent first views:
/// the winning insert bumps `views_count` atomically, the loser falls back
/// to refreshing `viewed_at`. Returns the row and whether it was created.
pub fn record_listing_view(
    conn: &mut PgConnection,
    viewer_id: i32,
    viewed_listing_id: i32,
    today: NaiveDate,
) -> QueryResult<(ListingView, bool)> {
    conn.transaction(|conn| {
        let inserted = diesel::insert_into(listing_views::table)
            .values((
                listing_views::user_id.eq(viewer_id),
                listing_views::listing_id.eq(viewed_listing_id),
                listing_views::viewed_on.eq(today),
            ))
            .on_conflict((
                listing_views::user_id,
                listing_views::listing_id,
                listing_views::viewed_on,
            ))
            .do_nothing()
            .get_result::<ListingView>(conn)
            .optional()?;

        match inserted {
            Some(row) => {
                // Counter increment in SQL, not read-modify-write.
                diesel::update(listings::table.find(viewed_listing_id))
                    .set(listings::views_count.eq(listings::views_count + 1))
                    .execute(conn)?;
                Ok((row, true))
            }
            None => {
                let row = diesel::update(
                    listing_views::table
                        .filter(listing_views::user_id.eq(viewer_id))
                        .filter(listing_views::listing_id.eq(viewed_listing_id))
                        .filter(listing_views::viewed_on.eq(today)),
                )
                .set(listing_views::viewed_at.eq(diesel::dsl::now))
                .get_result::<ListingView>(conn)?;
                Ok((row, false))
            }
        }
    })
}

/// Append a search keyword for the (possibly anonymous) user. Errors are
/// swallowed after logging so the search response is never blocked.
pub fn record_search(conn: &mut PgConnection, searcher_id: Option<i32>, keyword: &str) {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return;
    }

    let result = diesel::insert_into(search_history::table)
        .values((
            search_history::user_id.eq(searcher_id),
            search_history::keyword.eq(keyword),
        ))
        .execute(conn);

    if let Err(e) = result {
        tracing::warn!(error = %e, keyword, "failed to record search keyword");
    }
}
