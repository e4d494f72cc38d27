//! Capability predicates. Authorization is answered per (actor, action,
//! object), not via role hierarchies: handlers call these and map a `false`
//! to 403, or to 404 where the resource family disguises existence
//! (bookings do; listings and reviews do not).

use crate::auth::CurrentUser;
use crate::models::{Booking, Listing, UserRole};

pub fn is_admin(user: &CurrentUser) -> bool {
    user.role == UserRole::Admin
}

pub fn is_owner_of_listing(user: &CurrentUser, listing: &Listing) -> bool {
    listing.landlord_id == user.id
}

pub fn is_tenant_of_booking(user: &CurrentUser, booking: &Booking) -> bool {
    booking.tenant_id == user.id
}

/// Listing writes: the owning landlord or an admin.
pub fn can_mutate_listing(user: &CurrentUser, listing: &Listing) -> bool {
    is_admin(user) || is_owner_of_listing(user, listing)
}

/// Only landlords (and admins) may create listings.
pub fn can_create_listing(user: &CurrentUser) -> bool {
    matches!(user.role, UserRole::Landlord | UserRole::Admin)
}

/// Booking visibility: admin sees all; otherwise the tenant who made it or
/// the landlord of the referenced listing.
pub fn can_view_booking(user: &CurrentUser, booking: &Booking, listing_landlord_id: i32) -> bool {
    is_admin(user) || is_tenant_of_booking(user, booking) || listing_landlord_id == user.id
}

/// Review writes: the authoring tenant or an admin. Reads are open.
pub fn can_mutate_review(user: &CurrentUser, review_tenant_id: i32) -> bool {
    is_admin(user) || review_tenant_id == user.id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use crate::models::{BookingStatus, HousingType, ListingStatus};

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id,
            username: format!("user{id}"),
            role,
            is_verified: role == UserRole::Landlord,
        }
    }

    fn listing(id: i32, landlord_id: i32) -> Listing {
        Listing {
            id,
            landlord_id,
            title: format!("listing {id}"),
            description: String::new(),
            location_city: "Berlin".into(),
            location_district: "Mitte".into(),
            price: 100.0,
            rooms: 2,
            housing_type: HousingType::Apartment,
            status: ListingStatus::Available,
            views_count: 0,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn booking(id: i32, listing_id: i32, tenant_id: i32) -> Booking {
        Booking {
            id,
            listing_id,
            tenant_id,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
            status: BookingStatus::Pending,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn listing_writes_are_owner_or_admin() {
        let l = listing(1, 10);
        assert!(can_mutate_listing(&user(10, UserRole::Landlord), &l));
        assert!(can_mutate_listing(&user(99, UserRole::Admin), &l));
        assert!(!can_mutate_listing(&user(11, UserRole::Landlord), &l));
        assert!(!can_mutate_listing(&user(12, UserRole::Tenant), &l));
    }

    #[test]
    fn booking_visibility_is_tenant_landlord_or_admin() {
        let b = booking(1, 1, 20);
        assert!(can_view_booking(&user(20, UserRole::Tenant), &b, 10));
        assert!(can_view_booking(&user(10, UserRole::Landlord), &b, 10));
        assert!(can_view_booking(&user(99, UserRole::Admin), &b, 10));
        assert!(!can_view_booking(&user(21, UserRole::Tenant), &b, 10));
    }

    #[test]
    fn review_writes_are_author_or_admin() {
        assert!(can_mutate_review(&user(20, UserRole::Tenant), 20));
        assert!(can_mutate_review(&user(99, UserRole::Admin), 20));
        assert!(!can_mutate_review(&user(21, UserRole::Tenant), 20));
    }

    #[test]
    fn only_landlords_and_admins_create_listings() {
        assert!(can_create_listing(&user(10, UserRole::Landlord)));
        assert!(can_create_listing(&user(99, UserRole::Admin)));
        assert!(!can_create_listing(&user(20, UserRole::Tenant)));
    }
}
