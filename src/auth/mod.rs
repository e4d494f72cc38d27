pub mod jwt;
pub mod middleware;
pub mod password;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

use crate::errors::ApiError;
use crate::models::{User, UserRole};

use self::jwt::{TokenPair, ACCESS_COOKIE, REFRESH_COOKIE};

/// The authenticated actor, loaded fresh from the database by the auth
/// middleware and passed explicitly down to validators and queries.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_verified: bool,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<User> for CurrentUser {
    fn from(u: User) -> Self {
        CurrentUser {
            id: u.id,
            username: u.username,
            role: u.role,
            is_verified: u.is_verified,
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Optional variant of [`CurrentUser`] for endpoints that are public but
/// behave differently for signed-in users (listing reads, search logging).
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Attach both HttpOnly session cookies to the jar.
pub fn session_jar(jar: CookieJar, pair: &TokenPair) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access.clone()))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh.clone()))
}

/// Expire both session cookies.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    let mut access = Cookie::named(ACCESS_COOKIE);
    access.set_path("/");
    let mut refresh = Cookie::named(REFRESH_COOKIE);
    refresh.set_path("/");
    jar.remove(access).remove(refresh)
}
