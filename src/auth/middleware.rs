use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use diesel::prelude::*;

use crate::auth::jwt::{self, TokenError, TokenKind, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::{session_jar, CurrentUser};
use crate::models::User;
use crate::Context;

/// Endpoints that issue or revoke the session cookies themselves.
const AUTH_PATHS: &[&str] = &["/api/login", "/api/logout", "/api/users/register"];

/// Reads the `access_token` cookie and turns it into a [`CurrentUser`]
/// request extension. When the access token has expired but the refresh
/// cookie is still valid, a fresh pair is minted *before* dispatch, so the
/// handler runs exactly once and the response carries the new cookies.
///
/// An absent or invalid token is not an error here; protected handlers
/// reject via the [`CurrentUser`] extractor instead.
pub async fn authenticate<B>(
    State(ctx): State<Context>,
    jar: CookieJar,
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    if AUTH_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let Some(access) = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()) else {
        return next.run(req).await;
    };

    match jwt::verify(&ctx.config.jwt_secret, &access, TokenKind::Access) {
        Ok(claims) => {
            if let Some(user) = load_user(&ctx, claims.sub).await {
                req.extensions_mut().insert(user);
            }
            next.run(req).await
        }
        Err(TokenError::Expired) => refresh_and_dispatch(ctx, jar, req, next).await,
        Err(TokenError::Invalid) => next.run(req).await,
    }
}

async fn refresh_and_dispatch<B>(
    ctx: Context,
    jar: CookieJar,
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    let Some(refresh) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        return next.run(req).await;
    };

    let claims = match jwt::verify(&ctx.config.jwt_secret, &refresh, TokenKind::Refresh) {
        Ok(claims) => claims,
        Err(_) => return next.run(req).await,
    };

    let Ok(pair) = jwt::mint_pair(&ctx.config, claims.sub) else {
        return next.run(req).await;
    };

    let Some(user) = load_user(&ctx, claims.sub).await else {
        return next.run(req).await;
    };

    tracing::debug!(user_id = user.id, "access token refreshed from cookie");
    req.extensions_mut().insert(user);

    let response = next.run(req).await;
    (session_jar(CookieJar::default(), &pair), response).into_response()
}

async fn load_user(ctx: &Context, user_id: i32) -> Option<CurrentUser> {
    use crate::schema::users;

    ctx.db(move |conn| {
        users::table
            .find(user_id)
            .first::<User>(conn)
            .optional()
            .map_err(Into::into)
    })
    .await
    .ok()
    .flatten()
    .map(CurrentUser::from)
}
