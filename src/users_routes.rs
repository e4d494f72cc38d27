use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{clear_session, jwt, password, session_jar};
use crate::errors::is_unique_violation;
use crate::models::{NewUser, User, UserChanges, UserPublic, UserRole};
use crate::permissions::is_admin;
use crate::prelude::*;
use crate::schema::users;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_2: String,
}

pub async fn register(
    State(ctx): State<Context>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserPublic>), ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::Validation("username must not be empty".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("enter a valid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters long".into(),
        ));
    }
    if req.password != req.password_2 {
        return Err(ApiError::Validation("passwords do not match".into()));
    }

    let new_user = NewUser {
        username,
        email: req.email.trim().to_string(),
        password_hash: password::hash(&req.password)?,
        role: UserRole::Tenant,
        is_verified: false,
    };

    let user = ctx
        .db(move |conn| {
            diesel::insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    if is_unique_violation(&e, "") {
                        ApiError::Validation(
                            "a user with that username or email already exists".into(),
                        )
                    } else {
                        e.into()
                    }
                })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(ctx): State<Context>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = ctx
        .db(move |conn| {
            users::table
                .filter(users::username.eq(username))
                .first::<User>(conn)
                .optional()
                .map_err(Into::into)
        })
        .await?;

    // Same rejection for unknown user and bad password.
    let user = user.ok_or(ApiError::Unauthorized)?;
    if !password::verify(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let pair = jwt::mint_pair(&ctx.config, user.id).map_err(|_| ApiError::Unauthorized)?;
    tracing::info!(user_id = user.id, "login successful");

    Ok((
        session_jar(jar, &pair),
        Json(json!({ "detail": "login successful" })),
    ))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (clear_session(jar), StatusCode::NO_CONTENT)
}

pub async fn me(State(ctx): State<Context>, user: CurrentUser) -> Result<Json<UserPublic>, ApiError> {
    let row = ctx
        .db(move |conn| {
            users::table
                .find(user.id)
                .first::<User>(conn)
                .map_err(Into::into)
        })
        .await?;
    Ok(Json(row.into()))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
}

pub async fn update_me(
    State(ctx): State<Context>,
    user: CurrentUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<UserPublic>, ApiError> {
    if let Some(email) = &req.email {
        if !email.contains('@') {
            return Err(ApiError::Validation("enter a valid email address".into()));
        }
    }

    let changes = UserChanges {
        email: req.email,
        ..Default::default()
    }
    .promote_if_verified(user.role, user.is_verified);

    let row = apply_user_changes(&ctx, user.id, changes).await?;
    Ok(Json(row.into()))
}

pub async fn list_users(
    State(ctx): State<Context>,
    user: CurrentUser,
) -> Result<Json<Vec<UserPublic>>, ApiError> {
    if !is_admin(&user) {
        return Err(ApiError::Forbidden("admin access required".into()));
    }

    let rows = ctx
        .db(|conn| {
            users::table
                .order(users::id.asc())
                .load::<User>(conn)
                .map_err(Into::into)
        })
        .await?;

    Ok(Json(rows.into_iter().map(UserPublic::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct AdminUserUpdate {
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub is_verified: Option<bool>,
}

pub async fn admin_update_user(
    State(ctx): State<Context>,
    user: CurrentUser,
    Path(target_id): Path<i32>,
    Json(req): Json<AdminUserUpdate>,
) -> Result<Json<UserPublic>, ApiError> {
    if !is_admin(&user) {
        return Err(ApiError::Forbidden("admin access required".into()));
    }

    let target = ctx
        .db(move |conn| {
            users::table
                .find(target_id)
                .first::<User>(conn)
                .optional()
                .map_err(Into::into)
        })
        .await?
        .ok_or(ApiError::NotFound)?;

    let changes = UserChanges {
        email: req.email,
        role: req.role,
        is_verified: req.is_verified,
    }
    .promote_if_verified(target.role, target.is_verified);

    let row = apply_user_changes(&ctx, target_id, changes).await?;
    Ok(Json(row.into()))
}

async fn apply_user_changes(
    ctx: &Context,
    user_id: i32,
    changes: UserChanges,
) -> Result<User, ApiError> {
    let no_changes =
        changes.email.is_none() && changes.role.is_none() && changes.is_verified.is_none();

    ctx.db(move |conn| {
        if no_changes {
            return users::table.find(user_id).first::<User>(conn).map_err(Into::into);
        }
        diesel::update(users::table.find(user_id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(conn)
            .map_err(|e| {
                if is_unique_violation(&e, "") {
                    ApiError::Validation("a user with that email already exists".into())
                } else {
                    e.into()
                }
            })
    })
    .await
}
