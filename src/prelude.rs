pub use axum::extract::{Path, Query, State};
pub use axum::http::StatusCode;
pub use axum::response::IntoResponse;
pub use axum::Json;
pub use diesel::prelude::*;

pub use crate::auth::{CurrentUser, MaybeUser};
pub use crate::errors::ApiError;
pub use crate::Context;
