use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` extractor whose rejections (bad syntax, wrong field types, missing
/// content type) are reported as [`AppError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
