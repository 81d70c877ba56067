// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps [`CoreError`] onto the wire error envelope: `{detail: string}`
//! with the HTTP status the error kind implies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meshctl_core::error::CoreError;
use meshctl_core::token::AuthError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(CoreError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { detail: self.0.detail() })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
