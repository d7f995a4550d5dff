//! Canned responses shared by the dispatcher and handlers.
//!
//! # Design Decisions
//! - Plain-text bodies, no HTML error pages
//! - Upstream transport failures map to 502 Bad Gateway

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Response for unmatched paths and guard rejections.
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed\n").into_response()
}

pub fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, "Malformed request\n").into_response()
}

/// Permanent redirect to `location`.
pub fn moved_permanently(location: String) -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}
