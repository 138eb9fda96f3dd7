//! Staff identity extraction.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::StaffId;
use event_store::{Catalog, EventStore};

use crate::error::ApiError;
use crate::state::AppState;

pub const STAFF_HEADER: &str = "x-staff-id";

/// The staff member acting on a staff route, taken from `x-staff-id`.
///
/// Identity plumbing only: the header is trusted as given, subject to the
/// configured allow-list.
#[derive(Debug, Clone)]
pub struct Staff(pub StaffId);

impl<S> FromRequestParts<Arc<AppState<S>>> for Staff
where
    S: EventStore + Catalog + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let staff = parts
            .headers
            .get(STAFF_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(StaffId::parse)
            .ok_or_else(|| ApiError::Unauthorized(format!("{STAFF_HEADER} header is required")))?;

        if !state.is_staff(&staff) {
            tracing::warn!(%staff, "staff id not on the allow-list");
            return Err(ApiError::Forbidden(format!("{staff} is not a staff member")));
        }

        Ok(Staff(staff))
    }
}
