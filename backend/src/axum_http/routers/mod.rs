use axum::{body::Bytes, http::StatusCode, response::Response};
use serde::de::DeserializeOwned;

use crate::axum_http::error_responses::error_response;

pub mod boosts;
pub mod credits;
pub mod notifications;
pub mod payments;
pub mod relations;
pub mod subscriptions;

/// JSON body that may be omitted entirely; an empty body reads as `T::default()`.
pub(crate) fn optional_json_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body)
        .map_err(|err| error_response(StatusCode::BAD_REQUEST, format!("invalid JSON body: {err}")))
}
