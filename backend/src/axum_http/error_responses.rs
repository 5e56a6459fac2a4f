use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

/// Successful payloads are wrapped as `{ "data": ... }`.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

pub fn data_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(DataResponse { data })).into_response()
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message: message.into(),
    });

    (status, body).into_response()
}

/// Use-case errors that know their HTTP status and the text safe to show a client.
pub trait ApiError: std::error::Error {
    fn status_code(&self) -> StatusCode;

    fn client_message(&self) -> String {
        if self.status_code().is_server_error() {
            // Don't leak internal error detail to client
            return "Internal server error".to_string();
        }
        self.to_string()
    }
}

pub fn api_error_response<E: ApiError>(err: E) -> Response {
    error_response(err.status_code(), err.client_message())
}
