//! Actix Web error adapter for panel errors.
//!
//! Every handler returns `crate::error::Result`, so failures render uniformly as
//! `{"error": "<message>", "code": <status>}`.

use crate::error::Error;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code)
            .content_type("application/json")
            .json(json!({
                "error": self.to_string(),
                "code": status_code.as_u16()
            }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::ServerNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::ConfigParse(_) => StatusCode::BAD_REQUEST,
            Error::PortInUse(_) => StatusCode::BAD_REQUEST,
            Error::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
            Error::RuntimeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::ServerNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::PortInUse(25565).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::IllegalTransition {
                id: "x".into(),
                from: ServerStatus::Online,
                action: "start",
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Storage("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
