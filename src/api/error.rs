use crate::resolver::ResolverError;
use rocket::http::{ContentType, Status};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    ResolverError(ResolverError),
    Forbidden(String),
    BadRequest(String),
    FileError(std::io::Error),
}

impl From<ResolverError> for ApiError {
    fn from(error: ResolverError) -> Self {
        ApiError::ResolverError(error)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        ApiError::FileError(error)
    }
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::ResolverError(ResolverError::NotFound(_)) => Status::NotFound,
            ApiError::ResolverError(ResolverError::Conversion { .. }) => Status::BadGateway,
            ApiError::ResolverError(ResolverError::Timeout { .. }) => Status::GatewayTimeout,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::FileError(_) => Status::InternalServerError,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ApiError::ResolverError(ResolverError::NotFound(id)) => json!({
                "error": "Not found",
                "message": format!("{} not found", id)
            }),
            ApiError::ResolverError(error @ ResolverError::Conversion { .. }) => json!({
                "error": "Conversion failed",
                "message": error.to_string()
            }),
            ApiError::ResolverError(error @ ResolverError::Timeout { .. }) => json!({
                "error": "Still processing",
                "message": error.to_string()
            }),
            ApiError::Forbidden(host) => json!({
                "error": "Forbidden",
                "message": format!("Host '{}' not allowed", host)
            }),
            ApiError::BadRequest(message) => json!({
                "error": "Invalid Request",
                "message": message
            }),
            ApiError::FileError(error) => json!({
                "error": "Image unreadable",
                "message": error.to_string()
            }),
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            log::error!("Request failed: {:?}", self);
        }

        let body = self.body().to_string();

        rocket::Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(None, std::io::Cursor::new(body))
            .ok()
    }
}
