use rocket::http::{ContentType, Header, Status};
use rocket::serde::json::Json;
use rocket::State;
use rocket::{request::Request, response::{self, Responder, Response}};
use serde_json::{json, Value};
use std::io::Cursor;

use crate::access::AccessPolicy;
use crate::api::ApiError;
use crate::migrator::tools::content_type_for;
use crate::models::{ImageRecord, StatusResponse};
use crate::resolver::{IdentifierResolver, ResolverError};

fn require_id(rft_id: Option<String>) -> Result<String, ApiError> {
    match rft_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError::BadRequest("rft_id is required".to_string())),
    }
}

async fn resolve_allowed(
    rft_id: Option<String>,
    resolver: &IdentifierResolver,
    access: &AccessPolicy,
) -> Result<ImageRecord, ApiError> {
    let id = require_id(rft_id)?;

    access.check(&id).map_err(ApiError::Forbidden)?;

    let record = resolver.resolve(&id).await?;
    log::debug!("Resolved {} to {:?}", id, record.local_path);

    Ok(record)
}

#[get("/resolve?<rft_id>")]
pub async fn resolve_record(
    rft_id: Option<String>,
    resolver: &State<IdentifierResolver>,
    access: &State<AccessPolicy>,
) -> Result<Json<ImageRecord>, ApiError> {
    let record = resolve_allowed(rft_id, resolver, access).await?;
    Ok(Json(record))
}

#[get("/image?<rft_id>")]
pub async fn get_image(
    rft_id: Option<String>,
    resolver: &State<IdentifierResolver>,
    access: &State<AccessPolicy>,
) -> Result<ImageFile, ApiError> {
    let record = resolve_allowed(rft_id, resolver, access).await?;

    let path = match record.local_path {
        Some(path) => path,
        None => return Err(ResolverError::NotFound(record.identifier).into()),
    };

    let data = rocket::tokio::fs::read(&path).await?;

    let content_type = content_type_for(&path, &data);

    Ok(ImageFile { data, content_type })
}

#[get("/status?<rft_id>")]
pub fn get_status(
    rft_id: Option<String>,
    resolver: &State<IdentifierResolver>,
) -> Result<(Status, Json<StatusResponse>), ApiError> {
    let id = require_id(rft_id)?;
    let status = resolver.status(&id);

    let code = Status::from_code(status.http_code()).unwrap_or(Status::InternalServerError);

    Ok((code, Json(StatusResponse { identifier: id, status })))
}

#[post("/rescan")]
pub fn rescan(resolver: &State<IdentifierResolver>) -> Json<Value> {
    let indexed = resolver.rescan();
    Json(json!({ "indexed": indexed }))
}

// Responder for image data
pub struct ImageFile {
    pub data: Vec<u8>,
    pub content_type: &'static str,
}

impl<'r> Responder<'r, 'static> for ImageFile {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let content_type = ContentType::parse_flexible(self.content_type).unwrap_or(ContentType::Binary);
        let etag = format!("\"{:x}\"", md5::compute(&self.data));

        // Check If-None-Match header
        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(Header::new("ETag", etag))
                    .header(Header::new("Cache-Control", "public, max-age=86400"))
                    .ok();
            }
        }

        Response::build()
            .header(content_type)
            .header(Header::new("Cache-Control", "public, max-age=86400"))
            .header(Header::new("ETag", etag))
            .sized_body(None, Cursor::new(self.data))
            .ok()
    }
}
