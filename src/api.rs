//! HTTP request adapter
//!
//! Translates query parameters and request bodies into coordinator calls and
//! coordinator results into responses. Store work is blocking, so it runs on
//! actix's blocking thread pool.
//!
//! Uploads come in two shapes. A `multipart/form-data` body carries the file
//! as its first part with a filename, and the part supplies the filename and
//! content type. Any other body is stored as-is under the `filename` query
//! parameter with the request's `Content-Type`.

use actix_multipart::Multipart;
use actix_web::error::ErrorPayloadTooLarge;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{get, post, route, web, Error, HttpMessage, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::FileError;

/// Query parameters accepted by the file endpoints
#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    pub userid: Option<String>,
    pub filename: Option<String>,
}

fn required(value: &Option<String>, name: &str) -> Result<String, FileError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(FileError::Validation(format!("No {} found", name))),
    }
}

/// Pull the user out of the query string and tag the request's log lines with it
fn user_param(params: &FileParams) -> Result<String, FileError> {
    let user_id = required(&params.userid, "userid")?;
    log_mdc::insert("user", &user_id);
    Ok(user_id)
}

#[get("/healthcheck")]
pub async fn healthcheck() -> HttpResponse {
    HttpResponse::Ok().body("Alive")
}

/// A file pulled out of an upload request
struct Upload {
    filename: String,
    content_type: String,
    body: Bytes,
}

/// Collect a body stream into memory, refusing anything over `limit` bytes
async fn read_limited<S, E>(mut stream: S, limit: usize) -> Result<Bytes, Error>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Error>,
{
    let mut bytes = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::<Error>::into)?;
        if bytes.len() + chunk.len() > limit {
            warn!("Upload exceeds {} bytes", limit);
            return Err(ErrorPayloadTooLarge("Upload too large"));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes.freeze())
}

/// Take the first form part that carries a filename. Parts before it are
/// read and discarded.
async fn read_form_file(req: &HttpRequest, payload: web::Payload, limit: usize) -> Result<Upload, Error> {
    let mut form = Multipart::new(req.headers(), payload);
    while let Some(field) = form.next().await {
        let mut field = field?;
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        match filename {
            Some(filename) => {
                let content_type = field.content_type().map(|m| m.to_string()).unwrap_or_default();
                let body = read_limited(&mut field, limit).await?;
                return Ok(Upload {
                    filename,
                    content_type,
                    body,
                });
            }
            None => {
                read_limited(&mut field, limit).await?;
            }
        }
    }
    Err(FileError::Validation("No file content found".to_string()).into())
}

#[post("/uploadfile")]
pub async fn upload_file(
    params: web::Query<FileParams>,
    payload: web::Payload,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let owner_id = user_param(&params)?;
    let limit = app_state.config.server.max_payload_size;

    let upload = if req.content_type() == "multipart/form-data" {
        read_form_file(&req, payload, limit).await?
    } else {
        let filename = required(&params.filename, "filename")?;
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = read_limited(payload, limit).await?;
        Upload {
            filename,
            content_type,
            body,
        }
    };
    debug!("Received {} bytes for {}/{}", upload.body.len(), owner_id, upload.filename);

    let coordinator = app_state.coordinator.clone();
    let record = web::block(move || {
        let Upload {
            filename,
            content_type,
            body,
        } = upload;
        coordinator.upsert_file(&owner_id, &filename, &content_type, body.len() as u64, &body[..])
    })
    .await??;

    Ok(HttpResponse::Ok().json(record))
}

#[get("/downloadfile")]
pub async fn download_file(
    params: web::Query<FileParams>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let owner_id = user_param(&params)?;
    let filename = required(&params.filename, "filename")?;

    let coordinator = app_state.coordinator.clone();
    let (content_type, data) = web::block(move || {
        let fetched = coordinator.fetch_file(&owner_id, &filename)?;
        let content_type = fetched.record.content_type.clone();
        Ok::<_, FileError>((content_type, fetched.into_bytes()?))
    })
    .await??;

    Ok(HttpResponse::Ok().content_type(content_type).body(data))
}

#[get("/listfiles")]
pub async fn list_files(
    params: web::Query<FileParams>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let owner_id = user_param(&params)?;

    let coordinator = app_state.coordinator.clone();
    let files = web::block(move || coordinator.list_files(&owner_id)).await??;
    Ok(HttpResponse::Ok().json(files))
}

#[route("/deletefile", method = "GET", method = "DELETE")]
pub async fn delete_file(
    params: web::Query<FileParams>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let owner_id = user_param(&params)?;
    let filename = required(&params.filename, "filename")?;

    let coordinator = app_state.coordinator.clone();
    let (owner, name) = (owner_id.clone(), filename.clone());
    web::block(move || coordinator.delete_file(&owner, &name)).await??;

    info!("Deleted file {} for user {}", filename, owner_id);
    Ok(HttpResponse::Ok().body(format!("Deleted file '{}' for user '{}'", filename, owner_id)))
}

/// Register every file server route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(healthcheck)
        .service(upload_file)
        .service(download_file)
        .service(list_files)
        .service(delete_file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_param() {
        assert_eq!(required(&Some("u1".to_string()), "userid").unwrap(), "u1");
        assert!(matches!(required(&None, "userid"), Err(FileError::Validation(_))));
        assert!(matches!(required(&Some(" ".to_string()), "userid"), Err(FileError::Validation(_))));
    }

    #[test]
    fn test_user_param_reads_userid() {
        let params = FileParams {
            userid: Some("test_user".to_string()),
            filename: None,
        };
        assert_eq!(user_param(&params).unwrap(), "test_user");
        assert!(user_param(&FileParams::default()).is_err());
    }
}
