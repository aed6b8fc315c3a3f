//! Image endpoint handlers
//!
//! Each handler is a single-shot transformation from request to response.
//! Store errors bubble up as `ImageError` and are turned into a status code
//! by [`error_response`].

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_LENGTH;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

use crate::config::AppState;
use crate::error::ImageError;
use crate::http;
use crate::logger;

#[derive(Debug, Serialize)]
struct UploadReply<'a> {
    message: &'a str,
    filename: &'a str,
}

#[derive(Debug, Serialize)]
struct ListReply<'a> {
    message: &'a str,
    files: &'a [String],
}

/// `POST /upload`
pub async fn upload<B>(req: Request<B>, state: &AppState) -> Result<Response<Full<Bytes>>, ImageError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let data = read_body(req, state.config.http.max_body_size).await?;
    let filename = state.store.save(&data).await?;

    logger::log_info(&format!("Stored {} bytes as {filename}", data.len()));
    Ok(http::json_response(
        StatusCode::OK,
        &UploadReply {
            message: "Image received",
            filename: &filename,
        },
    ))
}

/// `GET /list_images`
pub async fn list_images(state: &AppState) -> Result<Response<Full<Bytes>>, ImageError> {
    let files = state.store.list_images().await?;
    let message = if files.is_empty() {
        "No images found"
    } else {
        "Images retrieved successfully"
    };

    Ok(http::json_response(
        StatusCode::OK,
        &ListReply {
            message,
            files: &files,
        },
    ))
}

/// `GET /get_image/{filename}`
pub async fn get_image(
    filename: &str,
    if_none_match: Option<&str>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, ImageError> {
    let image = state.store.read_image(filename).await?;
    Ok(http::build_image_response(image, if_none_match))
}

/// `GET /get_all_images`
pub async fn get_all_images(state: &AppState) -> Result<Response<Full<Bytes>>, ImageError> {
    let archive = state.store.archive_all().await?;
    Ok(http::build_archive_response(archive))
}

/// Translate a handler failure into its HTTP response
///
/// Internal failures are logged; their detail reaches the client only when
/// `expose_internal` is set (the upload endpoint).
pub fn error_response(err: &ImageError, expose_internal: bool) -> Response<Full<Bytes>> {
    if err.is_internal() {
        logger::log_error(&format!("Unexpected server error: {err}"));
        if !expose_internal {
            return http::build_error_response(err.status(), "Internal Server Error");
        }
    } else if err.status() == StatusCode::NOT_FOUND {
        logger::log_warning(&err.to_string());
    }
    http::build_error_response(err.status(), &err.to_string())
}

/// Collect the request body, enforcing the configured size limit
async fn read_body<B>(req: Request<B>, max_body_size: u64) -> Result<Bytes, ImageError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let too_large = || ImageError::PayloadTooLarge { max: max_body_size };

    // Reject early on a declared length
    if let Some(length) = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if length > max_body_size {
            return Err(too_large());
        }
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(too_large()),
        Err(e) => Err(ImageError::ClientError(format!(
            "Failed to read request body: {e}"
        ))),
    }
}
