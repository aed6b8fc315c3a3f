//! HTTP response building module
//!
//! Builders for every response the image endpoints produce. Builder failures
//! are logged and degrade to an empty response instead of panicking.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ALLOW, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::cache;
use super::mime;
use crate::store::StoredImage;

/// Build JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            return build_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, json.len())
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build error response with a `{"detail": ...}` JSON body
pub fn build_error_response(status: StatusCode, detail: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "detail": detail }).to_string();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len())
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<Full<Bytes>> {
    let mut response = build_error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    if let Ok(value) = allow.parse() {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

/// Build health check response
pub fn build_health_response(status: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain")
        .header(CACHE_CONTROL, "no-cache, no-store")
        .body(Full::new(Bytes::from(status.to_string())))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, etag)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build response carrying one stored image
///
/// Answers 304 when the client already holds the same content.
pub fn build_image_response(image: StoredImage, if_none_match: Option<&str>) -> Response<Full<Bytes>> {
    let validators = cache::Validators::for_content(&image.data, image.modified);
    if validators.not_modified(if_none_match) {
        return build_304_response(&validators.etag);
    }

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, image.content_type)
        .header(CONTENT_LENGTH, image.data.len())
        .header(ETAG, &validators.etag);
    if let Some(last_modified) = validators.last_modified {
        builder = builder.header(LAST_MODIFIED, last_modified);
    }

    builder
        .body(Full::new(Bytes::from(image.data)))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build the `images.zip` attachment response; the buffer moves into the body
pub fn build_archive_response(archive: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, mime::ZIP_ARCHIVE)
        .header(CONTENT_LENGTH, archive.len())
        .header(CONTENT_DISPOSITION, "attachment; filename=images.zip")
        .body(Full::new(Bytes::from(archive)))
        .unwrap_or_else(|e| {
            log_build_error("archive", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = build_error_response(StatusCode::NOT_FOUND, "Image not found!");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["detail"], "Image not found!");
    }

    #[test]
    fn test_405_sets_allow() {
        let response = build_405_response("POST");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_image_response_and_revalidation() {
        let image = || StoredImage {
            name: "a.png".to_string(),
            data: b"png bytes".to_vec(),
            content_type: "image/png",
            modified: Some(std::time::SystemTime::UNIX_EPOCH),
        };

        let response = build_image_response(image(), None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[LAST_MODIFIED],
            "Thu, 01 Jan 1970 00:00:00 GMT"
        );
        let etag = response.headers()[ETAG].to_str().unwrap().to_string();
        assert_eq!(&body_bytes(response).await[..], b"png bytes");

        let cached = build_image_response(image(), Some(&etag));
        assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);
        assert!(body_bytes(cached).await.is_empty());
    }

    #[test]
    fn test_archive_headers() {
        let response = build_archive_response(vec![1, 2, 3]);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/x-zip-compressed");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=images.zip"
        );
        assert_eq!(response.headers()[CONTENT_LENGTH], "3");
    }
}
