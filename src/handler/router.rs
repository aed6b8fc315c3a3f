//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method checks,
//! error translation and access logging.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue, IF_NONE_MATCH, REFERER, SERVER, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::handler::images;
use crate::http;
use crate::logger::{self, AccessLogEntry};

const GET_IMAGE_PREFIX: &str = "/get_image/";

/// Resolved target of a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Upload,
    ListImages,
    GetImage(&'a str),
    GetAllImages,
    Health,
    Unknown,
}

impl Route<'_> {
    /// Method accepted by the route; `HEAD` rides along with `GET`
    fn allowed_method(&self) -> Option<Method> {
        match self {
            Self::Upload => Some(Method::POST),
            Self::ListImages | Self::GetImage(_) | Self::GetAllImages | Self::Health => {
                Some(Method::GET)
            }
            Self::Unknown => None,
        }
    }
}

fn method_allowed(method: &Method, allowed: &Method) -> bool {
    method == allowed || (*allowed == Method::GET && *method == Method::HEAD)
}

/// `Allow` header value for a route accepting `allowed`
fn allow_header(allowed: &Method) -> &str {
    if *allowed == Method::GET {
        "GET, HEAD"
    } else {
        allowed.as_str()
    }
}

fn match_route<'a>(path: &'a str, state: &AppState) -> Route<'a> {
    let health = &state.config.routes.health;
    match path {
        "/upload" => Route::Upload,
        "/list_images" => Route::ListImages,
        "/get_all_images" => Route::GetAllImages,
        p if health.enabled && p == health.liveness_path => Route::Health,
        p => p
            .strip_prefix(GET_IMAGE_PREFIX)
            .map_or(Route::Unknown, Route::GetImage),
    }
}

/// Main entry point for HTTP request handling
///
/// Generic over the body so handlers can be driven without a socket.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = state
        .access_log_enabled()
        .then(|| access_entry(&req, remote_addr));

    let mut response = dispatch(req, &state).await;

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if let Some(entry) = entry.as_mut() {
        let body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.finish(response.status().as_u16(), body_bytes, started);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let route = match_route(&path, state);

    let Some(allowed) = route.allowed_method() else {
        return http::build_error_response(StatusCode::NOT_FOUND, "Not Found");
    };
    if !method_allowed(req.method(), &allowed) {
        logger::log_warning(&format!("Method not allowed: {} {path}", req.method()));
        return http::build_405_response(allow_header(&allowed));
    }

    let result = match route {
        Route::Upload => images::upload(req, state).await,
        Route::ListImages => images::list_images(state).await,
        Route::GetImage(raw_name) => {
            let filename = percent_decode_str(raw_name).decode_utf8_lossy();
            let if_none_match = req
                .headers()
                .get(IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            images::get_image(&filename, if_none_match.as_deref(), state).await
        }
        Route::GetAllImages => images::get_all_images(state).await,
        Route::Health => return http::build_health_response("ok"),
        Route::Unknown => return http::build_error_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    result.unwrap_or_else(|e| images::error_response(&e, route == Route::Upload))
}

fn access_entry<B>(req: &Request<B>, remote_addr: Option<SocketAddr>) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::header::{ALLOW, CONTENT_DISPOSITION, CONTENT_TYPE};

    fn state_for(dir: &tempfile::TempDir) -> Arc<AppState> {
        let mut cfg = Config::default();
        cfg.storage.upload_dir = dir.path().to_path_buf();
        cfg.logging.access_log = false;
        Arc::new(AppState::new(&cfg))
    }

    fn request(method: Method, uri: &str, body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        handle_request(req, Arc::clone(state), None).await.unwrap()
    }

    async fn body_of(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn test_match_route() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);
        assert_eq!(match_route("/upload", &state), Route::Upload);
        assert_eq!(match_route("/list_images", &state), Route::ListImages);
        assert_eq!(match_route("/get_all_images", &state), Route::GetAllImages);
        assert_eq!(
            match_route("/get_image/image_20240101000000.jpg", &state),
            Route::GetImage("image_20240101000000.jpg")
        );
        assert_eq!(match_route("/get_image/", &state), Route::GetImage(""));
        assert_eq!(match_route("/healthz", &state), Route::Health);
        assert_eq!(match_route("/", &state), Route::Unknown);
        assert_eq!(match_route("/upload/extra", &state), Route::Unknown);
    }

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        let response = send(&state, request(Method::POST, "/upload", b"\xff\xd8\xff\xe0")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(SERVER));
        let value: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        let filename = value["filename"].as_str().unwrap().to_string();

        let uri = format!("/get_image/{filename}");
        let response = send(&state, request(Method::GET, &uri, b"")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/jpeg");
        assert_eq!(&body_of(response).await[..], b"\xff\xd8\xff\xe0");
    }

    #[tokio::test]
    async fn test_fetch_percent_encoded_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my photo.png"), b"png").unwrap();
        let state = state_for(&dir);

        let response = send(&state, request(Method::GET, "/get_image/my%20photo.png", b"")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_fetch_missing_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        for uri in [
            "/get_image/missing.jpg",
            "/get_image/",
            "/get_image/..%2Fetc%2Fpasswd",
            "/get_image/a/b.jpg",
        ] {
            let response = send(&state, request(Method::GET, uri, b"")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_upload_empty_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        let response = send(&state, request(Method::POST, "/upload", b"")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(value["detail"], "No image provided");
    }

    #[tokio::test]
    async fn test_list_on_missing_directory_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.storage.upload_dir = dir.path().join("never-created");
        cfg.logging.access_log = false;
        let state = Arc::new(AppState::new(&cfg));

        let response = send(&state, request(Method::GET, "/list_images", b"")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let value: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(value["detail"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_get_all_images() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        let response = send(&state, request(Method::GET, "/get_all_images", b"")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::write(dir.path().join("a.jpg"), b"jpeg").unwrap();
        let response = send(&state, request(Method::GET, "/get_all_images", b"")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/x-zip-compressed");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=images.zip"
        );
        let zip = zip::ZipArchive::new(std::io::Cursor::new(body_of(response).await.to_vec())).unwrap();
        assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn test_wrong_method_and_unknown_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        let response = send(&state, request(Method::GET, "/upload", b"")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");

        let response = send(&state, request(Method::POST, "/list_images", b"x")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD");

        let response = send(&state, request(Method::HEAD, "/upload", b"")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = send(&state, request(Method::GET, "/nowhere", b"")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_follows_get() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.gif"), b"GIF89a").unwrap();
        let state = state_for(&dir);

        for uri in ["/list_images", "/get_image/a.gif", "/get_all_images", "/healthz"] {
            let response = send(&state, request(Method::HEAD, uri, b"")).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
        let response = send(&state, request(Method::HEAD, "/get_image/a.gif", b"")).await;
        assert_eq!(response.headers()[CONTENT_TYPE], "image/gif");
    }

    #[tokio::test]
    async fn test_internal_errors_only_echoed_by_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.storage.upload_dir = dir.path().join("never-created");
        cfg.logging.access_log = false;
        let state = Arc::new(AppState::new(&cfg));

        let response = send(&state, request(Method::POST, "/upload", b"\xff\xd8")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let value: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        let detail = value["detail"].as_str().unwrap();
        assert!(!detail.is_empty());
        assert_ne!(detail, "Internal Server Error");

        let response = send(&state, request(Method::GET, "/get_all_images", b"")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let value: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(value["detail"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        let response = send(&state, request(Method::GET, "/healthz", b"")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_of(response).await[..], b"ok");
    }
}
