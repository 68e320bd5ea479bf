//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body size validation, page path
//! matching, dispatch to the page handlers and access logging.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use hyper::header::{HeaderValue, SERVER};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use super::error::PageError;
use super::pages;
use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::store::Title;

/// `/(edit|save|view)/<title>` with an alphanumeric title
static VALID_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(edit|save|view)/([a-zA-Z0-9]+)$").unwrap());

/// Page operation selected by the first path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    View,
    Edit,
    Save,
}

/// A validated page path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    pub action: PageAction,
    pub title: Title,
}

impl PageRoute {
    /// Match a request path, `None` if it is not a page path
    pub fn parse(path: &str) -> Option<Self> {
        let caps = VALID_PATH.captures(path)?;
        let action = match &caps[1] {
            "view" => PageAction::View,
            "edit" => PageAction::Edit,
            "save" => PageAction::Save,
            _ => return None,
        };
        let title = Title::new(&caps[2])?;
        Some(Self { action, title })
    }
}

/// Request fields kept for the access log after the request is consumed
struct RequestInfo {
    method: Method,
    path: String,
    query: Option<String>,
    http_version: String,
    referer: Option<String>,
    user_agent: Option<String>,
}

impl RequestInfo {
    fn from_request<B>(req: &Request<B>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        let http_version = format!("{:?}", req.version())
            .trim_start_matches("HTTP/")
            .to_string();

        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(ToString::to_string),
            http_version,
            referer: header("referer"),
            user_agent: header("user-agent"),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let info = RequestInfo::from_request(&req);

    let mut response = match route_request(req, &state).await {
        Ok(resp) => resp,
        Err(e) => {
            if e.status().is_server_error() {
                logger::log_error(&format!("{} {}: {e}", info.method, info.path));
            } else {
                logger::log_debug(&format!("{} {}: {e}", info.method, info.path));
            }
            e.into_response()
        }
    };

    set_server_header(&mut response, &state.config.http.server_name);

    if state.access_log() {
        log_access(&state, &info, remote_addr, &response, started);
    }

    Ok(response)
}

/// Validate the request, extract the title and run the page handler
async fn route_request<B>(
    req: Request<B>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, PageError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = decode_path(req.uri().path()).ok_or(PageError::InvalidPath)?;
    let route = PageRoute::parse(&path).ok_or(PageError::InvalidPath)?;
    check_body_size(&req, state.config.http.max_body_size)?;

    let is_head = req.method() == Method::HEAD;
    match route.action {
        PageAction::View => pages::view(state, &route.title, is_head).await,
        PageAction::Edit => pages::edit(state, &route.title, is_head).await,
        PageAction::Save => pages::save(state, &route.title, req).await,
    }
}

/// Percent-decode a request path, `None` if the result is not UTF-8
fn decode_path(raw: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(raw).decode_utf8().ok()
}

/// Tag the response with the configured `Server` name
fn set_server_header(response: &mut Response<Full<Bytes>>, server_name: &str) {
    match HeaderValue::from_str(server_name) {
        Ok(value) => {
            response.headers_mut().insert(SERVER, value);
        }
        Err(e) => logger::log_warning(&format!("Invalid server_name '{server_name}': {e}")),
    }
}

/// Reject requests whose declared Content-Length exceeds the limit
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Result<(), PageError> {
    let Some(content_length) = req.headers().get("content-length") else {
        return Ok(());
    };
    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return Ok(());
    };
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Err(PageError::PayloadTooLarge {
                limit: max_body_size,
            })
        }
        Ok(_) => Ok(()),
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            Ok(())
        }
    }
}

fn log_access(
    state: &AppState,
    info: &RequestInfo,
    remote_addr: SocketAddr,
    response: &Response<Full<Bytes>>,
    started: Instant,
) {
    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        info.method.to_string(),
        info.path.clone(),
    );
    entry.query.clone_from(&info.query);
    entry.http_version.clone_from(&info.http_version);
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer.clone_from(&info.referer);
    entry.user_agent.clone_from(&info.user_agent);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::render::Templates;
    use crate::store::{Page, PageStore};
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use tempfile::TempDir;

    const FORM: &str = "application/x-www-form-urlencoded";

    fn test_state(dir: &TempDir) -> Arc<AppState> {
        let mut config = Config::load_from("__pagewiki_missing_config__").unwrap();
        config.logging.access_log = false;
        config.http.max_body_size = 64;
        let templates = Templates::from_sources(
            "<h1>{{title}}</h1><div>{{body}}</div>",
            "<form action=\"/save/{{title}}\"><textarea>{{body}}</textarea></form>",
        )
        .unwrap();
        let store = PageStore::open(dir.path().join("pages")).unwrap();
        Arc::new(AppState::new(config, templates, store))
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", FORM)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> (StatusCode, String, String) {
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let resp = handle_request(req, Arc::clone(state), addr).await.unwrap();
        let status = resp.status();
        let location = resp
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, location, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_parse_routes() {
        let route = PageRoute::parse("/view/FrontPage").unwrap();
        assert_eq!(route.action, PageAction::View);
        assert_eq!(route.title.as_str(), "FrontPage");
        assert_eq!(PageRoute::parse("/edit/a1").unwrap().action, PageAction::Edit);
        assert_eq!(PageRoute::parse("/save/Z").unwrap().action, PageAction::Save);
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for path in [
            "/",
            "/view",
            "/view/",
            "/view/foo-bar",
            "/view/foo/bar",
            "/view/foo/",
            "/view/../secret",
            "/delete/Foo",
            "/VIEW/Foo",
            "view/Foo",
            "/view/Foo.txt",
        ] {
            assert!(PageRoute::parse(path).is_none(), "{path} should not match");
        }
    }

    #[tokio::test]
    async fn test_malformed_path_is_404_for_any_method() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        for method in ["GET", "POST", "PUT", "DELETE"] {
            let (status, _, _) = send(&state, request(method, "/view/bad-title", "")).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _, _) = send(&state, request("GET", "/", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_view_missing_redirects_to_edit() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (status, location, _) = send(&state, request("GET", "/view/NewPage", "")).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(location, "/edit/NewPage");
    }

    #[tokio::test]
    async fn test_save_then_view() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, location, _) = send(&state, request("POST", "/save/Foo", "body=hi")).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(location, "/view/Foo");

        let (status, _, body) = send(&state, request("GET", &location, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Foo</h1><div>hi</div>");
    }

    #[tokio::test]
    async fn test_edit_missing_is_empty_form() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (status, _, body) = send(&state, request("GET", "/edit/Fresh", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "<form action=\"/save/Fresh\"><textarea></textarea></form>"
        );
    }

    #[tokio::test]
    async fn test_edit_existing_prefills_body() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        state
            .store
            .save(&Page::new(Title::new("Foo").unwrap(), b"stored <text>".to_vec()))
            .await
            .unwrap();

        let (status, _, body) = send(&state, request("GET", "/edit/Foo", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<textarea>stored &lt;text&gt;</textarea>"));
    }

    #[tokio::test]
    async fn test_save_empty_body_creates_empty_page() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (status, _, _) = send(&state, request("POST", "/save/Empty", "body=")).await;
        assert_eq!(status, StatusCode::FOUND);

        let page = state.store.load(&Title::new("Empty").unwrap()).await.unwrap();
        assert!(page.body.is_empty());

        let (status, _, body) = send(&state, request("GET", "/view/Empty", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Empty</h1><div></div>");
    }

    #[tokio::test]
    async fn test_save_from_query_string() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (status, _, _) = send(&state, request("GET", "/save/Q?body=via+query", "")).await;
        assert_eq!(status, StatusCode::FOUND);
        let page = state.store.load(&Title::new("Q").unwrap()).await.unwrap();
        assert_eq!(page.body, b"via query");
    }

    #[tokio::test]
    async fn test_save_storage_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        // A directory in place of the backing file makes the write fail
        std::fs::create_dir(state.store.path_for(&Title::new("Locked").unwrap())).unwrap();

        let (status, _, body) = send(&state, request("POST", "/save/Locked", "body=x")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Locked.txt"));
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_viewable_and_editable() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        std::fs::write(
            state.store.path_for(&Title::new("Bin").unwrap()),
            [b'o', b'k', 0xff],
        )
        .unwrap();

        let (status, _, body) = send(&state, request("GET", "/view/Bin", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Bin</h1><div>ok\u{FFFD}</div>");

        let (status, _, body) = send(&state, request("GET", "/edit/Bin", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<textarea>ok\u{FFFD}</textarea>"));
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        send(&state, request("POST", "/save/Foo", "body=hi")).await;

        let (status, _, body) = send(&state, request("GET", "/view/%46oo", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Foo</h1><div>hi</div>");

        // Decoded separators and invalid UTF-8 still fail the title pattern
        for path in ["/view/a%2Fb", "/view/%2E%2E", "/view/%FF"] {
            let (status, _, _) = send(&state, request("GET", path, "")).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[tokio::test]
    async fn test_server_header_on_every_response() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        for uri in ["/view/Nobody", "/edit/Nobody", "/not/a/page"] {
            let resp = handle_request(request("GET", uri, ""), Arc::clone(&state), addr)
                .await
                .unwrap();
            assert_eq!(resp.headers()["Server"], "pagewiki", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let big = format!("body={}", "a".repeat(100));

        let (status, _, _) = send(&state, request("POST", "/save/Big", &big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let mut declared = request("POST", "/save/Big", "body=a");
        declared
            .headers_mut()
            .insert("content-length", hyper::header::HeaderValue::from_static("1000"));
        let (status, _, _) = send(&state, declared).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        assert!(state
            .store
            .load(&Title::new("Big").unwrap())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_head_view_has_no_body() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        send(&state, request("POST", "/save/Foo", "body=hi")).await;

        let (status, _, body) = send(&state, request("HEAD", "/view/Foo", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }
}
