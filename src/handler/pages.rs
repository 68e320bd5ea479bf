//! Page handlers
//!
//! `view`, `edit` and `save` receive an already validated title; path
//! checking happens once in the router.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};

use super::error::PageError;
use crate::config::AppState;
use crate::http;
use crate::render::TemplateKind;
use crate::store::{Page, Title};

/// Form field carrying the page text
const BODY_FIELD: &str = "body";

type PageResult = Result<Response<Full<Bytes>>, PageError>;

/// Show a page, or send the client to the editor if it does not exist yet
pub async fn view(state: &AppState, title: &Title, is_head: bool) -> PageResult {
    match state.store.load(title).await {
        Ok(page) => render(state, TemplateKind::View, &page, is_head),
        Err(e) if e.is_not_found() => Ok(http::build_redirect_response(&format!("/edit/{title}"))),
        Err(e) => Err(e.into()),
    }
}

/// Show the edit form, empty for a page that does not exist yet
pub async fn edit(state: &AppState, title: &Title, is_head: bool) -> PageResult {
    let page = match state.store.load(title).await {
        Ok(page) => page,
        Err(e) if e.is_not_found() => Page::empty(title.clone()),
        Err(e) => return Err(e.into()),
    };
    render(state, TemplateKind::Edit, &page, is_head)
}

/// Store the submitted `body` field and redirect to the page view
pub async fn save<B>(state: &AppState, title: &Title, req: Request<B>) -> PageResult
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let query = req.uri().query().map(ToString::to_string);
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let limit = state.config.http.max_body_size;
    let body = read_body(req.into_body(), limit).await?;

    let text = http::form_value(query.as_deref(), content_type.as_deref(), &body, BODY_FIELD)
        .unwrap_or_default();
    let page = Page::new(title.clone(), text.into_bytes());
    state.store.save(&page).await?;

    Ok(http::build_redirect_response(&format!("/view/{title}")))
}

/// Collect the request body, failing with 413 past `limit` bytes
async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, PageError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(PageError::PayloadTooLarge { limit })
        }
        Err(e) => Err(PageError::BadRequest(e.to_string())),
    }
}

fn render(state: &AppState, kind: TemplateKind, page: &Page, is_head: bool) -> PageResult {
    let html = state.templates.render(kind, page)?;
    Ok(http::build_html_response(html, is_head))
}
