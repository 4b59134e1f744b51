//! `/page`: greeting rendered from a fixed template.

use once_cell::sync::Lazy;
use sg_core::security::template::Template;
use tracing::debug;

use crate::request::RequestParams;
use crate::response::Response;

pub const PAGE_ENDPOINT: &str = "/page";

/// `name` falls back to an empty string, `age` to the default `unknown`.
static PAGE_TEMPLATE: Lazy<Template> = Lazy::new(|| {
    Template::new("Hello {name}! Your age is {age}.")
        .unwrap()
        .with_fallback("name", "")
});

pub struct PageService;

impl PageService {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, params: &RequestParams) -> Response {
        let body = PAGE_TEMPLATE.render(params);
        debug!(endpoint = PAGE_ENDPOINT, bytes = body.len(), "Rendered page");
        Response::ok(body)
    }
}

impl Default for PageService {
    fn default() -> Self {
        Self::new()
    }
}
