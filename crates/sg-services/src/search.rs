//! `/search`: product name lookup with escaped results.

use std::sync::Arc;

use once_cell::sync::Lazy;
use sg_core::security::audit::{AuditAction, AuditEvent, AuditLogger, AuditResult};
use sg_core::security::field::UntrustedField;
use sg_core::security::template::{FieldSource, Template};
use sg_db::catalog::ProductCatalog;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::request::RequestParams;
use crate::response::Response;

pub const SEARCH_ENDPOINT: &str = "/search";
pub const QUERY_PARAM: &str = "query";

static PRODUCT_LINE: Lazy<Template> =
    Lazy::new(|| Template::new("Found product: {name}\n").unwrap());

/// A single stored product name, treated as untrusted like any request value.
struct ProductName<'a>(&'a str);

impl FieldSource for ProductName<'_> {
    fn field(&self, name: &str) -> Option<UntrustedField> {
        (name == "name").then(|| UntrustedField::new(self.0))
    }
}

pub struct SearchService<C: ProductCatalog> {
    catalog: C,
    audit: Arc<dyn AuditLogger>,
}

impl<C: ProductCatalog> SearchService<C> {
    pub fn new(catalog: C, audit: Arc<dyn AuditLogger>) -> Self {
        Self { catalog, audit }
    }

    pub async fn handle(&self, params: &RequestParams) -> Response {
        let request_id = Uuid::new_v4();

        let query = match params.get(QUERY_PARAM) {
            Some(query) if !query.is_empty() => query,
            _ => {
                warn!(%request_id, "Rejected search without query");
                self.audit.log_event(&AuditEvent::rejected(
                    request_id,
                    SEARCH_ENDPOINT,
                    QUERY_PARAM,
                    "MISSING",
                    0,
                ));
                return Response::bad_request("Query parameter is missing");
            }
        };

        match self.catalog.search_names(query.as_raw()).await {
            Ok(names) => {
                info!(%request_id, results = names.len(), "Search complete");
                self.audit.log_event(
                    &AuditEvent::new(
                        request_id,
                        AuditAction::CatalogSearch,
                        SEARCH_ENDPOINT,
                        AuditResult::Success,
                    )
                    .with_details(format!("results={}", names.len())),
                );
                let body: String = names
                    .iter()
                    .map(|name| PRODUCT_LINE.render(&ProductName(name)))
                    .collect();
                Response::ok(body)
            }
            Err(e) => {
                // Store errors can carry SQL text; keep them in the log only.
                error!(%request_id, error = %e, "Search query failed");
                self.audit.log_event(&AuditEvent::new(
                    request_id,
                    AuditAction::CatalogSearch,
                    SEARCH_ENDPOINT,
                    AuditResult::Failure,
                ));
                Response::internal_error("Query execution failed")
            }
        }
    }
}
