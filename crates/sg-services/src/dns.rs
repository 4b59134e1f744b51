//! `/dns`: validated hostname lookup through `nslookup`.

use std::sync::Arc;

use sg_core::process::executor::{CommandExecutor, SystemExecutor};
use sg_core::security::audit::{AuditAction, AuditEvent, AuditLogger, AuditResult};
use sg_core::security::input::{validate_hostname, ValidatedHostname};
use sg_core::system::dns::{self, NSLOOKUP};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::request::RequestParams;
use crate::response::Response;

pub const DNS_ENDPOINT: &str = "/dns";
pub const HOSTNAME_PARAM: &str = "hostname";

pub struct DnsService<E: CommandExecutor = SystemExecutor> {
    executor: E,
    permits: Semaphore,
    audit: Arc<dyn AuditLogger>,
}

impl DnsService<SystemExecutor> {
    /// Real `nslookup` with the configured deadline and spawn bound.
    pub fn from_config(config: &AppConfig, audit: Arc<dyn AuditLogger>) -> Self {
        Self::new(
            SystemExecutor::with_timeout(config.lookup_timeout),
            config.max_concurrent_lookups,
            audit,
        )
    }
}

impl<E: CommandExecutor> DnsService<E> {
    /// `max_concurrent` is clamped to at least one.
    pub fn new(executor: E, max_concurrent: usize, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            executor,
            permits: Semaphore::new(max_concurrent.max(1)),
            audit,
        }
    }

    pub async fn handle(&self, params: &RequestParams) -> Response {
        let request_id = Uuid::new_v4();
        let raw = params.get(HOSTNAME_PARAM);

        let hostname = match validate_hostname(raw.as_ref()) {
            Ok(hostname) => hostname,
            Err(e) => {
                let raw_len = raw.as_ref().map_or(0, |field| field.len());
                warn!(%request_id, reason = e.code(), raw_len, "Rejected hostname");
                self.audit.log_event(&AuditEvent::rejected(
                    request_id,
                    DNS_ENDPOINT,
                    HOSTNAME_PARAM,
                    e.code(),
                    raw_len,
                ));
                return Response::bad_request(e.to_string());
            }
        };

        match self.lookup(request_id, &hostname).await {
            Ok(output) => {
                self.audit.log_event(
                    &AuditEvent::new(
                        request_id,
                        AuditAction::CommandExecuted,
                        DNS_ENDPOINT,
                        AuditResult::Success,
                    )
                    .with_details(format!("{} {}", NSLOOKUP, hostname)),
                );
                Response::ok(output)
            }
            Err(message) => {
                self.audit.log_event(
                    &AuditEvent::new(
                        request_id,
                        AuditAction::CommandExecuted,
                        DNS_ENDPOINT,
                        AuditResult::Failure,
                    )
                    .with_details(format!("{} {}", NSLOOKUP, hostname)),
                );
                Response::internal_error(message)
            }
        }
    }

    /// Run `nslookup` once a spawn permit is free. Dropping this future
    /// kills the child and hands the permit back.
    async fn lookup(
        &self,
        request_id: Uuid,
        hostname: &ValidatedHostname,
    ) -> Result<String, String> {
        let _permit = self.permits.acquire().await.map_err(|e| {
            error!(%request_id, error = %e, "Lookup permits closed");
            "Lookup capacity unavailable".to_string()
        })?;

        let output = dns::lookup(&self.executor, hostname)
            .await
            .map_err(|e| e.to_string())?;
        info!(%request_id, "Lookup succeeded");
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
