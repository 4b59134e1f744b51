use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sg_core::security::audit::{AuditLogger, FileAuditLogger, NullAuditLogger};
use sg_db::catalog::MySqlCatalog;
use sg_db::pool::{self, DbConfig};
use sg_services::config::AppConfig;
use sg_services::dns::{DnsService, HOSTNAME_PARAM};
use sg_services::page::PageService;
use sg_services::request::RequestParams;
use sg_services::response::{Response, StatusCode};
use sg_services::search::{SearchService, QUERY_PARAM};
use tracing::{info, warn};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_REJECTED: u8 = 2;

/// Run one request against a guarded handler and print the response body.
#[derive(Debug, Parser)]
#[command(name = "safeguard", version)]
pub struct Cli {
    #[command(subcommand)]
    pub endpoint: Endpoint,
}

#[derive(Debug, Subcommand)]
pub enum Endpoint {
    /// Render the greeting page.
    Page {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
    },
    /// Look up a hostname with nslookup.
    Dns {
        #[arg(long)]
        hostname: Option<String>,
    },
    /// Search product names in the catalog database.
    Search {
        #[arg(long)]
        query: Option<String>,
    },
}

impl Endpoint {
    /// Request parameters as a web front end would have received them.
    pub fn params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        let mut put = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                params.insert(key, value.as_str());
            }
        };
        match self {
            Self::Page { name, age } => {
                put("name", name);
                put("age", age);
            }
            Self::Dns { hostname } => put(HOSTNAME_PARAM, hostname),
            Self::Search { query } => put(QUERY_PARAM, query),
        }
        params
    }
}

pub fn exit_code(status: StatusCode) -> u8 {
    match status {
        StatusCode::Ok => EXIT_OK,
        StatusCode::BadRequest => EXIT_REJECTED,
        StatusCode::InternalServerError => EXIT_FAILURE,
    }
}

fn audit_logger(config: &AppConfig) -> Result<Arc<dyn AuditLogger>> {
    match config.audit_log_path.as_deref() {
        Some(path) => {
            let logger = FileAuditLogger::new(path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?;
            Ok(Arc::new(logger))
        }
        None => {
            warn!("Audit trail disabled");
            Ok(Arc::new(NullAuditLogger))
        }
    }
}

pub async fn run(config: &AppConfig) -> Result<u8> {
    let cli = Cli::parse();
    dispatch(config, &cli.endpoint).await
}

async fn dispatch(config: &AppConfig, endpoint: &Endpoint) -> Result<u8> {
    let audit = audit_logger(config)?;
    let params = endpoint.params();

    let response = match endpoint {
        Endpoint::Page { .. } => PageService::new().handle(&params),
        Endpoint::Dns { .. } => DnsService::from_config(config, audit).handle(&params).await,
        Endpoint::Search { .. } => {
            let db = DbConfig::from_env().context("Catalog database is not configured")?;
            let pool = pool::connect_with_retry(&db)
                .await
                .context("Failed to connect to catalog database")?;
            SearchService::new(MySqlCatalog::new(pool), audit)
                .handle(&params)
                .await
        }
    };

    emit(&response);
    Ok(exit_code(response.status))
}

fn emit(response: &Response) {
    info!(status = %response.status, bytes = response.body.len(), "Request handled");
    if response.status.is_success() {
        print!("{}", response.body);
    } else {
        eprintln!("{}", response.body);
    }
}
