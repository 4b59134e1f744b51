use std::future::Future;

use sqlx::mysql::MySqlPool;
use tracing::debug;

use crate::pool::DbError;

/// Read access to product names.
pub trait ProductCatalog: Send + Sync {
    /// Names of products whose name contains `query`.
    fn search_names(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<String>, DbError>> + Send;
}

/// Bound parameter for a substring match. The query is a bound value, so it
/// can never change the statement; `%` and `_` inside it keep their LIKE
/// meaning.
pub fn like_pattern(query: &str) -> String {
    format!("%{}%", query)
}

/// MySQL-backed catalog using a prepared statement.
#[derive(Clone)]
pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl ProductCatalog for MySqlCatalog {
    async fn search_names(&self, query: &str) -> Result<Vec<String>, DbError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM products WHERE name LIKE ?")
                .bind(like_pattern(query))
                .fetch_all(&self.pool)
                .await?;
        debug!(rows = names.len(), "Catalog search complete");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_query() {
        assert_eq!(like_pattern("lamp"), "%lamp%");
        assert_eq!(like_pattern("' OR '1'='1"), "%' OR '1'='1%");
    }
}
