use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Params, Row, WarehouseClient};
use crate::error::StorageError;

/// [`WarehouseClient`] that posts statements to a SQL-over-HTTP gateway.
///
/// Endpoints, relative to `base_url`:
///
/// - `POST /query`   `{sql, params}` -> `{rows: [...]}`
/// - `POST /execute` `{sql, params}` -> `{affected_rows: n}`
/// - `POST /insert`  `{table, rows}` -> `{errors: [...]}`
#[derive(Debug, Clone)]
pub struct HttpWarehouseClient {
    base_url: String,
    auth_token: Option<String>,
}

impl HttpWarehouseClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        HttpWarehouseClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    async fn post<B, R>(&self, path: &'static str, body: B) -> Result<R, StorageError>
    where
        B: Serialize + Send + 'static,
        R: for<'de> Deserialize<'de> + Send + 'static,
    {
        let url = format!("{}{}", self.base_url, path);
        let token = self.auth_token.clone();
        // ureq is synchronous, so wrap in spawn_blocking
        tokio::task::spawn_blocking(move || post_json(&url, token.as_deref(), &body))
            .await
            .map_err(|e| StorageError::Backend(format!("task join error: {e}")))?
    }
}

#[derive(Serialize)]
struct StatementBody {
    sql: String,
    params: Params,
}

#[derive(Serialize)]
struct InsertBody {
    table: String,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    affected_rows: u64,
}

#[derive(Deserialize)]
struct InsertResponse {
    #[serde(default)]
    errors: Vec<Value>,
}

fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
    url: &str,
    token: Option<&str>,
    body: &B,
) -> Result<R, StorageError> {
    let agent = ureq::Agent::new_with_defaults();
    let mut request = agent.post(url).header("content-type", "application/json");
    if let Some(token) = token {
        request = request.header("authorization", &format!("Bearer {token}"));
    }
    let response = request
        .send_json(body)
        .map_err(|e| StorageError::Backend(format!("warehouse request to {url} failed: {e}")))?;
    response.into_body().read_json().map_err(|e| {
        StorageError::Backend(format!("failed to parse warehouse response from {url}: {e}"))
    })
}

#[async_trait::async_trait]
impl WarehouseClient for HttpWarehouseClient {
    async fn query(&self, sql: &str, params: &Params) -> Result<Vec<Row>, StorageError> {
        let body = StatementBody {
            sql: sql.to_string(),
            params: params.clone(),
        };
        let resp: QueryResponse = self.post("/query", body).await?;
        Ok(resp.rows)
    }

    async fn execute(&self, sql: &str, params: &Params) -> Result<u64, StorageError> {
        let body = StatementBody {
            sql: sql.to_string(),
            params: params.clone(),
        };
        let resp: ExecuteResponse = self.post("/execute", body).await?;
        Ok(resp.affected_rows)
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<Vec<String>, StorageError> {
        let body = InsertBody {
            table: table.to_string(),
            rows,
        };
        let resp: InsertResponse = self.post("/insert", body).await?;
        Ok(resp
            .errors
            .into_iter()
            .map(|e| match e {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = HttpWarehouseClient::new("http://localhost:9050/", None);
        assert_eq!(client.base_url, "http://localhost:9050");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_backend_error() {
        let client = HttpWarehouseClient::new("http://127.0.0.1:1", None);
        let err = client.query("SELECT 1", &Params::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
