use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;

pub type DbResult<T> = Result<T, DatabaseError>;

/// `Prefer` header asking PostgREST to echo written rows back.
pub const RETURN_REPRESENTATION: &str = "return=representation";
/// `Prefer` header turning an insert into insert-or-ignore on the `on_conflict` columns.
pub const IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=representation";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> DbResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> DbResult<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> DbResult<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => DatabaseError::Auth(error_text),
                404 => DatabaseError::NotFound(error_text),
                409 => DatabaseError::Conflict(error_text),
                code if error_text.contains("23505") => {
                    debug!("Unique violation reported with status {}", code);
                    DatabaseError::Conflict(error_text)
                }
                code => DatabaseError::Api { status: code, body: error_text },
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            // 204 No Content and minimal-return writes
            return Ok(serde_json::from_value(Value::Array(Vec::new()))?);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write request that returns the affected rows.
    pub async fn write_returning<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> DbResult<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, Some(prefer(RETURN_REPRESENTATION)))
            .await
    }

    /// Insert that silently skips rows colliding with an existing unique key.
    /// Returns only the rows actually inserted.
    pub async fn insert_ignoring_duplicates<T>(
        &self,
        table_path: &str,
        on_conflict: &str,
        auth_token: Option<&str>,
        body: Value,
    ) -> DbResult<Vec<T>>
    where T: DeserializeOwned {
        let path = format!("{}?on_conflict={}", table_path, on_conflict);
        self.request_with_headers(Method::POST, &path, auth_token, Some(body), Some(prefer(IGNORE_DUPLICATES)))
            .await
    }

    /// Calls a Postgres function through `/rest/v1/rpc`. The function body runs
    /// in a single transaction.
    pub async fn rpc<T>(&self, function: &str, auth_token: Option<&str>, args: Value) -> DbResult<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, auth_token, Some(args)).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn header_value(raw: &str) -> DbResult<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| DatabaseError::InvalidHeader(e.to_string()))
}

fn prefer(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static(value));
    headers
}
