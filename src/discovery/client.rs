use super::DiscoveryIndex;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::time::Duration;
use trellis_config::AUTO_FOLLOW_INDEX_PAGE_SIZE;
use trellis_error::{AppError, AppResult};

/// HTTP client for the instance index
#[derive(Clone)]
pub struct IndexClient {
    http_client: reqwest::Client,
    index_url: String,
}

impl IndexClient {
    pub fn new(index_url: impl Into<String>) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            index_url: index_url.into(),
        })
    }
}

#[async_trait]
impl DiscoveryIndex for IndexClient {
    async fn fetch_hosts(&self, since: Option<DateTime<Utc>>) -> AppResult<Vec<String>> {
        let mut query = vec![("count", AUTO_FOLLOW_INDEX_PAGE_SIZE.to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }

        let response = self
            .http_client
            .get(&self.index_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::upstream_discovery(format!("index request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream_discovery(format!(
                "index answered with status {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::upstream_discovery(format!("index body is not JSON: {}", e)))?;

        parse_index_hosts(&body)
    }

    fn url(&self) -> &str {
        &self.index_url
    }
}

/// Extract hosts from an index response body
///
/// A body without a `data` array is malformed. Entries without a string
/// `host` are skipped.
pub fn parse_index_hosts(body: &Value) -> AppResult<Vec<String>> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::upstream_discovery("index response has no data array"))?;

    Ok(data
        .iter()
        .filter_map(|entry| entry.get("host").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hosts() {
        let body = json!({
            "total": 3,
            "data": [
                { "host": "a.example" },
                { "id": 12 },
                { "host": "b.example" }
            ]
        });
        assert_eq!(
            parse_index_hosts(&body).unwrap(),
            vec!["a.example".to_string(), "b.example".to_string()]
        );
    }

    #[test]
    fn test_missing_or_non_array_data_is_upstream_error() {
        for body in [json!({}), json!({ "data": "a.example" }), json!([])] {
            let err = parse_index_hosts(&body).unwrap_err();
            assert!(matches!(err, AppError::UpstreamDiscovery(_)));
        }
    }
}
