use crate::config::GenderConfig;
use crate::error::{AppError, Result};
use crate::integrations::{read_json, Classification, GenderClassifier};
use crate::metrics::record_collaborator_call;
use crate::state::AppCache;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct GenderizeResponse {
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    probability: Option<f64>,
}

/// Client for genderize.io-compatible classifiers, memoized per name
pub struct GenderizeClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    memo: AppCache<String, Classification>,
}

impl GenderizeClient {
    pub fn new(config: &GenderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            memo: AppCache::new(10_000, Duration::from_secs(3600)),
        })
    }

    async fn request(&self, first_name: &str) -> Result<Classification> {
        let mut query = vec![("name", first_name)];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.as_str()));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Gender request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::integration(
                "genderize",
                format!("classifier returned {}", status),
            ));
        }

        let body: GenderizeResponse = read_json(response).await?;

        Ok(match body.gender {
            Some(label) => Classification {
                label,
                probability: body.probability.unwrap_or(0.0),
            },
            None => Classification {
                label: "unknown".to_string(),
                probability: 0.0,
            },
        })
    }
}

#[async_trait]
impl GenderClassifier for GenderizeClient {
    async fn classify(&self, first_name: &str) -> Result<Classification> {
        let name = first_name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("first name is empty".to_string()));
        }

        let key = name.to_lowercase();
        if let Some(hit) = self.memo.get(&key).await {
            debug!(name = %name, "Classification memo hit");
            return Ok(hit);
        }

        let result = self.request(name).await;
        record_collaborator_call("genderize", &result);
        let classification = result?;
        self.memo.insert(key, classification.clone()).await;
        Ok(classification)
    }
}
