//! HTTP client for the agreement service

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::{AgreementService, RatingPayload};
use crate::error::{QualitagError, QualitagResult};

/// Bare `NaN` tokens are not valid JSON but the service emits them
static BARE_NAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bNaN\b").unwrap());

/// Agreement service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpAgreementClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgreementClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> QualitagResult<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| QualitagError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> QualitagResult<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "Agreement service returned an error");
            return Err(QualitagError::Service(format!("{} returned {}", path, status)));
        }
        Ok(text)
    }
}

fn transport_error(err: reqwest::Error) -> QualitagError {
    if err.is_timeout() {
        QualitagError::ServiceUnavailable(format!("agreement service timed out: {}", err))
    } else {
        QualitagError::Service(format!("agreement service unreachable: {}", err))
    }
}

/// Read `{"alpha": n}`; `null` and bare `NaN` both mean undefined
pub(crate) fn parse_alpha(body: &str) -> QualitagResult<f64> {
    let sanitized = BARE_NAN.replace_all(body, "null");
    let value: Value = serde_json::from_str(&sanitized)
        .map_err(|e| QualitagError::Service(format!("malformed agreement response: {}", e)))?;
    match value.get("alpha") {
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| QualitagError::Service("alpha is not a finite number".to_string())),
        Some(Value::Null) => Ok(f64::NAN),
        _ => Err(QualitagError::Service(
            "malformed agreement response: missing alpha".to_string(),
        )),
    }
}

/// Read `{"result": [...]}`
pub(crate) fn parse_processed_tags(body: &str) -> QualitagResult<Vec<String>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| QualitagError::Service(format!("malformed processing response: {}", e)))?;
    match value.get("result") {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()),
        _ => Err(QualitagError::Service(
            "malformed processing response: result is not an array".to_string(),
        )),
    }
}

#[async_trait]
impl AgreementService for HttpAgreementClient {
    async fn krippendorff_alpha(&self, payload: &RatingPayload) -> QualitagResult<f64> {
        let body = self.post("/api/krippendorff", payload).await?;
        parse_alpha(&body)
    }

    async fn process_tags(&self, values: &[String]) -> QualitagResult<Vec<String>> {
        let body = self.post("/api/process-tags", values).await?;
        parse_processed_tags(&body)
    }
}
