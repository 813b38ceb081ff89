//! Remote scanner backend
//!
//! Calls two REST services: a data-discovery classify endpoint for entity
//! detection and a semantic-guardrail scan endpoint for risk scoring.
//! Redaction is applied locally from the returned spans.

use crate::config::ScannerConfig;
use crate::error::{Error, Result};
use crate::scanner::{
    apply_redactions, Finding, ScanDirection, ScanOptions, ScanReport, SensitivityScanner,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Scanner backed by remote data-discovery and semantic-guardrail services
pub struct RemoteScanner {
    client: reqwest::Client,
    classify_url: String,
    guardrail_url: String,
    score_threshold: f64,
}

/// Classify endpoint response
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    classifications: HashMap<String, Vec<Detection>>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    score: f64,
    location: DetectionLocation,
}

#[derive(Debug, Deserialize)]
struct DetectionLocation {
    start_index: usize,
    end_index: usize,
}

/// Guardrail scan endpoint response
#[derive(Debug, Deserialize)]
struct GuardrailResponse {
    #[serde(default)]
    messages: Vec<GuardrailMessage>,
}

#[derive(Debug, Deserialize)]
struct GuardrailMessage {
    #[serde(default)]
    score: f64,
}

impl RemoteScanner {
    /// Create a remote scanner from configuration.
    pub fn new(config: &ScannerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Scanner(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            classify_url: config.classify_url.clone(),
            guardrail_url: config.guardrail_url.clone(),
            score_threshold: config.score_threshold,
        })
    }

    /// Call the semantic-guardrail scan endpoint and return the message risk.
    async fn guardrail_score(&self, text: &str, direction: ScanDirection) -> Result<f64> {
        let (from, to, processors) = match direction {
            ScanDirection::UserToAi => ("user", "ai", vec!["customer-support"]),
            ScanDirection::AiToUser => ("ai", "user", vec!["pii"]),
        };

        let body = serde_json::json!({
            "messages": [{
                "from": from,
                "to": to,
                "content": text,
                "processors": processors,
            }]
        });

        let response = self
            .client
            .post(&self.guardrail_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Scanner(format!("guardrail scan failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Scanner(format!(
                "guardrail endpoint returned {}",
                response.status()
            )));
        }

        let parsed: GuardrailResponse = response
            .json()
            .await
            .map_err(|e| Error::Scanner(format!("malformed guardrail response: {}", e)))?;

        Ok(parsed.messages.first().map(|m| m.score).unwrap_or(0.0))
    }

    /// Call the data-discovery classify endpoint and return findings.
    async fn classify(&self, text: &str) -> Result<Vec<Finding>> {
        let response = self
            .client
            .post(&self.classify_url)
            .header("Content-Type", "text/plain")
            .query(&[("score_threshold", self.score_threshold)])
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| Error::Scanner(format!("classify request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Scanner(format!(
                "classify endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Scanner(format!("malformed classify response: {}", e)))?;

        Ok(findings_from_classifications(parsed))
    }
}

#[async_trait]
impl SensitivityScanner for RemoteScanner {
    async fn scan(&self, text: &str, opts: ScanOptions) -> Result<ScanReport> {
        if opts.tokenize {
            // Tokenization requires the enterprise protection platform; the
            // discovery service only supports redaction.
            tracing::debug!("tokenization unavailable on remote scanner, redacting instead");
        }

        let risk_score = self.guardrail_score(text, opts.direction).await?;
        let findings = self.classify(text).await?;
        let sanitized_text = apply_redactions(text, &findings);

        Ok(ScanReport {
            findings,
            sanitized_text,
            risk_score,
        })
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Flatten a classify response into ordered findings with normalized
/// entity categories.
fn findings_from_classifications(response: ClassifyResponse) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (entity_type, detections) in response.classifications {
        let category = map_entity(&entity_type).to_string();
        for det in detections {
            findings.push(Finding {
                category: category.clone(),
                start: det.location.start_index,
                end: det.location.end_index,
                confidence: det.score,
            });
        }
    }
    findings.sort_by_key(|f| f.start);
    findings
}

/// Normalize service entity types to the categories used across the app.
fn map_entity(entity_type: &str) -> &str {
    match entity_type {
        "US_SSN" | "SOCIAL_SECURITY_NUMBER" => "SSN",
        "EMAIL_ADDRESS" => "EMAIL",
        "PHONE_NUMBER" => "PHONE",
        "CREDIT_CARD" => "CREDIT_CARD",
        "US_DRIVER_LICENSE" => "DRIVER_LICENSE",
        "US_PASSPORT" => "PASSPORT",
        "IP_ADDRESS" => "IP_ADDRESS",
        "IBAN_CODE" => "IBAN",
        "MEDICAL_LICENSE" => "MEDICAL_LICENSE",
        "DATE_TIME" => "DATE",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_entity_known_types() {
        assert_eq!(map_entity("US_SSN"), "SSN");
        assert_eq!(map_entity("EMAIL_ADDRESS"), "EMAIL");
        assert_eq!(map_entity("IBAN_CODE"), "IBAN");
    }

    #[test]
    fn test_map_entity_passthrough() {
        assert_eq!(map_entity("USERNAME"), "USERNAME");
    }

    #[test]
    fn test_findings_from_classifications() {
        let raw = serde_json::json!({
            "classifications": {
                "US_SSN": [
                    {"score": 0.99, "location": {"start_index": 10, "end_index": 21}}
                ],
                "EMAIL_ADDRESS": [
                    {"score": 0.97, "location": {"start_index": 2, "end_index": 8}}
                ]
            }
        });
        let parsed: ClassifyResponse = serde_json::from_value(raw).unwrap();
        let findings = findings_from_classifications(parsed);

        assert_eq!(findings.len(), 2);
        // Ordered by start offset
        assert_eq!(findings[0].category, "EMAIL");
        assert_eq!(findings[1].category, "SSN");
        assert_eq!(findings[1].start, 10);
        assert_eq!(findings[1].end, 21);
    }

    #[test]
    fn test_empty_classifications() {
        let parsed: ClassifyResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(findings_from_classifications(parsed).is_empty());
    }

    #[test]
    fn test_guardrail_response_parsing() {
        let raw = serde_json::json!({"messages": [{"score": 0.83}]});
        let parsed: GuardrailResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.messages[0].score, 0.83);
    }
}
