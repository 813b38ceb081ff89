//! Protected message-processing pipeline
//!
//! For one user turn, produce a safe response while recording what was
//! scanned, decided, and why:
//!
//! ```text
//! user text ──► input scan ──► input decision ──► model provider
//!                                   │ BLOCK           │
//!                                   ▼                 ▼
//!                              refusal text      output scan ──► output decision
//!                                                                     │
//!                                                     allow/sanitize/refusal
//! ```
//!
//! The five steps run strictly in order; each step consumes only the
//! previous step's output. The pipeline has no persistence side effects —
//! storing the turn is the API boundary's job. A blocking decision is a
//! successful outcome, never an error.

use crate::error::{Error, Result};
use crate::guardrail::{GuardrailDecision, GuardrailPolicy};
use crate::provider::{ChatMessage, ModelProvider};
use crate::scanner::{Finding, ScanOptions, ScanReport, SensitivityScanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Refusal shown when the user's input is blocked
pub const INPUT_BLOCKED_MESSAGE: &str =
    "Your message was blocked due to policy violations. Please rephrase and try again.";

/// Refusal shown in place of a blocked model reply
pub const OUTPUT_BLOCKED_MESSAGE: &str = "This response was blocked due to policy violations.";

fn default_true() -> bool {
    true
}

/// Which protections are active for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionMode {
    /// Scan and enforce on user input
    #[serde(default = "default_true")]
    pub input_scan: bool,

    /// Scan and enforce on the model reply
    #[serde(default = "default_true")]
    pub output_scan: bool,

    /// Request tokenization instead of redaction where supported
    #[serde(default)]
    pub tokenize: bool,
}

impl Default for ProtectionMode {
    fn default() -> Self {
        Self {
            input_scan: true,
            output_scan: true,
            tokenize: false,
        }
    }
}

/// Output bundle of a single turn's processing
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Safe text to show the user (reply, sanitized reply, or refusal)
    pub final_text: String,

    /// True when either the input or the output was blocked
    pub blocked: bool,

    /// Findings from the input scan
    pub input_findings: Vec<Finding>,

    /// Findings from the output scan (empty when the turn never generated)
    pub output_findings: Vec<Finding>,

    /// Decision applied to the user's input
    pub input_decision: GuardrailDecision,

    /// Decision applied to the model reply (None when the provider was
    /// never called)
    pub output_decision: Option<GuardrailDecision>,

    /// Text actually sent to the provider (None when the input was blocked)
    pub processed_input: Option<String>,
}

/// Sequences scanner → policy → provider → scanner → policy for one turn
pub struct TurnPipeline {
    scanner: Arc<dyn SensitivityScanner>,
    policy: GuardrailPolicy,
    provider: Arc<dyn ModelProvider>,
}

impl TurnPipeline {
    pub fn new(
        scanner: Arc<dyn SensitivityScanner>,
        policy: GuardrailPolicy,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            scanner,
            policy,
            provider,
        }
    }

    /// Process one user turn.
    ///
    /// `history` is the prior conversation in provider form; `new_user_text`
    /// must be non-empty. The call is atomic from the caller's perspective:
    /// either a well-formed [`PipelineResult`] (including blocked turns) or
    /// an error with nothing partially produced.
    pub async fn process_turn(
        &self,
        history: &[ChatMessage],
        new_user_text: &str,
        mode: ProtectionMode,
    ) -> Result<PipelineResult> {
        if new_user_text.trim().is_empty() {
            return Err(Error::Validation(
                "message content must not be empty".to_string(),
            ));
        }

        // Step 1: input scan
        let input_report = if mode.input_scan {
            self.scanner
                .scan(new_user_text, ScanOptions::input(mode.tokenize))
                .await?
        } else {
            ScanReport::passthrough(new_user_text)
        };

        // Step 2: input decision
        let input_decision = self.policy.decide(&input_report);
        tracing::debug!(
            scanner = self.scanner.name(),
            findings = input_report.findings.len(),
            risk = input_report.risk_score,
            decision = ?input_decision,
            "input scan complete"
        );

        if input_decision == GuardrailDecision::Block {
            tracing::warn!("user input blocked by guardrail policy");
            return Ok(PipelineResult {
                final_text: INPUT_BLOCKED_MESSAGE.to_string(),
                blocked: true,
                input_findings: input_report.findings,
                output_findings: Vec::new(),
                input_decision,
                output_decision: None,
                processed_input: None,
            });
        }

        let chosen_input = match input_decision {
            GuardrailDecision::Sanitize => input_report.sanitized_text.clone(),
            _ => new_user_text.to_string(),
        };

        // Step 3: generation — at most one attempt, no retry
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(chosen_input.clone()));

        let reply = self.provider.generate(&messages).await?;
        tracing::debug!(
            provider = self.provider.name(),
            reply_len = reply.len(),
            "provider returned reply"
        );

        // Step 4: output scan
        let output_report = if mode.output_scan {
            self.scanner
                .scan(&reply, ScanOptions::output(mode.tokenize))
                .await?
        } else {
            ScanReport::passthrough(&reply)
        };

        // Step 5: output decision
        let output_decision = self.policy.decide(&output_report);
        tracing::debug!(
            findings = output_report.findings.len(),
            risk = output_report.risk_score,
            decision = ?output_decision,
            "output scan complete"
        );

        // A blocked reply is discarded here; it must never reach the caller
        // or the store verbatim.
        let (final_text, blocked) = match output_decision {
            GuardrailDecision::Block => {
                tracing::warn!("model reply blocked by guardrail policy");
                (OUTPUT_BLOCKED_MESSAGE.to_string(), true)
            }
            GuardrailDecision::Sanitize => (output_report.sanitized_text.clone(), false),
            GuardrailDecision::Allow => (reply, false),
        };

        Ok(PipelineResult {
            final_text,
            blocked,
            input_findings: input_report.findings,
            output_findings: output_report.findings,
            input_decision,
            output_decision: Some(output_decision),
            processed_input: Some(chosen_input),
        })
    }
}
