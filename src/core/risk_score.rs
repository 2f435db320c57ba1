//! Risk Scoring Module
//! Turns rule findings into a 0-100 safety score and a risk tier
//!
//! Higher is safer. Every finding subtracts its severity weight:
//! critical=30, high=18, medium=10, low=4, info=1.
//! - 85-100: Safe
//! - 70-84: Low
//! - 50-69: Medium
//! - 30-49: High
//! - 0-29: Critical

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::types::{
    ChainAnalysisArtifact, RiskLevel, ScanProvenance, SecurityReport, Severity, TargetType,
    VulnerabilityFinding,
};
use crate::utils::constants::ENGINE_TAG;

/// Penalty applied per finding of a given severity
#[inline]
pub fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 30,
        Severity::High => 18,
        Severity::Medium => 10,
        Severity::Low => 4,
        Severity::Info => 1,
    }
}

/// Tier is a step function of the score
pub fn risk_level_for(score: u8) -> RiskLevel {
    match score {
        85..=u8::MAX => RiskLevel::Safe,
        70..=84 => RiskLevel::Low,
        50..=69 => RiskLevel::Medium,
        30..=49 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    /// 0-100, higher is safer
    pub total: u8,
    pub risk_level: RiskLevel,
}

impl RiskScore {
    pub fn calculate(findings: &[VulnerabilityFinding]) -> Self {
        let penalty: u32 = findings.iter().map(|f| severity_weight(f.severity)).sum();
        let total = 100u32.saturating_sub(penalty) as u8;

        Self {
            total,
            risk_level: risk_level_for(total),
        }
    }
}

/// Human-readable one-line summary of the findings
pub fn summarize(findings: &[VulnerabilityFinding]) -> String {
    if findings.is_empty() {
        return "No major deterministic risk patterns were detected.".to_string();
    }

    let critical = findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count();
    let high = findings
        .iter()
        .filter(|f| f.severity == Severity::High)
        .count();

    format!(
        "Detected {} finding(s), including {} critical and {} high severity risks.",
        findings.len(),
        critical,
        high
    )
}

/// Assemble the report for an evaluated artifact
pub fn build_security_report(
    artifact: &ChainAnalysisArtifact,
    target_type: TargetType,
    findings: Vec<VulnerabilityFinding>,
    analysis_time_ms: u64,
    created_at: DateTime<Utc>,
) -> SecurityReport {
    let score = RiskScore::calculate(&findings);

    SecurityReport {
        chain: artifact.chain,
        target_type,
        target_value: artifact.target_value.clone(),
        score: score.total,
        risk_level: score.risk_level,
        summary: summarize(&findings),
        findings,
        engine: ENGINE_TAG.to_string(),
        analysis_time_ms,
        provenance: ScanProvenance::from(&artifact.metadata),
        created_at,
    }
}
