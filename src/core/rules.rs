//! Rule Engine
//!
//! Fixed, chain-scoped table of deterministic pattern rules. A rule fires
//! when any of its patterns matches the artifact source (case-insensitive,
//! unanchored). Findings come out in table order.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::types::{
    ChainAnalysisArtifact, ChainId, FindingCategory, Severity, VulnerabilityFinding,
};

/// Static rule definition
#[derive(Debug, Clone, Copy)]
pub struct RuleDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: Severity,
    pub category: FindingCategory,
    pub description: &'static str,
    pub recommendation: &'static str,
    pub patterns: &'static [&'static str],
}

pub const SUI_RULES: &[RuleDefinition] = &[
    RuleDefinition {
        id: "sui-public-mint",
        title: "Public mint capability detected",
        severity: Severity::Critical,
        category: FindingCategory::SupplyControl,
        description: "Public mint entry points may allow unbounded token supply changes.",
        recommendation: "Restrict mint paths to controlled capability objects and policy checks.",
        patterns: &[r"public\s+fun\s+mint", r"treasurycap"],
    },
    RuleDefinition {
        id: "sui-admin-transfer",
        title: "Privileged transfer control detected",
        severity: Severity::High,
        category: FindingCategory::AccessControl,
        description: "Admin-only transfer controls can freeze or censor user activity.",
        recommendation: "Document governance model and enforce transparent authority transfers.",
        patterns: &[r"admin", r"freeze", r"denylist|blacklist"],
    },
];

pub const EVM_RULES: &[RuleDefinition] = &[
    RuleDefinition {
        id: "evm-unlimited-mint",
        title: "Unlimited mint pattern",
        severity: Severity::Critical,
        category: FindingCategory::SupplyControl,
        description: "Mint function with weak checks can lead to inflation and rug behavior.",
        recommendation: "Require role-based access and hard-cap constraints around minting.",
        patterns: &[r"function\s+mint", r"onlyowner"],
    },
    RuleDefinition {
        id: "evm-blacklist-gating",
        title: "Transfer blacklist gating",
        severity: Severity::High,
        category: FindingCategory::RugPullPattern,
        description: "Blacklist-based transfer gating can trap users in a honeypot scenario.",
        recommendation: "Remove discretionary transfer blacklisting or provide immutable controls.",
        patterns: &[r"blacklist", r"_transfer"],
    },
];

pub const SOLANA_RULES: &[RuleDefinition] = &[
    RuleDefinition {
        id: "solana-upgrade-authority",
        title: "Upgradeable program authority risk",
        severity: Severity::High,
        category: FindingCategory::Upgradeability,
        description: "Retained upgrade authority allows post-deploy behavior changes.",
        recommendation: "Lock or govern upgrade authority through audited multisig.",
        patterns: &[r"upgrade", r"authority"],
    },
    RuleDefinition {
        id: "solana-freeze-authority",
        title: "Freeze authority controls",
        severity: Severity::Medium,
        category: FindingCategory::AccessControl,
        description: "Token freeze authority can block transfers unexpectedly.",
        recommendation: "Disclose freeze authority policy and constraints to users.",
        patterns: &[r"freeze", r"mint_authority|authority"],
    },
];

/// A rule with its patterns compiled
struct CompiledRule {
    def: &'static RuleDefinition,
    patterns: Vec<(&'static str, Regex)>,
}

impl CompiledRule {
    fn compile(def: &'static RuleDefinition) -> Self {
        let patterns = def
            .patterns
            .iter()
            .map(|p| {
                let re = Regex::new(&format!("(?i){}", p)).expect("valid rule pattern");
                (*p, re)
            })
            .collect();
        Self { def, patterns }
    }

    /// Source text of the first pattern that matches
    fn first_match(&self, source: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(source))
            .map(|(p, _)| *p)
    }
}

lazy_static! {
    static ref COMPILED_SUI: Vec<CompiledRule> =
        SUI_RULES.iter().map(CompiledRule::compile).collect();
    static ref COMPILED_EVM: Vec<CompiledRule> =
        EVM_RULES.iter().map(CompiledRule::compile).collect();
    static ref COMPILED_SOLANA: Vec<CompiledRule> =
        SOLANA_RULES.iter().map(CompiledRule::compile).collect();
}

/// Rule definitions for a chain, in evaluation order
pub fn rules_for(chain: ChainId) -> &'static [RuleDefinition] {
    match chain {
        ChainId::Sui => SUI_RULES,
        ChainId::Evm => EVM_RULES,
        ChainId::Solana => SOLANA_RULES,
    }
}

fn compiled_for(chain: ChainId) -> &'static [CompiledRule] {
    match chain {
        ChainId::Sui => &COMPILED_SUI,
        ChainId::Evm => &COMPILED_EVM,
        ChainId::Solana => &COMPILED_SOLANA,
    }
}

/// Evaluate `source` against the rule table of `chain`
pub fn detect_findings_in(chain: ChainId, source: &str) -> Vec<VulnerabilityFinding> {
    compiled_for(chain)
        .iter()
        .filter_map(|rule| {
            rule.first_match(source).map(|pattern| VulnerabilityFinding {
                id: rule.def.id.to_string(),
                title: rule.def.title.to_string(),
                severity: rule.def.severity,
                category: rule.def.category,
                description: rule.def.description.to_string(),
                recommendation: rule.def.recommendation.to_string(),
                evidence: Some(format!("Pattern hit in {} artifact: {}", chain, pattern)),
            })
        })
        .collect()
}

/// Evaluate an artifact's (possibly overridden) source
pub fn detect_findings(artifact: &ChainAnalysisArtifact) -> Vec<VulnerabilityFinding> {
    detect_findings_in(artifact.chain, &artifact.source_code)
}
