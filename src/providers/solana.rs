//! Solana Analyzer
//!
//! Program ids are base58 pubkeys. Solana does not publish program source
//! on-chain, so the lookup reports account facts instead:
//! - programs owned by the upgradeable BPF loader are followed to their
//!   program-data account to read the upgrade authority
//! - SPL mints report mint and freeze authorities
//!
//! The facts are rendered as comment lines above the placeholder body so the
//! rule engine can see them.

use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::rpc::JsonRpcClient;
use super::{is_base58_id, ChainAnalyzer, FetchedSource};
use crate::models::config::ProviderConfig;
use crate::models::types::ChainId;
use crate::utils::constants::{BPF_LOADER_UPGRADEABLE, SPL_TOKEN_PROGRAMS};
use crate::utils::retry::RetryOptions;

// ============================================
// SOLANA RPC TYPES
// ============================================

/// `getAccountInfo` wraps the account in `{ context, value }`
#[derive(Debug, Clone, Deserialize)]
pub struct RpcContextValue<T> {
    pub value: Option<T>,
}

/// Solana account info (jsonParsed encoding)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaAccountInfo {
    #[serde(default)]
    pub lamports: u64,
    pub owner: String,
    pub data: AccountData,
    #[serde(default)]
    pub executable: bool,
}

/// Account data (raw base64 pair or parsed)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccountData {
    Parsed(ParsedAccountData),
    Raw(Value),
}

/// Parsed account data
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedAccountData {
    pub program: String,
    pub parsed: Value,
}

impl SolanaAccountInfo {
    /// `(type, info)` of a parsed account
    fn parsed(&self) -> Option<(&str, &Value)> {
        match &self.data {
            AccountData::Parsed(p) => {
                let kind = p.parsed.get("type").and_then(Value::as_str)?;
                Some((kind, p.parsed.get("info").unwrap_or(&Value::Null)))
            }
            AccountData::Raw(_) => None,
        }
    }
}

const PLACEHOLDER_NOTE: &str =
    "/* Program source retrieval requires explorer/indexer metadata and is chain-specific. */";

/// On-chain facts recovered for a program or mint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramFacts {
    pub executable: bool,
    pub upgrade_authority: Option<String>,
    pub immutable: bool,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
}

pub struct SolanaAnalyzer {
    rpc: JsonRpcClient,
    retry: RetryOptions,
    lookups_enabled: bool,
}

impl SolanaAnalyzer {
    pub fn new(config: &ProviderConfig, client: reqwest::Client) -> Self {
        Self {
            rpc: JsonRpcClient::new(config.solana_rpc_url.clone(), "solana-mainnet", client),
            retry: config.retry,
            lookups_enabled: config.lookups_enabled,
        }
    }

    /// Get account info
    pub async fn get_account_info(&self, pubkey: &str) -> Result<Option<SolanaAccountInfo>> {
        let params = serde_json::json!([
            pubkey,
            {"encoding": "jsonParsed"}
        ]);

        let result: Option<RpcContextValue<SolanaAccountInfo>> =
            self.rpc.call("getAccountInfo", params).await?;
        Ok(result.and_then(|r| r.value))
    }

    async fn collect_facts(&self, account: SolanaAccountInfo) -> Result<ProgramFacts> {
        let mut facts = ProgramFacts {
            executable: account.executable,
            ..ProgramFacts::default()
        };

        match account.parsed() {
            Some(("program", info)) if account.owner == BPF_LOADER_UPGRADEABLE => {
                if let Some(program_data) = info.get("programData").and_then(Value::as_str) {
                    debug!(program_data, "Following program-data account");
                    if let Some(data_account) = self.get_account_info(program_data).await? {
                        if let Some(("programData", data_info)) = data_account.parsed() {
                            facts.upgrade_authority = string_field(data_info, "authority");
                            facts.immutable = facts.upgrade_authority.is_none();
                        }
                    }
                }
            }
            Some(("mint", info)) if SPL_TOKEN_PROGRAMS.contains(&account.owner.as_str()) => {
                facts.mint_authority = string_field(info, "mintAuthority");
                facts.freeze_authority = string_field(info, "freezeAuthority");
            }
            _ => {}
        }

        Ok(facts)
    }
}

fn string_field(info: &Value, key: &str) -> Option<String> {
    info.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Account facts as comment lines followed by the placeholder program body.
///
/// Owner addresses are left out: the upgradeable loader's id spells
/// "Upgradeab1e" and would trip the upgrade-authority rule on immutable programs.
pub fn render_facts(program: &str, facts: &ProgramFacts) -> String {
    let mut lines = vec![
        format!("// Solana program: {}", program),
        format!("// executable: {}", facts.executable),
    ];
    if let Some(authority) = &facts.upgrade_authority {
        lines.push(format!("// upgrade_authority: {}", authority));
    }
    if facts.immutable {
        lines.push("// immutable: true".to_string());
    }
    if let Some(authority) = &facts.mint_authority {
        lines.push(format!("// mint_authority: {}", authority));
    }
    if let Some(authority) = &facts.freeze_authority {
        lines.push(format!("// freeze_authority: {}", authority));
    }
    lines.push(PLACEHOLDER_NOTE.to_string());
    lines.push("pub fn process_instruction() {}".to_string());
    lines.join("\n")
}

#[async_trait]
impl ChainAnalyzer for SolanaAnalyzer {
    fn chain(&self) -> ChainId {
        ChainId::Solana
    }

    fn compiler(&self) -> &'static str {
        "rust/svm"
    }

    fn normalize_target(&self, target: &str) -> String {
        target.trim().to_string()
    }

    fn is_valid_target(&self, target: &str) -> bool {
        is_base58_id(&self.normalize_target(target))
    }

    fn placeholder_source(&self, normalized: &str) -> String {
        [
            format!("// Solana program: {}", normalized),
            PLACEHOLDER_NOTE.to_string(),
            "pub fn process_instruction() {}".to_string(),
        ]
        .join("\n")
    }

    fn retry_options(&self) -> &RetryOptions {
        &self.retry
    }

    fn lookups_enabled(&self) -> bool {
        self.lookups_enabled
    }

    async fn lookup_source(&self, normalized: &str) -> Result<Option<FetchedSource>> {
        let Some(account) = self.get_account_info(normalized).await? else {
            return Ok(None);
        };

        let facts = self.collect_facts(account).await?;
        Ok(Some(FetchedSource {
            source_code: render_facts(normalized, &facts),
            compiler: None,
            verified: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::detect_findings_in;
    use serde_json::json;

    const PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    fn analyzer() -> SolanaAnalyzer {
        SolanaAnalyzer::new(&ProviderConfig::offline(), reqwest::Client::new())
    }

    #[test]
    fn test_validate_base58() {
        let solana = analyzer();
        assert!(solana.is_valid_target(PROGRAM));
        assert!(solana.is_valid_target(&format!("  {}  ", PROGRAM)));
        // 0, O, I and l are not base58
        assert!(!solana.is_valid_target(&"0".repeat(44)));
        assert!(!solana.is_valid_target("short"));
    }

    #[test]
    fn test_placeholder_has_no_rule_keywords() {
        let source = analyzer().placeholder_source(PROGRAM).to_lowercase();
        assert!(source.starts_with("// solana program: "));
        assert!(!source.contains("authority"));
        assert!(!source.contains("upgrade"));
        assert!(!source.contains("freeze"));
    }

    #[test]
    fn test_render_mint_facts() {
        let facts = ProgramFacts {
            executable: false,
            mint_authority: Some("Auth111".to_string()),
            freeze_authority: Some("Frz111".to_string()),
            ..ProgramFacts::default()
        };
        let source = render_facts("Mint111", &facts);
        assert!(source.contains("// mint_authority: Auth111"));
        assert!(source.contains("// freeze_authority: Frz111"));
        assert!(source.ends_with("pub fn process_instruction() {}"));
    }

    #[test]
    fn test_immutable_program_is_not_flagged_upgradeable() {
        let immutable = ProgramFacts {
            executable: true,
            immutable: true,
            ..ProgramFacts::default()
        };
        let source = render_facts(PROGRAM, &immutable);
        assert!(!source.contains(BPF_LOADER_UPGRADEABLE));
        let findings = detect_findings_in(ChainId::Solana, &source);
        assert!(findings.iter().all(|f| f.id != "solana-upgrade-authority"));

        let upgradeable = ProgramFacts {
            executable: true,
            upgrade_authority: Some("Auth111".to_string()),
            ..ProgramFacts::default()
        };
        let findings = detect_findings_in(ChainId::Solana, &render_facts(PROGRAM, &upgradeable));
        assert!(findings.iter().any(|f| f.id == "solana-upgrade-authority"));
    }

    #[test]
    fn test_parse_account_info() {
        let value = json!({
            "context": { "slot": 1 },
            "value": {
                "lamports": 1,
                "owner": BPF_LOADER_UPGRADEABLE,
                "executable": true,
                "rentEpoch": 0,
                "data": {
                    "program": "bpf-upgradeable-loader",
                    "parsed": { "type": "program", "info": { "programData": "Data111" } },
                    "space": 36
                }
            }
        });

        let parsed: RpcContextValue<SolanaAccountInfo> = serde_json::from_value(value).unwrap();
        let account = parsed.value.unwrap();
        let (kind, info) = account.parsed().unwrap();
        assert_eq!(kind, "program");
        assert_eq!(info["programData"], "Data111");
    }

    #[test]
    fn test_parse_missing_account() {
        let parsed: RpcContextValue<SolanaAccountInfo> =
            serde_json::from_value(json!({ "context": { "slot": 1 }, "value": null })).unwrap();
        assert!(parsed.value.is_none());
    }
}
