//! EVM Analyzer
//!
//! Targets are 20-byte addresses, normalized to EIP-55 checksum casing.
//! Verified source comes from an Etherscan-compatible explorer
//! (`module=contract&action=getsourcecode`).

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use super::rpc::mask_url;
use super::{ChainAnalyzer, FetchedSource};
use crate::models::config::ProviderConfig;
use crate::models::types::ChainId;
use crate::utils::retry::RetryOptions;

lazy_static! {
    static ref EVM_HEX_ADDRESS: Regex =
        Regex::new(r"^(0x)?[0-9a-fA-F]{40}$").expect("valid regex");
}

/// Explorer envelope; `result` is an array on success and a message string on failure
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExplorerSourceRecord {
    #[serde(default)]
    source_code: String,
    #[serde(default)]
    compiler_version: String,
    #[serde(default)]
    contract_name: String,
}

pub struct EvmAnalyzer {
    client: reqwest::Client,
    explorer_url: String,
    api_key: Option<String>,
    retry: RetryOptions,
    lookups_enabled: bool,
}

impl EvmAnalyzer {
    pub fn new(config: &ProviderConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            explorer_url: config.etherscan_api_url.clone(),
            api_key: config.etherscan_api_key.clone(),
            retry: config.retry,
            lookups_enabled: config.lookups_enabled,
        }
    }

    /// Parse a hex address. Mixed-case input must carry a valid EIP-55 checksum.
    pub fn parse_address(target: &str) -> Option<Address> {
        let value = target.trim();
        if !EVM_HEX_ADDRESS.is_match(value) {
            return None;
        }

        let body = value.strip_prefix("0x").unwrap_or(value);
        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());

        if has_lower && has_upper {
            Address::parse_checksummed(format!("0x{}", body), None).ok()
        } else {
            Address::from_str(body).ok()
        }
    }
}

#[async_trait]
impl ChainAnalyzer for EvmAnalyzer {
    fn chain(&self) -> ChainId {
        ChainId::Evm
    }

    fn compiler(&self) -> &'static str {
        "solidity"
    }

    fn normalize_target(&self, target: &str) -> String {
        match Self::parse_address(target) {
            Some(address) => address.to_checksum(None),
            None => target.trim().to_string(),
        }
    }

    fn is_valid_target(&self, target: &str) -> bool {
        Self::parse_address(target).is_some()
    }

    fn placeholder_source(&self, normalized: &str) -> String {
        format!("// EVM contract {}\ncontract Unknown {{}}", normalized)
    }

    fn retry_options(&self) -> &RetryOptions {
        &self.retry
    }

    fn lookups_enabled(&self) -> bool {
        self.lookups_enabled
    }

    async fn lookup_source(&self, normalized: &str) -> Result<Option<FetchedSource>> {
        let mut query = vec![
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", normalized),
        ];
        if let Some(key) = self.api_key.as_deref() {
            query.push(("apikey", key));
        }

        debug!(
            url = %mask_url(&self.explorer_url),
            address = normalized,
            "📡 Explorer getsourcecode"
        );

        let response = self
            .client
            .get(&self.explorer_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| eyre!("Request failed: {}", e))?;

        let status = response.status();
        if status == 429 {
            return Err(eyre!("Rate limited (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(eyre!("HTTP error: {}", status));
        }

        let body: ExplorerResponse = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse explorer response: {}", e))?;

        parse_explorer_response(body)
    }
}

fn parse_explorer_response(body: ExplorerResponse) -> Result<Option<FetchedSource>> {
    if body.status != "1" {
        let detail = body
            .result
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.message.clone());
        return Err(eyre!("Explorer error: {}", detail));
    }

    let record: ExplorerSourceRecord = match body.result.as_array().and_then(|r| r.first()) {
        Some(first) => serde_json::from_value(first.clone())
            .map_err(|e| eyre!("Failed to parse source record: {}", e))?,
        None => return Ok(None),
    };

    if record.source_code.trim().is_empty() {
        return Ok(None);
    }

    debug!(
        contract = %record.contract_name,
        compiler = %record.compiler_version,
        "Verified source found"
    );

    Ok(Some(FetchedSource {
        source_code: record.source_code,
        compiler: Some(record.compiler_version).filter(|c| !c.trim().is_empty()),
        verified: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

    fn analyzer() -> EvmAnalyzer {
        EvmAnalyzer::new(&ProviderConfig::offline(), reqwest::Client::new())
    }

    #[test]
    fn test_checksum_normalization() {
        let evm = analyzer();
        let lower = WETH.to_lowercase();

        assert!(evm.is_valid_target(&lower));
        assert_eq!(evm.normalize_target(&lower), WETH);
        assert_eq!(evm.normalize_target(WETH), WETH);
        assert!(evm.is_valid_target(WETH.trim_start_matches("0x")));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let evm = analyzer();
        // flip the case of one letter
        let broken = WETH.replacen("C02aaA", "C02aAA", 1);
        assert!(!evm.is_valid_target(&broken));
        assert!(!evm.is_valid_target("0x1234"));
        assert!(!evm.is_valid_target(&format!("0x{}", "z".repeat(40))));
    }

    #[test]
    fn test_placeholder_source() {
        assert_eq!(
            analyzer().placeholder_source(WETH),
            format!("// EVM contract {}\ncontract Unknown {{}}", WETH)
        );
    }

    #[test]
    fn test_explorer_verified_source() {
        let body: ExplorerResponse = serde_json::from_value(json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "SourceCode": "contract Token { function mint() onlyOwner {} }",
                "CompilerVersion": "v0.8.19+commit.7dd6d404",
                "ContractName": "Token"
            }]
        }))
        .unwrap();

        let fetched = parse_explorer_response(body).unwrap().unwrap();
        assert!(fetched.verified);
        assert_eq!(fetched.compiler.as_deref(), Some("v0.8.19+commit.7dd6d404"));
        assert!(fetched.source_code.contains("onlyOwner"));
    }

    #[test]
    fn test_explorer_unverified_is_not_an_error() {
        let body: ExplorerResponse = serde_json::from_value(json!({
            "status": "1",
            "message": "OK",
            "result": [{ "SourceCode": "", "CompilerVersion": "", "ContractName": "" }]
        }))
        .unwrap();
        assert!(parse_explorer_response(body).unwrap().is_none());
    }

    #[test]
    fn test_explorer_error_is_degraded() {
        let body: ExplorerResponse = serde_json::from_value(json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Missing/Invalid API Key"
        }))
        .unwrap();
        let err = parse_explorer_response(body).unwrap_err();
        assert!(err.to_string().contains("Missing/Invalid API Key"));
    }
}
