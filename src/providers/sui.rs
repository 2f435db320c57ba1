//! Sui Analyzer
//!
//! Packages are addressed by 32-byte object ids. The fullnode exposes the
//! normalized module ABI (`sui_getNormalizedMoveModulesByPackage`), which we
//! render as Move-like text so the rule engine sees struct and function
//! signatures, e.g. `public fun mint(arg0: &mut coin::TreasuryCap<T0>, ...)`.

use async_trait::async_trait;
use eyre::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt::Write;

use super::rpc::{is_not_found, JsonRpcClient};
use super::{ChainAnalyzer, FetchedSource};
use crate::models::config::ProviderConfig;
use crate::models::types::ChainId;
use crate::utils::retry::RetryOptions;

lazy_static! {
    static ref SUI_PACKAGE_ID: Regex = Regex::new(r"^0x[0-9a-f]{64}$").expect("valid regex");
}

pub struct SuiAnalyzer {
    rpc: JsonRpcClient,
    retry: RetryOptions,
    lookups_enabled: bool,
}

impl SuiAnalyzer {
    pub fn new(config: &ProviderConfig, client: reqwest::Client) -> Self {
        Self {
            rpc: JsonRpcClient::new(config.sui_rpc_url.clone(), "sui-mainnet", client),
            retry: config.retry,
            lookups_enabled: config.lookups_enabled,
        }
    }
}

#[async_trait]
impl ChainAnalyzer for SuiAnalyzer {
    fn chain(&self) -> ChainId {
        ChainId::Sui
    }

    fn compiler(&self) -> &'static str {
        "sui-move"
    }

    fn normalize_target(&self, target: &str) -> String {
        let lower = target.trim().to_lowercase();
        if lower.starts_with("0x") {
            lower
        } else {
            format!("0x{}", lower)
        }
    }

    fn is_valid_target(&self, target: &str) -> bool {
        SUI_PACKAGE_ID.is_match(&self.normalize_target(target))
    }

    fn placeholder_source(&self, normalized: &str) -> String {
        [
            format!("// SUI package: {}", normalized),
            "module rugshield::sample {".to_string(),
            "  public fun transfer_guard() {}".to_string(),
            "}".to_string(),
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
        let modules = match self
            .rpc
            .call::<Map<String, Value>>(
                "sui_getNormalizedMoveModulesByPackage",
                serde_json::json!([normalized]),
            )
            .await
        {
            Ok(modules) => modules,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(modules
            .filter(|m| !m.is_empty())
            .map(|modules| FetchedSource {
                source_code: render_package(normalized, &modules),
                compiler: None,
                verified: true,
            }))
    }
}

/// Render a normalized package as Move-like declarations
pub fn render_package(package: &str, modules: &Map<String, Value>) -> String {
    let mut out = format!("// SUI package: {}\n", package);

    for (name, module) in modules {
        let _ = writeln!(out, "module {}::{} {{", package, name);

        if let Some(structs) = module.get("structs").and_then(Value::as_object) {
            for (struct_name, def) in structs {
                let abilities = def
                    .pointer("/abilities/abilities")
                    .and_then(Value::as_array)
                    .map(|list| {
                        list.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_lowercase)
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();

                let fields = def
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|f| {
                                format!(
                                    "{}: {}",
                                    f.get("name").and_then(Value::as_str).unwrap_or("_"),
                                    f.get("type").map(render_type).unwrap_or_default()
                                )
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();

                let has = if abilities.is_empty() {
                    String::new()
                } else {
                    format!(" has {}", abilities.join(", "))
                };
                let _ = writeln!(
                    out,
                    "  struct {}{} {{ {} }}",
                    struct_name,
                    has,
                    fields.join(", ")
                );
            }
        }

        if let Some(functions) = module.get("exposedFunctions").and_then(Value::as_object) {
            for (fn_name, def) in functions {
                let visibility = match def.get("visibility").and_then(Value::as_str) {
                    Some("Public") => "public ",
                    Some("Friend") => "public(friend) ",
                    _ => "",
                };
                let entry = if def.get("isEntry").and_then(Value::as_bool).unwrap_or(false) {
                    "entry "
                } else {
                    ""
                };

                let params = def
                    .get("parameters")
                    .and_then(Value::as_array)
                    .map(|params| {
                        params
                            .iter()
                            .enumerate()
                            .map(|(i, t)| format!("arg{}: {}", i, render_type(t)))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();

                let returns = def
                    .get("return")
                    .and_then(Value::as_array)
                    .map(|ret| ret.iter().map(render_type).collect::<Vec<_>>())
                    .unwrap_or_default();
                let ret = match returns.len() {
                    0 => String::new(),
                    1 => format!(": {}", returns[0]),
                    _ => format!(": ({})", returns.join(", ")),
                };

                let _ = writeln!(
                    out,
                    "  {}{}fun {}({}){};",
                    visibility,
                    entry,
                    fn_name,
                    params.join(", "),
                    ret
                );
            }
        }

        out.push_str("}\n");
    }

    out
}

/// Normalized Move type -> source-like text
fn render_type(ty: &Value) -> String {
    match ty {
        Value::String(prim) => prim.to_lowercase(),
        Value::Object(obj) => {
            if let Some(inner) = obj.get("Reference") {
                format!("&{}", render_type(inner))
            } else if let Some(inner) = obj.get("MutableReference") {
                format!("&mut {}", render_type(inner))
            } else if let Some(inner) = obj.get("Vector") {
                format!("vector<{}>", render_type(inner))
            } else if let Some(index) = obj.get("TypeParameter") {
                format!("T{}", index)
            } else if let Some(s) = obj.get("Struct") {
                let module = s.get("module").and_then(Value::as_str).unwrap_or("_");
                let name = s.get("name").and_then(Value::as_str).unwrap_or("_");
                let args = s
                    .get("typeArguments")
                    .and_then(Value::as_array)
                    .map(|args| args.iter().map(render_type).collect::<Vec<_>>())
                    .unwrap_or_default();
                if args.is_empty() {
                    format!("{}::{}", module, name)
                } else {
                    format!("{}::{}<{}>", module, name, args.join(", "))
                }
            } else {
                "_".to_string()
            }
        }
        _ => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analyzer() -> SuiAnalyzer {
        SuiAnalyzer::new(&ProviderConfig::offline(), reqwest::Client::new())
    }

    #[test]
    fn test_normalize_and_validate() {
        let sui = analyzer();
        let raw = format!("  {}  ", "AB".repeat(32));
        let normalized = sui.normalize_target(&raw);

        assert_eq!(normalized, format!("0x{}", "ab".repeat(32)));
        assert!(sui.is_valid_target(&raw));
        assert!(!sui.is_valid_target("0x1234"));
        assert!(!sui.is_valid_target(&format!("0x{}", "g".repeat(64))));
    }

    #[test]
    fn test_placeholder_source() {
        let sui = analyzer();
        let source = sui.placeholder_source("0xabc");
        assert_eq!(
            source,
            "// SUI package: 0xabc\nmodule rugshield::sample {\n  public fun transfer_guard() {}\n}"
        );
    }

    #[test]
    fn test_render_package() {
        let modules = json!({
            "coin_factory": {
                "structs": {
                    "Vault": {
                        "abilities": { "abilities": ["Key", "Store"] },
                        "fields": [{ "name": "id", "type": { "Struct": {
                            "address": "0x2", "module": "object", "name": "UID", "typeArguments": []
                        }}}]
                    }
                },
                "exposedFunctions": {
                    "mint": {
                        "visibility": "Public",
                        "isEntry": false,
                        "parameters": [
                            { "MutableReference": { "Struct": {
                                "address": "0x2", "module": "coin", "name": "TreasuryCap",
                                "typeArguments": [{ "TypeParameter": 0 }]
                            }}},
                            "U64"
                        ],
                        "return": []
                    }
                }
            }
        });

        let rendered = render_package("0x1", modules.as_object().unwrap());
        assert!(rendered.contains("module 0x1::coin_factory {"));
        assert!(rendered.contains("struct Vault has key, store { id: object::UID }"));
        assert!(rendered
            .contains("public fun mint(arg0: &mut coin::TreasuryCap<T0>, arg1: u64);"));
    }
}
