//! RugShield Library
//!
//! Deterministic, rule-based risk scanner for smart contracts and programs
//! on Sui, EVM chains and Solana:
//! - Chain detection and per-chain target validation
//! - Source/metadata retrieval with retry and degraded-mode fallback
//! - Pattern rules, 0-100 safety score and risk tier
//! - API keys, daily quotas, usage metering and invoices

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{InMemoryRepository, RiskScore, ScanService};
pub use models::{AppError, AppResult, ErrorCode, ServiceConfig};
pub use providers::{detect_chain, resolve_chain, AnalyzerRegistry, ChainAnalyzer};
