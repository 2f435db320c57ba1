//! Core Module - Rule Engine, Scoring & Scan Service
//!
//! Deterministic rule evaluation, scoring, persistence contracts and the
//! service that ties them together.

pub mod memory;
pub mod repository;
pub mod risk_score;
pub mod rules;
pub mod service;

pub use memory::InMemoryRepository;
pub use repository::{AccessRepository, ScanRepository};
pub use risk_score::*;
pub use rules::*;
pub use service::ScanService;
