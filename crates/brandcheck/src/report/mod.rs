//! Report aggregation: turns stage outputs into the fixed user-facing checks.

pub mod aggregator;

pub use aggregator::{aggregate, compliance_score, overall_status, ComplianceReport};
