//! Shared test utilities for brandcheck integration tests.
//!
//! This module provides:
//! - `TestHarness`: in-memory database, temp-dir asset store and scripted
//!   capabilities wired into a real `Pipeline`
//! - Builders for vision replies, compliance replies and brands

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedTranscript, TestHarness};
