//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based grouping of candidate paths (stage 1)
//! - Digest computation reconciled with the catalog (stage 2)
//! - Digest-based grouping (stage 3)
//! - Optional byte-for-byte verification (stage 4)
//! - The orchestrator that runs the stages and links the result

pub mod compare;
pub mod finder;
pub mod groups;
pub mod reconcile;

pub use compare::{files_equal, split_identical, verify_groups};
pub use finder::{DedupeConfig, Deduplicator, FinderError, RunSummary};
pub use groups::{group_by_digest, group_by_size, DuplicateGroup, SizeGroupingStats};
pub use reconcile::{ReconcileError, ReconcileStats, Reconciler, Reconciliation};
