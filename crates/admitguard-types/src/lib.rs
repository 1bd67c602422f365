//! Stable DTOs and IDs used across the admitguard workspace.
//!
//! This crate is intentionally boring:
//! - the closed `Value` union used for entity documents and parameter values
//! - entities, policies, and their targeting metadata (the policy document contract)
//! - validation results and per-entity summaries
//! - stable string IDs for validation types and triggers

#![forbid(unsafe_code)]

pub mod entity;
pub mod ids;
pub mod policy;
pub mod validation;
pub mod value;

pub use entity::{EntitiesList, Entity, ListOptions};
pub use policy::{
    LABEL_WILDCARD, LabelSelector, Policy, PolicyExclusions, PolicyParameters, PolicyStandard,
    PolicyTargets, Provider, Severity,
};
pub use validation::{PolicyValidation, PolicyValidationStatus, PolicyValidationSummary};
pub use value::Value;
