//! Stable identifiers for validation runs.
//!
//! A validation `type` names the kind of run that produced a result. A `trigger` names what
//! caused the run.

// Validation types
pub const VALIDATION_TYPE_ADMISSION: &str = "Admission";
pub const VALIDATION_TYPE_AUDIT: &str = "Audit";
pub const VALIDATION_TYPE_TF_ADMISSION: &str = "TFAdmission";

// Triggers
pub const TRIGGER_ADMISSION_CONTROLLER: &str = "AdmissionController";
pub const TRIGGER_PERIODIC_AUDIT: &str = "PeriodicAudit";
pub const TRIGGER_INITIAL_AUDIT: &str = "InitialAudit";

// Schemas
pub const SCHEMA_CONFIG_V1: &str = "admitguard.config.v1";

// Message recorded on compliant results.
pub const COMPLIANT_MESSAGE: &str = "compliant";
