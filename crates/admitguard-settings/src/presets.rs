use admitguard_domain::{SinkFailureMode, ValidatorOptions};
use admitguard_types::ids;
use std::time::Duration;

pub const PROFILE_ADMISSION: &str = "admission";
pub const PROFILE_AUDIT: &str = "audit";
pub const PROFILE_TF_ADMISSION: &str = "tf-admission";

const ADMISSION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Preset profiles. `None` for an unknown name.
pub fn preset(profile: &str) -> Option<ValidatorOptions> {
    match profile {
        PROFILE_ADMISSION => Some(admission_profile(ids::VALIDATION_TYPE_ADMISSION)),
        PROFILE_TF_ADMISSION => Some(admission_profile(ids::VALIDATION_TYPE_TF_ADMISSION)),
        PROFILE_AUDIT => Some(audit_profile()),
        _ => None,
    }
}

// An admission webhook is waiting on the answer, so it gets a deadline and a failed
// sink fails the request.
fn admission_profile(validation_type: &str) -> ValidatorOptions {
    ValidatorOptions {
        validation_type: validation_type.to_string(),
        write_compliance: false,
        sink_failure: SinkFailureMode::Propagate,
        evaluation_timeout: Some(ADMISSION_TIMEOUT),
        ..ValidatorOptions::default()
    }
}

fn audit_profile() -> ValidatorOptions {
    ValidatorOptions {
        validation_type: ids::VALIDATION_TYPE_AUDIT.to_string(),
        write_compliance: true,
        sink_failure: SinkFailureMode::Report,
        evaluation_timeout: None,
        ..ValidatorOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_profiles_resolve() {
        let audit = preset(PROFILE_AUDIT).expect("audit");
        assert!(audit.write_compliance);
        assert_eq!(audit.sink_failure, SinkFailureMode::Report);

        let tf = preset(PROFILE_TF_ADMISSION).expect("tf-admission");
        assert_eq!(tf.validation_type, ids::VALIDATION_TYPE_TF_ADMISSION);
        assert_eq!(tf.evaluation_timeout, Some(ADMISSION_TIMEOUT));

        assert!(preset("strict").is_none());
    }
}
