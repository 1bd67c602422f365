use admitguard_types::Policy;
use sha2::{Digest, Sha256};

/// Compute a stable SHA-256 fingerprint for the compiled form of a policy.
///
/// Identity fields:
/// - rule code
/// - declared parameter names (sorted)
///
/// Parameter values are bound per evaluation and do not affect the compiled program.
pub fn fingerprint_for_rule(policy: &Policy) -> String {
    let mut names: Vec<&str> = policy.parameters.iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();

    let mut hasher = Sha256::new();
    update_field(&mut hasher, &policy.code);
    for name in names {
        update_field(&mut hasher, name);
    }
    let digest = hasher.finalize();
    hex::encode(digest)
}

// Length-prefixed, so no field boundary can be forged from inside a field.
fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}
