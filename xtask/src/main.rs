//! Developer tasks (schema generation, policy fixture conformance).
//!
//! Keeping this separate keeps the library crates free of file-system tooling.

use admitguard_domain::{CancelToken, RuleEngine, ScriptEngine, applies};
use admitguard_types::{Entity, Policy, Value};
use anyhow::{Context, bail};
use schemars::schema_for;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the project root (parent of the xtask directory).
fn project_root() -> anyhow::Result<PathBuf> {
    let manifest_dir = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir().context("Cannot determine current directory")?,
    };

    if manifest_dir.ends_with("xtask") {
        manifest_dir
            .parent()
            .map(Path::to_path_buf)
            .context("xtask has no parent directory")
    } else {
        Ok(manifest_dir)
    }
}

fn schemas_dir() -> anyhow::Result<PathBuf> {
    Ok(project_root()?.join("schemas"))
}

fn fixtures_dir() -> anyhow::Result<PathBuf> {
    Ok(project_root()?.join("tests").join("fixtures"))
}

/// Schema definition with its target filename.
struct SchemaSpec {
    filename: &'static str,
    generate: fn() -> schemars::Schema,
}

/// The policy document contract honored by every policy source.
fn generate_policy_schema() -> schemars::Schema {
    schema_for!(admitguard_types::Policy)
}

fn generate_summary_schema() -> schemars::Schema {
    schema_for!(admitguard_types::PolicyValidationSummary)
}

fn generate_config_schema() -> schemars::Schema {
    schema_for!(admitguard_settings::ValidatorConfigV1)
}

fn schema_specs() -> Vec<SchemaSpec> {
    vec![
        SchemaSpec {
            filename: "admitguard.policy.v1.json",
            generate: generate_policy_schema,
        },
        SchemaSpec {
            filename: "admitguard.validation-summary.v1.json",
            generate: generate_summary_schema,
        },
        SchemaSpec {
            filename: "admitguard.config.v1.json",
            generate: generate_config_schema,
        },
    ]
}

/// Serialize a schema to pretty-printed JSON with trailing newline.
fn serialize_schema(schema: &schemars::Schema) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(schema).context("Failed to serialize schema")?;
    json.push('\n');
    Ok(json)
}

/// Emit schemas to the schemas/ directory.
fn emit_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir()?;
    fs::create_dir_all(&dir).context("Failed to create schemas directory")?;

    for spec in schema_specs() {
        let json = serialize_schema(&(spec.generate)())?;
        let path = dir.join(spec.filename);
        fs::write(&path, &json)
            .with_context(|| format!("Failed to write schema to {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    println!("\nSchemas emitted successfully.");
    Ok(())
}

/// Check that schemas in the repo match what would be generated.
fn validate_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir()?;
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for spec in schema_specs() {
        let path = dir.join(spec.filename);
        if !path.exists() {
            missing.push(spec.filename);
            continue;
        }

        let expected = serialize_schema(&(spec.generate)())?;
        let actual = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if expected != actual {
            mismatched.push(spec.filename);
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        println!("All schemas are up to date.");
        return Ok(());
    }

    if !missing.is_empty() {
        eprintln!("Missing schemas:");
        for name in &missing {
            eprintln!("  - {name}");
        }
    }
    if !mismatched.is_empty() {
        eprintln!("Schemas out of date:");
        for name in &mismatched {
            eprintln!("  - {name}");
        }
    }
    eprintln!("\nRun `cargo xtask emit-schemas` to regenerate.");
    bail!("Schema validation failed")
}

fn print_help() {
    eprintln!("xtask commands:");
    eprintln!("  help              Show this message");
    eprintln!("  emit-schemas      Generate JSON schemas from Rust types to schemas/");
    eprintln!("  validate-schemas  Check if schemas/ matches generated output (for CI)");
    eprintln!("  print-schema-ids  Print known schema IDs");
    eprintln!("  conform           Check policy fixtures (schema, compilation) and entity goldens");
}

/// JSON files in `dir`, sorted, skipping golden files.
fn json_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let is_golden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(".expected.json"));
        if is_json && !is_golden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as JSON", path.display()))
}

/// Validate every policy fixture against the policy schema and compile its rule code.
fn conform_policies(dir: &Path, errors: &mut Vec<String>) -> anyhow::Result<Vec<Policy>> {
    let schema = serde_json::to_value(generate_policy_schema())?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("Failed to compile policy schema: {e}"))?;

    let mut policies = Vec::new();
    let mut seen = BTreeSet::new();
    for path in json_files(dir)? {
        let filename = file_label(&path);
        let value = read_json(&path)?;

        for err in validator.iter_errors(&value) {
            errors.push(format!("{filename}: schema validation: {err}"));
        }

        let policy: Policy = match serde_json::from_value(value) {
            Ok(policy) => policy,
            Err(err) => {
                errors.push(format!("{filename}: not a policy document: {err}"));
                continue;
            }
        };
        if !seen.insert(policy.id.clone()) {
            errors.push(format!("{filename}: duplicate policy id '{}'", policy.id));
        }
        if let Err(err) = ScriptEngine.compile(&policy) {
            errors.push(format!("{filename}: policy '{}' does not compile: {err}", policy.id));
            continue;
        }

        println!("  ✓ {filename} validates and compiles");
        policies.push(policy);
    }

    if policies.is_empty() && errors.is_empty() {
        bail!("No policy fixtures found in {}", dir.display());
    }
    Ok(policies)
}

/// Violation reasons per policy ID plus compliant policy IDs, for golden comparison.
fn outcome(policies: &[Policy], entity: &Entity) -> anyhow::Result<serde_json::Value> {
    let cancel = CancelToken::new();
    let mut violations = BTreeMap::new();
    let mut compliances = Vec::new();

    for policy in policies.iter().filter(|p| applies(p, entity)) {
        let program = ScriptEngine
            .compile(policy)
            .with_context(|| format!("compile {}", policy.id))?;
        let reasons = ScriptEngine
            .evaluate(&program, &entity.document, &policy.parameters, &cancel)
            .with_context(|| format!("evaluate {} against {}", policy.id, entity.id))?;
        if reasons.is_empty() {
            compliances.push(policy.id.clone());
        } else {
            violations.insert(policy.id.clone(), reasons);
        }
    }
    compliances.sort();

    Ok(serde_json::json!({
        "violations": violations,
        "compliances": compliances,
    }))
}

/// Evaluate every entity fixture against the policy fixtures and compare with its golden.
fn conform_entities(dir: &Path, policies: &[Policy], errors: &mut Vec<String>) -> anyhow::Result<()> {
    for path in json_files(dir)? {
        let filename = file_label(&path);
        let entity = Entity::from_document(Value::from(read_json(&path)?));
        let actual = match outcome(policies, &entity) {
            Ok(actual) => actual,
            Err(err) => {
                errors.push(format!("{filename}: {err:#}"));
                continue;
            }
        };

        let golden_path = path.with_extension("expected.json");
        if !golden_path.exists() {
            errors.push(format!(
                "{filename}: missing golden file {}",
                file_label(&golden_path)
            ));
            continue;
        }
        if read_json(&golden_path)? != actual {
            errors.push(format!(
                "{filename}: outcome differs from {}:\n{}",
                file_label(&golden_path),
                serde_json::to_string_pretty(&actual)?
            ));
            continue;
        }
        println!("  ✓ {filename} matches its golden outcome");
    }
    Ok(())
}

fn conform() -> anyhow::Result<()> {
    let fixtures = fixtures_dir()?;
    let mut errors = Vec::new();

    println!("Policy fixtures:");
    let policies = conform_policies(&fixtures.join("policies"), &mut errors)?;

    println!("\nEntity fixtures:");
    conform_entities(&fixtures.join("entities"), &policies, &mut errors)?;

    if !errors.is_empty() {
        eprintln!("\nConformance errors:");
        for err in &errors {
            eprintln!("  - {err}");
        }
        bail!("Conformance validation failed with {} errors", errors.len());
    }

    println!("\n✓ All fixtures pass conformance checks!");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match cmd {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "emit-schemas" => emit_schemas(),
        "validate-schemas" => validate_schemas(),
        "conform" => conform(),
        "print-schema-ids" => {
            println!("{}", admitguard_types::ids::SCHEMA_CONFIG_V1);
            for spec in schema_specs() {
                println!("{}", spec.filename.trim_end_matches(".json"));
            }
            Ok(())
        }
        other => bail!("unknown xtask command: {other}\n\nRun `cargo xtask help` for usage."),
    }
    .context("xtask failed")
}
