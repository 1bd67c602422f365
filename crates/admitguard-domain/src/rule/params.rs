use crate::error::EvalError;
use admitguard_types::{PolicyParameters, Value};
use std::collections::BTreeMap;

/// Materialize declared parameters into the `params` map seen by rule code.
///
/// A parameter without a value binds to `null`, unless it is required. Values whose shape
/// contradicts the declared type tag are rejected; unknown tags are not checked.
pub fn bind_parameters(parameters: &[PolicyParameters]) -> Result<Value, EvalError> {
    let mut bound = BTreeMap::new();
    for param in parameters {
        let value = match &param.value {
            Some(value) if !value.is_null() => {
                check_type(param, value)?;
                value.clone()
            }
            _ if param.required => return Err(EvalError::MissingParameter(param.name.clone())),
            _ => Value::Null,
        };
        bound.insert(param.name.clone(), value);
    }
    Ok(Value::Map(bound))
}

fn check_type(param: &PolicyParameters, value: &Value) -> Result<(), EvalError> {
    let ok = match param.param_type.trim().to_ascii_lowercase().as_str() {
        "string" => matches!(value, Value::String(_)),
        "integer" | "int" => value.as_i64().is_some(),
        "number" | "float" => value.is_number(),
        "boolean" | "bool" => matches!(value, Value::Bool(_)),
        "array" | "list" => matches!(value, Value::List(_)),
        "object" | "map" => matches!(value, Value::Map(_)),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(EvalError::ParameterType {
            name: param.name.clone(),
            expected: param.param_type.clone(),
            found: value.type_name().to_string(),
        })
    }
}
