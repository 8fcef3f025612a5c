//! Household impact: per-variable difference between a baseline and a reform
//! household calculation.

use serde_json::{json, Map, Value};

/// Compare two household results of the shape
/// `{"household": {..}, "person": [{..}, ..], ..}`.
///
/// For every numeric variable present on both sides, emits
/// `{"baseline": b, "reform": r, "change": r - b}`. Persons are paired by
/// position. Non-numeric and one-sided variables are skipped.
pub fn household_impact(baseline: &Value, reform: &Value) -> Value {
    let household = diff_entity(baseline.get("household"), reform.get("household"));

    let empty = Vec::new();
    let baseline_people = baseline
        .get("person")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let reform_people = reform
        .get("person")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let person: Vec<Value> = baseline_people
        .iter()
        .zip(reform_people)
        .map(|(b, r)| diff_entity(Some(b), Some(r)))
        .collect();

    json!({
        "household": household,
        "person": person,
    })
}

fn diff_entity(baseline: Option<&Value>, reform: Option<&Value>) -> Value {
    let mut out = Map::new();
    let (Some(Value::Object(baseline)), Some(Value::Object(reform))) = (baseline, reform) else {
        return Value::Object(out);
    };

    for (key, b) in baseline {
        if let Some(entry) = reform.get(key).and_then(|r| diff_value(b, r)) {
            out.insert(key.clone(), entry);
        }
    }
    Value::Object(out)
}

fn diff_value(baseline: &Value, reform: &Value) -> Option<Value> {
    if let (Some(b), Some(r)) = (baseline.as_i64(), reform.as_i64()) {
        if let Some(change) = r.checked_sub(b) {
            return Some(json!({ "baseline": b, "reform": r, "change": change }));
        }
    }
    let (b, r) = (baseline.as_f64()?, reform.as_f64()?);
    Some(json!({ "baseline": b, "reform": r, "change": r - b }))
}
