use crate::errors::AdapterError;
use crate::utils::json::object_or_empty;
use serde_json::{Map, Value};

use super::types::{CmpOp, Condition, Logic, MAX_FILTER_COMPARISONS, TableQuery};

/// Translate caller options into a native query, combining conditions with AND.
///
/// # Errors
/// Returns `AdapterError::Query` for malformed `where`/`limit` values or unknown operators.
pub fn translate(base: TableQuery, options: &Map<String, Value>) -> Result<TableQuery, AdapterError> {
    translate_with_logic(base, options, Logic::And)
}

/// Translate caller options, attaching every condition after the first with `logic`.
///
/// # Errors
/// See [`translate`].
pub fn translate_with_logic(
    base: TableQuery,
    options: &Map<String, Value>,
    logic: Logic,
) -> Result<TableQuery, AdapterError> {
    let mut query = base;
    for (key, value) in options {
        query = filter_query(query, key, value, logic)?;
    }
    if query.clauses.len() > MAX_FILTER_COMPARISONS {
        return Err(AdapterError::Query(format!(
            "filter has {} comparisons; the table store accepts at most {MAX_FILTER_COMPARISONS}",
            query.clauses.len()
        )));
    }
    log::debug!(
        target: "tableshim::queries",
        "table={} filter=\"{}\" top={:?}",
        query.table,
        query.filter_expression(),
        query.top
    );
    Ok(query)
}

/// Applies one top-level option to `query`.
///
/// Keys other than `where` and `limit` are logged and left out of the query.
///
/// # Errors
/// See [`translate`].
pub fn filter_query(
    query: TableQuery,
    key: &str,
    value: &Value,
    logic: Logic,
) -> Result<TableQuery, AdapterError> {
    match key {
        "where" => {
            let conditions = object_or_empty(value, "where")?;
            let mut query = query;
            for (field, v) in conditions.iter() {
                query = query.attach(logic.into(), condition_for(field, v)?);
            }
            Ok(query)
        }
        "limit" => match value {
            Value::Null => Ok(query),
            v => Ok(query.top(parse_limit(v)?)),
        },
        other => {
            log::warn!("Invalid filter provided for tableshim. Key: {other}");
            Ok(query)
        }
    }
}

fn condition_for(field: &str, value: &Value) -> Result<Condition, AdapterError> {
    match value {
        Value::Object(ops) => {
            let mut iter = ops.iter();
            let Some((op, operand)) = iter.next() else {
                return Err(AdapterError::Query(format!("empty operator map for field '{field}'")));
            };
            if iter.next().is_some() {
                log::warn!("field '{field}' has several operators; only '{op}' is applied");
            }
            let cmp = CmpOp::from_operator(op).ok_or_else(|| {
                AdapterError::Query(format!("unknown comparison operator '{op}' on field '{field}'"))
            })?;
            Condition::new(field, cmp, operand.clone())
        }
        scalar => Condition::new(field, CmpOp::Eq, scalar.clone()),
    }
}

fn parse_limit(v: &Value) -> Result<u32, AdapterError> {
    v.as_u64()
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| AdapterError::Query(format!("limit must be a positive integer, got {v}")))
}
