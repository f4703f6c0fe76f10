use crate::entity::Entity;
use serde_json::Value;
use std::cmp::Ordering;

use super::types::{CmpOp, Condition, Join, TableQuery};

/// Evaluates the query's clauses against one entity, folding left to right.
/// A query without clauses matches everything.
#[must_use]
pub fn eval_query(entity: &Entity, query: &TableQuery) -> bool {
    let mut acc = true;
    for clause in &query.clauses {
        let m = eval_condition(entity, &clause.condition);
        acc = match clause.join {
            Join::Where => m,
            Join::And => acc && m,
            Join::Or => acc || m,
        };
    }
    acc
}

/// A missing attribute or a type mismatch never matches, whatever the operator.
#[must_use]
pub fn eval_condition(entity: &Entity, cond: &Condition) -> bool {
    let Some(v) = entity.get(&cond.field) else {
        return false;
    };
    let Some(ord) = compare_json(v, &cond.value) else {
        return false;
    };
    match cond.op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
    }
}

/// Orders two scalars of the same kind; `None` when the kinds differ.
#[must_use]
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return Some(i.cmp(&j));
            }
            let (f, g) = (x.as_f64()?, y.as_f64()?);
            Some(f.total_cmp(&g))
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
