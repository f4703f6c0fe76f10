use crate::errors::AdapterError;
use serde_json::Value;
use std::fmt::Write as _;

// The store rejects filters with more discrete comparisons than this.
pub(crate) const MAX_FILTER_COMPARISONS: usize = 15;

/// Comparison operators understood by the store's filter language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Caller-side operator spellings and the native operator each one maps to.
const OPERATOR_TABLE: &[(&str, CmpOp)] = &[
    ("=", CmpOp::Eq),
    ("==", CmpOp::Eq),
    ("eq", CmpOp::Eq),
    ("equals", CmpOp::Eq),
    ("!=", CmpOp::Ne),
    ("<>", CmpOp::Ne),
    ("ne", CmpOp::Ne),
    ("not", CmpOp::Ne),
    (">", CmpOp::Gt),
    ("gt", CmpOp::Gt),
    ("greaterThan", CmpOp::Gt),
    (">=", CmpOp::Ge),
    ("ge", CmpOp::Ge),
    ("greaterThanOrEqual", CmpOp::Ge),
    ("<", CmpOp::Lt),
    ("lt", CmpOp::Lt),
    ("lessThan", CmpOp::Lt),
    ("<=", CmpOp::Le),
    ("le", CmpOp::Le),
    ("lessThanOrEqual", CmpOp::Le),
];

impl CmpOp {
    #[must_use]
    pub fn from_operator(op: &str) -> Option<Self> {
        OPERATOR_TABLE.iter().find(|(name, _)| *name == op).map(|(_, cmp)| *cmp)
    }

    #[must_use]
    pub const fn as_native(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }
}

/// How conditions after the first are combined; one mode per translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// How a clause attaches to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    Where,
    And,
    Or,
}

impl From<Logic> for Join {
    fn from(l: Logic) -> Self {
        match l {
            Logic::And => Self::And,
            Logic::Or => Self::Or,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CmpOp,
    pub value: Value,
}

impl Condition {
    /// # Errors
    /// Returns `AdapterError::Query` if `field` is not a plain property name or
    /// `value` is not a scalar.
    pub fn new(field: &str, op: CmpOp, value: Value) -> Result<Self, AdapterError> {
        if !is_property_name(field) {
            return Err(AdapterError::Query(format!("invalid field name '{field}'")));
        }
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            return Err(AdapterError::Query(format!(
                "value compared against field '{field}' must be a scalar"
            )));
        }
        Ok(Self { field: field.to_string(), op, value })
    }
}

/// ASCII letter or `_`, then letters, digits or `_`. Anything else would be
/// spliced into the filter text as syntax.
fn is_property_name(field: &str) -> bool {
    let mut chars = field.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub join: Join,
    pub condition: Condition,
}

/// A native query against one table: ordered filter clauses plus an optional row cap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableQuery {
    pub table: String,
    pub clauses: Vec<Clause>,
    pub top: Option<u32>,
}

impl TableQuery {
    /// Select every column from `table` with no filter.
    #[must_use]
    pub fn from_table(table: &str) -> Self {
        Self { table: table.to_string(), clauses: Vec::new(), top: None }
    }

    /// Appends a condition. The first clause always attaches as a bare `where`.
    #[must_use]
    pub fn attach(mut self, join: Join, condition: Condition) -> Self {
        let join = if self.clauses.is_empty() { Join::Where } else { join };
        self.clauses.push(Clause { join, condition });
        self
    }

    #[must_use]
    pub const fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    #[must_use]
    pub fn has_filter(&self) -> bool {
        !self.clauses.is_empty()
    }

    /// Renders the clauses in the store's filter syntax, e.g.
    /// `PartitionKey eq 'users' and age gt 30`.
    #[must_use]
    pub fn filter_expression(&self) -> String {
        let mut out = String::new();
        for clause in &self.clauses {
            match clause.join {
                Join::Where => {}
                Join::And => out.push_str(" and "),
                Join::Or => out.push_str(" or "),
            }
            let c = &clause.condition;
            let _ = write!(out, "{} {} {}", c.field, c.op.as_native(), format_literal(&c.value));
        }
        out
    }
}

/// Formats a scalar as a filter literal.
#[must_use]
pub fn format_literal(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() { i.to_string() } else { format!("{i}L") }
            } else if let Some(u) = n.as_u64() {
                format!("{u}L")
            } else {
                format!("{:?}", n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}
