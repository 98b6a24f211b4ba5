//! Criterion predicates and the constructors used to build them

use std::fmt;

use crate::model::Value;

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Like,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equal => write!(f, "="),
            Operator::NotEqual => write!(f, "<>"),
            Operator::GreaterThan => write!(f, ">"),
            Operator::LessThan => write!(f, "<"),
            Operator::GreaterThanOrEqual => write!(f, ">="),
            Operator::LessThanOrEqual => write!(f, "<="),
            Operator::Like => write!(f, "LIKE"),
        }
    }
}

/// A predicate on the fields of one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Compare {
        field: String,
        operator: Operator,
        value: Value,
        ignore_case: bool,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
        ignore_case: bool,
    },
    In {
        field: String,
        values: Vec<Value>,
        ignore_case: bool,
    },
    IsNull {
        field: String,
    },
    NotNull {
        field: String,
    },
    And(Box<Criterion>, Box<Criterion>),
    Or(Box<Criterion>, Box<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    /// Compare text case-insensitively. Has no effect on null checks and
    /// logical combinations.
    pub fn ignore_case(mut self) -> Self {
        match &mut self {
            Criterion::Compare { ignore_case, .. }
            | Criterion::Between { ignore_case, .. }
            | Criterion::In { ignore_case, .. } => *ignore_case = true,
            _ => {}
        }
        self
    }

    /// AND or OR
    pub fn is_junction(&self) -> bool {
        matches!(self, Criterion::And(..) | Criterion::Or(..))
    }
}

fn compare(field: &str, operator: Operator, value: impl Into<Value>) -> Criterion {
    Criterion::Compare {
        field: field.to_string(),
        operator,
        value: value.into(),
        ignore_case: false,
    }
}

pub fn eq(field: &str, value: impl Into<Value>) -> Criterion {
    compare(field, Operator::Equal, value)
}

pub fn ne(field: &str, value: impl Into<Value>) -> Criterion {
    compare(field, Operator::NotEqual, value)
}

pub fn gt(field: &str, value: impl Into<Value>) -> Criterion {
    compare(field, Operator::GreaterThan, value)
}

pub fn lt(field: &str, value: impl Into<Value>) -> Criterion {
    compare(field, Operator::LessThan, value)
}

pub fn gte(field: &str, value: impl Into<Value>) -> Criterion {
    compare(field, Operator::GreaterThanOrEqual, value)
}

pub fn lte(field: &str, value: impl Into<Value>) -> Criterion {
    compare(field, Operator::LessThanOrEqual, value)
}

/// SQL `LIKE` with the pattern passed through unchanged
pub fn like(field: &str, pattern: impl Into<Value>) -> Criterion {
    compare(field, Operator::Like, pattern)
}

pub fn between(field: &str, low: impl Into<Value>, high: impl Into<Value>) -> Criterion {
    Criterion::Between {
        field: field.to_string(),
        low: low.into(),
        high: high.into(),
        ignore_case: false,
    }
}

pub fn is_in<V, I>(field: &str, values: I) -> Criterion
where
    V: Into<Value>,
    I: IntoIterator<Item = V>,
{
    Criterion::In {
        field: field.to_string(),
        values: values.into_iter().map(Into::into).collect(),
        ignore_case: false,
    }
}

pub fn is_null(field: &str) -> Criterion {
    Criterion::IsNull {
        field: field.to_string(),
    }
}

pub fn is_not_null(field: &str) -> Criterion {
    Criterion::NotNull {
        field: field.to_string(),
    }
}

pub fn and(lhs: Criterion, rhs: Criterion) -> Criterion {
    Criterion::And(Box::new(lhs), Box::new(rhs))
}

pub fn or(lhs: Criterion, rhs: Criterion) -> Criterion {
    Criterion::Or(Box::new(lhs), Box::new(rhs))
}

pub fn not(inner: Criterion) -> Criterion {
    Criterion::Not(Box::new(inner))
}
