use crate::value::FieldValue;
use std::fmt;

/// Comparison operators for conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
    NotNull,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "="),
            ComparisonOp::Ne => write!(f, "!="),
            ComparisonOp::Gt => write!(f, ">"),
            ComparisonOp::Gte => write!(f, ">="),
            ComparisonOp::Lt => write!(f, "<"),
            ComparisonOp::Lte => write!(f, "<="),
            ComparisonOp::In => write!(f, "IN"),
            ComparisonOp::IsNull => write!(f, "IS NULL"),
            ComparisonOp::NotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A single backend-neutral filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equal { field: String, value: FieldValue },
    NotEqual { field: String, value: FieldValue },
    GreaterThan { field: String, value: FieldValue },
    GreaterThanEqual { field: String, value: FieldValue },
    LessThan { field: String, value: FieldValue },
    LessThanEqual { field: String, value: FieldValue },
    In { field: String, values: Vec<FieldValue> },
    IsNull { field: String },
    NotNull { field: String },
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::Equal {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::NotEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::GreaterThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::GreaterThanEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::LessThanEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<FieldValue>>(field: impl Into<String>, values: Vec<V>) -> Self {
        Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Condition::IsNull {
            field: field.into(),
        }
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Condition::NotNull {
            field: field.into(),
        }
    }

    /// Name of the field to compare
    pub fn field(&self) -> &str {
        match self {
            Condition::Equal { field, .. }
            | Condition::NotEqual { field, .. }
            | Condition::GreaterThan { field, .. }
            | Condition::GreaterThanEqual { field, .. }
            | Condition::LessThan { field, .. }
            | Condition::LessThanEqual { field, .. }
            | Condition::In { field, .. }
            | Condition::IsNull { field }
            | Condition::NotNull { field } => field,
        }
    }

    /// Value to compare against. `In` yields its values as a list, the null
    /// checks carry no value.
    pub fn value(&self) -> Option<FieldValue> {
        match self {
            Condition::Equal { value, .. }
            | Condition::NotEqual { value, .. }
            | Condition::GreaterThan { value, .. }
            | Condition::GreaterThanEqual { value, .. }
            | Condition::LessThan { value, .. }
            | Condition::LessThanEqual { value, .. } => Some(value.clone()),
            Condition::In { values, .. } => Some(FieldValue::List(values.clone())),
            Condition::IsNull { .. } | Condition::NotNull { .. } => None,
        }
    }

    pub fn op(&self) -> ComparisonOp {
        match self {
            Condition::Equal { .. } => ComparisonOp::Eq,
            Condition::NotEqual { .. } => ComparisonOp::Ne,
            Condition::GreaterThan { .. } => ComparisonOp::Gt,
            Condition::GreaterThanEqual { .. } => ComparisonOp::Gte,
            Condition::LessThan { .. } => ComparisonOp::Lt,
            Condition::LessThanEqual { .. } => ComparisonOp::Lte,
            Condition::In { .. } => ComparisonOp::In,
            Condition::IsNull { .. } => ComparisonOp::IsNull,
            Condition::NotNull { .. } => ComparisonOp::NotNull,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// ORDER BY entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn is_descending(&self) -> bool {
        self.direction == SortDirection::Desc
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.direction)
    }
}
