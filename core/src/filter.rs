//! Filter compiler: client filter triples to validated query plans.
//!
//! Clients submit `{field, operator, value}` triples using external field names and
//! symbolic operators. A [`FilterSchema`] is the closed allow-list of fields for one
//! entity kind; [`FilterCompiler::compile`] validates the triples against it and
//! produces a [`QueryPlan`].
//!
//! # Single-inequality rule
//!
//! The store can only evaluate range filters on one property per query. The first field
//! used with a non-equality operator becomes the inequality field; an inequality on any
//! other field fails with [`FilterError::MultipleInequalityFields`]. Equality filters are
//! unconstrained.
//!
//! # Ordering
//!
//! With an inequality field the plan orders by that field, then by the schema's default
//! property (`name`). Without one it orders by `name` only.

use crate::key::{EntityKey, Kind};
use crate::store::{FilterClause, Operator, Query, SortKey};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A filter triple as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// External field name, e.g. `CITY`.
    pub field: String,
    /// Symbolic operator, e.g. `GTEQ`.
    pub operator: String,
    /// Operand as text; coerced according to the field type.
    pub value: String,
}

impl FilterSpec {
    /// Build a triple.
    #[must_use]
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Errors produced while compiling filters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Field not in the schema's allow-list.
    #[error("Filter contains invalid field: {0}")]
    InvalidFilterField(String),

    /// Operator not in the allow-list.
    #[error("Filter contains invalid operator: {0}")]
    InvalidFilterOperator(String),

    /// Value could not be coerced to the field's type.
    #[error("Invalid value {value:?} for filter field {field}: expected {expected}")]
    InvalidFilterValue {
        /// External field name.
        field: String,
        /// Rejected value.
        value: String,
        /// Expected format.
        expected: &'static str,
    },

    /// Inequality operators used on two different fields.
    #[error("Inequality filter is allowed on only one field (already on {first}, got {second})")]
    MultipleInequalityFields {
        /// Field that already carries an inequality.
        first: String,
        /// Offending field.
        second: String,
    },
}

/// Stored type of a filterable property, driving value coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// Compared as-is.
    Text,
    /// Lower-cased before comparison.
    LowercaseText,
    /// Parsed as a signed integer.
    Integer,
    /// `YYYY-MM-DD`.
    Date,
    /// `HH:MM` (seconds optional).
    Time,
}

impl FieldType {
    const fn expected(self) -> &'static str {
        match self {
            Self::Text | Self::LowercaseText => "text",
            Self::Integer => "an integer",
            Self::Date => "a date (YYYY-MM-DD)",
            Self::Time => "a time (HH:MM)",
        }
    }

    fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::Text => Some(Value::String(raw.to_string())),
            Self::LowercaseText => Some(Value::String(raw.to_lowercase())),
            Self::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .ok()
                .and_then(|d| serde_json::to_value(d).ok()),
            Self::Time => parse_time(raw).and_then(|t| serde_json::to_value(t).ok()),
        }
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
#[must_use]
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// One allow-listed field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// External name clients use.
    pub name: &'static str,
    /// Internal property name.
    pub property: &'static str,
    /// Stored type.
    pub field_type: FieldType,
}

impl FieldSpec {
    const fn new(name: &'static str, property: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            property,
            field_type,
        }
    }
}

/// Closed allow-list of filterable fields for one entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterSchema {
    /// Allowed fields.
    pub fields: &'static [FieldSpec],
    /// Secondary (or only) ordering property.
    pub default_order: &'static str,
}

impl FilterSchema {
    /// Look up an external field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Filterable conference fields.
pub const CONFERENCE_SCHEMA: FilterSchema = FilterSchema {
    fields: &[
        FieldSpec::new("CITY", "city", FieldType::Text),
        FieldSpec::new("TOPIC", "topics", FieldType::Text),
        FieldSpec::new("MONTH", "month", FieldType::Integer),
        FieldSpec::new("MAX_ATTENDEES", "maxAttendees", FieldType::Integer),
    ],
    default_order: "name",
};

/// Filterable session fields.
pub const SESSION_SCHEMA: FilterSchema = FilterSchema {
    fields: &[
        FieldSpec::new("SPEAKER", "speaker", FieldType::Text),
        FieldSpec::new("DURATION", "duration", FieldType::Integer),
        FieldSpec::new("TYPE_OF_SESSION", "typeOfSession", FieldType::LowercaseText),
        FieldSpec::new("DATE", "date", FieldType::Date),
        FieldSpec::new("START_TIME", "startTime", FieldType::Time),
        FieldSpec::new("NAME", "name", FieldType::Text),
    ],
    default_order: "name",
};

/// Validated filters plus ordering, ready to run against a store.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    /// Clauses in submission order.
    pub filters: Vec<FilterClause>,
    /// Ordering keys.
    pub order: Vec<SortKey>,
    /// Internal property carrying the inequality filters, if any.
    pub inequality_property: Option<&'static str>,
}

impl QueryPlan {
    /// Convert into a store query over `kind`.
    #[must_use]
    pub fn into_query(self, kind: Kind) -> Query {
        Query {
            kind,
            ancestor: None,
            filters: self.filters,
            order: self.order,
            limit: None,
        }
    }

    /// Convert into a store query over `kind` restricted to the subtree of `ancestor`.
    #[must_use]
    pub fn into_ancestor_query(self, kind: Kind, ancestor: EntityKey) -> Query {
        self.into_query(kind).with_ancestor(ancestor)
    }
}

/// Compiles filter triples against a schema. Pure: no I/O, no state.
#[derive(Clone, Copy, Debug)]
pub struct FilterCompiler {
    schema: &'static FilterSchema,
}

impl FilterCompiler {
    /// Compiler for `schema`.
    #[must_use]
    pub const fn new(schema: &'static FilterSchema) -> Self {
        Self { schema }
    }

    /// Compiler for conference queries.
    #[must_use]
    pub const fn conferences() -> Self {
        Self::new(&CONFERENCE_SCHEMA)
    }

    /// Compiler for session queries.
    #[must_use]
    pub const fn sessions() -> Self {
        Self::new(&SESSION_SCHEMA)
    }

    /// Validate `specs` and build a plan.
    ///
    /// Fields, operators and the single-inequality rule are checked for every triple
    /// before any value is coerced.
    ///
    /// # Errors
    ///
    /// - `InvalidFilterField`: field not in the schema
    /// - `InvalidFilterOperator`: operator not in the allow-list
    /// - `MultipleInequalityFields`: inequalities on two different fields
    /// - `InvalidFilterValue`: value does not parse as the field's type
    pub fn compile(&self, specs: &[FilterSpec]) -> Result<QueryPlan, FilterError> {
        let mut validated = Vec::with_capacity(specs.len());
        let mut inequality: Option<&'static FieldSpec> = None;

        for spec in specs {
            let field = self
                .schema
                .field(&spec.field)
                .ok_or_else(|| FilterError::InvalidFilterField(spec.field.clone()))?;
            let operator = Operator::from_name(&spec.operator)
                .ok_or_else(|| FilterError::InvalidFilterOperator(spec.operator.clone()))?;

            if operator.is_inequality() {
                match inequality {
                    Some(first) if first.name != field.name => {
                        return Err(FilterError::MultipleInequalityFields {
                            first: first.name.to_string(),
                            second: field.name.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => inequality = Some(field),
                }
            }
            validated.push((field, operator, spec.value.as_str()));
        }

        let filters = validated
            .into_iter()
            .map(|(field, operator, raw)| {
                let value =
                    field
                        .field_type
                        .coerce(raw)
                        .ok_or_else(|| FilterError::InvalidFilterValue {
                            field: field.name.to_string(),
                            value: raw.to_string(),
                            expected: field.field_type.expected(),
                        })?;
                Ok(FilterClause::new(field.property, operator, value))
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        let mut order = Vec::with_capacity(2);
        if let Some(field) = inequality {
            order.push(SortKey::ascending(field.property));
        }
        if inequality.is_none_or(|f| f.property != self.schema.default_order) {
            order.push(SortKey::ascending(self.schema.default_order));
        }

        Ok(QueryPlan {
            filters,
            order,
            inequality_property: inequality.map(|f| f.property),
        })
    }
}
