//! Translation of a store [`Query`] into SQL over the `entities` table.
//!
//! Properties live in a JSONB column. A list-valued property matches a clause when any
//! element matches, so every filter and sort key goes through the same element
//! expansion: arrays are unnested, scalars are wrapped in a one-element array.
//! Clauses only compare elements of the same JSON type as the bound value, which keeps
//! `"10" > 5` from matching on jsonb's cross-type ordering.

use conference_core::{Direction, FilterClause, Query, SortKey};
use sqlx::{Postgres, QueryBuilder};

/// Build the `SELECT` for `query`.
pub(crate) fn select(query: &Query) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT key, properties FROM entities WHERE kind = ");
    qb.push_bind(query.kind.as_str());

    if let Some(ancestor) = &query.ancestor {
        qb.push(" AND ");
        qb.push_bind(ancestor.to_urlsafe());
        qb.push(" = ANY(ancestors)");
    }

    for clause in &query.filters {
        push_filter(&mut qb, clause);
    }

    // Entities without a value for a sort property drop out of ordered queries.
    for key in &query.order {
        qb.push(" AND EXISTS (SELECT 1 FROM ");
        push_elements(&mut qb, &key.property);
        qb.push(" AS element WHERE jsonb_typeof(element) <> 'null')");
    }

    qb.push(" ORDER BY ");
    for key in &query.order {
        push_sort(&mut qb, key);
        qb.push(", ");
    }
    qb.push("key ASC");

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }

    qb
}

fn push_elements(qb: &mut QueryBuilder<'static, Postgres>, property: &str) {
    qb.push("jsonb_array_elements(CASE jsonb_typeof(properties -> ");
    qb.push_bind(property.to_string());
    qb.push(") WHEN 'array' THEN properties -> ");
    qb.push_bind(property.to_string());
    qb.push(" ELSE jsonb_build_array(properties -> ");
    qb.push_bind(property.to_string());
    qb.push(") END)");
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, clause: &FilterClause) {
    qb.push(" AND EXISTS (SELECT 1 FROM ");
    push_elements(qb, &clause.property);
    qb.push(" AS element WHERE jsonb_typeof(element) = jsonb_typeof(");
    qb.push_bind(clause.value.clone());
    qb.push(") AND element ");
    qb.push(clause.operator.symbol());
    qb.push(" ");
    qb.push_bind(clause.value.clone());
    qb.push(")");
}

/// Ascending order sorts a list by its smallest element, descending by its largest.
fn push_sort(qb: &mut QueryBuilder<'static, Postgres>, key: &SortKey) {
    let direction = match key.direction {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
    };
    qb.push("(SELECT element FROM ");
    push_elements(qb, &key.property);
    qb.push(" AS element WHERE jsonb_typeof(element) <> 'null' ORDER BY element ");
    qb.push(direction);
    qb.push(" LIMIT 1) ");
    qb.push(direction);
}
