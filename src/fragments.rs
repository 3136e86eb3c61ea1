//! Projection and predicate fragments layered onto compiled patterns.

use serde_json::Value;

use crate::cypher::{CypherQuery, Params};
use crate::metadata::{Vector, VectorMeta, VectorType};

/// `collect(distinct { relation: r, target: t })`
pub fn collect_vector(relation: &str, target: &str) -> String {
    format!("collect(distinct {{ relation: {relation}, target: {target} }})")
}

/// `collect(distinct t)`
pub fn collect_target(target: &str) -> String {
    format!("collect(distinct {target})")
}

/// [`collect_vector`] over the default relation key of `meta`.
pub fn collect_for(meta: &VectorMeta, target: &str) -> String {
    collect_vector(&meta.relation.key, target)
}

/// `head(expr)`
pub fn head(expr: &str) -> String {
    format!("head({expr})")
}

/// `[pattern | projection]`
pub fn row_comprehension(pattern: &str, projection: &str) -> String {
    format!("[{pattern} | {projection}]")
}

/// Drops vectors produced by an optional match that found nothing.
pub fn non_empty<V: VectorType>(vectors: Vec<Vector<V>>) -> Vec<Vector<V>> {
    vectors.into_iter().filter(|v| !v.is_empty()).collect()
}

/// Case-insensitive "contains" regex for `=~`.
///
/// Quotes are stripped and regex metacharacters escaped so the input only
/// ever matches literally.
pub fn partial_match(value: &str) -> String {
    let trimmed = value.trim();
    let mut escaped = String::with_capacity(trimmed.len() + 8);
    escaped.push_str("(?i).*");
    for ch in trimmed.chars() {
        match ch {
            '\'' | '"' => {}
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped.push_str(".*");
    escaped
}

/// Accumulates `AND`-joined predicates and their parameters.
#[derive(Clone, Debug, Default)]
pub struct WhereBuilder {
    predicates: Vec<String>,
    params: Params,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `prop = $param`
    pub fn eq(mut self, prop: &str, param: &str, value: impl Into<Value>) -> Self {
        self.predicates.push(format!("{prop} = ${param}"));
        self.params.insert(param.to_string(), value.into());
        self
    }

    /// `prop =~ $param`, matching `value` anywhere, ignoring case.
    pub fn like(mut self, prop: &str, param: &str, value: &str) -> Self {
        self.predicates.push(format!("{prop} =~ ${param}"));
        self.params
            .insert(param.to_string(), Value::String(partial_match(value)));
        self
    }

    /// Excludes soft-deleted nodes bound to `var`.
    pub fn not_deleted(mut self, var: &str) -> Self {
        self.predicates
            .push(format!("coalesce({var}.is_deleted, false) = false"));
        self
    }

    /// Free-form predicate without parameters.
    pub fn raw(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Predicates joined with `AND`, or `None` when empty.
    pub fn build(&self) -> Option<String> {
        if self.predicates.is_empty() {
            None
        } else {
            Some(self.predicates.join(" AND "))
        }
    }

    /// [`Self::build`] prefixed with `AND `, for appending to an open `WHERE`.
    pub fn build_and(&self) -> Option<String> {
        self.build().map(|text| format!("AND {text}"))
    }

    pub fn apply(self, mut query: CypherQuery) -> CypherQuery {
        for predicate in self.predicates {
            query = query.and_where(predicate);
        }
        for (name, value) in self.params {
            query = query.param(name, value);
        }
        query
    }
}
