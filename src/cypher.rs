//! Clause builder producing parameterized Cypher statements.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::GraphMapError;

/// Named statement parameters, referenced as `$name` in the text.
pub type Params = Map<String, Value>;

/// A complete statement ready for a [`crate::session::CypherExecutor`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Params,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Appends clauses in call order, separated by single spaces.
///
/// ```rust
/// use cyphervector::cypher::CypherQuery;
/// let statement = CypherQuery::new()
///     .match_("(p:Person)")
///     .where_("p.id = $id")
///     .param("id", "42")
///     .return_("p")
///     .limit(1)
///     .build();
/// assert_eq!(statement.text, "MATCH (p:Person) WHERE p.id = $id RETURN p LIMIT 1");
/// ```
#[derive(Clone, Debug, Default)]
pub struct CypherQuery {
    clauses: Vec<String>,
    params: Params,
    where_open: bool,
}

impl CypherQuery {
    pub fn new() -> Self {
        Self::default()
    }

    fn clause(mut self, keyword: &str, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        if body.is_empty() {
            self.clauses.push(keyword.to_string());
        } else {
            self.clauses.push(format!("{keyword} {body}"));
        }
        self.where_open = keyword == "WHERE" || (self.where_open && keyword == "AND");
        self
    }

    pub fn match_(self, pattern: impl AsRef<str>) -> Self {
        self.clause("MATCH", pattern)
    }

    pub fn optional_match(self, pattern: impl AsRef<str>) -> Self {
        self.clause("OPTIONAL MATCH", pattern)
    }

    pub fn merge(self, pattern: impl AsRef<str>) -> Self {
        self.clause("MERGE", pattern)
    }

    pub fn on_create_set(self, assignments: impl AsRef<str>) -> Self {
        self.clause("ON CREATE SET", assignments)
    }

    pub fn on_match_set(self, assignments: impl AsRef<str>) -> Self {
        self.clause("ON MATCH SET", assignments)
    }

    pub fn create(self, pattern: impl AsRef<str>) -> Self {
        self.clause("CREATE", pattern)
    }

    pub fn set(self, assignments: impl AsRef<str>) -> Self {
        self.clause("SET", assignments)
    }

    pub fn where_(self, predicate: impl AsRef<str>) -> Self {
        self.clause("WHERE", predicate)
    }

    /// `AND` after an open `WHERE`, otherwise starts one.
    pub fn and_where(self, predicate: impl AsRef<str>) -> Self {
        if self.where_open {
            self.clause("AND", predicate)
        } else {
            self.clause("WHERE", predicate)
        }
    }

    pub fn with(self, projection: impl AsRef<str>) -> Self {
        self.clause("WITH", projection)
    }

    pub fn delete(self, variables: impl AsRef<str>) -> Self {
        self.clause("DELETE", variables)
    }

    pub fn detach_delete(self, variables: impl AsRef<str>) -> Self {
        self.clause("DETACH DELETE", variables)
    }

    pub fn return_(self, projection: impl AsRef<str>) -> Self {
        self.clause("RETURN", projection)
    }

    pub fn order_by(self, ordering: impl AsRef<str>) -> Self {
        self.clause("ORDER BY", ordering)
    }

    pub fn skip(self, count: i64) -> Self {
        self.clause("SKIP", count.to_string())
    }

    pub fn limit(self, count: i64) -> Self {
        self.clause("LIMIT", count.to_string())
    }

    /// Raw text appended as its own clause.
    pub fn raw(self, text: impl AsRef<str>) -> Self {
        self.clause(text.as_ref(), "")
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Binds any serializable value, e.g. a whole entity.
    pub fn param_serialized<T: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, GraphMapError> {
        let value = serde_json::to_value(value)
            .map_err(|e| GraphMapError::invalid_input(format!("parameter encoding: {e}")))?;
        Ok(self.param(name, value))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn text(&self) -> String {
        self.clauses.join(" ")
    }

    pub fn build(self) -> Statement {
        Statement {
            text: self.clauses.join(" "),
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_upsert_shape() {
        let statement = CypherQuery::new()
            .merge("(e:Person { id: $id })")
            .on_create_set("e = $entity")
            .on_match_set("e = $entity")
            .build();
        assert_eq!(
            statement.text,
            "MERGE (e:Person { id: $id }) ON CREATE SET e = $entity ON MATCH SET e = $entity"
        );
    }

    #[test]
    fn test_and_where_opens_where() {
        let text = CypherQuery::new()
            .match_("(x)")
            .and_where("x.a = 1")
            .and_where("x.b = 2")
            .with("x")
            .and_where("x.c = 3")
            .text();
        assert_eq!(
            text,
            "MATCH (x) WHERE x.a = 1 AND x.b = 2 WITH x WHERE x.c = 3"
        );
    }

    #[test]
    fn test_param_serialized() {
        #[derive(Serialize)]
        struct Payload {
            name: &'static str,
        }
        let statement = CypherQuery::new()
            .param_serialized("entity", &Payload { name: "ada" })
            .unwrap()
            .build();
        assert_eq!(statement.param("entity"), Some(&serde_json::json!({"name": "ada"})));
    }
}
