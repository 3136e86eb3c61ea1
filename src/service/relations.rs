//! Relationship persistence: relate, unrelate, n-arity and vector lookups.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{finish, input_of, GraphService};
use crate::compiler::{render_hyper_pattern, render_vector_pattern, PatternOptions};
use crate::config::RelatePolicy;
use crate::cypher::{CypherQuery, Statement};
use crate::errors::GraphMapError;
use crate::fragments::WhereBuilder;
use crate::keys::is_identifier;
use crate::metadata::{
    HyperVector, HyperVectorType, Relation, TypeTag, Vector, VectorIdent, VectorMeta, VectorType,
};
use crate::outcome::Outcome;
use crate::session::{decode_column, first_column, CypherExecutor, GraphSession, Row};

/// `(:S { id: $source_id })-[r:TYPE]->(:T { id: $target_id })`
fn anchored_pattern(meta: &VectorMeta) -> String {
    render_vector_pattern(
        meta,
        &PatternOptions::new()
            .source("_")
            .relation("r")
            .target("_")
            .source_props("id: $source_id")
            .target_props("id: $target_id"),
    )
}

/// `(x:S)-[r:TYPE]->(y:T)`
fn bound_pattern(meta: &VectorMeta) -> String {
    render_vector_pattern(
        meta,
        &PatternOptions::new().source("x").relation("r").target("y"),
    )
}

fn property_name(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        format!("`{}`", key.replace('`', "``"))
    }
}

/// `k: $relation.k` for every non-null property, sorted by name.
///
/// The id is always among them, so every relate with a fresh id creates a
/// new edge.
fn merge_props(relation: &Map<String, Value>) -> Option<String> {
    let mut keys: Vec<&String> = relation
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, _)| key)
        .collect();
    if keys.is_empty() {
        return None;
    }
    keys.sort();
    let props: Vec<String> = keys
        .into_iter()
        .map(|key| {
            let name = property_name(key);
            format!("{name}: $relation.{name}")
        })
        .collect();
    Some(props.join(", "))
}

fn relation_map<R: Relation>(relation: &R) -> Result<Map<String, Value>, GraphMapError> {
    match serde_json::to_value(relation) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GraphMapError::invalid_input(format!(
            "relation must serialize to a map, got {other}"
        ))),
        Err(e) => Err(GraphMapError::invalid_input(format!(
            "relation encoding: {e}"
        ))),
    }
}

fn relation_id_in(map: &Map<String, Value>) -> Option<Uuid> {
    map.get("id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}

async fn count_between<E>(
    executor: &E,
    meta: &VectorMeta,
    source_id: Uuid,
    target_id: Uuid,
) -> Result<i64, GraphMapError>
where
    E: CypherExecutor + ?Sized,
{
    let statement = CypherQuery::new()
        .match_(anchored_pattern(meta))
        .param("source_id", source_id.to_string())
        .param("target_id", target_id.to_string())
        .return_("count(distinct r) AS total")
        .build();
    Ok(first_column(executor, &statement, "total").await?.unwrap_or(0))
}

async fn count_from<E>(executor: &E, meta: &VectorMeta, source_id: Uuid) -> Result<i64, GraphMapError>
where
    E: CypherExecutor + ?Sized,
{
    let pattern = render_vector_pattern(
        meta,
        &PatternOptions::new()
            .source("_")
            .relation("r")
            .target("_")
            .source_props("id: $source_id"),
    );
    let statement = CypherQuery::new()
        .match_(pattern)
        .param("source_id", source_id.to_string())
        .return_("count(distinct r) AS total")
        .build();
    Ok(first_column(executor, &statement, "total").await?.unwrap_or(0))
}

fn relate_statement(
    meta: &VectorMeta,
    source_id: Uuid,
    target_id: Uuid,
    relation: Map<String, Value>,
) -> Statement {
    let mut opts = PatternOptions::new()
        .source("source")
        .relation("r")
        .target("target")
        .without_source_label()
        .without_target_label();
    if let Some(props) = merge_props(&relation) {
        opts = opts.rel_props(props);
    }
    CypherQuery::new()
        .match_(format!(
            "(source:{} {{ id: $source_id }}), (target:{} {{ id: $target_id }})",
            meta.source.label, meta.target.label
        ))
        .merge(render_vector_pattern(meta, &opts))
        .on_create_set("r = $relation")
        .return_("r.id AS relation_id")
        .param("source_id", source_id.to_string())
        .param("target_id", target_id.to_string())
        .param("relation", Value::Object(relation))
        .build()
}

/// Relates two nodes inside `executor`, returning the relation id.
async fn relate_in<E>(
    executor: &E,
    meta: &VectorMeta,
    policy: RelatePolicy,
    source_id: Uuid,
    target_id: Uuid,
    relation: Map<String, Value>,
) -> Result<Outcome<Uuid>, GraphMapError>
where
    E: CypherExecutor + ?Sized,
{
    if policy == RelatePolicy::Enforced {
        let rel = &meta.relation;
        if !rel.same_node_multiple_allowed
            && count_between(executor, meta, source_id, target_id).await? >= 1
        {
            return Ok(Outcome::already_performed(format!(
                "{} already joins {source_id} and {target_id}",
                rel.rel_type
            )));
        }
        if !rel.multiple_allowed && count_from(executor, meta, source_id).await? >= 1 {
            return Ok(Outcome::already_performed(format!(
                "{source_id} already has a {} relationship",
                rel.rel_type
            )));
        }
    }
    let fallback_id = relation_id_in(&relation);
    let statement = relate_statement(meta, source_id, target_id, relation);
    let stored: Option<Option<Uuid>> = first_column(executor, &statement, "relation_id").await?;
    tracing::debug!(
        target: "cyphervector::service",
        rel_type = %meta.relation.rel_type,
        %source_id,
        %target_id,
        matched = stored.is_some(),
        "service.relate"
    );
    match stored {
        None => Ok(Outcome::not_found(format!(
            "{} {source_id} or {} {target_id} not found",
            meta.source.label, meta.target.label
        ))),
        Some(id) => match id.or(fallback_id) {
            Some(id) => Ok(Outcome::success(id)),
            None => Err(GraphMapError::decode("relationship stored without an id")),
        },
    }
}

fn unrelate_statement(
    meta: &VectorMeta,
    source_id: Option<Uuid>,
    target_id: Option<Uuid>,
    relation_id: Option<Uuid>,
) -> Statement {
    let mut filter = WhereBuilder::new();
    if let Some(id) = source_id {
        filter = filter.eq("x.id", "source_id", id.to_string());
    }
    if let Some(id) = target_id {
        filter = filter.eq("y.id", "target_id", id.to_string());
    }
    if let Some(id) = relation_id {
        filter = filter.eq("r.id", "relation_id", id.to_string());
    }
    filter
        .apply(CypherQuery::new().match_(bound_pattern(meta)))
        .delete("r")
        .return_("count(*) AS deleted")
        .build()
}

async fn unrelate_in<E>(
    executor: &E,
    meta: &VectorMeta,
    source_id: Option<Uuid>,
    target_id: Option<Uuid>,
    relation_id: Option<Uuid>,
) -> Result<u64, GraphMapError>
where
    E: CypherExecutor + ?Sized,
{
    let statement = unrelate_statement(meta, source_id, target_id, relation_id);
    let deleted: Option<i64> = first_column(executor, &statement, "deleted").await?;
    Ok(deleted.unwrap_or(0).max(0) as u64)
}

/// The nil id counts as unset.
fn unless_nil(id: Option<Uuid>) -> Option<Uuid> {
    id.filter(|id| !id.is_nil())
}

fn decode_row<T: serde::de::DeserializeOwned>(row: Row) -> Result<T, GraphMapError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| GraphMapError::decode(e.to_string()))
}

impl<S: GraphSession> GraphService<S> {
    /// Creates the relationship of `vector` between its source and target.
    ///
    /// The relation id is minted when absent. The merge pins the id and every
    /// other non-null property, so a fresh id always creates a new edge and a
    /// stored relation's id matches its existing edge. Missing endpoints
    /// are `Rejected(NotFound)`; under [`RelatePolicy::Enforced`] a forbidden
    /// parallel or multiple edge is `Rejected(ActionAlreadyPerformed)`.
    pub async fn relate<V: VectorType>(
        &self,
        mut vector: Vector<V>,
    ) -> Result<Outcome<Vector<V>>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let (Some(source_id), Some(target_id)) = (vector.source_id(), vector.target_id()) else {
            return Ok(Outcome::rejected(format!(
                "{} needs source and target ids to relate",
                meta.name
            )));
        };
        let input = input_of("vector", &vector);
        let mut relation = vector.relation.take().unwrap_or_default();
        if relation.id().is_none() {
            relation.set_id(Uuid::new_v4());
        }
        let result = match relation_map(&relation) {
            Ok(props) => self.relate_tx(&meta, source_id, target_id, props).await,
            Err(err) => Err(err),
        };
        let result = result.map(|outcome| {
            outcome.map(|id| {
                relation.set_id(id);
                vector.relation = Some(relation);
                vector
            })
        });
        self.settle("relate", || input, result)
    }

    /// [`Self::relate`] from bare ids.
    pub async fn relate_ident<V: VectorType>(
        &self,
        ident: VectorIdent,
    ) -> Result<Outcome<VectorIdent>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let mut props = Map::new();
        let relation_id = ident.relation_id.unwrap_or_else(Uuid::new_v4);
        props.insert("id".to_string(), Value::String(relation_id.to_string()));
        let result = self
            .relate_tx(&meta, ident.source_id, ident.target_id, props)
            .await
            .map(|outcome| outcome.map(|id| ident.with_relation(id)));
        self.settle("relate_ident", || input_of("ident", &ident), result)
    }

    async fn relate_tx(
        &self,
        meta: &VectorMeta,
        source_id: Uuid,
        target_id: Uuid,
        props: Map<String, Value>,
    ) -> Result<Outcome<Uuid>, GraphMapError> {
        let policy = self.config().relate_policy;
        let uow = self.session().begin().await?;
        let result = relate_in(&*uow, meta, policy, source_id, target_id, props).await;
        finish(uow, result).await
    }

    /// True when parallel edges are allowed, or when at least one edge of the
    /// vector already joins the two nodes.
    pub async fn narity_of(
        &self,
        tag: TypeTag,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, GraphMapError> {
        let meta = self.unpacker().unpack(tag)?;
        if meta.relation.same_node_multiple_allowed {
            return Ok(true);
        }
        Ok(count_between(self.session(), &meta, source_id, target_id).await? >= 1)
    }

    pub async fn narity<V: VectorType>(
        &self,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, GraphMapError> {
        self.narity_of(TypeTag::of::<V>(), source_id, target_id).await
    }

    /// Deletes the relationships matching the ids present on `vector`.
    ///
    /// Unset or nil ids do not filter, so a vector without ids removes every
    /// edge of its type. With `strict`, a vector that names neither a relation
    /// id nor both endpoints is rejected instead. Returns the number deleted.
    pub async fn unrelate<V: VectorType>(
        &self,
        vector: &Vector<V>,
        strict: bool,
    ) -> Result<Outcome<u64>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let ids = (vector.source_id(), vector.target_id(), vector.relation_id());
        let result = self.unrelate_tx(&meta, ids, strict).await;
        self.settle("unrelate", || input_of("vector", vector), result)
    }

    pub async fn unrelate_ident<V: VectorType>(
        &self,
        ident: &VectorIdent,
        strict: bool,
    ) -> Result<Outcome<u64>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let ids = (
            Some(ident.source_id),
            Some(ident.target_id),
            ident.relation_id,
        );
        let result = self.unrelate_tx(&meta, ids, strict).await;
        self.settle("unrelate_ident", || input_of("ident", ident), result)
    }

    async fn unrelate_tx(
        &self,
        meta: &VectorMeta,
        (source_id, target_id, relation_id): (Option<Uuid>, Option<Uuid>, Option<Uuid>),
        strict: bool,
    ) -> Result<Outcome<u64>, GraphMapError> {
        let (source_id, target_id, relation_id) =
            (unless_nil(source_id), unless_nil(target_id), unless_nil(relation_id));
        let pinned = relation_id.is_some() || (source_id.is_some() && target_id.is_some());
        if strict && !pinned {
            return Ok(Outcome::rejected(format!(
                "{} needs a relation id or both endpoint ids",
                meta.name
            )));
        }
        let uow = self.session().begin().await?;
        let result = unrelate_in(&*uow, meta, source_id, target_id, relation_id).await;
        finish(uow, result).await.map(Outcome::success)
    }

    /// Deletes the relationship with `id`, whatever its type.
    pub async fn delete_relation(&self, id: Uuid) -> Result<Outcome<u64>, GraphMapError> {
        let result = self.delete_relation_tx("()-[r { id: $id }]->()", id).await;
        self.settle("delete_relation", || input_of("id", &id), result)
    }

    pub async fn delete_relation_of<R: Relation>(
        &self,
        id: Uuid,
    ) -> Result<Outcome<u64>, GraphMapError> {
        let meta = self.unpacker().relation::<R>()?;
        let pattern = format!("()-[r:{} {{ id: $id }}]->()", meta.rel_type);
        let result = self.delete_relation_tx(&pattern, id).await;
        self.settle("delete_relation_of", || input_of("id", &id), result)
    }

    /// Deletes the stored edge of `relation`, which must carry an id.
    pub async fn delete_relation_instance<R: Relation>(
        &self,
        relation: &R,
    ) -> Result<Outcome<u64>, GraphMapError> {
        match relation.id() {
            Some(id) => self.delete_relation_of::<R>(id).await,
            None => Ok(Outcome::rejected("relation has no id")),
        }
    }

    async fn delete_relation_tx(&self, pattern: &str, id: Uuid) -> Result<Outcome<u64>, GraphMapError> {
        let statement = CypherQuery::new()
            .match_(pattern)
            .delete("r")
            .return_("count(*) AS deleted")
            .param("id", id.to_string())
            .build();
        let uow = self.session().begin().await?;
        let result = first_column::<_, i64>(&*uow, &statement, "deleted").await;
        finish(uow, result)
            .await
            .map(|deleted| Outcome::success(deleted.unwrap_or(0).max(0) as u64))
    }

    /// Loads the vector whose relationship has `relation_id`.
    pub async fn find_vector<V: VectorType>(
        &self,
        relation_id: Uuid,
    ) -> Result<Option<Vector<V>>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let statement = CypherQuery::new()
            .match_(bound_pattern(&meta))
            .where_("r.id = $relation_id")
            .return_("x AS source, r AS relation, y AS target")
            .limit(1)
            .param("relation_id", relation_id.to_string())
            .build();
        let rows = self.session().fetch(&statement).await?;
        let Some(mut row) = rows.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(Vector {
            source: decode_column(&mut row, "source")?,
            relation: decode_column(&mut row, "relation")?,
            target: decode_column(&mut row, "target")?,
        }))
    }

    pub async fn find_vector_ident<V: VectorType>(
        &self,
        relation_id: Uuid,
    ) -> Result<Option<VectorIdent>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let statement = CypherQuery::new()
            .match_(bound_pattern(&meta))
            .where_("r.id = $relation_id")
            .return_("x.id AS source_id, y.id AS target_id, r.id AS relation_id")
            .limit(1)
            .param("relation_id", relation_id.to_string())
            .build();
        let rows = self.session().fetch(&statement).await?;
        rows.into_iter().next().map(decode_row).transpose()
    }

    /// Loads both hops of a hyper-vector, anchored on the first relationship.
    pub async fn find_hyper_vector<H: HyperVectorType>(
        &self,
        relation_id: Uuid,
    ) -> Result<Option<HyperVector<H>>, GraphMapError> {
        let meta = self.unpacker().hyper_vector::<H>()?;
        let pattern = render_hyper_pattern(
            &meta,
            &PatternOptions::new().source("x").relation("r").target("y"),
            &PatternOptions::new().relation("r2").target("z"),
        );
        let statement = CypherQuery::new()
            .match_(pattern)
            .where_("r.id = $relation_id")
            .return_("x AS source, r AS relation, y AS middle, r2 AS relation2, z AS target")
            .limit(1)
            .param("relation_id", relation_id.to_string())
            .build();
        let rows = self.session().fetch(&statement).await?;
        let Some(mut row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let middle = row.get("middle").cloned().unwrap_or(Value::Null);
        let mut right_row = Row::new();
        right_row.insert("middle".to_string(), middle);
        Ok(Some(HyperVector {
            left: Vector {
                source: decode_column(&mut row, "source")?,
                relation: decode_column(&mut row, "relation")?,
                target: decode_column(&mut row, "middle")?,
            },
            right: Vector {
                source: decode_column(&mut right_row, "middle")?,
                relation: decode_column(&mut row, "relation2")?,
                target: decode_column(&mut row, "target")?,
            },
        }))
    }

    /// Replaces the edge described by `vector` with one starting at `source_id`.
    ///
    /// When the vector's relation carries an id, that edge is deleted first;
    /// both steps share one unit of work.
    pub async fn save_vector<V: VectorType>(
        &self,
        source_id: Uuid,
        vector: &Vector<V>,
    ) -> Result<Outcome<VectorIdent>, GraphMapError> {
        let meta = self.unpacker().vector::<V>()?;
        let Some(target_id) = vector.target_id() else {
            return Ok(Outcome::rejected(format!(
                "{} needs a target id to save",
                meta.name
            )));
        };
        let ident = VectorIdent {
            source_id,
            target_id,
            relation_id: vector.relation_id(),
        };
        let policy = self.config().relate_policy;
        let result = async {
            let uow = self.session().begin().await?;
            let replaced = async {
                if let Some(relation_id) = ident.relation_id {
                    unrelate_in(&*uow, &meta, Some(source_id), Some(target_id), Some(relation_id))
                        .await?;
                }
                let relation_id = ident.relation_id.unwrap_or_else(Uuid::new_v4);
                let mut props = Map::new();
                props.insert("id".to_string(), Value::String(relation_id.to_string()));
                relate_in(&*uow, &meta, policy, source_id, target_id, props).await
            }
            .await;
            finish(uow, replaced).await
        }
        .await
        .map(|outcome| outcome.map(|id| ident.with_relation(id)));
        self.settle("save_vector", || input_of("ident", &ident), result)
    }
}
