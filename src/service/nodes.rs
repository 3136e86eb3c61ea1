//! Node persistence: upsert, lookup, soft delete and purge.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::{finish, input_of, GraphService};
use crate::cypher::{CypherQuery, Statement};
use crate::errors::GraphMapError;
use crate::memoizer::CacheKey;
use crate::metadata::{Node, NodeMeta, Root, TypeTag};
use crate::outcome::Outcome;
use crate::session::{first_column, fetch_column, CypherExecutor, GraphSession};

pub(crate) const ALL_NODES: &str = "all_nodes";

/// Mints identity on first save, stamps modification afterwards.
fn stamp(root: &mut Root) {
    let now = Utc::now();
    if root.id.is_none() {
        root.id = Some(Uuid::new_v4());
        root.created_at = Some(now);
    } else {
        root.modified_at = Some(now);
    }
}

fn merge_statement<T: Node>(meta: &NodeMeta, entity: &T) -> Result<Statement, GraphMapError> {
    let id = entity
        .id()
        .ok_or_else(|| GraphMapError::invalid_input("entity has no id to merge on"))?;
    Ok(CypherQuery::new()
        .merge(format!("(e:{} {{ id: $id }})", meta.label))
        .on_create_set("e = $entity")
        .on_match_set("e = $entity")
        .param("id", id.to_string())
        .param_serialized("entity", entity)?
        .build())
}

fn lookup_statement(meta: &NodeMeta, field: &str, value: impl Into<serde_json::Value>) -> Statement {
    CypherQuery::new()
        .match_(format!("(x:{} {{ {field}: $value }})", meta.label))
        .param("value", value)
        .return_("x")
        .limit(1)
        .build()
}

async fn find_in<E, T>(executor: &E, meta: &NodeMeta, id: Uuid) -> Result<Option<T>, GraphMapError>
where
    E: CypherExecutor + ?Sized,
    T: Node,
{
    first_column(executor, &lookup_statement(meta, "id", id.to_string()), "x").await
}

impl<S: GraphSession> GraphService<S> {
    fn forget_scans<T: Node>(&self) {
        self.memoizer()
            .invalidate_subject(ALL_NODES, TypeTag::of::<T>());
    }

    /// Idempotent upsert keyed by id; last writer wins.
    ///
    /// Returns the stored entity, with its id and timestamps filled in.
    pub async fn save<T: Node>(&self, mut entity: T) -> Result<Outcome<T>, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        stamp(entity.root_mut());
        let result = async {
            let statement = merge_statement(&meta, &entity)?;
            let uow = self.session().begin().await?;
            let written = uow.run(&statement).await.map_err(GraphMapError::from);
            finish(uow, written).await
        }
        .await;
        self.forget_scans::<T>();
        let result = result.map(|()| Outcome::success(entity.clone()));
        self.settle("save", || input_of("entity", &entity), result)
    }

    /// Inserts when `entity` has no id, otherwise updates the stored copy.
    ///
    /// On the update path `on_update` runs against the node loaded from the
    /// graph, not against `entity`: fields of `entity` that `on_update` does
    /// not copy over are discarded. A missing node is `Rejected(NotFound)`.
    /// A callback error rolls the unit of work back.
    pub async fn save_or_update<T, I, U>(
        &self,
        mut entity: T,
        on_insert: I,
        on_update: U,
    ) -> Result<Outcome<T>, GraphMapError>
    where
        T: Node,
        I: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
        U: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
    {
        let meta = self.unpacker().node::<T>()?;
        let input = input_of("entity", &entity);
        let result = match entity.id() {
            None => {
                stamp(entity.root_mut());
                async {
                    on_insert(&mut entity)?;
                    let statement = merge_statement(&meta, &entity)?;
                    let uow = self.session().begin().await?;
                    let written = uow.run(&statement).await.map_err(GraphMapError::from);
                    finish(uow, written).await?;
                    Ok::<_, GraphMapError>(Outcome::success(entity))
                }
                .await
            }
            Some(id) => self.update_stored(&meta, id, on_update).await,
        };
        self.forget_scans::<T>();
        self.settle("save_or_update", || input, result)
    }

    /// The update path of [`Self::save_or_update`] on its own.
    pub async fn update<T, U>(&self, id: Uuid, on_update: U) -> Result<Outcome<T>, GraphMapError>
    where
        T: Node,
        U: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
    {
        let meta = self.unpacker().node::<T>()?;
        let result = self.update_stored(&meta, id, on_update).await;
        self.forget_scans::<T>();
        self.settle("update", || input_of("id", &id), result)
    }

    async fn update_stored<T, U>(
        &self,
        meta: &NodeMeta,
        id: Uuid,
        on_update: U,
    ) -> Result<Outcome<T>, GraphMapError>
    where
        T: Node,
        U: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
    {
        let uow = self.session().begin().await?;
        let result = async {
            let Some(mut existing) = find_in::<_, T>(&*uow, meta, id).await? else {
                return Ok::<_, GraphMapError>(Outcome::not_found(format!(
                    "{} {id} not found",
                    meta.label
                )));
            };
            existing.root_mut().modified_at = Some(Utc::now());
            on_update(&mut existing)?;
            uow.run(&merge_statement(meta, &existing)?).await?;
            Ok(Outcome::success(existing))
        }
        .await;
        finish(uow, result).await
    }

    pub async fn find<T: Node>(&self, id: Uuid) -> Result<Option<T>, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        find_in(self.session(), &meta, id).await
    }

    /// Lookup by the unique plain-text `code`.
    pub async fn find_by_code<T: Node>(&self, code: &str) -> Result<Option<T>, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        first_column(self.session(), &lookup_statement(&meta, "code", code), "x").await
    }

    pub async fn find_by_name<T: Node>(&self, name: &str) -> Result<Option<T>, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        first_column(self.session(), &lookup_statement(&meta, "name", name), "x").await
    }

    /// Soft delete: the node stays in the graph with `is_deleted = true`.
    pub async fn delete_node<T: Node>(&self, id: Uuid) -> Result<Outcome, GraphMapError> {
        self.set_deleted::<T>(id, true, "delete_node").await
    }

    pub async fn undelete_node<T: Node>(&self, id: Uuid) -> Result<Outcome, GraphMapError> {
        self.set_deleted::<T>(id, false, "undelete_node").await
    }

    async fn set_deleted<T: Node>(
        &self,
        id: Uuid,
        deleted: bool,
        operation: &'static str,
    ) -> Result<Outcome, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        let result = async {
            let uow = self.session().begin().await?;
            let toggled = async {
                let Some(mut existing) = find_in::<_, T>(&*uow, &meta, id).await? else {
                    return Ok::<_, GraphMapError>(Outcome::not_found(format!(
                        "{} {id} not found",
                        meta.label
                    )));
                };
                existing.root_mut().is_deleted = deleted;
                uow.run(&merge_statement(&meta, &existing)?).await?;
                Ok(Outcome::success(()))
            }
            .await;
            finish(uow, toggled).await
        }
        .await;
        self.forget_scans::<T>();
        self.settle(operation, || input_of("id", &id), result)
    }

    /// Hard delete of the node and every relationship attached to it.
    ///
    /// Ignores the soft-delete flag. Purging an absent node succeeds.
    pub async fn purge_node<T: Node>(&self, id: Uuid) -> Result<Outcome, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        let statement = CypherQuery::new()
            .match_(format!("(x:{} {{ id: $id }})", meta.label))
            .detach_delete("x")
            .param("id", id.to_string())
            .build();
        let result = async {
            let uow = self.session().begin().await?;
            let deleted = uow.run(&statement).await.map_err(GraphMapError::from);
            finish(uow, deleted).await
        }
        .await
        .map(Outcome::success);
        self.forget_scans::<T>();
        self.settle("purge_node", || input_of("id", &id), result)
    }

    /// Every node of the label, unbounded.
    pub async fn all<T: Node>(&self, order_by: Option<&str>) -> Result<Vec<T>, GraphMapError> {
        let meta = self.unpacker().node::<T>()?;
        let mut query = CypherQuery::new()
            .match_(format!("(x:{})", meta.label))
            .return_("x");
        if let Some(order) = order_by {
            query = query.order_by(order);
        }
        fetch_column(self.session(), &query.build(), "x").await
    }

    /// [`Self::all`] through the memoizer.
    ///
    /// Any save, delete or purge of `T` through this service drops the entry.
    pub async fn all_cached<T: Node>(
        &self,
        order_by: Option<&str>,
        ttl: Duration,
    ) -> Result<Vec<T>, GraphMapError> {
        let key = CacheKey::for_type::<T>(ALL_NODES).with_params(&order_by)?;
        self.memoizer()
            .get_or_compute_async(&key, ttl, || self.all::<T>(order_by))
            .await
    }
}
