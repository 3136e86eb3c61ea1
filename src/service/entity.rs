//! Typed view of [`GraphService`] bound to one node type.

use std::marker::PhantomData;
use std::time::Duration;

use uuid::Uuid;

use super::GraphService;
use crate::cypher::CypherQuery;
use crate::errors::GraphMapError;
use crate::fragments::WhereBuilder;
use crate::metadata::{Node, Vector, VectorIdent, VectorType};
use crate::outcome::Outcome;
use crate::search::Search;
use crate::session::GraphSession;

/// Node operations fixed to `T`, with `x` as the variable of paged queries.
pub struct EntityService<'a, S: GraphSession, T: Node> {
    pub(super) service: &'a GraphService<S>,
    pub(super) _entity: PhantomData<fn() -> T>,
}

impl<'a, S: GraphSession, T: Node> EntityService<'a, S, T> {
    pub fn service(&self) -> &'a GraphService<S> {
        self.service
    }

    pub async fn save(&self, entity: T) -> Result<Outcome<T>, GraphMapError> {
        self.service.save(entity).await
    }

    pub async fn save_or_update<I, U>(
        &self,
        entity: T,
        on_insert: I,
        on_update: U,
    ) -> Result<Outcome<T>, GraphMapError>
    where
        I: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
        U: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
    {
        self.service.save_or_update(entity, on_insert, on_update).await
    }

    pub async fn update<U>(&self, id: Uuid, on_update: U) -> Result<Outcome<T>, GraphMapError>
    where
        U: FnOnce(&mut T) -> Result<(), GraphMapError> + Send,
    {
        self.service.update(id, on_update).await
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<T>, GraphMapError> {
        self.service.find(id).await
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<T>, GraphMapError> {
        self.service.find_by_code(code).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<T>, GraphMapError> {
        self.service.find_by_name(name).await
    }

    pub async fn all(&self, order_by: Option<&str>) -> Result<Vec<T>, GraphMapError> {
        self.service.all(order_by).await
    }

    pub async fn all_cached(
        &self,
        order_by: Option<&str>,
        ttl: Duration,
    ) -> Result<Vec<T>, GraphMapError> {
        self.service.all_cached(order_by, ttl).await
    }

    pub async fn delete_node(&self, id: Uuid) -> Result<Outcome, GraphMapError> {
        self.service.delete_node::<T>(id).await
    }

    pub async fn undelete_node(&self, id: Uuid) -> Result<Outcome, GraphMapError> {
        self.service.undelete_node::<T>(id).await
    }

    pub async fn purge_node(&self, id: Uuid) -> Result<Outcome, GraphMapError> {
        self.service.purge_node::<T>(id).await
    }

    /// `MATCH (x:Label)`
    pub fn match_all(&self) -> Result<CypherQuery, GraphMapError> {
        self.service.match_node::<T>(Some("x"))
    }

    pub fn new_search(&self) -> Search<T> {
        self.service.new_search()
    }

    /// Pages the nodes of `T` that pass `filter`, projecting `x` itself.
    ///
    /// Filter predicates refer to the node as `x`.
    pub async fn page(
        &self,
        search: Search<T>,
        filter: WhereBuilder,
        order_by: Option<String>,
    ) -> Result<Search<T>, GraphMapError> {
        let base = filter.apply(self.match_all()?);
        self.service.page(search, base, "x", order_by, "x").await
    }

    /// Replaces the `V` edge leaving `entity` with the one described by `vector`.
    pub async fn save_vector<V>(
        &self,
        entity: &T,
        vector: &Vector<V>,
    ) -> Result<Outcome<VectorIdent>, GraphMapError>
    where
        V: VectorType<Source = T>,
    {
        let Some(source_id) = entity.id() else {
            return Ok(Outcome::rejected("entity has no id"));
        };
        self.service.save_vector(source_id, vector).await
    }
}
