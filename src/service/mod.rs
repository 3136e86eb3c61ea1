//! Generic persistence engine over a [`GraphSession`].
//!
//! Every mutating operation runs inside one unit of work, committed when the
//! operation body succeeds and rolled back on any error. Expected conditions
//! and session faults come back as [`Outcome`]s; declaration defects are the
//! only `Err`s.

mod entity;
mod nodes;
mod paging;
mod relations;

pub use entity::EntityService;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::compiler::{render_vector_pattern, PatternOptions};
use crate::config::MapperConfig;
use crate::cypher::CypherQuery;
use crate::errors::GraphMapError;
use crate::memoizer::Memoizer;
use crate::metadata::{Node, VectorType};
use crate::outcome::Outcome;
use crate::registry::{TypeRegistry, TypeUnpacker};
use crate::search::Search;
use crate::session::{GraphSession, UnitOfWork};

pub struct GraphService<S: GraphSession> {
    session: Arc<S>,
    unpacker: TypeUnpacker,
    config: MapperConfig,
}

impl<S: GraphSession> Clone for GraphService<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            unpacker: self.unpacker.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: GraphSession> GraphService<S> {
    /// Freezes `registry` and builds a private memoizer from `config.cache`.
    pub fn new(session: Arc<S>, registry: TypeRegistry, config: MapperConfig) -> Self {
        let memo = Arc::new(Memoizer::new(&config.cache));
        Self::with_memoizer(session, Arc::new(registry), memo, config)
    }

    /// Shares a registry and memoizer with other services.
    pub fn with_memoizer(
        session: Arc<S>,
        registry: Arc<TypeRegistry>,
        memo: Arc<Memoizer>,
        config: MapperConfig,
    ) -> Self {
        let unpacker = TypeUnpacker::new(registry, memo, config.cache.metadata_ttl);
        Self {
            session,
            unpacker,
            config,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn unpacker(&self) -> &TypeUnpacker {
        &self.unpacker
    }

    pub fn memoizer(&self) -> &Arc<Memoizer> {
        self.unpacker.memoizer()
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Typed view bound to one entity type.
    pub fn entities<T: Node>(&self) -> EntityService<'_, S, T> {
        EntityService {
            service: self,
            _entity: PhantomData,
        }
    }

    /// An empty search sized with the configured default page rows.
    pub fn new_search<T>(&self) -> Search<T> {
        Search::new().page_rows(self.config.default_page_rows)
    }

    /// `MATCH (var:Label)`, with the declared node key when `var` is `None`.
    pub fn match_node<T: Node>(&self, var: Option<&str>) -> Result<CypherQuery, GraphMapError> {
        let meta = self.unpacker.node::<T>()?;
        let var = var.unwrap_or(&meta.key);
        Ok(CypherQuery::new().match_(format!("({var}:{})", meta.label)))
    }

    pub fn match_vector<V: VectorType>(
        &self,
        opts: &PatternOptions,
    ) -> Result<CypherQuery, GraphMapError> {
        let meta = self.unpacker.vector::<V>()?;
        Ok(CypherQuery::new().match_(render_vector_pattern(&meta, opts)))
    }

    pub fn optional_match_vector<V: VectorType>(
        &self,
        opts: &PatternOptions,
    ) -> Result<CypherQuery, GraphMapError> {
        let meta = self.unpacker.vector::<V>()?;
        Ok(CypherQuery::new().optional_match(render_vector_pattern(&meta, opts)))
    }

    /// Folds an operation result into the outcome taxonomy.
    ///
    /// Declaration defects stay `Err`; every other error is logged with its
    /// input and returned as [`Outcome::Error`].
    fn settle<T>(
        &self,
        operation: &'static str,
        input: impl FnOnce() -> Value,
        result: Result<Outcome<T>, GraphMapError>,
    ) -> Result<Outcome<T>, GraphMapError> {
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_declaration_defect() => Err(err),
            Err(err) => {
                let input = input();
                tracing::error!(
                    target: "cyphervector::service",
                    operation,
                    input = %input,
                    error = %err,
                    "service.fault"
                );
                Ok(Outcome::error(err, Some(input)))
            }
        }
    }
}

/// `{ name: value }` for fault logs; unserializable values log as `null`.
fn input_of<T: Serialize + ?Sized>(name: &str, value: &T) -> Value {
    let mut map = Map::new();
    map.insert(
        name.to_string(),
        serde_json::to_value(value).unwrap_or(Value::Null),
    );
    Value::Object(map)
}

/// Commits `uow` when `result` is `Ok`, otherwise rolls it back.
async fn finish<T>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T, GraphMapError>,
) -> Result<T, GraphMapError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = uow.rollback().await {
                tracing::warn!(
                    target: "cyphervector::service",
                    error = %rollback,
                    "service.rollback.failed"
                );
            }
            Err(err)
        }
    }
}
