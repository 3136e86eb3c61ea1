//! Typed Cypher pattern compiler and async persistence layer.
//!
//! Domain types declare themselves once through [`Node`] and [`Relation`];
//! vector marker types tie a relation to its endpoints. The [`TypeRegistry`]
//! collects those declarations, the [`TypeUnpacker`] resolves them (through the
//! [`Memoizer`]) into metadata, the [`compiler`] renders that metadata into
//! path patterns, and [`GraphService`] runs persistence operations built from
//! those patterns against an external [`GraphSession`].
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod compiler;
pub mod config;
pub mod cypher;
pub mod errors;
pub mod fragments;
pub mod keys;
pub mod memoizer;
pub mod metadata;
pub mod outcome;
pub mod registry;
pub mod search;
pub mod service;
pub mod session;

pub use crate::compiler::{
    render_hyper_pattern, render_join_fragment, render_vector_pattern, PatternOptions, Var,
};
pub use crate::config::{CacheConfig, MapperConfig, RelatePolicy};
pub use crate::cypher::{CypherQuery, Params, Statement};
pub use crate::errors::{GraphMapError, SessionError};
pub use crate::fragments::WhereBuilder;
pub use crate::memoizer::{CacheKey, CacheStats, Memoizable, Memoizer};
pub use crate::metadata::{
    Direction, HyperVector, HyperVectorMeta, HyperVectorType, Node, NodeConfig, NodeMeta,
    Relation, RelationMeta, RelationshipConfig, Root, TypeTag, Vector, VectorIdent, VectorMeta,
    VectorType,
};
pub use crate::outcome::{Outcome, OutcomeStatus, StatusDetail};
pub use crate::registry::{TypeRegistry, TypeUnpacker};
pub use crate::search::{OrderBy, PageWindow, Search, SearchDirection};
pub use crate::service::{EntityService, GraphService};
pub use crate::session::{CypherExecutor, GraphSession, Row, UnitOfWork};
