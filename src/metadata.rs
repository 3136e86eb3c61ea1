//! Declarations and resolved metadata for nodes, relationships and vectors.
//!
//! Domain types describe themselves once through [`Node`] and [`Relation`];
//! a vector is a marker type implementing [`VectorType`] that ties a relation
//! to its source and target node types.

use std::any::TypeId;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Arrow orientation of a relationship relative to its source node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Identity of a declared Rust type, used as registry and cache key.
#[derive(Clone, Copy, Eq)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `my_app::model::GraphNode<T>` -> `GraphNode`
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Declaration of a node type: what `#[Node(Label, Key)]` used to say.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeConfig {
    /// Declared type name; the label and key derive from it when not set.
    pub type_name: String,
    pub label: Option<String>,
    pub key: Option<String>,
    /// Variable name used when the node sits in the source position of a vector.
    pub source_key: Option<String>,
    /// Variable name used when the node sits in the target position of a vector.
    pub target_key: Option<String>,
}

impl NodeConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            label: None,
            key: None,
            source_key: None,
            target_key: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    pub fn target_key(mut self, key: impl Into<String>) -> Self {
        self.target_key = Some(key.into());
        self
    }
}

/// Declaration of a relationship type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationshipConfig {
    /// Graph relation type, `[A-Z0-9_]+` by convention.
    pub rel_type: String,
    pub key: Option<String>,
    pub direction: Direction,
    /// When false, at most one edge of this type may join the same node pair.
    pub same_node_multiple_allowed: bool,
    /// When false, a source node may hold at most one edge of this type.
    pub multiple_allowed: bool,
}

impl RelationshipConfig {
    pub fn new(rel_type: impl Into<String>) -> Self {
        Self {
            rel_type: rel_type.into(),
            key: None,
            direction: Direction::Outgoing,
            same_node_multiple_allowed: false,
            multiple_allowed: true,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn incoming(self) -> Self {
        self.direction(Direction::Incoming)
    }

    pub fn same_node_multiple_allowed(mut self, allowed: bool) -> Self {
        self.same_node_multiple_allowed = allowed;
        self
    }

    pub fn multiple_allowed(mut self, allowed: bool) -> Self {
        self.multiple_allowed = allowed;
        self
    }
}

/// Resolved node metadata with every default applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeMeta {
    pub type_name: String,
    pub label: String,
    pub key: String,
    pub source_key: String,
    pub target_key: String,
}

/// Resolved relationship metadata with every default applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationMeta {
    pub rel_type: String,
    pub key: String,
    pub direction: Direction,
    pub same_node_multiple_allowed: bool,
    pub multiple_allowed: bool,
}

/// Unpacked vector: relation plus source and target node metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VectorMeta {
    pub name: String,
    pub relation: RelationMeta,
    pub source: NodeMeta,
    pub target: NodeMeta,
    /// Variable bound to the source node in default patterns.
    pub source_key: String,
    /// Variable bound to the target node in default patterns.
    pub target_key: String,
}

/// Unpacked hyper-vector: two vectors chained left to right.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HyperVectorMeta {
    pub name: String,
    pub left: VectorMeta,
    pub right: VectorMeta,
}

/// Fields every persisted node carries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    /// Unique plain-text identifier such as a slug.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Root {
    pub fn with_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// A persisted entity type.
pub trait Node: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn declaration() -> NodeConfig;
    fn root(&self) -> &Root;
    fn root_mut(&mut self) -> &mut Root;

    fn id(&self) -> Option<Uuid> {
        self.root().id
    }
}

/// A relationship payload type.
pub trait Relation: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static {
    fn declaration() -> RelationshipConfig;
    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);
}

/// Marker type declaring a (relation, source, target) triple.
pub trait VectorType: Send + Sync + 'static {
    type Relation: Relation;
    type Source: Node;
    type Target: Node;
}

/// Marker type declaring two vectors chained into a two-hop traversal.
pub trait HyperVectorType: Send + Sync + 'static {
    type Left: VectorType;
    type Right: VectorType;
}

/// A vector instance with optional payloads.
pub struct Vector<V: VectorType> {
    pub relation: Option<V::Relation>,
    pub source: Option<V::Source>,
    pub target: Option<V::Target>,
}

impl<V: VectorType> Vector<V> {
    pub fn new(source: V::Source, target: V::Target) -> Self {
        Self {
            relation: None,
            source: Some(source),
            target: Some(target),
        }
    }

    pub fn with_relation(mut self, relation: V::Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn source_id(&self) -> Option<Uuid> {
        self.source.as_ref().and_then(Node::id)
    }

    pub fn target_id(&self) -> Option<Uuid> {
        self.target.as_ref().and_then(Node::id)
    }

    pub fn relation_id(&self) -> Option<Uuid> {
        self.relation.as_ref().and_then(Relation::id)
    }

    /// True when neither endpoint is present, as after an unmatched optional match.
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.target.is_none()
    }

    /// Projects the payload ids onto a [`VectorIdent`].
    ///
    /// Returns `None` unless both endpoints carry an id.
    pub fn ident(&self) -> Option<VectorIdent> {
        Some(VectorIdent {
            source_id: self.source_id()?,
            target_id: self.target_id()?,
            relation_id: self.relation_id(),
        })
    }
}

impl<V: VectorType> Default for Vector<V> {
    fn default() -> Self {
        Self {
            relation: None,
            source: None,
            target: None,
        }
    }
}

impl<V: VectorType> Clone for Vector<V> {
    fn clone(&self) -> Self {
        Self {
            relation: self.relation.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }
}

impl<V> fmt::Debug for Vector<V>
where
    V: VectorType,
    V::Relation: fmt::Debug,
    V::Source: fmt::Debug,
    V::Target: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("relation", &self.relation)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl<V: VectorType> Serialize for Vector<V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Vector", 3)?;
        state.serialize_field("relation", &self.relation)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("target", &self.target)?;
        state.end()
    }
}

/// A hyper-vector instance: both hops of a two-hop match.
pub struct HyperVector<H: HyperVectorType> {
    pub left: Vector<H::Left>,
    pub right: Vector<H::Right>,
}

impl<H: HyperVectorType> Clone for HyperVector<H> {
    fn clone(&self) -> Self {
        Self {
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

/// Lightweight handle on one relationship instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorIdent {
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(default)]
    pub relation_id: Option<Uuid>,
}

impl VectorIdent {
    pub fn new(source_id: Uuid, target_id: Uuid) -> Self {
        Self {
            source_id,
            target_id,
            relation_id: None,
        }
    }

    pub fn with_relation(mut self, relation_id: Uuid) -> Self {
        self.relation_id = Some(relation_id);
        self
    }
}
