//! Declaration registry and the memoized type unpacker.
//!
//! Vector marker types are registered once at startup; the unpacker then
//! resolves a [`TypeTag`] into [`VectorMeta`] / [`HyperVectorMeta`] and keeps
//! the result in the shared [`Memoizer`].

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;

use crate::errors::GraphMapError;
use crate::keys;
use crate::memoizer::{CacheKey, Memoizer};
use crate::metadata::{
    HyperVectorMeta, HyperVectorType, Node, NodeConfig, NodeMeta, Relation, RelationMeta,
    RelationshipConfig, TypeTag, VectorMeta, VectorType,
};

const UNPACK: &str = "unpack";
const UNPACK_HYPER: &str = "unpack_hyper";
const UNPACK_NODE: &str = "unpack_node";
const UNPACK_RELATION: &str = "unpack_relation";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    Vector {
        relation: TypeTag,
        source: TypeTag,
        target: TypeTag,
    },
    HyperVector {
        left: TypeTag,
        right: TypeTag,
    },
}

/// Declarations of every node, relation and vector type known to the mapper.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    nodes: AHashMap<TypeTag, NodeConfig>,
    relations: AHashMap<TypeTag, RelationshipConfig>,
    shapes: AHashMap<TypeTag, Shape>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_node<N: Node>(&mut self) -> Result<&mut Self, GraphMapError> {
        let config = N::declaration();
        keys::resolve_node(&config)?;
        self.nodes.insert(TypeTag::of::<N>(), config);
        Ok(self)
    }

    pub fn register_relation<R: Relation>(&mut self) -> Result<&mut Self, GraphMapError> {
        let config = R::declaration();
        keys::resolve_relation(&config)?;
        self.relations.insert(TypeTag::of::<R>(), config);
        Ok(self)
    }

    /// Registers a vector together with its relation and endpoint types.
    ///
    /// The source, relation and target variables must be distinct.
    pub fn register_vector<V: VectorType>(&mut self) -> Result<&mut Self, GraphMapError> {
        self.register_relation::<V::Relation>()?;
        self.register_node::<V::Source>()?;
        self.register_node::<V::Target>()?;
        let (source_key, target_key) =
            keys::vector_keys(&V::Source::declaration(), &V::Target::declaration())?;
        let relation_key = keys::resolve_relation(&V::Relation::declaration())?.key;
        keys::distinct_keys(
            TypeTag::of::<V>().name(),
            &[
                ("source", source_key.as_str()),
                ("relation", relation_key.as_str()),
                ("target", target_key.as_str()),
            ],
        )?;
        self.shapes.insert(
            TypeTag::of::<V>(),
            Shape::Vector {
                relation: TypeTag::of::<V::Relation>(),
                source: TypeTag::of::<V::Source>(),
                target: TypeTag::of::<V::Target>(),
            },
        );
        Ok(self)
    }

    /// Registers a hyper-vector and both of its vectors.
    ///
    /// Only the middle node may share a variable across the two hops.
    pub fn register_hyper_vector<H: HyperVectorType>(&mut self) -> Result<&mut Self, GraphMapError> {
        self.register_vector::<H::Left>()?;
        self.register_vector::<H::Right>()?;
        let left = self.resolve_vector(TypeTag::of::<H::Left>())?;
        let right = self.resolve_vector(TypeTag::of::<H::Right>())?;
        keys::distinct_keys(
            TypeTag::of::<H>().name(),
            &[
                ("left source", left.source_key.as_str()),
                ("left relation", left.relation.key.as_str()),
                ("middle", left.target_key.as_str()),
                ("right relation", right.relation.key.as_str()),
                ("right target", right.target_key.as_str()),
            ],
        )?;
        self.shapes.insert(
            TypeTag::of::<H>(),
            Shape::HyperVector {
                left: TypeTag::of::<H::Left>(),
                right: TypeTag::of::<H::Right>(),
            },
        );
        Ok(self)
    }

    pub fn is_vector(&self, tag: TypeTag) -> bool {
        matches!(self.shapes.get(&tag), Some(Shape::Vector { .. }))
    }

    pub fn is_hyper_vector(&self, tag: TypeTag) -> bool {
        matches!(self.shapes.get(&tag), Some(Shape::HyperVector { .. }))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn node_config(&self, tag: TypeTag) -> Result<&NodeConfig, GraphMapError> {
        self.nodes
            .get(&tag)
            .ok_or_else(|| GraphMapError::shape(format!("node type `{tag}` is not registered")))
    }

    fn relation_config(&self, tag: TypeTag) -> Result<&RelationshipConfig, GraphMapError> {
        self.relations
            .get(&tag)
            .ok_or_else(|| GraphMapError::shape(format!("relation type `{tag}` is not registered")))
    }

    fn resolve_vector(&self, tag: TypeTag) -> Result<VectorMeta, GraphMapError> {
        let Some(Shape::Vector {
            relation,
            source,
            target,
        }) = self.shapes.get(&tag).copied()
        else {
            return Err(GraphMapError::shape(format!(
                "`{tag}` is not a registered vector"
            )));
        };
        let source_config = self.node_config(source)?;
        let target_config = self.node_config(target)?;
        let (source_key, target_key) = keys::vector_keys(source_config, target_config)?;
        Ok(VectorMeta {
            name: tag.name().to_string(),
            relation: keys::resolve_relation(self.relation_config(relation)?)?,
            source: keys::resolve_node(source_config)?,
            target: keys::resolve_node(target_config)?,
            source_key,
            target_key,
        })
    }

    fn resolve_hyper_vector(&self, tag: TypeTag) -> Result<HyperVectorMeta, GraphMapError> {
        let Some(Shape::HyperVector { left, right }) = self.shapes.get(&tag).copied() else {
            return Err(GraphMapError::shape(format!(
                "`{tag}` is not a registered hyper-vector"
            )));
        };
        Ok(HyperVectorMeta {
            name: tag.name().to_string(),
            left: self.resolve_vector(left)?,
            right: self.resolve_vector(right)?,
        })
    }
}

/// Resolves registered shapes into metadata, memoizing every success.
#[derive(Clone)]
pub struct TypeUnpacker {
    registry: Arc<TypeRegistry>,
    memo: Arc<Memoizer>,
    ttl: Duration,
}

impl TypeUnpacker {
    pub fn new(registry: Arc<TypeRegistry>, memo: Arc<Memoizer>, ttl: Duration) -> Self {
        Self {
            registry,
            memo,
            ttl,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn memoizer(&self) -> &Arc<Memoizer> {
        &self.memo
    }

    /// Fails with `InvalidVectorShape` unless `tag` names a registered vector.
    pub fn unpack(&self, tag: TypeTag) -> Result<Arc<VectorMeta>, GraphMapError> {
        let key = CacheKey::new(UNPACK).with_tag(tag);
        self.memo.get_or_compute(&key, self.ttl, || {
            self.registry.resolve_vector(tag).map(Arc::new)
        })
    }

    /// Fails with `InvalidVectorShape` unless `tag` names a registered hyper-vector.
    pub fn unpack_hyper(&self, tag: TypeTag) -> Result<Arc<HyperVectorMeta>, GraphMapError> {
        let key = CacheKey::new(UNPACK_HYPER).with_tag(tag);
        self.memo.get_or_compute(&key, self.ttl, || {
            self.registry.resolve_hyper_vector(tag).map(Arc::new)
        })
    }

    pub fn vector<V: VectorType>(&self) -> Result<Arc<VectorMeta>, GraphMapError> {
        self.unpack(TypeTag::of::<V>())
    }

    pub fn hyper_vector<H: HyperVectorType>(&self) -> Result<Arc<HyperVectorMeta>, GraphMapError> {
        self.unpack_hyper(TypeTag::of::<H>())
    }

    /// Node metadata straight from the type's declaration; no registration needed.
    pub fn node<N: Node>(&self) -> Result<Arc<NodeMeta>, GraphMapError> {
        let key = CacheKey::for_type::<N>(UNPACK_NODE);
        self.memo.get_or_compute(&key, self.ttl, || {
            keys::resolve_node(&N::declaration()).map(Arc::new)
        })
    }

    pub fn relation<R: Relation>(&self) -> Result<Arc<RelationMeta>, GraphMapError> {
        let key = CacheKey::for_type::<R>(UNPACK_RELATION);
        self.memo.get_or_compute(&key, self.ttl, || {
            keys::resolve_relation(&R::declaration()).map(Arc::new)
        })
    }
}
