//! Default variable names and identifiers derived from declarations.
//!
//! Compiled patterns embed these keys as query variables that later clauses
//! reference, so every function here is deterministic in its input.

use crate::errors::GraphMapError;
use crate::metadata::{NodeConfig, NodeMeta, RelationMeta, RelationshipConfig};

/// Splits before every uppercase letter except the first character.
///
/// `"GraphNode"` -> `["Graph", "Node"]`, `"HTTPServer"` -> `["H", "T", "T", "P", "Server"]`.
pub fn split_camel_case(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, ch) in source.char_indices() {
        if idx > 0 && ch.is_uppercase() {
            parts.push(&source[start..idx]);
            start = idx;
        }
    }
    if start < source.len() || source.is_empty() {
        parts.push(&source[start..]);
    }
    parts
}

/// First character of each camel-case segment, lower-cased.
pub fn abbreviate(name: &str) -> String {
    split_camel_case(name)
        .into_iter()
        .filter_map(|segment| segment.chars().next())
        .flat_map(char::to_lowercase)
        .collect()
}

/// First character of each `_`-separated part of a relation type, lower-cased.
///
/// Empty parts are dropped, so `"HAS__MEMBER_"` abbreviates like `"HAS_MEMBER"`.
pub fn relationship_abbreviation(rel_type: &str) -> String {
    rel_type
        .split('_')
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn node_label(config: &NodeConfig) -> String {
    config
        .label
        .clone()
        .unwrap_or_else(|| config.type_name.clone())
}

pub fn node_key(config: &NodeConfig) -> String {
    config
        .key
        .clone()
        .unwrap_or_else(|| abbreviate(&config.type_name))
}

pub fn source_key(config: &NodeConfig) -> String {
    config.source_key.clone().unwrap_or_else(|| node_key(config))
}

pub fn target_key(config: &NodeConfig) -> String {
    config.target_key.clone().unwrap_or_else(|| node_key(config))
}

pub fn relationship_key(config: &RelationshipConfig) -> String {
    config
        .key
        .clone()
        .unwrap_or_else(|| relationship_abbreviation(&config.rel_type))
}

/// ASCII letter first, then ASCII letters, digits or `_`.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// `[A-Z0-9_]+`
pub fn is_relationship_type(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Resolves a node declaration, validating label and keys.
pub fn resolve_node(config: &NodeConfig) -> Result<NodeMeta, GraphMapError> {
    let label = node_label(config);
    if label.trim().is_empty() {
        return Err(GraphMapError::declaration(format!(
            "node `{}` has an empty label",
            config.type_name
        )));
    }
    let meta = NodeMeta {
        type_name: config.type_name.clone(),
        label,
        key: node_key(config),
        source_key: source_key(config),
        target_key: target_key(config),
    };
    for key in [&meta.key, &meta.source_key, &meta.target_key] {
        if !is_identifier(key) {
            return Err(GraphMapError::declaration(format!(
                "node `{}` resolves to invalid key `{}`",
                config.type_name, key
            )));
        }
    }
    Ok(meta)
}

/// Resolves a relationship declaration, validating its type and key.
pub fn resolve_relation(config: &RelationshipConfig) -> Result<RelationMeta, GraphMapError> {
    if !is_relationship_type(&config.rel_type) {
        return Err(GraphMapError::declaration(format!(
            "relationship type `{}` must match [A-Z0-9_]+",
            config.rel_type
        )));
    }
    let key = relationship_key(config);
    if !is_identifier(&key) {
        return Err(GraphMapError::declaration(format!(
            "relationship `{}` resolves to invalid key `{}`",
            config.rel_type, key
        )));
    }
    Ok(RelationMeta {
        rel_type: config.rel_type.clone(),
        key,
        direction: config.direction,
        same_node_multiple_allowed: config.same_node_multiple_allowed,
        multiple_allowed: config.multiple_allowed,
    })
}

/// Picks the source and target variables of a vector.
///
/// Derived keys that collide are disambiguated by suffixing the target with
/// `2`; explicitly declared keys that collide are rejected.
pub fn vector_keys(
    source: &NodeConfig,
    target: &NodeConfig,
) -> Result<(String, String), GraphMapError> {
    let source_var = source_key(source);
    let target_var = target_key(target);
    if source_var != target_var {
        return Ok((source_var, target_var));
    }
    let target_explicit = target.target_key.is_some() || target.key.is_some();
    let source_explicit = source.source_key.is_some() || source.key.is_some();
    if target_explicit && source_explicit {
        return Err(GraphMapError::declaration(format!(
            "source `{}` and target `{}` both declare key `{}`",
            source.type_name, target.type_name, source_var
        )));
    }
    if target_explicit {
        return Ok((format!("{source_var}2"), target_var));
    }
    Ok((source_var, format!("{target_var}2")))
}

/// Rejects a pattern whose variables are not pairwise distinct.
///
/// `keys` pairs each role in `shape` with the variable bound to it.
pub fn distinct_keys(shape: &str, keys: &[(&str, &str)]) -> Result<(), GraphMapError> {
    for (i, (role, key)) in keys.iter().enumerate() {
        if let Some((other, _)) = keys[..i].iter().find(|(_, seen)| seen == key) {
            return Err(GraphMapError::declaration(format!(
                "`{shape}` binds `{key}` to both {other} and {role}"
            )));
        }
    }
    Ok(())
}
