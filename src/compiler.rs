//! Renders unpacked vector metadata into Cypher path patterns.
//!
//! ```rust
//! use cyphervector::compiler::{render_vector_pattern, PatternOptions};
//! # use cyphervector::metadata::*;
//! # let meta = VectorMeta {
//! #     name: "PersonKnowsPerson".into(),
//! #     relation: RelationMeta { rel_type: "KNOWS".into(), key: "k".into(),
//! #         direction: Direction::Outgoing, same_node_multiple_allowed: false, multiple_allowed: true },
//! #     source: NodeMeta { type_name: "Person".into(), label: "Person".into(), key: "p".into(),
//! #         source_key: "p".into(), target_key: "p".into() },
//! #     target: NodeMeta { type_name: "Person".into(), label: "Person".into(), key: "p".into(),
//! #         source_key: "p".into(), target_key: "p".into() },
//! #     source_key: "p".into(), target_key: "p2".into(),
//! # };
//! let text = render_vector_pattern(&meta, &PatternOptions::new().rel_path("*1..3"));
//! assert_eq!(text, "(p:Person)-[k:KNOWS*1..3]->(p2:Person)");
//! ```

use crate::metadata::{Direction, HyperVectorMeta, NodeMeta, RelationMeta, VectorMeta};

/// Variable bound to one element of a pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Var {
    /// Use the key derived from the declaration.
    #[default]
    Default,
    Named(String),
    /// Omit the variable token entirely.
    Anonymous,
}

impl Var {
    pub fn named(name: impl Into<String>) -> Self {
        Var::from(name.into())
    }

    fn resolve<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            Var::Default => default,
            Var::Named(name) => name,
            Var::Anonymous => "",
        }
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        if value == "_" {
            Var::Anonymous
        } else {
            Var::Named(value.to_string())
        }
    }
}

impl From<String> for Var {
    fn from(value: String) -> Self {
        if value == "_" {
            Var::Anonymous
        } else {
            Var::Named(value)
        }
    }
}

/// Per-call overrides for pattern rendering.
///
/// Property maps are given as the text between the braces, e.g. `"id: $id"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternOptions {
    pub relation: Var,
    pub source: Var,
    pub target: Var,
    /// Appended verbatim after the relation type, e.g. `*1..3`.
    pub rel_path: Option<String>,
    pub source_label: bool,
    pub target_label: bool,
    pub source_props: Option<String>,
    pub target_props: Option<String>,
    pub rel_props: Option<String>,
    /// Binds the whole path: `p = (...)`.
    pub path_name: Option<String>,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            relation: Var::Default,
            source: Var::Default,
            target: Var::Default,
            rel_path: None,
            source_label: true,
            target_label: true,
            source_props: None,
            target_props: None,
            rel_props: None,
            path_name: None,
        }
    }
}

impl PatternOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relation(mut self, var: impl Into<Var>) -> Self {
        self.relation = var.into();
        self
    }

    pub fn source(mut self, var: impl Into<Var>) -> Self {
        self.source = var.into();
        self
    }

    pub fn target(mut self, var: impl Into<Var>) -> Self {
        self.target = var.into();
        self
    }

    pub fn rel_path(mut self, path: impl Into<String>) -> Self {
        self.rel_path = Some(path.into());
        self
    }

    pub fn without_source_label(mut self) -> Self {
        self.source_label = false;
        self
    }

    pub fn without_target_label(mut self) -> Self {
        self.target_label = false;
        self
    }

    pub fn source_props(mut self, props: impl Into<String>) -> Self {
        self.source_props = Some(props.into());
        self
    }

    pub fn target_props(mut self, props: impl Into<String>) -> Self {
        self.target_props = Some(props.into());
        self
    }

    pub fn rel_props(mut self, props: impl Into<String>) -> Self {
        self.rel_props = Some(props.into());
        self
    }

    pub fn path_name(mut self, name: impl Into<String>) -> Self {
        self.path_name = Some(name.into());
        self
    }
}

fn props_suffix(out: &mut String, props: Option<&str>) {
    if let Some(props) = props {
        out.push_str(" { ");
        out.push_str(props);
        out.push_str(" }");
    }
}

fn render_node(var: &str, node: &NodeMeta, with_label: bool, props: Option<&str>) -> String {
    let mut out = String::with_capacity(var.len() + node.label.len() + 4);
    out.push('(');
    out.push_str(var);
    if with_label {
        out.push(':');
        out.push_str(&node.label);
    }
    props_suffix(&mut out, props);
    out.push(')');
    out
}

fn render_relation(var: &str, relation: &RelationMeta, opts: &PatternOptions) -> String {
    let mut out = String::from("[");
    out.push_str(var);
    out.push(':');
    out.push_str(&relation.rel_type);
    if let Some(path) = &opts.rel_path {
        out.push_str(path);
    }
    props_suffix(&mut out, opts.rel_props.as_deref());
    out.push(']');
    out
}

fn render_hop(meta: &VectorMeta, opts: &PatternOptions) -> String {
    let relation = render_relation(
        opts.relation.resolve(&meta.relation.key),
        &meta.relation,
        opts,
    );
    let target = render_node(
        opts.target.resolve(&meta.target_key),
        &meta.target,
        opts.target_label,
        opts.target_props.as_deref(),
    );
    match meta.relation.direction {
        Direction::Outgoing => format!("-{relation}->{target}"),
        Direction::Incoming => format!("<-{relation}-{target}"),
    }
}

/// `(S:SL)-[R:TYPE]->(T:TL)`, or `(S:SL)<-[R:TYPE]-(T:TL)` for incoming relations.
pub fn render_vector_pattern(meta: &VectorMeta, opts: &PatternOptions) -> String {
    let source = render_node(
        opts.source.resolve(&meta.source_key),
        &meta.source,
        opts.source_label,
        opts.source_props.as_deref(),
    );
    let hop = render_hop(meta, opts);
    match &opts.path_name {
        Some(path) => format!("{path} = {source}{hop}"),
        None => format!("{source}{hop}"),
    }
}

/// The trailing hop of a vector, for chaining onto an existing pattern.
///
/// Source options are ignored.
pub fn render_join_fragment(meta: &VectorMeta, opts: &PatternOptions) -> String {
    render_hop(meta, opts)
}

/// Left vector followed by the right vector's hop.
pub fn render_hyper_pattern(
    meta: &HyperVectorMeta,
    left: &PatternOptions,
    right: &PatternOptions,
) -> String {
    let mut out = render_vector_pattern(&meta.left, left);
    out.push_str(&render_join_fragment(&meta.right, right));
    out
}
