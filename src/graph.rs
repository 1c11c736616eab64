//! Derivation graph builder and the name/path resolution that backs it.
//!
//! Resolution needs the *whole* tree up front regardless of source order -
//! a node may derive from a sibling declared later - so this module first
//! mirrors the tree into a lightweight `ScopeEntry` tree carrying only
//! `{name, kind, path, children}`, then walks the real IR alongside it to
//! resolve every `derivedFrom` into a graph edge keyed by canonical path.
//!
//! The same walk also records, for every node, a clone of its own content
//! (`originals`) and the canonical paths of its immediate children
//! (`children_of`). The resolver (`crate::derive`) needs both: it must
//! process a node's children before the node itself (so an inherited
//! subtree is cloned already-resolved), which means the graph that feeds
//! the topological sort carries structural "parent depends on child" edges
//! alongside the explicit `derivedFrom` edges.

use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::ir::*;
use crate::path::segments_match;

#[derive(Debug)]
struct ScopeEntry {
    name: String,
    kind: Kind,
    path: String,
    children: Vec<ScopeEntry>,
}

fn field_scope(path_prefix: &str, field: &Field) -> ScopeEntry {
    let path = format!("{}.{}", path_prefix, field.name);
    let children = field
        .enum_containers
        .iter()
        .enumerate()
        .map(|(i, c)| ScopeEntry {
            name: c
                .name
                .clone()
                .unwrap_or_else(|| format!("{:?}#{}", c.usage, i)),
            kind: Kind::EnumContainer,
            path: format!("{}.{}", path, i),
            children: vec![],
        })
        .collect();

    ScopeEntry {
        name: field.name.clone(),
        kind: Kind::Field,
        path,
        children,
    }
}

fn cluster_or_register_scope(path_prefix: &str, node: &ClusterOrRegister) -> ScopeEntry {
    let path = format!("{}.{}", path_prefix, node.name());
    match node {
        ClusterOrRegister::Register(r) => ScopeEntry {
            name: r.name.clone(),
            kind: Kind::Register,
            path: path.clone(),
            children: r.fields.iter().map(|f| field_scope(&path, f)).collect(),
        },
        ClusterOrRegister::Cluster(c) => ScopeEntry {
            name: c.name.clone(),
            kind: Kind::Cluster,
            path: path.clone(),
            children: c
                .children
                .iter()
                .map(|child| cluster_or_register_scope(&path, child))
                .collect(),
        },
    }
}

fn peripheral_scope(p: &Peripheral) -> ScopeEntry {
    ScopeEntry {
        name: p.name.clone(),
        kind: Kind::Peripheral,
        path: p.name.clone(),
        children: p
            .registers
            .iter()
            .map(|c| cluster_or_register_scope(&p.name, c))
            .collect(),
    }
}

/// One `derivedFrom` edge: `from` inherits the content of `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A node's own content, captured verbatim from the input tree (children
/// lists included, unresolved `derivedFrom` and all) so the resolver can
/// later substitute already-resolved children in without re-walking the
/// original tree by path.
#[derive(Debug, Clone)]
pub enum AnyNode {
    Peripheral(Peripheral),
    ClusterOrRegister(ClusterOrRegister),
    Field(Field),
    EnumContainer(EnumContainer),
}

/// The derivation graph: `derivedFrom` edges, a combined topological order
/// (derivation edges plus implicit "children before parent" structural
/// edges), and the bookkeeping the resolver needs to apply it.
pub struct DerivationGraph {
    pub derivation_edges: Vec<Edge>,
    pub order: Vec<String>,
    pub originals: HashMap<String, AnyNode>,
    pub children_of: HashMap<String, Vec<String>>,
    pub kinds: HashMap<String, Kind>,
}

struct Accumulator {
    derivation_edges: Vec<Edge>,
    structural_edges: Vec<Edge>,
    originals: HashMap<String, AnyNode>,
    children_of: HashMap<String, Vec<String>>,
    kinds: HashMap<String, Kind>,
}

pub fn build(device: &Device) -> Result<DerivationGraph> {
    let root: Vec<ScopeEntry> = device.peripherals.iter().map(peripheral_scope).collect();

    let mut acc = Accumulator {
        derivation_edges: Vec::new(),
        structural_edges: Vec::new(),
        originals: HashMap::new(),
        children_of: HashMap::new(),
        kinds: HashMap::new(),
    };

    for (i, peripheral) in device.peripherals.iter().enumerate() {
        let entry = &root[i];

        acc.kinds.insert(entry.path.clone(), Kind::Peripheral);
        acc.originals
            .insert(entry.path.clone(), AnyNode::Peripheral(peripheral.clone()));

        if let Some(reference) = peripheral.derived_from() {
            let target = resolve(&root, &[&root], reference, Kind::Peripheral, &entry.path)?;
            acc.derivation_edges.push(Edge {
                from: entry.path.clone(),
                to: target,
            });
        }

        let child_paths: Vec<String> = entry.children.iter().map(|c| c.path.clone()).collect();
        for child_path in &child_paths {
            acc.structural_edges.push(Edge {
                from: entry.path.clone(),
                to: child_path.clone(),
            });
        }
        acc.children_of.insert(entry.path.clone(), child_paths);

        walk_children(&root, &entry.children, &peripheral.registers, vec![&root], &mut acc)?;
    }

    let all_paths = root_paths(&root);
    let mut combined = acc.derivation_edges.clone();
    combined.extend(acc.structural_edges.iter().cloned());
    let order = topological_order(&all_paths, &combined)?;

    Ok(DerivationGraph {
        derivation_edges: acc.derivation_edges,
        order,
        originals: acc.originals,
        children_of: acc.children_of,
        kinds: acc.kinds,
    })
}

fn root_paths(root: &[ScopeEntry]) -> Vec<String> {
    let mut out = Vec::new();
    collect_paths(root, &mut out);
    out
}

fn collect_paths(entries: &[ScopeEntry], out: &mut Vec<String>) {
    for e in entries {
        out.push(e.path.clone());
        collect_paths(&e.children, out);
    }
}

fn walk_children(
    root: &[ScopeEntry],
    scope_level: &[ScopeEntry],
    children: &[ClusterOrRegister],
    mut ancestor_stack: Vec<&[ScopeEntry]>,
    acc: &mut Accumulator,
) -> Result<()> {
    ancestor_stack.insert(0, scope_level);

    for (i, child) in children.iter().enumerate() {
        let entry = &scope_level[i];

        acc.kinds.insert(entry.path.clone(), entry.kind);
        acc.originals
            .insert(entry.path.clone(), AnyNode::ClusterOrRegister(child.clone()));

        if let Some(reference) = child.derived_from() {
            let target = resolve(root, &ancestor_stack, reference, entry.kind, &entry.path)?;
            acc.derivation_edges.push(Edge {
                from: entry.path.clone(),
                to: target,
            });
        }

        let child_paths: Vec<String> = entry.children.iter().map(|c| c.path.clone()).collect();
        for cp in &child_paths {
            acc.structural_edges.push(Edge {
                from: entry.path.clone(),
                to: cp.clone(),
            });
        }
        acc.children_of.insert(entry.path.clone(), child_paths);

        match child {
            ClusterOrRegister::Cluster(c) => {
                walk_children(root, &entry.children, &c.children, ancestor_stack.clone(), acc)?;
            }
            ClusterOrRegister::Register(r) => {
                walk_fields(root, &entry.children, &r.fields, ancestor_stack.clone(), acc)?;
            }
        }
    }

    Ok(())
}

fn walk_fields(
    root: &[ScopeEntry],
    scope_level: &[ScopeEntry],
    fields: &[Field],
    mut ancestor_stack: Vec<&[ScopeEntry]>,
    acc: &mut Accumulator,
) -> Result<()> {
    ancestor_stack.insert(0, scope_level);

    for (i, field) in fields.iter().enumerate() {
        let entry = &scope_level[i];

        acc.kinds.insert(entry.path.clone(), Kind::Field);
        acc.originals
            .insert(entry.path.clone(), AnyNode::Field(field.clone()));

        if let Some(reference) = field.derived_from() {
            let target = resolve(root, &ancestor_stack, reference, Kind::Field, &entry.path)?;
            acc.derivation_edges.push(Edge {
                from: entry.path.clone(),
                to: target,
            });
        }

        let container_paths: Vec<String> = entry.children.iter().map(|c| c.path.clone()).collect();
        for cp in &container_paths {
            acc.structural_edges.push(Edge {
                from: entry.path.clone(),
                to: cp.clone(),
            });
        }
        acc.children_of.insert(entry.path.clone(), container_paths);

        for (j, container) in field.enum_containers.iter().enumerate() {
            let container_entry = &entry.children[j];
            acc.kinds.insert(container_entry.path.clone(), Kind::EnumContainer);
            acc.originals.insert(
                container_entry.path.clone(),
                AnyNode::EnumContainer(container.clone()),
            );

            if let Some(reference) = container.derived_from() {
                let mut container_stack = vec![entry.children.as_slice()];
                container_stack.extend(ancestor_stack.iter().cloned());
                let target = resolve(
                    root,
                    &container_stack,
                    reference,
                    Kind::EnumContainer,
                    &container_entry.path,
                )?;
                acc.derivation_edges.push(Edge {
                    from: container_entry.path.clone(),
                    to: target,
                });
            }
        }
    }

    Ok(())
}

/// Resolves reference `R` written on a node of kind `referrer_kind` at
/// `referrer_path`.
fn resolve(
    root: &[ScopeEntry],
    scope_stack: &[&[ScopeEntry]],
    reference: &str,
    referrer_kind: Kind,
    referrer_path: &str,
) -> Result<String> {
    if reference.contains('.') {
        resolve_absolute(root, reference, referrer_kind, referrer_path)
    } else {
        resolve_relative(scope_stack, reference, referrer_kind, referrer_path)
    }
}

fn resolve_relative(
    scope_stack: &[&[ScopeEntry]],
    reference: &str,
    referrer_kind: Kind,
    referrer_path: &str,
) -> Result<String> {
    for level in scope_stack {
        let matches: Vec<&ScopeEntry> = level
            .iter()
            .filter(|e| segments_match(reference, &e.name))
            .collect();

        if matches.is_empty() {
            continue;
        }

        if let Some(m) = matches.iter().find(|e| e.kind == referrer_kind) {
            return Ok(m.path.clone());
        }

        return Err(Error::WrongKindReference {
            path: referrer_path.to_string(),
            reference: reference.to_string(),
        });
    }

    Err(Error::UnresolvedReference {
        path: referrer_path.to_string(),
        reference: reference.to_string(),
    })
}

fn resolve_absolute(
    root: &[ScopeEntry],
    reference: &str,
    referrer_kind: Kind,
    referrer_path: &str,
) -> Result<String> {
    let mut level = root;
    let mut current: Option<&ScopeEntry> = None;

    for segment in reference.split('.') {
        let found: Vec<&ScopeEntry> = level
            .iter()
            .filter(|e| segments_match(segment, &e.name))
            .collect();

        if found.len() != 1 {
            return Err(Error::UnresolvedReference {
                path: referrer_path.to_string(),
                reference: reference.to_string(),
            });
        }

        current = Some(found[0]);
        level = &found[0].children;
    }

    let node = current.ok_or_else(|| Error::UnresolvedReference {
        path: referrer_path.to_string(),
        reference: reference.to_string(),
    })?;

    if node.kind != referrer_kind {
        return Err(Error::WrongKindReference {
            path: referrer_path.to_string(),
            reference: reference.to_string(),
        });
    }

    Ok(node.path.clone())
}

/// DFS-based topological sort with cycle detection (white/gray/black
/// coloring). Linear in graph size, simpler to get right than a full
/// Tarjan SCC decomposition for a graph where we only need "is there a
/// cycle" plus one valid order. Structural
/// (parent-depends-on-child) edges can never participate in a cycle since
/// they mirror a tree, so any reported cycle is necessarily a genuine
/// `derivedFrom` cycle.
fn topological_order(nodes: &[String], edges: &[Edge]) -> Result<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut color: HashMap<&str, Color> = nodes.iter().map(|n| (n.as_str(), Color::White)).collect();
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack_trace: Vec<String> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        color: &mut HashMap<&'a str, Color>,
        order: &mut Vec<String>,
        stack_trace: &mut Vec<String>,
    ) -> Result<()> {
        match color.get(node) {
            Some(Color::Black) => return Ok(()),
            Some(Color::Gray) => {
                let start = stack_trace.iter().position(|p| p == node).unwrap_or(0);
                let mut cycle: Vec<String> = stack_trace[start..].to_vec();
                cycle.push(node.to_string());
                return Err(Error::CircularInheritance { cycle });
            }
            _ => {}
        }

        color.insert(node, Color::Gray);
        stack_trace.push(node.to_string());

        if let Some(deps) = adjacency.get(node) {
            for dep in deps {
                visit(dep, adjacency, color, order, stack_trace)?;
            }
        }

        stack_trace.pop();
        color.insert(node, Color::Black);
        // Dependencies (bases, children) must precede their dependents, so
        // push to the order only after all of a node's deps are done.
        order.push(node.to_string());
        Ok(())
    }

    for node in nodes {
        if color.get(node.as_str()) == Some(&Color::White) {
            visit(node.as_str(), &adjacency, &mut color, &mut order, &mut stack_trace)?;
        }
    }

    Ok(order)
}
