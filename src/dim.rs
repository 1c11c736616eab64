//! Dimension expander.
//!
//! Replaces every node carrying a `dim` group with `dim` concrete sibling
//! instances, named either in array form (`Name[%s]` -> `Name[0]`,
//! `Name[1]`, ...) or substitution form (`Name%s` -> `Name0`, `Name1`,
//! ...), and shifts each copy's address offset (or, for a field, bit
//! position) by `i * dimIncrement`. Runs after derivation and before
//! property propagation: a dim'd node's `derivedFrom` must already be
//! gone, and the clones it produces still need size/access filled in from
//! their parent.

use crate::errors::{Error, Result};
use crate::ir::*;

/// Index labels substituted for `%s`, derived from `dimIndex` (or, when
/// absent, the default `0..dim` numeric sequence) unless `dimArrayIndex`
/// supplies names of its own, in which case those take precedence.
fn dim_labels(path: &str, group: &DimElementGroup) -> Result<Vec<String>> {
    let labels = if let Some(array_index) = &group.dim_array_index {
        array_index.iter().map(|v| v.name.clone()).collect()
    } else {
        match &group.dim_index {
            None => (0..group.dim).map(|i| i.to_string()).collect(),
            Some(spec) => parse_dim_index(spec),
        }
    };

    if labels.len() as u64 != group.dim {
        return Err(Error::DimIndexMismatch {
            path: path.to_string(),
            dim: group.dim as usize,
            got: labels.len(),
        });
    }

    Ok(labels)
}

/// `dimIndex` grammar: `N1-N2` (inclusive numeric range), `A-Z` (inclusive
/// alphabetic range), or a comma-separated identifier list.
fn parse_dim_index(spec: &str) -> Vec<String> {
    if let Some((start, end)) = spec.split_once('-') {
        if let (Ok(s), Ok(e)) = (start.parse::<u64>(), end.parse::<u64>()) {
            if s <= e {
                return (s..=e).map(|i| i.to_string()).collect();
            }
        }
        let mut start_chars = start.chars();
        let mut end_chars = end.chars();
        if let (Some(s), None, Some(e), None) = (
            start_chars.next(),
            start_chars.next(),
            end_chars.next(),
            end_chars.next(),
        ) {
            if s.is_ascii_alphabetic() && e.is_ascii_alphabetic() && s <= e {
                return (s as u8..=e as u8).map(|c| (c as char).to_string()).collect();
            }
        }
    }

    spec.split(',').map(|s| s.trim().to_string()).collect()
}

fn expand_name(template: &str, label: &str) -> String {
    if let Some(base) = template.strip_suffix("[%s]") {
        format!("{}[{}]", base, label)
    } else if let Some(base) = template.strip_suffix("%s") {
        format!("{}{}", base, label)
    } else {
        template.to_string()
    }
}

/// Expands one dim'd node into its sibling instances, or returns it
/// unchanged (as a single-element vec) if it carries no `dim` group.
fn expand<T: Dimensionable + Clone>(mut node: T, path: &str) -> Result<Vec<T>> {
    let group = match node.take_dim_element_group() {
        Some(g) => g,
        None => return Ok(vec![node]),
    };

    if group.dim == 0 || group.dim_increment == 0 {
        return Err(Error::InvalidDimGroup { path: path.to_string() });
    }

    let labels = dim_labels(path, &group)?;
    let template = node.name().to_string();

    let mut out = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        let mut copy = node.clone();
        copy.set_name(expand_name(&template, label));
        copy.shift_position(group.dim_increment * i as u64);
        out.push(copy);
    }
    Ok(out)
}

/// Expands an entire resolved device tree.
pub fn expand_device(device: Device) -> Result<Device> {
    let mut peripherals = Vec::new();
    for p in device.peripherals {
        let path = p.name.clone();
        for mut copy in expand(p, &path)? {
            let prefix = copy.name.clone();
            copy.registers = expand_cor_list(copy.registers, &prefix)?;
            peripherals.push(copy);
        }
    }
    Ok(Device { peripherals, ..device })
}

fn expand_cor_list(items: Vec<ClusterOrRegister>, parent_path: &str) -> Result<Vec<ClusterOrRegister>> {
    let mut out = Vec::new();
    for item in items {
        let path = format!("{}.{}", parent_path, item.name());
        for mut copy in expand(item, &path)? {
            match &mut copy {
                ClusterOrRegister::Cluster(c) => {
                    let prefix = format!("{}.{}", parent_path, c.name);
                    c.children = expand_cor_list(std::mem::take(&mut c.children), &prefix)?;
                }
                ClusterOrRegister::Register(r) => {
                    let prefix = format!("{}.{}", parent_path, r.name);
                    r.fields = expand_field_list(std::mem::take(&mut r.fields), &prefix)?;
                }
            }
            out.push(copy);
        }
    }
    Ok(out)
}

fn expand_field_list(fields: Vec<Field>, parent_path: &str) -> Result<Vec<Field>> {
    let mut out = Vec::new();
    for f in fields {
        let path = format!("{}.{}", parent_path, f.name);
        out.extend(expand(f, &path)?);
    }
    Ok(out)
}
