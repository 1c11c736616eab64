//! Enumerated-value post-processor.
//!
//! Runs after property propagation, once every field has a canonical
//! `{lsb, msb}` bit range and therefore a known bit width. For each
//! field's enumerated-value containers this:
//! - validates that at most one "read" and one "write" container coexist
//!   (a lone "read-write" container stands for both);
//! - expands `0b1xxxx`-style don't-care literals into their concrete
//!   values;
//! - expands an `isDefault` entry into one concrete entry per value the
//!   field's bit width admits that no other entry already names;
//! - flags duplicate concrete values as a warning (first occurrence
//!   wins; SVD files commonly alias two names to the same code).
//!
//! Don't-care and default expansion both walk the field's whole value
//! space, so a field wider than 16 bits carrying either is rejected with
//! `DefaultExpansionOverflow` rather than silently building a
//! multi-billion-entry table.

use std::collections::HashSet;

use crate::errors::{Diagnostics, Error, Result, Warning};
use crate::ir::*;

const MAX_EXPANSION_WIDTH: u32 = 16;

pub fn process_device(device: &mut Device, diagnostics: &mut Diagnostics) -> Result<()> {
    for p in &mut device.peripherals {
        for node in &mut p.registers {
            process_cor(node, p.name.as_str(), diagnostics)?;
        }
    }
    Ok(())
}

fn process_cor(node: &mut ClusterOrRegister, parent_path: &str, diagnostics: &mut Diagnostics) -> Result<()> {
    match node {
        ClusterOrRegister::Cluster(c) => {
            let path = format!("{}.{}", parent_path, c.name);
            for child in &mut c.children {
                process_cor(child, &path, diagnostics)?;
            }
        }
        ClusterOrRegister::Register(r) => {
            let path = format!("{}.{}", parent_path, r.name);
            for f in &mut r.fields {
                process_field(&path, f, diagnostics)?;
            }
        }
    }
    Ok(())
}

fn process_field(register_path: &str, field: &mut Field, diagnostics: &mut Diagnostics) -> Result<()> {
    let path = format!("{}.{}", register_path, field.name);

    if field.enum_containers.len() > 2 {
        diagnostics.fail(Error::ConflictingEnumUsage { path: path.clone() })?;
        field.enum_containers.clear();
        return Ok(());
    }
    if field.enum_containers.len() == 2 {
        let usages: Vec<EnumUsage> = field.enum_containers.iter().map(|c| c.usage).collect();
        let valid = (usages[0] == EnumUsage::Read && usages[1] == EnumUsage::Write)
            || (usages[0] == EnumUsage::Write && usages[1] == EnumUsage::Read);
        if !valid {
            diagnostics.fail(Error::ConflictingEnumUsage { path: path.clone() })?;
            field.enum_containers.clear();
            return Ok(());
        }
    }

    let (lsb, msb) = match field.bit_range {
        BitRange::LsbMsb { lsb, msb } => (lsb, msb),
        BitRange::OffsetWidth { .. } => {
            unreachable!("enumerate runs after props has canonicalized every bit range")
        }
    };
    let width = msb - lsb + 1;

    for container in &mut field.enum_containers {
        expand_container(container, width, &path, diagnostics)?;
    }

    Ok(())
}

fn expand_container(
    container: &mut EnumContainer,
    width: u32,
    path: &str,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let needs_expansion = container
        .values
        .iter()
        .any(|v| matches!(v.kind, EnumValueKind::DontCare { .. } | EnumValueKind::Default));

    if needs_expansion && width > MAX_EXPANSION_WIDTH {
        diagnostics.fail(Error::DefaultExpansionOverflow {
            path: path.to_string(),
            width,
        })?;
        return Ok(());
    }

    let max_value: u64 = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };

    let mut covered: HashSet<u64> = HashSet::new();
    let mut expanded = Vec::new();
    let mut default_template: Option<EnumeratedValue> = None;

    for v in &container.values {
        match v.kind {
            EnumValueKind::Concrete(value) => {
                push_concrete(&mut covered, &mut expanded, v.clone(), value, path, diagnostics);
            }
            EnumValueKind::DontCare { value, mask } => {
                for concrete in submasks(mask).map(|sub| value | sub) {
                    let entry = EnumeratedValue {
                        name: v.name.clone(),
                        description: v.description.clone(),
                        kind: EnumValueKind::Concrete(concrete),
                    };
                    // An explicit concrete value already names this slot:
                    // the explicit entry wins and the expansion collision
                    // is dropped silently rather than warned about.
                    push_expanded(&mut covered, &mut expanded, entry, concrete);
                }
            }
            EnumValueKind::Default => {
                default_template = Some(v.clone());
            }
        }
    }

    let mut complete = default_template.is_some();

    if let Some(template) = default_template {
        for value in 0..=max_value {
            if covered.contains(&value) {
                continue;
            }
            covered.insert(value);
            expanded.push(EnumeratedValue {
                name: template.name.clone(),
                description: template.description.clone(),
                kind: EnumValueKind::Concrete(value),
            });
            if max_value == u64::MAX && value == u64::MAX {
                break;
            }
        }
    } else if let Some(space) = max_value.checked_add(1) {
        complete = covered.len() as u64 >= space;
    }

    container.values = expanded;
    container.complete = complete;
    Ok(())
}

/// Records an explicitly-named concrete value; a collision with an
/// earlier explicit value is a `DuplicateEnumValue` warning.
fn push_concrete(
    covered: &mut HashSet<u64>,
    expanded: &mut Vec<EnumeratedValue>,
    entry: EnumeratedValue,
    value: u64,
    path: &str,
    diagnostics: &mut Diagnostics,
) {
    if covered.insert(value) {
        expanded.push(entry);
    } else {
        diagnostics.warn(Warning::DuplicateEnumValue {
            path: path.to_string(),
            value,
        });
    }
}

/// Records a value produced by don't-care expansion; a collision with an
/// already-covered value (explicit or from an earlier submask) is dropped
/// silently, since the explicit entry it collided with already wins.
fn push_expanded(covered: &mut HashSet<u64>, expanded: &mut Vec<EnumeratedValue>, entry: EnumeratedValue, value: u64) {
    if covered.insert(value) {
        expanded.push(entry);
    }
}

/// Enumerates every submask of `mask`, including 0 and `mask` itself
/// (standard "submasks of a bitmask" walk), used to expand a
/// `0b1xxxx`-style don't-care literal into its concrete values.
fn submasks(mask: u64) -> impl Iterator<Item = u64> {
    let mut next = Some(mask);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current == 0 {
            None
        } else {
            Some((current.wrapping_sub(1)) & mask)
        };
        Some(current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(name: &str, kind: EnumValueKind) -> EnumeratedValue {
        EnumeratedValue {
            name: name.to_string(),
            description: None,
            kind,
        }
    }

    #[test]
    fn submasks_enumerates_every_subset() {
        let mut got: Vec<u64> = submasks(0b101).collect();
        got.sort_unstable();
        assert_eq!(got, vec![0b000, 0b001, 0b100, 0b101]);
    }

    #[test]
    fn expands_dont_care_literal() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::ReadWrite,
            values: vec![value("HIGH", EnumValueKind::DontCare { value: 0b10000, mask: 0b01111 })],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 5, "R.F", &mut diagnostics).unwrap();
        assert_eq!(container.values.len(), 16);
        assert!(container.values.iter().all(|v| matches!(v.kind, EnumValueKind::Concrete(c) if c >= 16)));
    }

    #[test]
    fn expands_default_against_remaining_space() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![
                value("ONE", EnumValueKind::Concrete(1)),
                value("OTHER", EnumValueKind::Default),
            ],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 2, "R.F", &mut diagnostics).unwrap();
        // width=2 -> values 0..=3; 1 explicit, 3 via default.
        assert_eq!(container.values.len(), 4);
        let ones: Vec<_> = container
            .values
            .iter()
            .filter(|v| matches!(v.kind, EnumValueKind::Concrete(1)))
            .collect();
        assert_eq!(ones.len(), 1);
        assert_eq!(ones[0].name, "ONE");
    }

    #[test]
    fn wide_field_with_dont_care_overflows() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![value("X", EnumValueKind::DontCare { value: 0, mask: 0xffff })],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        let err = expand_container(&mut container, 20, "R.F", &mut diagnostics).unwrap_err();
        assert!(matches!(err, Error::DefaultExpansionOverflow { width: 20, .. }));
    }

    #[test]
    fn duplicate_concrete_value_is_a_warning_not_an_error() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![
                value("A", EnumValueKind::Concrete(1)),
                value("B", EnumValueKind::Concrete(1)),
            ],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 4, "R.F", &mut diagnostics).unwrap();
        assert_eq!(container.values.len(), 1);
        assert_eq!(container.values[0].name, "A");
        assert_eq!(diagnostics.warnings.len(), 1);
    }

    #[test]
    fn dont_care_collision_with_explicit_value_is_silently_dropped() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![
                value("EXPLICIT", EnumValueKind::Concrete(0b10000)),
                value("RANGE", EnumValueKind::DontCare { value: 0b10000, mask: 0b01111 }),
            ],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 5, "R.F", &mut diagnostics).unwrap();
        // 16 values in the don't-care's range, one already claimed by the
        // explicit entry, which wins and leaves no warning behind.
        assert_eq!(container.values.len(), 16);
        assert!(diagnostics.warnings.is_empty());
        let at_sixteen: Vec<_> = container
            .values
            .iter()
            .filter(|v| matches!(v.kind, EnumValueKind::Concrete(0b10000)))
            .collect();
        assert_eq!(at_sixteen.len(), 1);
        assert_eq!(at_sixteen[0].name, "EXPLICIT");
    }

    #[test]
    fn complete_is_set_when_default_entry_present() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![
                value("ONE", EnumValueKind::Concrete(1)),
                value("OTHER", EnumValueKind::Default),
            ],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 2, "R.F", &mut diagnostics).unwrap();
        assert!(container.complete);
    }

    #[test]
    fn complete_is_false_when_values_leave_gaps() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![value("ONE", EnumValueKind::Concrete(1))],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 2, "R.F", &mut diagnostics).unwrap();
        assert!(!container.complete);
    }

    #[test]
    fn complete_is_true_when_explicit_values_exhaust_the_space() {
        let mut container = EnumContainer {
            name: None,
            header_enum_name: None,
            usage: EnumUsage::Read,
            values: vec![
                value("A", EnumValueKind::Concrete(0)),
                value("B", EnumValueKind::Concrete(1)),
            ],
            derived_from: None,
            complete: false,
        };
        let mut diagnostics = Diagnostics::new(true);
        expand_container(&mut container, 1, "R.F", &mut diagnostics).unwrap();
        assert!(container.complete);
    }
}
