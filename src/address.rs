//! Address resolver.
//!
//! The last stage before validation: walks the (derived, dim-expanded,
//! property-propagated, enumeration-expanded) input tree once, summing
//! `peripheral.baseAddress` with every enclosing cluster's
//! `addressOffset` down to each register, and converts every node into
//! its `resolved` counterpart along the way. `RegisterPropertiesGroup` is
//! unwrapped into `ResolvedRegisterPropertiesGroup` here on the assumption
//! that `props::propagate` already ran; an absent field at this point is
//! a pipeline ordering bug, not malformed input, hence the `expect`s.

use crate::ir;
use crate::ir::EnumUsage;
use crate::resolved::*;

pub fn resolve_addresses(device: ir::Device) -> ResolvedDevice {
    let peripherals = device.peripherals.into_iter().map(resolve_peripheral).collect();
    ResolvedDevice {
        name: device.name,
        version: device.version,
        description: device.description,
        cpu: device.cpu,
        address_unit_bits: device.address_unit_bits,
        width: device.width,
        peripherals,
        vendor_extensions: device.vendor_extensions,
    }
}

fn resolve_properties(p: ir::RegisterPropertiesGroup) -> ResolvedRegisterPropertiesGroup {
    ResolvedRegisterPropertiesGroup {
        size: p.size.expect("props::propagate fills in size"),
        access: p.access.expect("props::propagate fills in access"),
        protection: p.protection,
        reset_value: p.reset_value.expect("props::propagate fills in reset_value"),
        reset_mask: p.reset_mask.expect("props::propagate fills in reset_mask"),
    }
}

fn resolve_peripheral(p: ir::Peripheral) -> ResolvedPeripheral {
    let path = p.name.clone();
    let base_address = p.base_address;
    let registers = p
        .registers
        .into_iter()
        .map(|c| resolve_cor(c, base_address, &path))
        .collect();

    ResolvedPeripheral {
        path,
        name: p.name,
        description: p.description,
        group_name: p.group_name,
        alternate_peripheral: p.alternate_peripheral,
        base_address,
        properties: resolve_properties(p.properties),
        address_blocks: p.address_blocks,
        interrupts: p.interrupts,
        registers,
    }
}

fn resolve_cor(node: ir::ClusterOrRegister, base: u64, parent_path: &str) -> ResolvedClusterOrRegister {
    match node {
        ir::ClusterOrRegister::Cluster(c) => {
            let path = format!("{}.{}", parent_path, c.name);
            let address = base + c.address_offset;
            let children = c
                .children
                .into_iter()
                .map(|child| resolve_cor(child, address, &path))
                .collect();

            ResolvedClusterOrRegister::Cluster(ResolvedCluster {
                path,
                name: c.name,
                description: c.description,
                alternate_cluster: c.alternate_cluster,
                address,
                properties: resolve_properties(c.properties),
                children,
            })
        }
        ir::ClusterOrRegister::Register(r) => {
            let path = format!("{}.{}", parent_path, r.name);
            let address = base + r.address_offset;
            let fields = r.fields.into_iter().map(|f| resolve_field(f, &path)).collect();

            ResolvedClusterOrRegister::Register(ResolvedRegister {
                path,
                name: r.name,
                display_name: r.display_name,
                description: r.description,
                address,
                alternate: r.alternate,
                properties: resolve_properties(r.properties),
                fields,
            })
        }
    }
}

fn resolve_field(f: ir::Field, parent_path: &str) -> ResolvedField {
    let path = format!("{}.{}", parent_path, f.name);
    let (lsb, msb) = match f.bit_range {
        ir::BitRange::LsbMsb { lsb, msb } => (lsb, msb),
        ir::BitRange::OffsetWidth { .. } => {
            unreachable!("props::propagate canonicalizes every bit range before address resolution")
        }
    };

    let mut read_enum = None;
    let mut write_enum = None;
    for container in f.enum_containers {
        let resolved = resolve_enum_container(container);
        match resolved.usage {
            EnumUsage::Read => read_enum = Some(resolved),
            EnumUsage::Write => write_enum = Some(resolved),
            EnumUsage::ReadWrite => {
                read_enum = Some(resolved.clone());
                write_enum = Some(resolved);
            }
        }
    }

    ResolvedField {
        path,
        name: f.name,
        description: f.description,
        lsb,
        msb,
        access: f.access.expect("props::propagate fills in field access"),
        modified_write_values: f.modified_write_values,
        write_constraint: f.write_constraint,
        read_action: f.read_action,
        read_enum,
        write_enum,
    }
}

fn resolve_enum_container(c: ir::EnumContainer) -> ResolvedEnumContainer {
    ResolvedEnumContainer {
        name: c.name,
        usage: c.usage,
        complete: c.complete,
        values: c
            .values
            .into_iter()
            .map(|v| ResolvedEnumeratedValue {
                name: v.name,
                description: v.description,
                value: match v.kind {
                    ir::EnumValueKind::Concrete(x) => x,
                    _ => unreachable!("enumerate::process_device expands every value to Concrete"),
                },
            })
            .collect(),
    }
}
