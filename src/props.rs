//! Property propagator.
//!
//! Fills every level's `RegisterPropertiesGroup` in from its parent
//! (device -> peripheral -> cluster(s) -> register), then canonicalizes
//! every field's bit range to `{lsb, msb}` now that its register's
//! resolved size is known, and fills in a field's own `access` from the
//! register's when the field doesn't narrow it itself.
//!
//! Runs after dimension expansion: every node here is already a concrete
//! instance, so propagation needs no knowledge of array indices.

use crate::ir::*;

/// Propagates properties through the whole tree in place.
pub fn propagate(device: &mut Device) {
    let device_props = device.properties.clone();
    for p in &mut device.peripherals {
        propagate_peripheral(p, &device_props);
    }
}

fn propagate_peripheral(p: &mut Peripheral, parent: &RegisterPropertiesGroup) {
    p.properties = p.properties.inherit_from(parent);
    let props = p.properties.clone();
    for c in &mut p.registers {
        propagate_cor(c, &props);
    }
}

fn propagate_cor(node: &mut ClusterOrRegister, parent: &RegisterPropertiesGroup) {
    match node {
        ClusterOrRegister::Cluster(c) => {
            c.properties = c.properties.inherit_from(parent);
            let props = c.properties.clone();
            for child in &mut c.children {
                propagate_cor(child, &props);
            }
        }
        ClusterOrRegister::Register(r) => {
            r.properties = r.properties.inherit_from(parent);
            // Every register ends up with a concrete size/access even if
            // no ancestor ever set one; 32-bit read-write mirrors what the
            // large majority of real SVD files declare at the device
            // level anyway.
            let size = r.properties.size.unwrap_or(32);
            r.properties.size.get_or_insert(size);
            let access = r.properties.access.unwrap_or(Access::ReadWrite);
            r.properties.access.get_or_insert(access);
            r.properties.reset_value.get_or_insert(0);
            r.properties.reset_mask.get_or_insert(0xffff_ffff);

            for f in &mut r.fields {
                let (lsb, msb) = f.bit_range.canonicalize(size);
                f.bit_range = BitRange::LsbMsb { lsb, msb };
                if f.access.is_none() {
                    f.access = Some(access);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_with(peripheral: Peripheral, device_props: RegisterPropertiesGroup) -> Device {
        Device {
            vendor: None,
            vendor_id: None,
            name: "Dev".into(),
            series: None,
            version: "1.0".into(),
            description: "d".into(),
            license_text: None,
            cpu: None,
            header_system_filename: None,
            header_definitions_prefix: None,
            address_unit_bits: 8,
            width: 32,
            properties: device_props,
            peripherals: vec![peripheral],
            vendor_extensions: None,
        }
    }

    #[test]
    fn register_inherits_size_through_peripheral() {
        let field = Field {
            name: "F".into(),
            description: None,
            bit_range: BitRange::OffsetWidth {
                bit_offset: 4,
                bit_width: None,
            },
            access: None,
            modified_write_values: None,
            write_constraint: None,
            read_action: None,
            enum_containers: vec![],
            dim_element_group: None,
            derived_from: None,
        };
        let register = Register {
            name: "R".into(),
            display_name: None,
            description: None,
            address_offset: 0,
            alternate: None,
            data_type: None,
            modified_write_values: None,
            write_constraint: None,
            read_action: None,
            properties: RegisterPropertiesGroup::default(),
            dim_element_group: None,
            fields: vec![field],
            derived_from: None,
        };
        let peripheral = Peripheral {
            name: "P".into(),
            version: None,
            description: None,
            alternate_peripheral: None,
            group_name: None,
            prepend_to_name: None,
            append_to_name: None,
            header_struct_name: None,
            disable_condition: None,
            base_address: 0x4000_0000,
            properties: RegisterPropertiesGroup::default(),
            address_blocks: vec![],
            interrupts: vec![],
            dim_element_group: None,
            registers: vec![ClusterOrRegister::Register(register)],
            derived_from: None,
        };

        let mut device = device_with(
            peripheral,
            RegisterPropertiesGroup {
                size: Some(16),
                access: Some(Access::ReadOnly),
                protection: None,
                reset_value: Some(0),
                reset_mask: Some(0xffff),
            },
        );

        propagate(&mut device);

        let ClusterOrRegister::Register(r) = &device.peripherals[0].registers[0] else {
            panic!()
        };
        assert_eq!(r.properties.size, Some(16));
        assert_eq!(r.properties.access, Some(Access::ReadOnly));
        match r.fields[0].bit_range {
            BitRange::LsbMsb { lsb, msb } => assert_eq!((lsb, msb), (4, 15)),
            _ => panic!("bit range not canonicalized"),
        }
        assert_eq!(r.fields[0].access, Some(Access::ReadOnly));
    }

    #[test]
    fn field_access_override_is_not_clobbered() {
        let field = Field {
            name: "F".into(),
            description: None,
            bit_range: BitRange::LsbMsb { lsb: 0, msb: 0 },
            access: Some(Access::WriteOnly),
            modified_write_values: None,
            write_constraint: None,
            read_action: None,
            enum_containers: vec![],
            dim_element_group: None,
            derived_from: None,
        };
        let register = Register {
            name: "R".into(),
            display_name: None,
            description: None,
            address_offset: 0,
            alternate: None,
            data_type: None,
            modified_write_values: None,
            write_constraint: None,
            read_action: None,
            properties: RegisterPropertiesGroup {
                size: Some(32),
                access: Some(Access::ReadWrite),
                protection: None,
                reset_value: Some(0),
                reset_mask: Some(0),
            },
            dim_element_group: None,
            fields: vec![field],
            derived_from: None,
        };
        let peripheral = Peripheral {
            name: "P".into(),
            version: None,
            description: None,
            alternate_peripheral: None,
            group_name: None,
            prepend_to_name: None,
            append_to_name: None,
            header_struct_name: None,
            disable_condition: None,
            base_address: 0,
            properties: RegisterPropertiesGroup::default(),
            address_blocks: vec![],
            interrupts: vec![],
            dim_element_group: None,
            registers: vec![ClusterOrRegister::Register(register)],
            derived_from: None,
        };
        let mut device = device_with(peripheral, RegisterPropertiesGroup::default());
        propagate(&mut device);

        let ClusterOrRegister::Register(r) = &device.peripherals[0].registers[0] else {
            panic!()
        };
        assert_eq!(r.fields[0].access, Some(Access::WriteOnly));
    }
}
