//! Structural validator.
//!
//! The final pass, run over the fully `resolved` tree: checks that
//! nothing about the *shape* of the device is self-contradictory once
//! every reference, array and property has been expanded. Two registers
//! (or clusters) sharing a name or an address range is only legal when
//! at least one of them declares `alternateRegister`/`alternateGroup` (or
//! `alternateCluster`) - that is exactly what those attributes are for.

use crate::errors::{Diagnostics, Error, Result, Warning};
use crate::ir::{Alternate, AddressBlockUsage, Cpu};
use crate::resolved::*;

pub fn validate(device: &ResolvedDevice, diagnostics: &mut Diagnostics) -> Result<()> {
    check_duplicate_names(
        device
            .peripherals
            .iter()
            .map(|p| (p.name.as_str(), p.alternate_peripheral.is_some())),
        "<device>",
        diagnostics,
    )?;

    for peripheral in &device.peripherals {
        validate_peripheral(peripheral, diagnostics)?;
    }

    if let Some(cpu) = &device.cpu {
        validate_cpu(cpu, diagnostics)?;
    }

    Ok(())
}

fn check_duplicate_names<'a>(
    names: impl Iterator<Item = (&'a str, bool)>,
    scope_path: &str,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let mut seen: Vec<(&str, bool)> = Vec::new();
    for (name, exempt) in names {
        if let Some((_, prior_exempt)) = seen.iter().find(|(n, _)| *n == name) {
            if !(exempt || *prior_exempt) {
                diagnostics.fail(Error::DuplicateName {
                    path: scope_path.to_string(),
                    name: name.to_string(),
                })?;
            }
        }
        seen.push((name, exempt));
    }
    Ok(())
}

fn validate_peripheral(peripheral: &ResolvedPeripheral, diagnostics: &mut Diagnostics) -> Result<()> {
    check_duplicate_names(
        peripheral.registers.iter().map(|c| (c.name(), is_exempt(c))),
        &peripheral.path,
        diagnostics,
    )?;

    let mut registers = Vec::new();
    collect_registers(&peripheral.registers, &mut registers);

    for i in 0..registers.len() {
        for j in (i + 1)..registers.len() {
            let (a, b) = (registers[i], registers[j]);
            let a_size = a.properties.size.max(8) as u64 / 8;
            let b_size = b.properties.size.max(8) as u64 / 8;
            if ranges_overlap(a.address, a_size, b.address, b_size)
                && a.alternate.is_none()
                && b.alternate.is_none()
            {
                diagnostics.fail(Error::AddressOverlap {
                    path: a.path.clone(),
                    other: b.path.clone(),
                })?;
            }
        }
        validate_register(registers[i], peripheral, diagnostics)?;
    }

    for node in &peripheral.registers {
        validate_cor(node, diagnostics)?;
    }

    Ok(())
}

fn validate_cor(node: &ResolvedClusterOrRegister, diagnostics: &mut Diagnostics) -> Result<()> {
    if let ResolvedClusterOrRegister::Cluster(c) = node {
        check_duplicate_names(
            c.children.iter().map(|child| (child.name(), is_exempt(child))),
            &c.path,
            diagnostics,
        )?;
        for child in &c.children {
            validate_cor(child, diagnostics)?;
        }
    }
    Ok(())
}

fn is_exempt(node: &ResolvedClusterOrRegister) -> bool {
    match node {
        ResolvedClusterOrRegister::Cluster(c) => c.alternate_cluster.is_some(),
        ResolvedClusterOrRegister::Register(r) => r.alternate.is_some(),
    }
}

fn collect_registers<'a>(nodes: &'a [ResolvedClusterOrRegister], out: &mut Vec<&'a ResolvedRegister>) {
    for node in nodes {
        match node {
            ResolvedClusterOrRegister::Register(r) => out.push(r),
            ResolvedClusterOrRegister::Cluster(c) => collect_registers(&c.children, out),
        }
    }
}

fn ranges_overlap(a_addr: u64, a_len: u64, b_addr: u64, b_len: u64) -> bool {
    a_addr < b_addr + b_len.max(1) && b_addr < a_addr + a_len.max(1)
}

fn validate_register(
    register: &ResolvedRegister,
    peripheral: &ResolvedPeripheral,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    for i in 0..register.fields.len() {
        let a = &register.fields[i];
        if a.msb >= register.properties.size {
            diagnostics.fail(Error::FieldOutOfRange { path: a.path.clone() })?;
        }
        for b in &register.fields[i + 1..] {
            if a.lsb <= b.msb && b.lsb <= a.msb {
                diagnostics.fail(Error::AddressOverlap {
                    path: a.path.clone(),
                    other: b.path.clone(),
                })?;
            }
        }
    }

    if !peripheral.address_blocks.is_empty() {
        let register_offset = register.address - peripheral.base_address;
        let register_size = (register.properties.size.max(8) / 8) as u64;

        let containing = peripheral.address_blocks.iter().find(|b| {
            register_offset >= b.offset && register_offset + register_size <= b.offset + b.size
        });

        match containing {
            None => {
                diagnostics.fail(Error::AddressBlockViolation {
                    path: register.path.clone(),
                })?;
            }
            Some(block) if block.usage == AddressBlockUsage::Reserved => {
                diagnostics.warn(Warning::ReservedBlockContainsRegisters {
                    path: register.path.clone(),
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

fn validate_cpu(cpu: &Cpu, diagnostics: &mut Diagnostics) -> Result<()> {
    if cpu.nvic_prio_bits < 2 || cpu.nvic_prio_bits > 8 {
        diagnostics.fail(Error::CpuFieldOutOfRange {
            path: "<device>.cpu.nvicPrioBits".to_string(),
        })?;
    }

    if let Some(config) = &cpu.sau_regions_config {
        for (i, region) in config.regions.iter().enumerate() {
            let path = format!("<device>.cpu.sauRegionsConfig.regions[{}]", i);
            if region.base > region.limit {
                diagnostics.fail(Error::SauRegionInvalid { path: path.clone() })?;
                continue;
            }
            for other in &config.regions[i + 1..] {
                if region.base <= other.limit && other.base <= region.limit {
                    diagnostics.fail(Error::SauRegionInvalid { path: path.clone() })?;
                }
            }
        }
    }

    Ok(())
}
