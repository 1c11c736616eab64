//! Output IR. Mirrors `ir::ResolvedRegisterPropertiesGroup` (a plain-struct,
//! no-`Option` sibling of an input type) but generalized to the whole tree:
//! every node here carries a concrete absolute address and a canonical
//! dotted path, neither of which exists until derivation, dimension
//! expansion, property propagation and address resolution have all run.

use crate::ir::{
    Access, Alternate, AddressBlock, Cpu, EnumUsage, Interrupt, ModifiedWriteValues, ReadAction,
    ResolvedRegisterPropertiesGroup, WriteConstraint,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEnumeratedValue {
    pub name: String,
    pub description: Option<String>,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEnumContainer {
    pub name: Option<String>,
    pub usage: EnumUsage,
    pub values: Vec<ResolvedEnumeratedValue>,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub lsb: u32,
    pub msb: u32,
    pub access: Access,
    pub modified_write_values: Option<ModifiedWriteValues>,
    pub write_constraint: Option<WriteConstraint>,
    pub read_action: Option<ReadAction>,
    pub read_enum: Option<ResolvedEnumContainer>,
    pub write_enum: Option<ResolvedEnumContainer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRegister {
    pub path: String,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub address: u64,
    pub alternate: Option<Alternate>,
    pub properties: ResolvedRegisterPropertiesGroup,
    pub fields: Vec<ResolvedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCluster {
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub alternate_cluster: Option<String>,
    pub address: u64,
    pub properties: ResolvedRegisterPropertiesGroup,
    pub children: Vec<ResolvedClusterOrRegister>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedClusterOrRegister {
    Cluster(ResolvedCluster),
    Register(ResolvedRegister),
}

impl ResolvedClusterOrRegister {
    pub fn path(&self) -> &str {
        match self {
            ResolvedClusterOrRegister::Cluster(c) => &c.path,
            ResolvedClusterOrRegister::Register(r) => &r.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResolvedClusterOrRegister::Cluster(c) => &c.name,
            ResolvedClusterOrRegister::Register(r) => &r.name,
        }
    }

    pub fn address(&self) -> u64 {
        match self {
            ResolvedClusterOrRegister::Cluster(c) => c.address,
            ResolvedClusterOrRegister::Register(r) => r.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPeripheral {
    pub path: String,
    pub name: String,
    pub description: Option<String>,
    pub group_name: Option<String>,
    pub alternate_peripheral: Option<String>,
    pub base_address: u64,
    pub properties: ResolvedRegisterPropertiesGroup,
    pub address_blocks: Vec<AddressBlock>,
    pub interrupts: Vec<Interrupt>,
    pub registers: Vec<ResolvedClusterOrRegister>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDevice {
    pub name: String,
    pub version: String,
    pub description: String,
    pub cpu: Option<Cpu>,
    pub address_unit_bits: u32,
    pub width: u32,
    pub peripherals: Vec<ResolvedPeripheral>,
    pub vendor_extensions: Option<String>,
}
