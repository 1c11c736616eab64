//! Resolves a parsed CMSIS-SVD device tree into a fully expanded, derived
//! register map.
//!
//! Consumes the in-memory input IR (`ir::Device`) an XML decoder would
//! hand it - decoding SVD XML is out of scope here - and runs it through
//! `derivedFrom` resolution, `dim` array expansion, register-property
//! propagation, enumerated-value expansion and absolute address
//! resolution, finishing with a structural validation pass. The
//! `process` entry point in `process` composes the whole pipeline.

pub mod address;
pub mod derive;
pub mod dim;
pub mod enumerate;
pub mod errors;
pub mod graph;
pub mod ir;
pub mod number;
pub mod path;
pub mod process;
pub mod props;
pub mod resolved;
pub mod validate;

pub use errors::{Error, Result, Warning};
pub use process::{process, Outcome, ProcessOptions};
