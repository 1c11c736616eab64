//! Pipeline orchestration.
//!
//! Composes every stage in order: derivation graph, derivation resolver,
//! dimension expansion, property propagation, enumerated-value
//! post-processing, address resolution, structural validation. Each
//! stage's own module documents what it does; this is just the glue,
//! plus the `fail_fast` vs. collect-and-continue switch.

use log::{debug, info};

use crate::address;
use crate::derive;
use crate::dim;
use crate::enumerate;
use crate::errors::{Diagnostics, Error, Result, Warning};
use crate::graph;
use crate::ir::Device;
use crate::props;
use crate::resolved::ResolvedDevice;
use crate::validate;

/// Configuration for a processing run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// `true`: the first fatal error aborts the run (the default).
    /// `false`: fatal errors are recorded in the returned `Outcome` and
    /// processing continues past them where it safely can.
    pub fail_fast: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions { fail_fast: true }
    }
}

/// Everything a processing run produces besides the resolved device
/// itself: the errors and warnings collected along the way. `errors` is
/// only ever non-empty in collect-and-continue mode - in `fail_fast`
/// mode the first fatal error returns `Err` from `process` directly.
#[derive(Debug)]
pub struct Outcome {
    pub device: ResolvedDevice,
    pub warnings: Vec<Warning>,
    pub errors: Vec<Error>,
}

/// Runs the full pipeline over `device`, consuming it.
pub fn process(device: Device, options: ProcessOptions) -> Result<Outcome> {
    let mut diagnostics = Diagnostics::new(options.fail_fast);

    info!("building derivation graph for device {:?}", device.name);
    let graph = graph::build(&device)?;
    debug!("derivation graph has {} nodes", graph.order.len());

    info!("resolving derivedFrom references");
    let device = derive::resolve(&device, &graph)?;

    info!("expanding dim groups");
    let mut device = dim::expand_device(device)?;

    info!("propagating register properties");
    props::propagate(&mut device);

    info!("expanding enumerated values");
    enumerate::process_device(&mut device, &mut diagnostics)?;

    info!("resolving absolute addresses");
    let resolved = address::resolve_addresses(device);

    info!("validating resolved device");
    validate::validate(&resolved, &mut diagnostics)?;

    Ok(Outcome {
        device: resolved,
        warnings: diagnostics.warnings,
        errors: diagnostics.errors,
    })
}
