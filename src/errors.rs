//! Error taxonomy for the resolver.
//!
//! Every variant carries the pre-expansion path of the offending node so
//! that a diagnostic can always be traced back to a concrete place in the
//! input tree, even after the tree has been rewritten by later stages.

pub use failure::{err_msg, format_err, Error as AnyError, Fail};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum Error {
    #[fail(display = "{}: malformed numeric literal {:?}", path, literal)]
    MalformedNumber { path: String, literal: String },

    #[fail(
        display = "{}: dimIndex has {} entries but dim={}",
        path, got, dim
    )]
    DimIndexMismatch { path: String, dim: usize, got: usize },

    #[fail(display = "{}: dim group must have dim >= 1 and dimIncrement > 0", path)]
    InvalidDimGroup { path: String },

    #[fail(display = "{}: invalid bit range [{}:{}]", path, msb, lsb)]
    InvalidBitRange { path: String, lsb: usize, msb: usize },

    #[fail(display = "{}: conflicting alternate declaration", path)]
    ConflictingAlternate { path: String },

    #[fail(display = "{}: duplicate name {:?} among siblings", path, name)]
    DuplicateName { path: String, name: String },

    #[fail(display = "{}: overlaps address range of {:?}", path, other)]
    AddressOverlap { path: String, other: String },

    #[fail(display = "{}: field does not fit within register bit width", path)]
    FieldOutOfRange { path: String },

    #[fail(display = "{}: register does not fit within its address block", path)]
    AddressBlockViolation { path: String },

    #[fail(display = "{}: unresolved reference {:?}", path, reference)]
    UnresolvedReference { path: String, reference: String },

    #[fail(
        display = "{}: reference {:?} resolved to a node of the wrong kind",
        path, reference
    )]
    WrongKindReference { path: String, reference: String },

    #[fail(display = "circular inheritance: {:?}", cycle)]
    CircularInheritance { cycle: Vec<String> },

    #[fail(display = "{}: conflicting enumeratedValues usage", path)]
    ConflictingEnumUsage { path: String },

    #[fail(
        display = "{}: don't-care expansion would produce too many values (width {})",
        path, width
    )]
    DefaultExpansionOverflow { path: String, width: u32 },

    #[fail(display = "{}: CPU field out of range", path)]
    CpuFieldOutOfRange { path: String },

    #[fail(display = "{}: invalid SAU region", path)]
    SauRegionInvalid { path: String },
}

impl Error {
    /// The pre-expansion path of the node the error is attached to, where
    /// applicable (cycles name every node on the cycle instead).
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::MalformedNumber { path, .. }
            | Error::DimIndexMismatch { path, .. }
            | Error::InvalidDimGroup { path }
            | Error::InvalidBitRange { path, .. }
            | Error::ConflictingAlternate { path }
            | Error::DuplicateName { path, .. }
            | Error::AddressOverlap { path, .. }
            | Error::FieldOutOfRange { path }
            | Error::AddressBlockViolation { path }
            | Error::UnresolvedReference { path, .. }
            | Error::WrongKindReference { path, .. }
            | Error::ConflictingEnumUsage { path }
            | Error::DefaultExpansionOverflow { path, .. }
            | Error::CpuFieldOutOfRange { path }
            | Error::SauRegionInvalid { path } => Some(path.as_str()),
            Error::CircularInheritance { .. } => None,
        }
    }
}

/// A non-fatal condition: recorded and processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    DuplicateEnumValue { path: String, value: u64 },
    RedundantFieldOverride { path: String },
    ReservedBlockContainsRegisters { path: String },
}

/// Accumulates diagnostics across a processing run.
///
/// In fail-fast mode (the default) the first fatal error is
/// returned immediately via `?` and this type is never consulted for
/// errors. In collect-and-continue mode, `push_error` records the error and
/// the caller drops the affected subtree instead of aborting the whole run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub fail_fast: bool,
    pub errors: Vec<Error>,
    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Records a fatal error. In fail-fast mode this returns `Err` so the
    /// caller should propagate it with `?`; in collect mode it is recorded
    /// and `Ok(())` is returned so the caller can skip the subtree and keep
    /// going.
    pub fn fail(&mut self, error: Error) -> Result<()> {
        if self.fail_fast {
            return Err(error);
        }

        self.errors.push(error);
        Ok(())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
