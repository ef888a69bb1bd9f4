//! # Variable Precision Emulation
//!
//! The VPREC backend reinterprets every instrumented binary32/binary64
//! operation as if it had been computed in a format with fewer mantissa bits
//! (the *precision*) and a narrower exponent field (the *range*).
//!
//! Each operation goes through three steps, depending on the [`Mode`]:
//!
//! 1. round both operands to the target format (`full`, `ib`),
//! 2. compute the result with the native hardware operation,
//! 3. round the result to the target format (`full`, `ob`).
//!
//! Rounding itself is split in two layers: [`round`] performs
//! round-to-nearest-even at a given number of mantissa bits, and [`clamp`]
//! applies the exponent range on top of it (overflow to infinity, gradual
//! underflow, denormals-are-zero and flush-to-zero).
//!
//! ## Examples
//!
//! ```rust
//! use vprec::vprec::{Context, FormatSpec, clamp::clamp};
//!
//! // 1 + 2^-11 needs 11 mantissa bits: it is a tie at 10 bits
//! let spec = FormatSpec { precision: 10, range: 5 };
//! let rounded = clamp(1.0 + 2f64.powi(-11), false, spec, &Context::default());
//! assert_eq!(rounded, 1.0);
//!
//! // half-precision overflows above 65504
//! assert_eq!(clamp(70000.0f32, false, spec, &Context::default()), f32::INFINITY);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;

use crate::binary::Format;
use crate::callstack::CallStack;
use crate::error::{Error, Result};
use crate::logging::LogFile;
use crate::registry::Registry;

pub mod backend;
pub mod clamp;
pub mod dispatch;
pub mod hooks;
pub mod round;

/// VPREC mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Pass-through, nothing is rounded.
    Ieee,
    /// Round operands and result.
    Full,
    /// Round operands only.
    #[value(name = "ib", alias = "input-bound")]
    InputBound,
    /// Round the result only.
    #[default]
    #[value(name = "ob", alias = "output-bound")]
    OutputBound,
}

impl Mode {
    pub fn rounds_inputs(self) -> bool {
        matches!(self, Mode::Full | Mode::InputBound)
    }

    pub fn rounds_output(self) -> bool {
        matches!(self, Mode::Full | Mode::OutputBound)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Ieee => "ieee",
            Mode::Full => "full",
            Mode::InputBound => "ib",
            Mode::OutputBound => "ob",
        }
    }
}

/// Granularity of the instrumentation when a registry is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InstrumentMode {
    /// Round function arguments only.
    Arguments,
    /// Round internal operations only.
    Operations,
    /// Round both.
    All,
    #[default]
    None,
}

impl InstrumentMode {
    pub fn rounds_operations(self) -> bool {
        matches!(self, InstrumentMode::Operations | InstrumentMode::All)
    }

    pub fn rounds_arguments(self) -> bool {
        matches!(self, InstrumentMode::Arguments | InstrumentMode::All)
    }

    pub fn name(self) -> &'static str {
        match self {
            InstrumentMode::Arguments => "arguments",
            InstrumentMode::Operations => "operations",
            InstrumentMode::All => "all",
            InstrumentMode::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ErrorMode {
    #[default]
    #[value(name = "rel", alias = "relative")]
    Relative,
    #[value(name = "abs", alias = "absolute")]
    Absolute,
    /// Relative and absolute error budgets at the same time.
    #[value(name = "all", alias = "combined")]
    Combined,
}

impl ErrorMode {
    pub fn name(self) -> &'static str {
        match self {
            ErrorMode::Relative => "rel",
            ErrorMode::Absolute => "abs",
            ErrorMode::Combined => "all",
        }
    }
}

/// Smallest binary64 normal exponent, the default absolute error threshold.
pub const DEFAULT_ABS_ERR_EXP: i32 = -1022;

/// Bound on the magnitude of the absolute error threshold, well past the
/// exponents of every binary64 value.
pub const ABS_ERR_EXP_LIMIT: i64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub mode: ErrorMode,
    /// Bits below `2^abs_err_exp` are insignificant in absolute and combined
    /// modes.
    pub abs_err_exp: i32,
}

impl ErrorPolicy {
    pub fn relative() -> Self {
        Self {
            mode: ErrorMode::Relative,
            abs_err_exp: DEFAULT_ABS_ERR_EXP,
        }
    }

    pub fn absolute(abs_err_exp: i32) -> Self {
        Self {
            mode: ErrorMode::Absolute,
            abs_err_exp,
        }
    }

    pub fn combined(abs_err_exp: i32) -> Self {
        Self {
            mode: ErrorMode::Combined,
            abs_err_exp,
        }
    }

    pub fn has_absolute(&self) -> bool {
        matches!(self.mode, ErrorMode::Absolute | ErrorMode::Combined)
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::relative()
    }
}

/// Per-run rounding context, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Context {
    pub policy: ErrorPolicy,
    /// Denormals-are-zero: flush subnormal operands.
    pub daz: bool,
    /// Flush-to-zero: flush subnormal results.
    pub ftz: bool,
}

pub const PRECISION_MIN: u32 = 1;
pub const RANGE_MIN: u32 = 2;

/// Target mantissa length and exponent width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub precision: u32,
    pub range: u32,
}

impl FormatSpec {
    pub const fn native(format: Format) -> Self {
        Self {
            precision: format.pman_size(),
            range: format.exp_size(),
        }
    }

    pub fn new(format: Format, precision: u32, range: u32) -> Result<Self> {
        let name = format.name();
        if !(PRECISION_MIN..=format.pman_size()).contains(&precision) {
            return Err(Error::invalid_option(
                &format!("precision-{name}"),
                precision,
                format!("must be in {PRECISION_MIN}..={}", format.pman_size()),
            ));
        }
        if !(RANGE_MIN..=format.exp_size()).contains(&range) {
            return Err(Error::invalid_option(
                &format!("range-{name}"),
                range,
                format!("must be in {RANGE_MIN}..={}", format.exp_size()),
            ));
        }
        Ok(Self { precision, range })
    }

    /// Largest normal exponent of the target range.
    pub fn emax(self) -> i32 {
        (1 << (self.range - 1)) - 1
    }

    /// Smallest normal exponent of the target range.
    pub fn emin(self) -> i32 {
        1 - self.emax()
    }
}

/// Default precision and range of each managed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precisions {
    pub binary32: FormatSpec,
    pub binary64: FormatSpec,
}

impl Precisions {
    pub fn get(&self, format: Format) -> FormatSpec {
        match format {
            Format::Binary32 => self.binary32,
            Format::Binary64 => self.binary64,
        }
    }
}

impl Default for Precisions {
    fn default() -> Self {
        Self {
            binary32: FormatSpec::native(Format::Binary32),
            binary64: FormatSpec::native(Format::Binary64),
        }
    }
}

/// Immutable backend configuration, built once from the backend arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VprecConfig {
    pub defaults: Precisions,
    pub mode: Mode,
    pub instrument: InstrumentMode,
    pub context: Context,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// The VPREC backend context handed back to every hook.
#[derive(Debug)]
pub struct Vprec {
    config: VprecConfig,
    registry: Option<Arc<Registry>>,
    call_stack: Option<Arc<CallStack>>,
    log: Option<LogFile>,
}

impl Vprec {
    pub fn config(&self) -> &VprecConfig {
        &self.config
    }

    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_deref()
    }

    fn log_depth(&self) -> usize {
        self.call_stack.as_ref().map_or(0, |stack| stack.depth())
    }
}
