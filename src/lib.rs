//! # VPREC
//!
//! Variable-precision emulation of IEEE 754 binary32/binary64 arithmetic, as
//! a runtime backend for instrumented programs.
//!
//! ## Overview
//!
//! An instrumentation pass rewrites every floating-point operation of a
//! program into a call to a backend hook. This crate provides the runtime
//! side of that contract:
//!
//! - **VPREC**: every operation is reinterpreted as if it had been computed in
//!   a smaller format, with a chosen number of mantissa bits and exponent bits
//! - **Registry**: a per call-site profile giving each operation, and each
//!   argument of instrumented functions, its own format
//! - **Analysis**: a second backend recording cancellations, absorptions and
//!   round-off errors per call-site
//! - **Chain**: backends are stacked and each hook is forwarded to every
//!   backend implementing it
//!
//! ## Architecture
//!
//! ### Binary Module
//! Bit-level access to the two managed formats through the [`Binary`] trait.
//!
//! ### VPREC Module
//! The rounder, the range clamper, the operation dispatcher and the
//! function-boundary hooks, all driven by an immutable [`VprecConfig`].
//!
//! ### Registry Module
//! The read-only site table loaded once from a JSON profile.
//!
//! ## Quick Start
//!
//! ```rust
//! use vprec::prelude::*;
//!
//! let args = ["vprec", "--precision-binary64", "10", "--range-binary64", "5", "--mode", "full"];
//! let (interface, backend) = Vprec::init(args, None, None).unwrap();
//!
//! let add = interface.add_f64.unwrap();
//! let mut result = 0.0;
//! add(1.0, 2.0 / 3.0, &mut result, None, &backend);
//! assert_eq!(result, 1.666015625);
//! ```
//!
//! ## Registry-Driven Precision
//!
//! ```rust
//! use vprec::prelude::*;
//! use vprec::registry::{DataType, FopKind, FopsInfo, InstructionKind, InstructionRecord};
//!
//! let site = InstructionRecord::new(
//!     "main.c/main/0",
//!     InstructionKind::Fops(FopsInfo::new(FopKind::Mul, DataType::Double, 2, 5)),
//! );
//! let registry = Registry::from_records([site]).unwrap();
//!
//! let args = ["vprec", "--instrument", "operations"];
//! let (_, backend) = Vprec::init(args, None, Some(registry.into())).unwrap();
//! let product = backend.binary_op(1.5, 1.25, Operation::Mul, Some("main.c/main/0"));
//! assert_eq!(product.unwrap(), 2.0);
//! ```

pub mod analysis;
pub mod binary;
pub mod callstack;
pub mod config;
pub mod error;
pub mod interface;
pub mod logging;
pub mod registry;
pub mod vprec;

// Re-export the main types for convenience
pub use binary::{Binary, Format};
pub use error::{Error, Result};
pub use registry::Registry;
pub use vprec::{Vprec, VprecConfig};

pub mod prelude {
    //! Prelude module for VPREC.
    //!
    //! This module re-exports commonly used types and traits from the VPREC crate,
    //! allowing for easier imports in user code.

    pub use crate::analysis::Analysis;
    pub use crate::binary::{Binary, Format};
    pub use crate::callstack::CallStack;
    pub use crate::error::{Error, Result};
    pub use crate::interface::{ArgSlot, Chain, Instrument, Interface, Loaded, Predicate};
    pub use crate::registry::Registry;
    pub use crate::vprec::dispatch::Operation;
    pub use crate::vprec::{
        Context, ErrorMode, ErrorPolicy, FormatSpec, InstrumentMode, Mode, Vprec, VprecConfig,
    };
}
