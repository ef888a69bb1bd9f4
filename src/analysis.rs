//! # Numerical Error Analysis
//!
//! A backend that leaves every result untouched and records, per operation
//! site, three phenomena measured in bits:
//!
//! - **cancellation**: leading bits lost when subtracting close values,
//!   `max(exp a, exp b) - exp(a - b)`
//! - **absorption**: significant bits of the smaller operand of an addition
//!   that fall below the ulp of the result
//! - **round-off**: the magnitude of the exponent of the rounding error of the
//!   native operation, computed exactly with error-free transforms
//!
//! Each phenomenon keeps its minimum, maximum, sum and number of occurrences.
//! The report is written as JSON on finalize.
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use vprec::prelude::*;
//! use vprec::registry::{DataType, FopKind, FopsInfo, InstructionKind, InstructionRecord};
//!
//! let site = InstructionRecord::new(
//!     "sum.c/main/0",
//!     InstructionKind::Fops(FopsInfo::new(FopKind::Sub, DataType::Double, 52, 11)),
//! );
//! let registry = Arc::new(Registry::from_records([site]).unwrap());
//! let (interface, analysis) = Analysis::init(["analysis"], None, Some(registry)).unwrap();
//!
//! let mut res = 0.0;
//! (interface.sub_f64.unwrap())(1.0, 0.9990234375, &mut res, Some("sum.c/main/0"), &analysis);
//! assert_eq!(res, 0.0009765625);
//! assert_eq!(analysis.stats("sum.c/main/0").unwrap().cancellation.max, 10);
//! ```

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::binary::Binary;
use crate::callstack::CallStack;
use crate::config::invalid_option;
use crate::error::{Error, Result, or_fatal};
use crate::interface::Interface;
use crate::logging;
use crate::registry::{FopKind, Registry};
use crate::vprec::dispatch::Operation;

/// Options of the analysis backend.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "analysis", about = "Cancellation, absorption and round-off analysis backend")]
pub struct AnalysisOptions {
    /// Report destination, stdout when absent.
    #[arg(short, long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,
}

/// Running statistics of one phenomenon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub min: u32,
    pub max: u32,
    pub sum: u64,
    pub count: u64,
}

impl Accumulator {
    pub fn record(&mut self, bits: u32) {
        if self.count == 0 {
            self.min = bits;
            self.max = bits;
        } else {
            self.min = self.min.min(bits);
            self.max = self.max.max(bits);
        }
        self.sum += u64::from(bits);
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

impl Serialize for Accumulator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry {
            min: u32,
            max: u32,
            sum: u64,
            count: u64,
            mean: Option<f64>,
        }

        Entry {
            min: self.min,
            max: self.max,
            sum: self.sum,
            count: self.count,
            mean: self.mean(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    pub cancellation: Accumulator,
    pub absorption: Accumulator,
    pub roundoff: Accumulator,
}

/// Cancelled bits of `a + b` or `a - b` giving `res`, if any.
pub fn cancellation<T: Binary>(a: T, b: T, res: T) -> Option<u32> {
    let bits = a.exponent().max(b.exponent()) - res.exponent();
    (bits > 0).then_some(bits as u32)
}

/// Bits of the smaller-magnitude operand of `a + b` lost below the ulp of
/// `res`, if any.
pub fn absorption<T: Binary>(a: T, b: T, res: T) -> Option<u32> {
    let small = if a.abs() < b.abs() { a } else { b };
    if small.is_zero() {
        return None;
    }
    let significant = (T::PMAN_SIZE + 1 - small.lsb()) as i32;
    let lost = res.exponent() - small.exponent() - small.lsb() as i32;
    (lost > 0).then_some(lost.min(significant) as u32)
}

/// Exact rounding error of the native `a op b`, possibly scaled for a
/// division.
pub fn rounding_error<T: Binary>(op: Operation, a: T, b: T, res: T) -> T {
    match op {
        Operation::Add | Operation::Sub => {
            let b = if op == Operation::Sub { -b } else { b };
            // TwoSum
            let b_virtual = res - a;
            let a_virtual = res - b_virtual;
            (a - a_virtual) + (b - b_virtual)
        }
        Operation::Mul => a.mul_add(b, -res),
        // a - res * b is exact
        Operation::Div => -(res.mul_add(b, -a)) / b,
    }
}

/// Round-off bits of the native `a op b`, if it was inexact.
pub fn roundoff<T: Binary>(op: Operation, a: T, b: T, res: T) -> Option<u32> {
    let error = rounding_error(op, a, b, res);
    (error.is_finite() && !error.is_zero()).then(|| error.exponent().unsigned_abs())
}

/// Analysis backend context.
pub struct Analysis {
    sites: IndexMap<String, (FopKind, Mutex<SiteStats>)>,
    output: Mutex<Box<dyn Write + Send>>,
    output_name: String,
}

impl Analysis {
    /// Prepares statistics for every operation site of `registry`, the
    /// report going to `output_file` or stdout.
    pub fn new(registry: &Registry, output_file: Option<PathBuf>) -> Result<Self> {
        let sites = registry
            .iter()
            .filter_map(|record| {
                let fops = record.fops()?;
                Some((record.id.clone(), (fops.op, Mutex::new(SiteStats::default()))))
            })
            .collect();
        let output: Box<dyn Write + Send> = match &output_file {
            Some(path) => {
                let file = File::create(path).map_err(|err| Error::io(path, err))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(io::stdout()),
        };
        let output_name = match &output_file {
            Some(path) => path.display().to_string(),
            None => "stdout".to_string(),
        };
        Ok(Self {
            sites,
            output: Mutex::new(output),
            output_name,
        })
    }

    pub fn init<I, T>(
        args: I,
        _call_stack: Option<Arc<CallStack>>,
        registry: Option<Arc<Registry>>,
    ) -> Result<(Interface<Analysis>, Analysis)>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        logging::init();
        let registry = registry.ok_or(Error::MissingRegistry)?;
        let options = AnalysisOptions::try_parse_from(args).map_err(invalid_option)?;
        let analysis = Analysis::new(&registry, options.output_file)?;
        if logging::banner_enabled() {
            info!("analysis: loaded backend with output_file = {}", analysis.output_name);
        }
        Ok((interface(), analysis))
    }

    /// Records the phenomena of `res = a op b` at `site`.
    pub fn record<T: Binary>(&self, op: Operation, a: T, b: T, res: T, site: Option<&str>) -> Result<()> {
        let (_, stats) = site
            .and_then(|site| self.sites.get(site))
            .ok_or_else(|| Error::UnknownSite(site.map(str::to_string)))?;
        if !(a.is_finite() && b.is_finite() && res.is_finite()) {
            return Ok(());
        }

        let negative_b = b.is_sign_negative() && !b.is_zero();
        let adds = op == Operation::Add || (op == Operation::Sub && negative_b);
        let subtracts = op == Operation::Sub || (op == Operation::Add && negative_b);

        let mut stats = stats.lock();
        if adds && let Some(bits) = absorption(a, b, res) {
            stats.absorption.record(bits);
        }
        if subtracts && let Some(bits) = cancellation(a, b, res) {
            stats.cancellation.record(bits);
        }
        if let Some(bits) = roundoff(op, a, b, res) {
            stats.roundoff.record(bits);
        }
        Ok(())
    }

    pub fn stats(&self, site: &str) -> Option<SiteStats> {
        self.sites.get(site).map(|(_, stats)| *stats.lock())
    }

    pub fn write_report(&self, writer: impl Write) -> Result<()> {
        #[derive(Serialize)]
        struct Site<'a> {
            id: &'a str,
            op: FopKind,
            #[serde(flatten)]
            stats: SiteStats,
        }

        #[derive(Serialize)]
        struct Report<'a> {
            sites: Vec<Site<'a>>,
        }

        let report = Report {
            sites: self
                .sites
                .iter()
                .map(|(id, (op, stats))| Site {
                    id,
                    op: *op,
                    stats: *stats.lock(),
                })
                .collect(),
        };
        serde_json::to_writer_pretty(writer, &report)?;
        Ok(())
    }

    pub fn finalize(&self) -> Result<()> {
        let mut output = self.output.lock();
        self.write_report(&mut *output)?;
        writeln!(output).and_then(|()| output.flush()).map_err(|err| Error::io(&self.output_name, err))
    }
}

macro_rules! analysis_hook {
    ($name:ident, $t:ty, $op:expr) => {
        fn $name(a: $t, b: $t, res: &mut $t, site: Option<&str>, analysis: &Analysis) {
            *res = $op.apply(a, b);
            or_fatal(analysis.record($op, a, b, *res, site));
        }
    };
}

analysis_hook!(add_f32, f32, Operation::Add);
analysis_hook!(sub_f32, f32, Operation::Sub);
analysis_hook!(mul_f32, f32, Operation::Mul);
analysis_hook!(div_f32, f32, Operation::Div);
analysis_hook!(add_f64, f64, Operation::Add);
analysis_hook!(sub_f64, f64, Operation::Sub);
analysis_hook!(mul_f64, f64, Operation::Mul);
analysis_hook!(div_f64, f64, Operation::Div);

fn finalize(analysis: &Analysis) {
    or_fatal(analysis.finalize());
}

fn interface() -> Interface<Analysis> {
    Interface {
        add_f32: Some(add_f32),
        sub_f32: Some(sub_f32),
        mul_f32: Some(mul_f32),
        div_f32: Some(div_f32),
        add_f64: Some(add_f64),
        sub_f64: Some(sub_f64),
        mul_f64: Some(mul_f64),
        div_f64: Some(div_f64),
        finalize: Some(finalize),
        ..Interface::default()
    }
}
