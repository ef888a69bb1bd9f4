use std::fmt;

use crate::binary::Binary;
use crate::error::{Error, Result};
use crate::registry::FopKind;
use crate::vprec::clamp::clamp;
use crate::vprec::Vprec;

/// The arithmetic operations intercepted by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Add, Operation::Sub, Operation::Mul, Operation::Div];

    /// Native hardware operation.
    #[inline]
    pub fn apply<T: Binary>(self, a: T, b: T) -> T {
        match self {
            Operation::Add => a + b,
            Operation::Sub => a - b,
            Operation::Mul => a * b,
            Operation::Div => a / b,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Sub => '-',
            Operation::Mul => '*',
            Operation::Div => '/',
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<char> for Operation {
    type Error = Error;

    fn try_from(symbol: char) -> Result<Self> {
        match symbol {
            '+' => Ok(Operation::Add),
            '-' => Ok(Operation::Sub),
            '*' => Ok(Operation::Mul),
            '/' => Ok(Operation::Div),
            other => Err(Error::UnknownOperator(other.to_string())),
        }
    }
}

impl TryFrom<FopKind> for Operation {
    type Error = Error;

    fn try_from(kind: FopKind) -> Result<Self> {
        match kind {
            FopKind::Add => Ok(Operation::Add),
            FopKind::Sub => Ok(Operation::Sub),
            FopKind::Mul => Ok(Operation::Mul),
            FopKind::Div => Ok(Operation::Div),
            FopKind::Cmp => Err(Error::UnknownOperator(kind.to_string())),
        }
    }
}

impl Vprec {
    /// Computes `a op b` in the target format of `site`.
    ///
    /// The format comes from the registry when there is one, otherwise from
    /// the per-format defaults. With a registry, operations are only rounded
    /// when the instrumentation mode covers them, and the native result is
    /// returned otherwise.
    ///
    /// Depending on the mode, operands are rounded before the native
    /// operation and the result after it.
    pub fn binary_op<T: Binary>(&self, a: T, b: T, op: Operation, site: Option<&str>) -> Result<T> {
        let config = &self.config;
        let spec = match self.registry() {
            Some(_) if !config.instrument.rounds_operations() => return Ok(op.apply(a, b)),
            Some(registry) => {
                let fops = registry.lookup_fops(site)?;
                Error::check_format(site, fops.data_type.format(), T::FORMAT)?;
                fops.spec()
            }
            None => config.defaults.get(T::FORMAT),
        };

        let ctx = &config.context;
        let (a, b) = if config.mode.rounds_inputs() {
            (clamp(a, true, spec, ctx), clamp(b, true, spec, ctx))
        } else {
            (a, b)
        };

        let res = op.apply(a, b);

        if config.mode.rounds_output() {
            Ok(clamp(res, false, spec, ctx))
        } else {
            Ok(res)
        }
    }
}
