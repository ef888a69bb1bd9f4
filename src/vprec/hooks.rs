//! Rounding of the arguments of instrumented functions.
//!
//! On entry the arguments are rounded as operands, on exit as results, so the
//! DAZ and FTZ flags apply the same way they do around an operation.

use std::fmt::{self, LowerExp};

use crate::binary::Binary;
use crate::error::{Error, Result};
use crate::interface::ArgSlot;
use crate::vprec::clamp::clamp;
use crate::vprec::{FormatSpec, Vprec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enter,
    Exit,
}

impl Direction {
    pub fn is_input(self) -> bool {
        self == Direction::Enter
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Enter => "enter",
            Direction::Exit => "exit",
        })
    }
}

impl Vprec {
    /// Rounds the arguments of the function called at `site` before the call,
    /// when the mode rounds operands and the instrumentation covers arguments.
    ///
    /// With a registry, argument `i` takes the format of the `i`-th input of
    /// the call site.
    pub fn enter_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) -> Result<()> {
        self.round_arguments(Direction::Enter, site, args)
    }

    /// Rounds the results of the function called at `site` after the call,
    /// when the mode rounds results and the instrumentation covers arguments.
    pub fn exit_function(&self, site: Option<&str>, args: &mut [ArgSlot<'_>]) -> Result<()> {
        self.round_arguments(Direction::Exit, site, args)
    }

    fn round_arguments(
        &self,
        direction: Direction,
        site: Option<&str>,
        args: &mut [ArgSlot<'_>],
    ) -> Result<()> {
        let config = &self.config;
        let mode_rounds = match direction {
            Direction::Enter => config.mode.rounds_inputs(),
            Direction::Exit => config.mode.rounds_output(),
        };
        if !mode_rounds || !config.instrument.rounds_arguments() {
            return Ok(());
        }

        let descriptors = match self.registry() {
            Some(registry) => {
                let record = registry.lookup_call(site)?;
                Some(match direction {
                    Direction::Enter => &record.inputs,
                    Direction::Exit => &record.outputs,
                })
            }
            None => None,
        };

        for (index, arg) in args.iter_mut().enumerate() {
            let spec = match descriptors {
                Some(descriptors) => {
                    let info = descriptors.get(index).ok_or_else(|| Error::ArgumentMismatch {
                        site: site.unwrap_or("(null)").to_string(),
                        index,
                    })?;
                    Error::check_format(site, info.data_type.format(), arg.format())?;
                    info.spec()
                }
                None => config.defaults.get(arg.format()),
            };

            let round = RoundArgument {
                vprec: self,
                direction,
                site,
                index,
                spec,
            };
            match arg {
                ArgSlot::Float(value) => round.apply(None, &mut **value)?,
                ArgSlot::Double(value) => round.apply(None, &mut **value)?,
                ArgSlot::FloatPtr(values) => {
                    for (element, value) in values.iter_mut().enumerate() {
                        round.apply(Some(element), value)?;
                    }
                }
                ArgSlot::DoublePtr(values) => {
                    for (element, value) in values.iter_mut().enumerate() {
                        round.apply(Some(element), value)?;
                    }
                }
            }
        }
        Ok(())
    }
}

struct RoundArgument<'a> {
    vprec: &'a Vprec,
    direction: Direction,
    site: Option<&'a str>,
    index: usize,
    spec: FormatSpec,
}

impl RoundArgument<'_> {
    fn apply<T: Binary + LowerExp>(&self, element: Option<usize>, value: &mut T) -> Result<()> {
        let vprec = self.vprec;
        let rounded = clamp(*value, self.direction.is_input(), self.spec, &vprec.config.context);
        if let Some(log) = &vprec.log {
            let site = self.site.unwrap_or("(null)");
            let position = match element {
                Some(element) => format!("{}[{element}]", self.index),
                None => self.index.to_string(),
            };
            log.write_line(
                vprec.log_depth(),
                format_args!(
                    "{} {site} arg {position}: {:e} -> {rounded:e}",
                    self.direction, *value
                ),
            )?;
        }
        *value = rounded;
        Ok(())
    }
}
