use std::ffi::OsString;
use std::sync::Arc;

use tracing::{debug, info};

use crate::callstack::CallStack;
use crate::config::Options;
use crate::error::{Result, or_fatal};
use crate::interface::{ArgSlot, Interface};
use crate::logging::{self, LogFile};
use crate::registry::{Registry, profile};
use crate::vprec::dispatch::Operation;
use crate::vprec::{Vprec, VprecConfig};

impl Vprec {
    /// Builds the backend context.
    ///
    /// Without a `registry`, the profile of `config.input_file` is loaded when
    /// there is one. The log file, if any, is created here.
    pub fn new(
        config: VprecConfig,
        registry: Option<Arc<Registry>>,
        call_stack: Option<Arc<CallStack>>,
    ) -> Result<Self> {
        let registry = match (registry, &config.input_file) {
            (Some(registry), _) => Some(registry),
            (None, Some(path)) => Some(Arc::new(profile::load(path)?)),
            (None, None) => None,
        };
        let log = config.log_file.as_ref().map(LogFile::create).transpose()?;

        Ok(Self {
            config,
            registry,
            call_stack,
            log,
        })
    }

    /// Parses the backend arguments and returns the hook table along with
    /// the context every hook expects.
    ///
    /// `args[0]` is the name of the backend.
    pub fn init<I, T>(
        args: I,
        call_stack: Option<Arc<CallStack>>,
        registry: Option<Arc<Registry>>,
    ) -> Result<(Interface<Vprec>, Vprec)>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        logging::init();
        let config = VprecConfig::from_options(Options::parse_tokens(args)?)?;
        let vprec = Vprec::new(config, registry, call_stack)?;
        if logging::banner_enabled() {
            info!("{}", vprec.header());
        }
        Ok((interface(), vprec))
    }

    /// Stores the registry to the output profile, if requested, and flushes
    /// the log.
    pub fn finalize(&self) -> Result<()> {
        if let (Some(path), Some(registry)) = (&self.config.output_file, self.registry()) {
            profile::store(path, registry)?;
        }
        if let Some(log) = &self.log {
            log.flush()?;
            debug!("log written to {}", log.path().display());
        }
        Ok(())
    }

    /// Summary of the effective options.
    pub fn header(&self) -> String {
        let config = &self.config;
        let context = &config.context;
        format!(
            "load backend with precision-binary32 = {}, range-binary32 = {}, \
             precision-binary64 = {}, range-binary64 = {}, mode = {}, error-mode = {}, \
             max-abs-error-exponent = {}, daz = {}, ftz = {} and instrument = {}",
            config.defaults.binary32.precision,
            config.defaults.binary32.range,
            config.defaults.binary64.precision,
            config.defaults.binary64.range,
            config.mode.name(),
            context.policy.mode.name(),
            context.policy.abs_err_exp,
            context.daz,
            context.ftz,
            config.instrument.name(),
        )
    }
}

macro_rules! binary_hook {
    ($name:ident, $t:ty, $op:expr) => {
        fn $name(a: $t, b: $t, res: &mut $t, site: Option<&str>, vprec: &Vprec) {
            *res = or_fatal(vprec.binary_op(a, b, $op, site));
        }
    };
}

binary_hook!(add_f32, f32, Operation::Add);
binary_hook!(sub_f32, f32, Operation::Sub);
binary_hook!(mul_f32, f32, Operation::Mul);
binary_hook!(div_f32, f32, Operation::Div);
binary_hook!(add_f64, f64, Operation::Add);
binary_hook!(sub_f64, f64, Operation::Sub);
binary_hook!(mul_f64, f64, Operation::Mul);
binary_hook!(div_f64, f64, Operation::Div);

fn enter_function(site: Option<&str>, vprec: &Vprec, args: &mut [ArgSlot<'_>]) {
    or_fatal(vprec.enter_function(site, args));
}

fn exit_function(site: Option<&str>, vprec: &Vprec, args: &mut [ArgSlot<'_>]) {
    or_fatal(vprec.exit_function(site, args));
}

fn finalize(vprec: &Vprec) {
    or_fatal(vprec.finalize());
}

/// Comparisons are left to the hardware.
fn interface() -> Interface<Vprec> {
    Interface {
        add_f32: Some(add_f32),
        sub_f32: Some(sub_f32),
        mul_f32: Some(mul_f32),
        div_f32: Some(div_f32),
        cmp_f32: None,
        add_f64: Some(add_f64),
        sub_f64: Some(sub_f64),
        mul_f64: Some(mul_f64),
        div_f64: Some(div_f64),
        cmp_f64: None,
        enter_function: Some(enter_function),
        exit_function: Some(exit_function),
        finalize: Some(finalize),
    }
}
