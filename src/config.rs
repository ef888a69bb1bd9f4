//! Backend options, parsed from argv-style tokens.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use clap::error::{ContextKind, ContextValue};

use crate::binary::Format;
use crate::error::{Error, Result};
use crate::vprec::{
    ABS_ERR_EXP_LIMIT, Context, DEFAULT_ABS_ERR_EXP, ErrorMode, ErrorPolicy, FormatSpec,
    InstrumentMode, Mode,
    Precisions, VprecConfig,
};

/// Options of the VPREC backend.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "vprec", about = "Variable precision emulation backend")]
pub struct Options {
    /// Mantissa bits kept for binary32 operations.
    #[arg(long, default_value_t = 23, value_parser = clap::value_parser!(u32).range(1..=23))]
    pub precision_binary32: u32,

    /// Mantissa bits kept for binary64 operations.
    #[arg(long, default_value_t = 52, value_parser = clap::value_parser!(u32).range(1..=52))]
    pub precision_binary64: u32,

    /// Exponent bits kept for binary32 operations.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(2..=8))]
    pub range_binary32: u32,

    /// Exponent bits kept for binary64 operations.
    #[arg(long, default_value_t = 11, value_parser = clap::value_parser!(u32).range(2..=11))]
    pub range_binary64: u32,

    #[arg(long, value_enum, ignore_case = true, default_value_t = Mode::OutputBound)]
    pub mode: Mode,

    #[arg(long, value_enum, ignore_case = true, default_value_t = ErrorMode::Relative)]
    pub error_mode: ErrorMode,

    /// Exponent below which bits are insignificant, in abs and all error modes.
    #[arg(
        long,
        default_value_t = DEFAULT_ABS_ERR_EXP,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-ABS_ERR_EXP_LIMIT..=ABS_ERR_EXP_LIMIT)
    )]
    pub max_abs_error_exponent: i32,

    #[arg(long, value_enum, ignore_case = true, default_value_t = InstrumentMode::None)]
    pub instrument: InstrumentMode,

    /// Denormals are zero: flush subnormal operands.
    #[arg(long)]
    pub daz: bool,

    /// Flush to zero: flush subnormal results.
    #[arg(long)]
    pub ftz: bool,

    #[arg(long, value_name = "PATH")]
    pub prec_input_file: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub prec_output_file: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub prec_log_file: Option<PathBuf>,
}

impl Options {
    /// Parses `args`, whose first token is the backend name.
    pub fn parse_tokens<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(invalid_option)
    }
}

pub(crate) fn invalid_option(err: clap::Error) -> Error {
    let context = |kind| match err.get(kind) {
        Some(ContextValue::String(value)) => Some(value.clone()),
        _ => None,
    };
    // "--precision-binary32 <PRECISION_BINARY32>" names the option "precision-binary32"
    let key = context(ContextKind::InvalidArg)
        .and_then(|arg| arg.split_whitespace().next().map(str::to_string))
        .map(|arg| arg.trim_start_matches('-').to_string())
        .unwrap_or_else(|| "(backend)".to_string());
    let value = context(ContextKind::InvalidValue).unwrap_or_default();
    let reason = err.kind().as_str().unwrap_or("invalid option");
    Error::invalid_option(&key, value, reason)
}

impl VprecConfig {
    pub fn from_options(options: Options) -> Result<Self> {
        let defaults = Precisions {
            binary32: FormatSpec::new(
                Format::Binary32,
                options.precision_binary32,
                options.range_binary32,
            )?,
            binary64: FormatSpec::new(
                Format::Binary64,
                options.precision_binary64,
                options.range_binary64,
            )?,
        };
        let context = Context {
            policy: ErrorPolicy {
                mode: options.error_mode,
                abs_err_exp: options.max_abs_error_exponent,
            },
            daz: options.daz,
            ftz: options.ftz,
        };

        Ok(Self {
            defaults,
            mode: options.mode,
            instrument: options.instrument,
            context,
            input_file: options.prec_input_file,
            output_file: options.prec_output_file,
            log_file: options.prec_log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(args: &[&str]) -> Result<VprecConfig> {
        let tokens = std::iter::once("vprec").chain(args.iter().copied());
        VprecConfig::from_options(Options::parse_tokens(tokens)?)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, VprecConfig::default());
        assert_eq!(config.defaults.binary32, FormatSpec::native(Format::Binary32));
        assert_eq!(config.context.policy, ErrorPolicy::relative());
    }

    #[test]
    fn test_every_option() {
        let config = parse(&[
            "--precision-binary32=10",
            "--range-binary32=5",
            "--precision-binary64",
            "30",
            "--range-binary64",
            "9",
            "--mode=full",
            "--error-mode=all",
            "--max-abs-error-exponent",
            "-20",
            "--instrument=arguments",
            "--daz",
            "--ftz",
            "--prec-input-file=in.json",
            "--prec-output-file=out.json",
            "--prec-log-file=vprec.log",
        ])
        .unwrap();

        assert_eq!(config.defaults.binary32, FormatSpec { precision: 10, range: 5 });
        assert_eq!(config.defaults.binary64, FormatSpec { precision: 30, range: 9 });
        assert_eq!(config.mode, Mode::Full);
        assert_eq!(config.instrument, InstrumentMode::Arguments);
        assert_eq!(config.context.policy, ErrorPolicy::combined(-20));
        assert!(config.context.daz && config.context.ftz);
        assert_eq!(config.input_file, Some(PathBuf::from("in.json")));
        assert_eq!(config.output_file, Some(PathBuf::from("out.json")));
        assert_eq!(config.log_file, Some(PathBuf::from("vprec.log")));
    }

    #[rstest]
    #[case("ieee", Mode::Ieee)]
    #[case("FULL", Mode::Full)]
    #[case("ib", Mode::InputBound)]
    #[case("input-bound", Mode::InputBound)]
    #[case("Ob", Mode::OutputBound)]
    #[case("output-bound", Mode::OutputBound)]
    fn test_mode_names(#[case] name: &str, #[case] mode: Mode) {
        assert_eq!(parse(&["--mode", name]).unwrap().mode, mode);
    }

    #[rstest]
    #[case("rel", ErrorMode::Relative)]
    #[case("relative", ErrorMode::Relative)]
    #[case("ABS", ErrorMode::Absolute)]
    #[case("absolute", ErrorMode::Absolute)]
    #[case("all", ErrorMode::Combined)]
    #[case("combined", ErrorMode::Combined)]
    fn test_error_mode_names(#[case] name: &str, #[case] mode: ErrorMode) {
        let config = parse(&["--error-mode", name]).unwrap();
        assert_eq!(config.context.policy.mode, mode);
        assert_eq!(config.context.policy.abs_err_exp, DEFAULT_ABS_ERR_EXP);
    }

    #[rstest]
    #[case(&["--precision-binary32", "24"], "precision-binary32", "24")]
    #[case(&["--precision-binary64=0"], "precision-binary64", "0")]
    #[case(&["--range-binary32", "1"], "range-binary32", "1")]
    #[case(&["--range-binary64", "12"], "range-binary64", "12")]
    #[case(&["--mode", "half"], "mode", "half")]
    #[case(&["--instrument", "loops"], "instrument", "loops")]
    #[case(&["--max-abs-error-exponent", "x"], "max-abs-error-exponent", "x")]
    #[case(&["--max-abs-error-exponent", "-2147483648"], "max-abs-error-exponent", "-2147483648")]
    #[case(&["--max-abs-error-exponent=2049"], "max-abs-error-exponent", "2049")]
    fn test_invalid_values_name_the_option(
        #[case] args: &[&str],
        #[case] expected_key: &str,
        #[case] expected_value: &str,
    ) {
        match parse(args) {
            Err(Error::InvalidOption { key, value, .. }) => {
                assert_eq!(key, expected_key);
                assert_eq!(value, expected_value);
            }
            other => panic!("unexpected parse result {other:?}"),
        }
    }

    #[test]
    fn test_abs_error_exponent_bounds() {
        for bound in ["-2048", "2048"] {
            let config = parse(&["--error-mode", "abs", "--max-abs-error-exponent", bound]).unwrap();
            assert_eq!(config.context.policy.abs_err_exp.abs(), 2048);
        }
    }

    #[test]
    fn test_unknown_option() {
        match parse(&["--precision", "3"]) {
            Err(Error::InvalidOption { key, .. }) => assert_eq!(key, "precision"),
            other => panic!("unexpected parse result {other:?}"),
        }
    }
}
