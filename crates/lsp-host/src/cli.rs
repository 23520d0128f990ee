use clap::{Parser, ValueEnum};

/// Log verbosity surfaced on the CLI. A superset of `tracing::Level`:
/// `critical` maps onto `ERROR` (the tracing crate has no separate
/// critical tier) and `none` disables the subscriber entirely.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
	Critical,
	None,
}

impl LogLevel {
	/// The `EnvFilter` directive for this level, or `None` for
	/// [`LogLevel::None`], which disables logging outright rather than
	/// filtering to a level.
	pub fn filter_directive(self) -> Option<&'static str> {
		match self {
			LogLevel::Trace => Some("trace"),
			LogLevel::Debug => Some("debug"),
			LogLevel::Info => Some("info"),
			LogLevel::Warn => Some("warn"),
			LogLevel::Error | LogLevel::Critical => Some("error"),
			LogLevel::None => None,
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "lsp-host")]
#[command(about = "LSP server kernel host: stdio or named-pipe transport")]
#[command(version)]
pub struct Cli {
	/// Speak the protocol over stdin/stdout (the default if neither
	/// transport flag is given).
	#[arg(long)]
	pub stdio: bool,

	/// Speak the protocol over a named pipe / Unix domain socket at PATH,
	/// announced on stdout once bound.
	#[arg(long, value_name = "PATH")]
	pub pipe: Option<String>,

	/// Log verbosity; also honors RUST_LOG if set.
	#[arg(long = "logLevel", value_name = "LEVEL", default_value = "info")]
	pub log_level: LogLevel,
}

impl Cli {
	pub fn validate(&self) -> anyhow::Result<()> {
		if self.stdio && self.pipe.is_some() {
			anyhow::bail!("--stdio and --pipe are mutually exclusive");
		}
		Ok(())
	}
}
