//! Host binary: picks a transport, wires a stub `AnalysisProvider`, and
//! drives the `lsp-server` kernel to completion. Produces a runnable
//! artifact for manual smoke testing; real analysis is supplied by
//! whichever language backend embeds the kernel.

mod cli;
mod stub_provider;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, LogLevel};
use lsp_server::Server;
use stub_provider::StubProvider;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	cli.validate()?;
	setup_tracing(cli.log_level);

	let exit_code = if let Some(path) = &cli.pipe {
		run_pipe(path).await?
	} else {
		run_stdio().await?
	};

	std::process::exit(exit_code);
}

async fn run_stdio() -> anyhow::Result<i32> {
	tracing::info!("starting lsp-host over stdio");
	let (reader, writer) = lsp_rpc::transport::stdio();
	drive(Box::new(reader), Arc::new(writer)).await
}

async fn run_pipe(path: &str) -> anyhow::Result<i32> {
	tracing::info!(path, "starting lsp-host over named pipe");
	#[cfg(unix)]
	let (reader, writer) = lsp_rpc::transport::pipe::listen_once(std::path::Path::new(path), |bound| {
		announce_bound_pipe(bound);
	})
	.await?;
	#[cfg(windows)]
	let (reader, writer) = lsp_rpc::transport::pipe::listen_once(path, announce_bound_pipe).await?;
	drive(Box::new(reader), Arc::new(writer)).await
}

/// Prints the bound pipe/socket path on stdout as the single JSON line the
/// client is expected to parse before speaking the protocol over it.
fn announce_bound_pipe(bound: &str) {
	#[derive(serde::Serialize)]
	struct PipeAnnouncement<'a> {
		#[serde(rename = "pipeName")]
		pipe_name: &'a str,
	}
	let line = serde_json::to_string(&PipeAnnouncement { pipe_name: bound }).expect("PipeAnnouncement always serializes");
	println!("{line}");
}

/// Runs the server to completion, racing a clean transport close against
/// Ctrl-C. A signal is treated like an unexpected transport drop: in-flight
/// requests are released with RequestCancelled and the process exits 1.
async fn drive(
	reader: Box<dyn lsp_rpc::transport::MessageReader>,
	writer: Arc<dyn lsp_rpc::transport::MessageWriter>,
) -> anyhow::Result<i32> {
	let server = Server::new(Arc::new(StubProvider), writer);
	server.start();
	let mut exit_code = server.exit_code();
	let dispatcher = server.dispatcher();

	tokio::select! {
		result = dispatcher.run(reader) => {
			result?;
			// A clean transport close without a prior `exit` notification is
			// an abnormal termination.
			Ok((*exit_code.borrow()).unwrap_or(1))
		}
		_ = exit_code.changed() => {
			Ok((*exit_code.borrow()).unwrap_or(1))
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::warn!("received Ctrl-C, shutting down");
			Ok(1)
		}
	}
}

fn setup_tracing(level: LogLevel) {
	let Some(directive) = level.filter_directive() else {
		// `none` disables the subscriber outright rather than filtering to a
		// level; RUST_LOG is not consulted in this case.
		return;
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
