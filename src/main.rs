use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use class_file::ReadOptions;
use crate::input::ClassInput;

mod input;
mod summary;

#[derive(Debug, Parser)]
#[command(about = "Inspects and round trips Java class files")]
struct Cli {
	/// Be verbose, given twice for even more output.
	#[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
	verbose: u8,

	/// Only print errors.
	#[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
	quiet: bool,

	/// Don't check that code offsets land on instruction boundaries.
	#[arg(long = "no-verify-offsets", global = true)]
	no_verify_offsets: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Prints the header, constant pool, members and attributes of a class file
	Summary {
		path: PathBuf,
	},
	/// Reads and writes back class files, checking that the same bytes come out
	Check {
		/// Class files, jars, or directories containing them
		#[arg(required = true)]
		paths: Vec<PathBuf>,
	},
}

impl Cli {
	fn level(&self) -> LevelFilter {
		match (self.quiet, self.verbose) {
			(true, _) => LevelFilter::Error,
			(false, 0) => LevelFilter::Info,
			(false, 1) => LevelFilter::Debug,
			(false, _) => LevelFilter::Trace,
		}
	}
}

fn setup_logger(level: LevelFilter) -> Result<()> {
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to set up logging")
}

fn check_one(input: &ClassInput, options: &ReadOptions) -> Result<()> {
	let class = class_file::read_class_with(&input.bytes, options)?;
	let written = class_file::write_class(&class)?;
	if written != input.bytes {
		let position = written.iter().zip(&input.bytes).position(|(a, b)| a != b)
			.unwrap_or(written.len().min(input.bytes.len()));
		bail!("writing back produced different bytes: first difference at offset {position}, length {} instead of {}",
			written.len(), input.bytes.len());
	}
	Ok(())
}

/// Checks all inputs on as many threads as there are cores, returning the number of failures.
fn check_all(inputs: &[ClassInput], options: &ReadOptions) -> usize {
	let failures = AtomicUsize::new(0);
	let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
	let chunk_size = inputs.len().div_ceil(threads).max(1);

	std::thread::scope(|scope| {
		for chunk in inputs.chunks(chunk_size) {
			let failures = &failures;
			scope.spawn(move || {
				for input in chunk {
					match check_one(input, options) {
						Ok(()) => info!("{}: ok", input.origin),
						Err(e) => {
							error!("{}: {e:#}", input.origin);
							failures.fetch_add(1, Ordering::Relaxed);
						},
					}
				}
			});
		}
	});

	failures.into_inner()
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_logger(cli.level())?;

	let options = ReadOptions {
		verify_code_offsets: !cli.no_verify_offsets,
	};

	match cli.command {
		Command::Summary { path } => {
			let bytes = std::fs::read(&path)
				.with_context(|| anyhow!("failed to read {path:?}"))?;
			let class = class_file::read_class_with(&bytes, &options)
				.with_context(|| anyhow!("failed to read class file {path:?}"))?;
			summary::print(&mut std::io::stdout().lock(), &class)?;
		},
		Command::Check { paths } => {
			let inputs = input::collect(&paths)?;
			let failures = check_all(&inputs, &options);
			println!("checked {} class files, {failures} failed", inputs.len());
			if failures != 0 {
				bail!("{failures} of {} class files failed to round trip", inputs.len());
			}
		},
	}

	Ok(())
}
