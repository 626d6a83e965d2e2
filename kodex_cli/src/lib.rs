use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Expand doc-comment macros like @include, @sample and @getArg.",
	long_about = "kodex expands macro-like tags inside KDoc and Javadoc comments before they \
	              are rendered.\n\nIt reads a document set exported from your sources (JSON or \
	              YAML), expands every tag to a fixed point and writes the result back out.\n\nQuick \
	              start:\n  kodex expand docs.json          Print the expanded document set\n  \
	              kodex expand docs.json --check  Fail when anything would change\n  kodex order \
	              docs.json           Show the include visiting order"
)]
pub struct KodexCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Directory to look for `kodex.toml` in.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Expand every tag in a document set.
	///
	/// Reads a JSON or YAML list of documents, runs the configured processor
	/// pipeline until no tag is left and prints the expanded set as JSON.
	/// Documents are only written when the whole run succeeds.
	Expand {
		/// The document set to expand (`.json`, `.yaml` or `.yml`).
		input: PathBuf,

		/// Write the expanded set to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Show a unified diff for every document that changed.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Exit with status 1 when any document would change, without
		/// printing the expanded set. Ideal for CI pipelines.
		#[arg(long, default_value_t = false)]
		check: bool,

		/// Override the maximum number of passes per stage.
		#[arg(long)]
		process_limit: Option<usize>,
	},
	/// Print the order in which `@include` targets are expanded.
	///
	/// Targets come before the documents that include them. When the
	/// references form a cycle the input order is printed instead.
	Order {
		/// The document set to inspect (`.json`, `.yaml` or `.yml`).
		input: PathBuf,
	},
}
