use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use kodex_cli::Commands;
use kodex_cli::KodexCli;
use kodex_core::Document;
use kodex_core::DocumentId;
use kodex_core::DocumentSet;
use kodex_core::ExpansionReport;
use kodex_core::KodexConfig;
use kodex_core::ReferenceIndex;
use kodex_core::dependency_order;
use kodex_core::expand_documents;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing::debug;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
	let args = KodexCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Expand {
			input,
			output,
			diff,
			check,
			process_limit,
		}) => {
			run_expand(
				&args,
				input,
				output.as_deref(),
				*diff,
				*check,
				*process_limit,
			)
		}
		Some(Commands::Order { input }) => run_order(&args, input),
		None => {
			eprintln!("No subcommand specified. Run `kodex --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Render through miette for error codes, help text and the
		// highlighted tag of processor failures.
		match e.downcast::<kodex_core::KodexError>() {
			Ok(kodex_err) => {
				let report: miette::Report = (*kodex_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

fn resolve_root(args: &KodexCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(args: &KodexCli) -> Result<KodexConfig, Box<dyn std::error::Error>> {
	let root = resolve_root(args);

	match KodexConfig::load(&root)? {
		Some(config) => {
			debug!(root = %root.display(), "loaded kodex config");
			Ok(config)
		}
		None => Ok(KodexConfig::default()),
	}
}

fn run_expand(
	args: &KodexCli,
	input: &Path,
	output: Option<&Path>,
	diff: bool,
	check: bool,
	process_limit: Option<usize>,
) -> CliResult {
	let mut config = load_config(args)?;
	if let Some(process_limit) = process_limit {
		config.process_limit = process_limit;
	}

	let mut documents = DocumentSet::load(input)?;
	let report = expand_documents(&mut documents, &config)?;

	if args.verbose {
		print_report(&report);
	}

	if diff {
		for id in &report.modified {
			print_document_diff(&documents, *id);
		}
	}

	if check {
		if report.modified.is_empty() {
			println!("{} all documents are expanded", colored!("ok:", green));
			return Ok(());
		}

		eprintln!(
			"{} {} document(s) would change:",
			colored!("error:", red),
			report.modified.len()
		);
		for id in &report.modified {
			if let Some(document) = documents.get(*id) {
				eprintln!("  {}", document.path());
			}
		}
		process::exit(1);
	}

	let json = serde_json::to_string_pretty(&documents)?;
	match output {
		Some(path) => {
			std::fs::write(path, format!("{json}\n"))?;
			eprintln!(
				"Wrote {} document(s) to {}",
				documents.len(),
				path.display()
			);
		}
		None => println!("{json}"),
	}

	Ok(())
}

fn run_order(args: &KodexCli, input: &Path) -> CliResult {
	let config = load_config(args)?;
	let documents = DocumentSet::load(input)?;
	let index = ReferenceIndex::new(&documents).with_process_filter(config.process_filter()?);

	let ids: Vec<DocumentId> = documents
		.iter()
		.filter(|document| index.is_processable(document))
		.map(Document::id)
		.collect();

	for id in dependency_order(&documents, &index, &ids) {
		if let Some(document) = documents.get(id) {
			println!("{}", document.path());
		}
	}

	Ok(())
}

fn print_report(report: &ExpansionReport) {
	eprintln!("{}", colored!("Stages", bold));
	for stage in &report.stages {
		eprintln!("  {:<20} {} pass(es)", stage.processor, stage.passes);
	}
	eprintln!(
		"{} pass(es), {} document(s) modified, {} warning(s)",
		report.passes(),
		report.modified.len(),
		report.warnings.len()
	);
}

fn print_document_diff(documents: &DocumentSet, id: DocumentId) {
	let Some(document) = documents.get(id) else {
		return;
	};

	eprintln!("{}", colored!(document.path(), bold));
	print_diff(document.original(), document.content());
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		let line = change.value().trim_end_matches('\n');

		match change.tag() {
			ChangeTag::Delete => {
				eprintln!("  {}", colored!(format!("-{line}"), red));
			}
			ChangeTag::Insert => {
				eprintln!("  {}", colored!(format!("+{line}"), green));
			}
			ChangeTag::Equal => {
				eprintln!("   {line}");
			}
		}
	}
}
