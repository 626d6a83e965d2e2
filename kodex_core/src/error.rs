use std::ops::Range;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use thiserror::Error;

use crate::DocumentId;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
#[allow(clippy::large_enum_variant)]
pub enum KodexError {
	#[error(transparent)]
	#[diagnostic(code(kodex::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(kodex::config_parse),
		help("check that kodex.toml is valid TOML; see the `[filter]`, `[arg]` and `[sample]` sections")
	)]
	ConfigParse(String),

	#[error("failed to load document set `{path}`: {reason}")]
	#[diagnostic(code(kodex::document_set))]
	DocumentSet { path: String, reason: String },

	#[error("unsupported document set format: `{0}`")]
	#[diagnostic(
		code(kodex::unsupported_format),
		help("supported formats: json, yaml, yml")
	)]
	UnsupportedFormat(String),

	#[error("unknown processor: `{0}`")]
	#[diagnostic(
		code(kodex::unknown_processor),
		help(
			"available processors: include, includeFile, arg, comment, sample, \
			 removeEscapeChars"
		)
	)]
	UnknownProcessor(String),

	#[error("invalid filter pattern `{pattern}`: {reason}")]
	#[diagnostic(code(kodex::invalid_filter))]
	InvalidFilterPattern { pattern: String, reason: String },

	#[error(transparent)]
	#[diagnostic(transparent)]
	Processor(#[from] ProcessorFailure),

	#[error("circular @include detected between: {}", .documents.join(", "))]
	#[diagnostic(
		code(kodex::circular_include),
		help("remove the @include that points back at one of these documents")
	)]
	CircularInclude { documents: Vec<String> },

	#[error(
		"`{processor}` exceeded the process limit of {limit}, a tag probably expands into \
		 itself; still pending: {}",
		.documents.join(", ")
	)]
	#[diagnostic(
		code(kodex::process_limit),
		help("raise `process_limit` in kodex.toml if the documents legitimately need more passes")
	)]
	ProcessLimitExceeded {
		processor: String,
		limit: usize,
		documents: Vec<String>,
	},

	#[error("`{processor}` made no progress while tags remain in: {}", .documents.join(", "))]
	#[diagnostic(code(kodex::no_progress))]
	NoProgress {
		processor: String,
		documents: Vec<String>,
	},
}

/// A fatal failure raised by a tag processor, wrapped with the location of
/// the tag that triggered it.
///
/// The `source_code` is the document content at the moment of failure, so
/// miette's fancy handler renders the offending tag highlighted in context.
#[derive(Debug, Diagnostic, Error)]
#[error("`{processor}` could not expand `@{tag}` in `{path}`: {cause}")]
#[diagnostic(code(kodex::processor))]
pub struct ProcessorFailure {
	/// Name of the processor that failed.
	pub processor: String,
	/// Name of the tag being expanded.
	pub tag: String,
	/// Identity of the document being processed.
	pub document: DocumentId,
	/// Fully qualified path of the document being processed.
	pub path: String,
	/// Byte range of the tag inside `source_code`.
	pub range: Range<usize>,
	#[source_code]
	pub source_code: NamedSource<String>,
	#[label("while expanding this tag")]
	pub span: SourceSpan,
	/// The processor-local reason.
	pub cause: TagError,
}

impl ProcessorFailure {
	pub fn new(
		processor: &str,
		tag: &str,
		document: DocumentId,
		path: &str,
		content: &str,
		range: Range<usize>,
		cause: TagError,
	) -> Self {
		Self {
			processor: processor.to_string(),
			tag: tag.to_string(),
			document,
			path: path.to_string(),
			source_code: NamedSource::new(path, content.to_string()),
			span: SourceSpan::from(range.clone()),
			range,
			cause,
		}
	}
}

/// Errors produced by an individual tag processor. These carry no location;
/// the engine wraps them into a [`ProcessorFailure`].
#[derive(Debug, Clone, Diagnostic, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagError {
	#[error("{}", describe_unresolved(.target, .attempted, .filtered))]
	#[diagnostic(code(kodex::unresolved_reference))]
	UnresolvedReference {
		target: String,
		/// Every fully qualified path that was queried.
		attempted: Vec<String>,
		/// Paths that exist but were excluded by the query filter.
		filtered: Vec<String>,
	},

	#[error("`{target}` refers to the document itself")]
	#[diagnostic(
		code(kodex::self_reference),
		help("a document cannot include itself")
	)]
	SelfReference { target: String },

	#[error("`{target}` has no declaration source to sample")]
	#[diagnostic(code(kodex::missing_source))]
	MissingSource { target: String },

	#[error("the document has no source file to resolve `{path}` against")]
	#[diagnostic(code(kodex::missing_file_handle))]
	MissingFileHandle { path: String },

	#[error("file `{path}` does not exist")]
	#[diagnostic(code(kodex::file_not_found))]
	FileNotFound { path: String },

	#[error("`{path}` is a directory, not a file")]
	#[diagnostic(code(kodex::not_a_file))]
	NotAFile { path: String },

	#[error("failed to read `{path}`: {reason}")]
	#[diagnostic(code(kodex::file_read))]
	FileRead { path: String, reason: String },

	#[error("`@{tag}` requires an argument")]
	#[diagnostic(code(kodex::missing_argument))]
	MissingArgument { tag: String },

	#[error("unmatched closing `{character}` in argument {argument} at offset {offset}")]
	#[diagnostic(code(kodex::rogue_closing_char))]
	RogueClosingChar {
		character: char,
		argument: usize,
		offset: usize,
	},
}

fn describe_unresolved(target: &str, attempted: &[String], filtered: &[String]) -> String {
	let mut message = format!(
		"could not resolve `{target}`; attempted: {}",
		attempted.join(", ")
	);

	if !filtered.is_empty() {
		message.push_str("; found but excluded by the query filter: ");
		message.push_str(&filtered.join(", "));
	}

	message
}

pub type KodexResult<T> = Result<T, KodexError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
