use std::borrow::Cow;
use std::ops::Range;

use crate::ArgProcessor;
use crate::CommentProcessor;
use crate::Document;
use crate::DocumentId;
use crate::DocumentSet;
use crate::ExpansionWarning;
use crate::IncludeFileProcessor;
use crate::IncludeProcessor;
use crate::KodexConfig;
use crate::KodexError;
use crate::KodexResult;
use crate::ReferenceIndex;
use crate::SampleProcessor;
use crate::TagError;

pub const INCLUDE: &str = "include";
pub const INCLUDE_FILE: &str = "includeFile";
pub const ARG: &str = "arg";
pub const COMMENT: &str = "comment";
pub const SAMPLE: &str = "sample";
pub const REMOVE_ESCAPE_CHARS: &str = "removeEscapeChars";

/// Stage names in their default order.
pub const DEFAULT_PROCESSORS: [&str; 6] = [
	INCLUDE,
	INCLUDE_FILE,
	ARG,
	COMMENT,
	SAMPLE,
	REMOVE_ESCAPE_CHARS,
];

/// One tag occurrence handed to a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOccurrence<'a> {
	/// The tag name without `@`.
	pub name: &'a str,
	/// The full text of the occurrence: `{@name ...}` for inline tags, the
	/// whole block for block tags.
	pub text: &'a str,
	/// Byte range of `text` in the document content.
	pub range: Range<usize>,
	/// 1-based line of the start of the occurrence.
	pub line: usize,
	/// Nesting depth; `None` for block tags.
	pub depth: Option<usize>,
}

impl TagOccurrence<'_> {
	pub fn is_inline(&self) -> bool {
		self.depth.is_some()
	}
}

/// Read-only state shared with processors during a pass.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
	pub documents: &'a DocumentSet,
	pub index: &'a ReferenceIndex,
	/// Zero-based pass number within the current stage.
	pub pass: usize,
}

/// A stage that made no progress while its tags are still present.
#[derive(Debug)]
pub struct Stall<'a> {
	pub processor: &'a str,
	/// Consecutive passes without a modification, starting at 1.
	pub idle_passes: usize,
	/// Documents still carrying a supported tag.
	pub documents: Vec<&'a Document>,
}

impl Stall<'_> {
	pub fn paths(&self) -> Vec<String> {
		self.documents
			.iter()
			.map(|document| document.path().to_string())
			.collect()
	}
}

/// What the engine should do about a [`Stall`].
#[derive(Debug)]
#[non_exhaustive]
pub enum StallAction {
	/// Run another pass.
	Retry,
	/// Accept the remaining tags and finish the stage.
	Settle,
	/// Abort the run.
	Fail(KodexError),
}

/// Expands one family of tags.
///
/// Returning the occurrence text unchanged from `expand_inline` or
/// `expand_block` defers it to a later pass.
pub trait TagProcessor: Send + Sync {
	fn name(&self) -> &str;

	fn supports(&self, tag: &str) -> bool;

	fn expand_inline(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		context: &ProcessContext<'_>,
	) -> Result<String, TagError>;

	fn expand_block(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		context: &ProcessContext<'_>,
	) -> Result<String, TagError>;

	/// Whether documents may be expanded concurrently within a pass.
	fn is_parallel(&self) -> bool {
		true
	}

	/// Whether `document` has anything for this processor to do.
	fn is_eligible(&self, document: &Document) -> bool {
		document.has_tag(|tag| self.supports(tag))
	}

	/// Rewrite content before tags are scanned in a pass.
	fn prepare<'c>(&self, _document: &Document, content: &'c str) -> Cow<'c, str> {
		Cow::Borrowed(content)
	}

	/// Order the eligible documents of a sequential pass.
	fn order(&self, _context: &ProcessContext<'_>, eligible: Vec<DocumentId>) -> Vec<DocumentId> {
		eligible
	}

	fn on_stall(&self, stall: &Stall<'_>) -> StallAction {
		StallAction::Fail(KodexError::NoProgress {
			processor: stall.processor.to_string(),
			documents: stall.paths(),
		})
	}

	/// Non-fatal findings collected during the run.
	fn warnings(&self) -> Vec<ExpansionWarning> {
		Vec::new()
	}
}

/// One step of the expansion pipeline.
#[non_exhaustive]
pub enum Stage {
	Tags(Box<dyn TagProcessor>),
	/// Strip escaping backslashes once every tag stage has finished.
	RemoveEscapeChars,
}

impl Stage {
	pub fn name(&self) -> &str {
		match self {
			Self::Tags(processor) => processor.name(),
			Self::RemoveEscapeChars => REMOVE_ESCAPE_CHARS,
		}
	}
}

impl std::fmt::Debug for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Stage").field(&self.name()).finish()
	}
}

/// The ordered stages of a run. Holds per-run processor state, so build a
/// fresh registry for every run.
#[derive(Debug, Default)]
pub struct ProcessorRegistry {
	stages: Vec<Stage>,
}

impl ProcessorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// The built-in stages named in `config.processors`, in that order.
	pub fn from_config(config: &KodexConfig) -> KodexResult<Self> {
		let mut registry = Self::new();

		for name in &config.processors {
			let stage = match name.as_str() {
				INCLUDE => Stage::Tags(Box::new(IncludeProcessor)),
				INCLUDE_FILE => Stage::Tags(Box::new(IncludeFileProcessor)),
				ARG => Stage::Tags(Box::new(ArgProcessor::new(config.arg.dollar_shorthand))),
				COMMENT => Stage::Tags(Box::new(CommentProcessor)),
				SAMPLE => {
					Stage::Tags(Box::new(SampleProcessor::new(
						&config.sample.start_marker,
						&config.sample.end_marker,
					)))
				}
				REMOVE_ESCAPE_CHARS => Stage::RemoveEscapeChars,
				other => return Err(KodexError::UnknownProcessor(other.to_string())),
			};
			registry.stages.push(stage);
		}

		Ok(registry)
	}

	/// Append a tag processor stage.
	pub fn register(&mut self, processor: Box<dyn TagProcessor>) -> &mut Self {
		self.stages.push(Stage::Tags(processor));
		self
	}

	/// Append the escape removal stage.
	pub fn register_escape_removal(&mut self) -> &mut Self {
		self.stages.push(Stage::RemoveEscapeChars);
		self
	}

	pub fn stages(&self) -> &[Stage] {
		&self.stages
	}

	/// The first processor that handles `tag`.
	pub fn find(&self, tag: &str) -> Option<&dyn TagProcessor> {
		self.stages.iter().find_map(|stage| {
			match stage {
				Stage::Tags(processor) if processor.supports(tag) => Some(processor.as_ref()),
				_ => None,
			}
		})
	}

	pub fn names(&self) -> Vec<&str> {
		self.stages.iter().map(Stage::name).collect()
	}
}
