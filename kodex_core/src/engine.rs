use derive_more::Display;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::DEFAULT_PROCESS_LIMIT;
use crate::Document;
use crate::DocumentId;
use crate::DocumentSet;
use crate::KodexConfig;
use crate::KodexError;
use crate::KodexResult;
use crate::ProcessContext;
use crate::ProcessorFailure;
use crate::ProcessorRegistry;
use crate::ReferenceIndex;
use crate::Stage;
use crate::Stall;
use crate::StallAction;
use crate::TagError;
use crate::TagOccurrence;
use crate::TagProcessor;
use crate::tokenizer::find_inline_tag_ranges;
use crate::tokenizer::remove_escape_chars;
use crate::tokenizer::split_into_blocks;

/// Inline replacements allowed for one document within a single pass. Only
/// reached by a tag whose expansion reproduces itself.
const MAX_INLINE_EXPANSIONS: usize = 100_000;

/// A non-fatal finding reported after a successful run.
#[derive(Debug, Clone, Display, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[non_exhaustive]
pub enum ExpansionWarning {
	/// A `getArg` key that never received a value. The tag is left as is.
	#[display("`{key}` has no value for @getArg in `{path}` (line {line})")]
	UnresolvedArgument {
		key: String,
		document: DocumentId,
		path: String,
		line: usize,
	},
}

/// Passes taken by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
	pub processor: String,
	pub passes: usize,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionReport {
	pub stages: Vec<StageReport>,
	/// Documents whose content now differs from the original.
	pub modified: Vec<DocumentId>,
	pub warnings: Vec<ExpansionWarning>,
}

impl ExpansionReport {
	pub fn has_warnings(&self) -> bool {
		!self.warnings.is_empty()
	}

	/// Total passes across all stages.
	pub fn passes(&self) -> usize {
		self.stages.iter().map(|stage| stage.passes).sum()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
	/// Maximum passes per stage.
	pub process_limit: usize,
	/// Emit a `warn!` event for every unresolved `getArg`.
	pub log_unresolved_get_arg: bool,
	/// Use the rayon pool for stages that allow it.
	pub parallel: bool,
}

impl Default for ExpandOptions {
	fn default() -> Self {
		Self {
			process_limit: DEFAULT_PROCESS_LIMIT,
			log_unresolved_get_arg: true,
			parallel: true,
		}
	}
}

impl From<&KodexConfig> for ExpandOptions {
	fn from(config: &KodexConfig) -> Self {
		Self {
			process_limit: config.process_limit,
			log_unresolved_get_arg: config.log_unresolved_get_arg,
			parallel: config.parallel,
		}
	}
}

/// Drives every stage of the pipeline to a fixed point.
///
/// An expander is consumed by [`Expander::run`] since its processors keep
/// state for exactly one run.
#[derive(Debug, Default)]
pub struct Expander {
	registry: ProcessorRegistry,
	options: ExpandOptions,
}

impl Expander {
	pub fn new(registry: ProcessorRegistry, options: ExpandOptions) -> Self {
		Self { registry, options }
	}

	pub fn builder() -> ExpanderBuilder {
		ExpanderBuilder::default()
	}

	/// The built-in pipeline described by `config`.
	pub fn from_config(config: &KodexConfig) -> KodexResult<Self> {
		Ok(Self::new(
			ProcessorRegistry::from_config(config)?,
			ExpandOptions::from(config),
		))
	}

	pub fn registry(&self) -> &ProcessorRegistry {
		&self.registry
	}

	pub fn options(&self) -> &ExpandOptions {
		&self.options
	}

	/// Expand every processable document in place.
	///
	/// Documents are only updated when the whole run succeeds.
	pub fn run(self, documents: &mut DocumentSet, index: &ReferenceIndex) -> KodexResult<ExpansionReport> {
		let mut working = documents.clone();
		let mut report = ExpansionReport::default();

		for stage in self.registry.stages() {
			let passes = match stage {
				Stage::Tags(processor) => self.run_stage(processor.as_ref(), &mut working, index)?,
				Stage::RemoveEscapeChars => {
					strip_escapes(&mut working, index);
					1
				}
			};

			report.stages.push(StageReport {
				processor: stage.name().to_string(),
				passes,
			});
		}

		for stage in self.registry.stages() {
			if let Stage::Tags(processor) = stage {
				report.warnings.extend(processor.warnings());
			}
		}

		if self.options.log_unresolved_get_arg {
			for warning in &report.warnings {
				warn!("{warning}");
			}
		}

		report.modified = working.modified();
		*documents = working;

		Ok(report)
	}

	fn run_stage(
		&self,
		processor: &dyn TagProcessor,
		documents: &mut DocumentSet,
		index: &ReferenceIndex,
	) -> KodexResult<usize> {
		let limit = self.options.process_limit;
		let mut pass = 0;
		let mut idle_passes = 0;

		loop {
			let eligible: Vec<DocumentId> = documents
				.iter()
				.filter(|document| index.is_processable(document) && processor.is_eligible(document))
				.map(Document::id)
				.collect();

			if eligible.is_empty() {
				return Ok(pass);
			}

			if pass >= limit {
				return Err(KodexError::ProcessLimitExceeded {
					processor: processor.name().to_string(),
					limit,
					documents: paths_of(documents, &eligible),
				});
			}

			let modified = if processor.is_parallel() && self.options.parallel {
				parallel_pass(processor, documents, index, &eligible, pass)?
			} else {
				sequential_pass(processor, documents, index, eligible.clone(), pass)?
			};
			pass += 1;

			debug!(
				processor = processor.name(),
				pass,
				documents = eligible.len(),
				modified,
				"finished pass"
			);

			if modified {
				idle_passes = 0;
				continue;
			}

			idle_passes += 1;
			let stall = Stall {
				processor: processor.name(),
				idle_passes,
				documents: eligible.iter().filter_map(|id| documents.get(*id)).collect(),
			};

			match processor.on_stall(&stall) {
				StallAction::Retry => {}
				StallAction::Settle => return Ok(pass),
				StallAction::Fail(error) => return Err(error),
			}
		}
	}
}

/// Expand all eligible documents concurrently, then apply the results. Any
/// failure discards the whole pass.
fn parallel_pass(
	processor: &dyn TagProcessor,
	documents: &mut DocumentSet,
	index: &ReferenceIndex,
	eligible: &[DocumentId],
	pass: usize,
) -> KodexResult<bool> {
	let results = {
		let context = ProcessContext {
			documents: &*documents,
			index,
			pass,
		};

		eligible
			.par_iter()
			.map(|&id| expand_document(processor, id, &context).map(|content| (id, content)))
			.collect::<KodexResult<Vec<_>>>()?
	};

	let mut modified = false;
	for (id, content) in results {
		if let (Some(content), Some(document)) = (content, documents.get_mut(id)) {
			document.set_content(content);
			modified = true;
		}
	}

	Ok(modified)
}

/// Expand documents one at a time in the processor's preferred order; each
/// document sees the results of the ones before it.
fn sequential_pass(
	processor: &dyn TagProcessor,
	documents: &mut DocumentSet,
	index: &ReferenceIndex,
	eligible: Vec<DocumentId>,
	pass: usize,
) -> KodexResult<bool> {
	let order = processor.order(
		&ProcessContext {
			documents: &*documents,
			index,
			pass,
		},
		eligible,
	);

	let mut modified = false;
	for id in order {
		let context = ProcessContext {
			documents: &*documents,
			index,
			pass,
		};
		let content = expand_document(processor, id, &context)?;

		if let (Some(content), Some(document)) = (content, documents.get_mut(id)) {
			document.set_content(content);
			modified = true;
		}
	}

	Ok(modified)
}

/// Run the inline phase and then the block phase over one document.
/// Returns the new content when it changed.
fn expand_document(
	processor: &dyn TagProcessor,
	id: DocumentId,
	context: &ProcessContext<'_>,
) -> KodexResult<Option<String>> {
	let Some(document) = context.documents.get(id) else {
		return Ok(None);
	};

	let mut content = processor.prepare(document, document.content()).into_owned();
	let mut deferred = 0;
	let mut expansions = 0;

	loop {
		let Some(tag) = find_inline_tag_ranges(&content)
			.into_iter()
			.filter(|tag| processor.supports(&tag.name))
			.nth(deferred)
		else {
			break;
		};

		let text = &content[tag.range.clone()];
		let occurrence = TagOccurrence {
			name: &tag.name,
			text,
			range: tag.range.clone(),
			line: line_of(&content, tag.range.start),
			depth: Some(tag.depth),
		};
		let replacement = processor
			.expand_inline(&occurrence, document, context)
			.map_err(|cause| failure(processor, &occurrence, document, &content, cause))?;

		if replacement == text {
			deferred += 1;
			continue;
		}

		expansions += 1;
		if expansions > MAX_INLINE_EXPANSIONS {
			return Err(KodexError::ProcessLimitExceeded {
				processor: processor.name().to_string(),
				limit: MAX_INLINE_EXPANSIONS,
				documents: vec![document.path().to_string()],
			});
		}

		trace!(
			processor = processor.name(),
			document = document.path(),
			tag = %tag.name,
			"expanded inline tag"
		);
		content.replace_range(tag.range, &replacement);
	}

	let blocks = split_into_blocks(&content);
	let names: Vec<Option<String>> = blocks
		.iter()
		.map(|block| block.tag_name().filter(|name| processor.supports(name)))
		.collect();

	if names.iter().any(Option::is_some) {
		let last = blocks.len() - 1;
		let mut parts = Vec::with_capacity(blocks.len());

		for (position, (block, name)) in blocks.iter().zip(&names).enumerate() {
			let text = match name {
				Some(name) => {
					let occurrence = TagOccurrence {
						name,
						text: &block.text,
						range: block.range.clone(),
						line: line_of(&content, block.range.start),
						depth: None,
					};
					let expanded = processor
						.expand_block(&occurrence, document, context)
						.map_err(|cause| failure(processor, &occurrence, document, &content, cause))?;

					trace!(
						processor = processor.name(),
						document = document.path(),
						tag = %name,
						"expanded block tag"
					);
					expanded
				}
				None => block.text.clone(),
			};

			// Keep the first and last block so leading and trailing lines survive.
			if text.is_empty() && position != 0 && position != last {
				continue;
			}

			parts.push(text);
		}

		content = parts.join("\n");
	}

	Ok((content != document.content()).then_some(content))
}

fn failure(
	processor: &dyn TagProcessor,
	occurrence: &TagOccurrence<'_>,
	document: &Document,
	content: &str,
	cause: TagError,
) -> KodexError {
	KodexError::Processor(ProcessorFailure::new(
		processor.name(),
		occurrence.name,
		document.id(),
		document.path(),
		content,
		occurrence.range.clone(),
		cause,
	))
}

fn strip_escapes(documents: &mut DocumentSet, index: &ReferenceIndex) {
	let ids: Vec<DocumentId> = documents
		.iter()
		.filter(|document| index.is_processable(document))
		.map(Document::id)
		.collect();

	for id in ids {
		let Some(document) = documents.get_mut(id) else {
			continue;
		};
		let stripped = remove_escape_chars(document.content());

		if stripped != document.content() {
			document.set_content(stripped);
		}
	}
}

fn line_of(content: &str, offset: usize) -> usize {
	content[..offset].matches('\n').count() + 1
}

fn paths_of(documents: &DocumentSet, ids: &[DocumentId]) -> Vec<String> {
	ids.iter()
		.filter_map(|id| documents.get(*id))
		.map(|document| document.path().to_string())
		.collect()
}

/// Builds an [`Expander`] with custom stages.
///
/// ```rust
/// use kodex_core::CommentProcessor;
/// use kodex_core::Expander;
///
/// let expander = Expander::builder()
/// 	.processor(Box::new(CommentProcessor))
/// 	.remove_escape_chars()
/// 	.process_limit(100)
/// 	.build();
///
/// assert_eq!(expander.registry().names(), vec!["comment", "removeEscapeChars"]);
/// ```
#[derive(Debug, Default)]
pub struct ExpanderBuilder {
	registry: ProcessorRegistry,
	options: ExpandOptions,
}

impl ExpanderBuilder {
	#[must_use]
	pub fn processor(mut self, processor: Box<dyn TagProcessor>) -> Self {
		self.registry.register(processor);
		self
	}

	#[must_use]
	pub fn remove_escape_chars(mut self) -> Self {
		self.registry.register_escape_removal();
		self
	}

	#[must_use]
	pub fn options(mut self, options: ExpandOptions) -> Self {
		self.options = options;
		self
	}

	#[must_use]
	pub fn process_limit(mut self, process_limit: usize) -> Self {
		self.options.process_limit = process_limit;
		self
	}

	#[must_use]
	pub fn log_unresolved_get_arg(mut self, log: bool) -> Self {
		self.options.log_unresolved_get_arg = log;
		self
	}

	#[must_use]
	pub fn parallel(mut self, parallel: bool) -> Self {
		self.options.parallel = parallel;
		self
	}

	pub fn build(self) -> Expander {
		Expander::new(self.registry, self.options)
	}
}

/// Expand `documents` with the pipeline, limits and process filter from
/// `config`.
pub fn expand_documents(documents: &mut DocumentSet, config: &KodexConfig) -> KodexResult<ExpansionReport> {
	let index = ReferenceIndex::new(documents).with_process_filter(config.process_filter()?);
	Expander::from_config(config)?.run(documents, &index)
}
