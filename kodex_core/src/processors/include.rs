use tracing::trace;

use super::resolve_reference;
use crate::Document;
use crate::DocumentId;
use crate::INCLUDE;
use crate::KodexError;
use crate::ProcessContext;
use crate::Stall;
use crate::StallAction;
use crate::TagError;
use crate::TagOccurrence;
use crate::TagProcessor;
use crate::dependency_order;
use crate::tokenizer::decode_reference_target;
use crate::tokenizer::get_tag_arguments;
use crate::tokenizer::rewrite_reference_links;
use crate::tokenizer::with_trailing;

/// `@include [Target] trailing` and `{@include [Target]}`: copy the
/// documentation of another declaration.
///
/// Targets that still carry an include tag of their own are deferred, so
/// chains expand innermost first and true cycles stall.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeProcessor;

impl IncludeProcessor {
	fn expand(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		let mut arguments = get_tag_arguments(occurrence.text, occurrence.name, 2).into_iter();
		let target = arguments.next().unwrap_or_default();
		let trailing = arguments.next().unwrap_or_default();

		let reference = decode_reference_target(&target);
		if reference.is_empty() {
			return Err(TagError::MissingArgument {
				tag: occurrence.name.to_string(),
			});
		}

		let id = resolve_reference(document, &reference, context)?;
		let Some(included) = context.documents.get(id) else {
			return Ok(occurrence.text.to_string());
		};

		// Targets outside the process view never settle, so their tags are
		// copied and expanded here on a later pass.
		if included.has_tag(|tag| self.supports(tag)) && context.index.is_processable(included) {
			trace!(from = document.path(), target = included.path(), "include target not settled yet");
			return Ok(occurrence.text.to_string());
		}

		let content = rewrite_reference_links(included.content(), |link| {
			let decoded = decode_reference_target(link);
			context
				.index
				.resolve(context.documents, included, &decoded, &|_| true)
				.and_then(|id| context.documents.get(id))
				.map_or_else(|| link.to_string(), |found| found.path().to_string())
		});

		Ok(with_trailing(&content, &trailing))
	}
}

impl TagProcessor for IncludeProcessor {
	fn name(&self) -> &str {
		INCLUDE
	}

	fn supports(&self, tag: &str) -> bool {
		tag == INCLUDE
	}

	fn expand_inline(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		self.expand(occurrence, document, context)
	}

	fn expand_block(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		self.expand(occurrence, document, context)
	}

	fn is_parallel(&self) -> bool {
		false
	}

	fn order(&self, context: &ProcessContext<'_>, eligible: Vec<DocumentId>) -> Vec<DocumentId> {
		dependency_order(context.documents, context.index, &eligible)
	}

	fn on_stall(&self, stall: &Stall<'_>) -> StallAction {
		StallAction::Fail(KodexError::CircularInclude {
			documents: stall.paths(),
		})
	}
}
