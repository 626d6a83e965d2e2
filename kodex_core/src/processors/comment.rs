use crate::COMMENT;
use crate::Document;
use crate::ProcessContext;
use crate::TagError;
use crate::TagOccurrence;
use crate::TagProcessor;

/// `@comment` and `{@comment ...}` erase themselves, including anything
/// nested inside them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentProcessor;

impl TagProcessor for CommentProcessor {
	fn name(&self) -> &str {
		COMMENT
	}

	fn supports(&self, tag: &str) -> bool {
		tag == COMMENT
	}

	fn expand_inline(
		&self,
		_occurrence: &TagOccurrence<'_>,
		_document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		Ok(String::new())
	}

	fn expand_block(
		&self,
		_occurrence: &TagOccurrence<'_>,
		_document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		Ok(String::new())
	}
}
