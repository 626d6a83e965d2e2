pub use arg::*;
pub use comment::*;
pub use include::*;
pub use include_file::*;
pub use sample::*;

mod arg;
mod comment;
mod include;
mod include_file;
mod sample;

use crate::Document;
use crate::DocumentId;
use crate::Language;
use crate::ProcessContext;
use crate::TagError;

/// Resolve a decoded reference from `document`, never to the document
/// itself.
pub(crate) fn resolve_reference(
	document: &Document,
	reference: &str,
	context: &ProcessContext<'_>,
) -> Result<DocumentId, TagError> {
	let ProcessContext {
		documents, index, ..
	} = *context;

	if let Some(id) = index.resolve(documents, document, reference, &|candidate| {
		candidate.id() != document.id()
	}) {
		return Ok(id);
	}

	if index.resolve(documents, document, reference, &|_| true) == Some(document.id()) {
		return Err(TagError::SelfReference {
			target: reference.to_string(),
		});
	}

	Err(unresolved(document, reference, context))
}

pub(crate) fn unresolved(document: &Document, reference: &str, context: &ProcessContext<'_>) -> TagError {
	TagError::UnresolvedReference {
		target: reference.to_string(),
		attempted: context.index.candidate_paths(document, reference),
		filtered: context
			.index
			.filtered_candidates(context.documents, document, reference),
	}
}

/// Make literal text safe to embed in a doc comment of the given dialect.
pub(crate) fn escape_for(language: Language, text: &str) -> String {
	let text = match language {
		Language::Java => escape_html(text),
		Language::Kotlin => text.to_string(),
	};

	text.replace("*/", "*&#47;")
}

pub(crate) fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for character in text.chars() {
		match character {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'@' => escaped.push_str("&#64;"),
			_ => escaped.push(character),
		}
	}

	escaped
}
