use std::path::Path;

use super::escape_for;
use crate::Document;
use crate::INCLUDE_FILE;
use crate::ProcessContext;
use crate::TagError;
use crate::TagOccurrence;
use crate::TagProcessor;
use crate::tokenizer::get_tag_arguments;
use crate::tokenizer::with_trailing;

/// `@includeFile (relative/path.txt)` inlines a file that lives next to the
/// declaration's source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeFileProcessor;

impl IncludeFileProcessor {
	fn expand(occurrence: &TagOccurrence<'_>, document: &Document) -> Result<String, TagError> {
		let mut arguments = get_tag_arguments(occurrence.text, occurrence.name, 2).into_iter();
		let argument = arguments.next().unwrap_or_default();
		let trailing = arguments.next().unwrap_or_default();

		let relative = unwrap_path(&argument);
		if relative.is_empty() {
			return Err(TagError::MissingArgument {
				tag: occurrence.name.to_string(),
			});
		}

		let file = document.file().ok_or_else(|| {
			TagError::MissingFileHandle {
				path: relative.to_string(),
			}
		})?;
		let path = file.parent().unwrap_or_else(|| Path::new("")).join(relative);
		let display = path.display().to_string();

		if !path.exists() {
			return Err(TagError::FileNotFound { path: display });
		}

		if !path.is_file() {
			return Err(TagError::NotAFile { path: display });
		}

		let text = std::fs::read_to_string(&path).map_err(|error| {
			TagError::FileRead {
				path: display,
				reason: error.to_string(),
			}
		})?;
		let text = text.replace("\r\n", "\n");
		let text = text.strip_suffix('\n').unwrap_or(&text);

		Ok(with_trailing(&escape_for(document.language(), text), &trailing))
	}
}

impl TagProcessor for IncludeFileProcessor {
	fn name(&self) -> &str {
		INCLUDE_FILE
	}

	fn supports(&self, tag: &str) -> bool {
		tag == INCLUDE_FILE
	}

	fn expand_inline(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		Self::expand(occurrence, document)
	}

	fn expand_block(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		Self::expand(occurrence, document)
	}
}

/// Strip one layer of parentheses, quotes or backticks around a path.
fn unwrap_path(argument: &str) -> &str {
	let argument = argument.trim();

	for (open, close) in [('(', ')'), ('"', '"'), ('\'', '\''), ('`', '`')] {
		if argument.len() >= 2 && argument.starts_with(open) && argument.ends_with(close) {
			return argument[1..argument.len() - 1].trim();
		}
	}

	argument
}
