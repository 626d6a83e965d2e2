use super::escape_for;
use super::unresolved;
use crate::Document;
use crate::Language;
use crate::ProcessContext;
use crate::SAMPLE;
use crate::TagError;
use crate::TagOccurrence;
use crate::TagProcessor;
use crate::tokenizer::decode_reference_target;
use crate::tokenizer::get_tag_arguments;
use crate::tokenizer::with_trailing;

/// `@sampleNoComments` strips doc comments from the excerpt first.
pub const SAMPLE_NO_COMMENTS: &str = "sampleNoComments";

/// `@sample [Target]` copies the declaration source of another document
/// into a code block.
#[derive(Debug, Clone)]
pub struct SampleProcessor {
	start_marker: String,
	end_marker: String,
}

impl Default for SampleProcessor {
	fn default() -> Self {
		Self::new("SampleStart", "SampleEnd")
	}
}

impl SampleProcessor {
	pub fn new(start_marker: &str, end_marker: &str) -> Self {
		Self {
			start_marker: start_marker.to_string(),
			end_marker: end_marker.to_string(),
		}
	}

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

		let sampled = context
			.index
			.resolve(context.documents, document, &reference, &|_| true)
			.and_then(|id| context.documents.get(id))
			.ok_or_else(|| unresolved(document, &reference, context))?;

		let source = sampled.source().ok_or_else(|| {
			TagError::MissingSource {
				target: sampled.path().to_string(),
			}
		})?;

		let source = if occurrence.name == SAMPLE_NO_COMMENTS {
			strip_doc_comments(source)
		} else {
			source.to_string()
		};
		let excerpt = between_markers(&source, &self.start_marker, &self.end_marker).unwrap_or(&source);
		let code = dedent(excerpt.trim_matches('\n'));

		let language = document.language();
		let code = escape_for(language, &code);
		let block = match language {
			Language::Java => format!("<pre>\n{code}\n</pre>"),
			Language::Kotlin => format!("```{}\n{code}\n```", sampled.language().code_label()),
		};

		Ok(with_trailing(&block, &trailing))
	}
}

impl TagProcessor for SampleProcessor {
	fn name(&self) -> &str {
		SAMPLE
	}

	fn supports(&self, tag: &str) -> bool {
		tag == SAMPLE || tag == SAMPLE_NO_COMMENTS
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
}

/// Remove every `/** ... */` block together with the rest of its last line.
fn strip_doc_comments(source: &str) -> String {
	let mut output = String::with_capacity(source.len());
	let mut rest = source;

	while let Some(start) = rest.find("/**") {
		let Some(length) = rest[start..].find("*/") else {
			break;
		};
		let end = start + length + 2;

		// Drop the indentation before the comment when it owns its lines.
		let before = &rest[..start];
		let line_start = before.rfind('\n').map_or(0, |index| index + 1);
		if before[line_start..].trim().is_empty() {
			output.push_str(&before[..line_start]);
		} else {
			output.push_str(before);
		}

		rest = &rest[end..];
		if let Some(after) = rest.strip_prefix('\n') {
			rest = after;
		} else if rest.trim_start_matches([' ', '\t']).starts_with('\n') {
			rest = rest.trim_start_matches([' ', '\t']);
			rest = &rest[1..];
		}
	}

	output.push_str(rest);
	output
}

/// The lines strictly between the `// start` and `// end` marker comments,
/// when both are present in that order.
fn between_markers<'a>(source: &'a str, start: &str, end: &str) -> Option<&'a str> {
	let is_marker = |line: &str, marker: &str| {
		line.trim()
			.strip_prefix("//")
			.is_some_and(|comment| comment.trim() == marker)
	};

	let mut offset = 0;
	let mut excerpt_start = None;

	for line in source.split_inclusive('\n') {
		let line_start = offset;
		offset += line.len();

		match excerpt_start {
			None if is_marker(line, start) => excerpt_start = Some(offset),
			Some(from) if is_marker(line, end) => return Some(&source[from..line_start]),
			_ => {}
		}
	}

	None
}

/// Remove the indentation shared by every non-blank line.
fn dedent(code: &str) -> String {
	let indent = code
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(|line| line.len() - line.trim_start().len())
		.min()
		.unwrap_or(0);

	code.lines()
		.map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
		.collect::<Vec<_>>()
		.join("\n")
}
