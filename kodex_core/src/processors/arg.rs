use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::ARG;
use crate::Document;
use crate::DocumentId;
use crate::ExpansionWarning;
use crate::KodexError;
use crate::ProcessContext;
use crate::Stall;
use crate::StallAction;
use crate::TagError;
use crate::TagOccurrence;
use crate::TagProcessor;
use crate::lexer::RawToken;
use crate::lexer::RegionTracker;
use crate::lexer::lex;
use crate::tokenizer::get_tag_arguments;
use crate::tokenizer::with_trailing;

/// Tags that store a value. `@arg` is the deprecated spelling.
pub const SET_ARG_TAGS: [&str; 3] = ["setArg", "set", "arg"];
/// Tags that read a value. `@includeArg` is the deprecated spelling.
pub const GET_ARG_TAGS: [&str; 3] = ["getArg", "get", "includeArg"];

fn is_set_tag(tag: &str) -> bool {
	SET_ARG_TAGS.contains(&tag)
}

fn is_get_tag(tag: &str) -> bool {
	GET_ARG_TAGS.contains(&tag)
}

/// `@setArg key value` stores a value for the document and `{@getArg key}`
/// substitutes it.
///
/// Values are keyed by document identity and live for one run. A document
/// with pending `setArg` tags does not substitute `getArg` in the same pass.
#[derive(Debug, Default)]
pub struct ArgProcessor {
	dollar_shorthand: bool,
	values: Mutex<HashMap<(DocumentId, String), String>>,
	missing: Mutex<BTreeMap<(DocumentId, String), ExpansionWarning>>,
}

impl ArgProcessor {
	pub fn new(dollar_shorthand: bool) -> Self {
		Self {
			dollar_shorthand,
			..Self::default()
		}
	}

	fn expand(&self, occurrence: &TagOccurrence<'_>, document: &Document) -> Result<String, TagError> {
		let mut arguments = get_tag_arguments(occurrence.text, occurrence.name, 2).into_iter();
		let key = arguments.next().unwrap_or_default();
		let rest = arguments.next().unwrap_or_default();

		if key.is_empty() {
			return Err(TagError::MissingArgument {
				tag: occurrence.name.to_string(),
			});
		}

		let entry = (document.id(), key);

		if is_set_tag(occurrence.name) {
			self.values
				.lock()
				.unwrap_or_else(PoisonError::into_inner)
				.insert(entry.clone(), rest.trim_end().to_string());
			self.missing
				.lock()
				.unwrap_or_else(PoisonError::into_inner)
				.remove(&entry);
			return Ok(String::new());
		}

		if document.has_tag(is_set_tag) {
			return Ok(occurrence.text.to_string());
		}

		let value = self
			.values
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&entry)
			.cloned();
		let mut missing = self.missing.lock().unwrap_or_else(PoisonError::into_inner);

		match value {
			Some(value) => {
				missing.remove(&entry);
				Ok(with_trailing(&value, &rest))
			}
			None => {
				let warning = ExpansionWarning::UnresolvedArgument {
					key: entry.1.clone(),
					document: document.id(),
					path: document.path().to_string(),
					line: occurrence.line,
				};
				missing.insert(entry, warning);
				Ok(occurrence.text.to_string())
			}
		}
	}
}

impl TagProcessor for ArgProcessor {
	fn name(&self) -> &str {
		ARG
	}

	fn supports(&self, tag: &str) -> bool {
		is_set_tag(tag) || is_get_tag(tag)
	}

	fn expand_inline(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		self.expand(occurrence, document)
	}

	fn expand_block(
		&self,
		occurrence: &TagOccurrence<'_>,
		document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		self.expand(occurrence, document)
	}

	fn is_eligible(&self, document: &Document) -> bool {
		document.has_tag(|tag| self.supports(tag))
			|| (self.dollar_shorthand && !dollar_shorthand_ranges(document.content()).is_empty())
	}

	fn prepare<'c>(&self, _document: &Document, content: &'c str) -> Cow<'c, str> {
		if self.dollar_shorthand {
			expand_dollar_shorthand(content)
		} else {
			Cow::Borrowed(content)
		}
	}

	fn on_stall(&self, stall: &Stall<'_>) -> StallAction {
		let pending_set = stall
			.documents
			.iter()
			.any(|document| document.has_tag(is_set_tag));

		if pending_set {
			StallAction::Fail(KodexError::NoProgress {
				processor: stall.processor.to_string(),
				documents: stall.paths(),
			})
		} else if stall.idle_passes < 2 {
			StallAction::Retry
		} else {
			StallAction::Settle
		}
	}

	fn warnings(&self) -> Vec<ExpansionWarning> {
		self.missing
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.values()
			.cloned()
			.collect()
	}
}

/// `(range, key)` of every `$key` and `${key}` occurrence outside code.
fn dollar_shorthand_ranges(content: &str) -> Vec<(std::ops::Range<usize>, String)> {
	let lexemes = lex(content);
	let mut regions = RegionTracker::default();
	let mut found = Vec::new();
	let mut index = 0;

	while index < lexemes.len() {
		let lexeme = &lexemes[index];
		index += 1;

		let in_code = regions.in_code();
		regions.step(lexeme);
		if in_code {
			continue;
		}

		match lexeme.token {
			Some(RawToken::Dollar) => {
				let Some(next) = lexemes.get(index).filter(|next| next.is(RawToken::Text)) else {
					continue;
				};
				let text = &content[next.span.clone()];
				let key_len: usize = text
					.chars()
					.take_while(|c| c.is_alphanumeric() || *c == '_')
					.map(char::len_utf8)
					.sum();

				if key_len > 0 && text.starts_with(|c: char| c.is_alphabetic() || c == '_') {
					let end = next.span.start + key_len;
					found.push((lexeme.span.start..end, text[..key_len].to_string()));
				}
			}
			Some(RawToken::DollarBraceOpen) => {
				let Some(close) = lexemes[index..]
					.iter()
					.position(|candidate| candidate.is(RawToken::BraceClose))
				else {
					continue;
				};
				let close = &lexemes[index + close];
				let key = content[lexeme.span.end..close.span.start].trim();

				if !key.is_empty() && !key.contains(char::is_whitespace) {
					found.push((lexeme.span.start..close.span.end, key.to_string()));
				}
			}
			_ => {}
		}
	}

	found
}

/// Rewrite `$key` and `${key}` into `{@getArg key}`.
fn expand_dollar_shorthand(content: &str) -> Cow<'_, str> {
	let ranges = dollar_shorthand_ranges(content);
	if ranges.is_empty() {
		return Cow::Borrowed(content);
	}

	let mut output = String::with_capacity(content.len());
	let mut cursor = 0;
	for (range, key) in ranges {
		output.push_str(&content[cursor..range.start]);
		output.push_str("{@");
		output.push_str(GET_ARG_TAGS[0]);
		output.push(' ');
		output.push_str(&key);
		output.push('}');
		cursor = range.end;
	}
	output.push_str(&content[cursor..]);

	Cow::Owned(output)
}
