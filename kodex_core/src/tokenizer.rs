//! Splitting documentation text into block tags, locating inline tags, and
//! parsing tag arguments.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::lexer::Lexeme;
use crate::lexer::RawToken;
use crate::lexer::RegionTracker;
use crate::lexer::lex;

/// Characters that a backslash escapes in documentation text.
pub const ESCAPABLE_CHARS: [char; 7] = ['@', '{', '}', '[', ']', '$', '`'];

/// A contiguous run of lines that either starts with a block tag or, for the
/// first block only, holds the description preceding any block tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBlock {
	pub text: String,
	pub range: Range<usize>,
}

impl DocBlock {
	/// The block tag this block starts with, if any.
	pub fn tag_name(&self) -> Option<String> {
		block_tag_name(&self.text)
	}
}

/// An inline `{@tag ...}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
	pub name: String,
	pub range: Range<usize>,
	/// Number of enclosing inline tags.
	pub depth: usize,
}

/// Reported when an argument contains a closing delimiter with no matching
/// opener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RogueClosingChar {
	pub character: char,
	/// Index of the argument being scanned.
	pub argument: usize,
	/// Byte offset of the character within the tag text.
	pub offset: usize,
}

/// Split documentation content into blocks.
///
/// A new block starts at every line that begins, after at most two spaces,
/// with an unescaped `@name`, unless the line is inside a code fence or still
/// inside an unclosed `{@...}` / `${...}` region. Joining the block texts with
/// `"\n"` reproduces the input exactly.
pub fn split_into_blocks(content: &str) -> Vec<DocBlock> {
	let continues_region = line_region_states(content);
	let mut ranges: Vec<Range<usize>> = Vec::new();
	let mut offset = 0;

	for (index, line) in content.split('\n').enumerate() {
		let start = offset;
		let end = start + line.len();
		offset = end + 1;

		let inside_region = continues_region.get(index).copied().unwrap_or(false);
		let starts_block = !inside_region && block_tag_name(line).is_some();

		match ranges.last_mut() {
			Some(range) if !starts_block => range.end = end,
			_ => ranges.push(start..end),
		}
	}

	ranges
		.into_iter()
		.map(|range| {
			DocBlock {
				text: content[range.clone()].to_string(),
				range,
			}
		})
		.collect()
}

/// For every line, whether it starts inside a fence or an open tag region.
fn line_region_states(content: &str) -> Vec<bool> {
	let mut tracker = RegionTracker::default();
	let mut states = vec![false];

	for lexeme in lex(content) {
		tracker.step(&lexeme);

		if lexeme.is(RawToken::Newline) {
			states.push(tracker.is_open());
		}
	}

	states
}

/// The tag a block line starts with, allowing up to two leading spaces.
fn block_tag_name(text: &str) -> Option<String> {
	let trimmed = text
		.strip_prefix("  ")
		.or_else(|| text.strip_prefix(' '))
		.unwrap_or(text);

	if !trimmed.starts_with('@') {
		return None;
	}

	get_tag_name(trimmed)
}

/// Extract the tag name from tag text, which may be a block tag (`@name ...`)
/// or an inline tag (`{@name ...}`).
pub fn get_tag_name(text: &str) -> Option<String> {
	let trimmed = text.trim_start();
	let trimmed = trimmed.strip_prefix('{').unwrap_or(trimmed);
	let rest = trimmed.strip_prefix('@')?;
	let name: String = rest
		.chars()
		.take_while(|c| !c.is_whitespace() && *c != '{' && *c != '}')
		.collect();

	let starts_like_identifier = name.chars().next().is_some_and(char::is_alphabetic);
	starts_like_identifier.then_some(name)
}

/// Find every inline tag, ordered deepest first and then by position.
///
/// Processing the first entry and rescanning always expands innermost tags
/// before the tags that contain them. Unclosed tags are ignored.
pub fn find_inline_tag_ranges(content: &str) -> Vec<InlineTag> {
	// (start offset, whether the brace opened an inline tag)
	let mut open: Vec<(usize, bool)> = Vec::new();
	let mut tags = Vec::new();

	for Lexeme { token, span } in lex(content) {
		match token {
			Some(RawToken::InlineTagOpen) => open.push((span.start, true)),
			Some(RawToken::BraceOpen | RawToken::DollarBraceOpen) => open.push((span.start, false)),
			Some(RawToken::BraceClose) => {
				let Some((start, is_tag)) = open.pop() else {
					continue;
				};

				if !is_tag {
					continue;
				}

				let range = start..span.end;
				if let Some(name) = get_tag_name(&content[range.clone()]) {
					let depth = open.iter().filter(|(_, is_tag)| *is_tag).count();
					tags.push(InlineTag { name, range, depth });
				}
			}
			_ => {}
		}
	}

	tags.sort_by(|a, b| {
		b.depth
			.cmp(&a.depth)
			.then(a.range.start.cmp(&b.range.start))
	});
	tags
}

/// All tag names, block and inline, present in `content`.
pub fn tags_found_in(content: &str) -> BTreeSet<String> {
	let mut tags: BTreeSet<String> = split_into_blocks(content)
		.iter()
		.filter_map(DocBlock::tag_name)
		.collect();

	tags.extend(find_inline_tag_ranges(content).into_iter().map(|tag| tag.name));
	tags
}

/// Parse exactly `count` whitespace separated arguments from tag text.
///
/// See [`get_tag_arguments_with`].
pub fn get_tag_arguments(tag_text: &str, tag: &str, count: usize) -> Vec<String> {
	get_tag_arguments_with(tag_text, tag, count, char::is_whitespace, |_| {})
}

/// Parse exactly `count` arguments from tag text.
///
/// The `@tag` prefix is removed, along with the surrounding braces of an
/// inline tag. Arguments are split on characters accepted by `is_splitter`,
/// except inside `{}`, `[]`, `()` or `<>` pairs, backtick spans and quotes.
/// The final argument receives all remaining text with at most one leading
/// splitter removed; a leading newline is preserved. Missing arguments are
/// returned as empty strings.
pub fn get_tag_arguments_with(
	tag_text: &str,
	tag: &str,
	count: usize,
	is_splitter: impl Fn(char) -> bool,
	mut on_rogue_closing_char: impl FnMut(RogueClosingChar),
) -> Vec<String> {
	if count == 0 {
		return Vec::new();
	}

	let (mut offset, body) = strip_tag_prefix(tag_text, tag);
	let mut remaining = body;
	let mut arguments = Vec::with_capacity(count);

	while arguments.len() + 1 < count {
		let start = remaining
			.find(|c: char| !is_splitter(c))
			.unwrap_or(remaining.len());
		offset += start;
		remaining = &remaining[start..];

		let end = argument_end(
			remaining,
			&is_splitter,
			arguments.len(),
			offset,
			&mut on_rogue_closing_char,
		);
		arguments.push(remaining[..end].to_string());
		offset += end;
		remaining = &remaining[end..];
	}

	let last = match remaining.chars().next() {
		Some(first) if first != '\n' && is_splitter(first) => &remaining[first.len_utf8()..],
		_ => remaining,
	};
	arguments.push(last.to_string());

	arguments
}

/// Remove the `@tag` marker and, for inline tags, the enclosing braces.
/// Returns the remaining body and its byte offset within `text`.
fn strip_tag_prefix<'a>(text: &'a str, tag: &str) -> (usize, &'a str) {
	let trimmed = text.trim_start();
	let mut offset = text.len() - trimmed.len();

	let body = match trimmed.strip_prefix('{') {
		Some(inner) => {
			offset += 1;
			inner.strip_suffix('}').unwrap_or(inner)
		}
		None => trimmed,
	};

	let marker = format!("@{tag}");
	match body.strip_prefix(marker.as_str()) {
		Some(rest) => (offset + marker.len(), rest),
		None => (offset, body),
	}
}

fn argument_end(
	text: &str,
	is_splitter: &impl Fn(char) -> bool,
	argument: usize,
	base_offset: usize,
	on_rogue_closing_char: &mut impl FnMut(RogueClosingChar),
) -> usize {
	let mut expected: Vec<char> = Vec::new();
	let mut escaped = false;

	for (index, character) in text.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}

		if character == '\\' {
			escaped = true;
			continue;
		}

		if let Some(&quote @ ('`' | '"' | '\'')) = expected.last() {
			if character == quote {
				expected.pop();
			}
			continue;
		}

		match character {
			'{' => expected.push('}'),
			'[' => expected.push(']'),
			'(' => expected.push(')'),
			'<' => expected.push('>'),
			'`' | '"' | '\'' => expected.push(character),
			'}' | ']' | ')' | '>' => {
				if expected.last() == Some(&character) {
					expected.pop();
				} else {
					on_rogue_closing_char(RogueClosingChar {
						character,
						argument,
						offset: base_offset + index,
					});
				}
			}
			_ if expected.is_empty() && is_splitter(character) => return index,
			_ => {}
		}
	}

	text.len()
}

/// Append the trailing text of a tag to its expansion, separating the two
/// with a space unless the trailing text already starts with whitespace.
pub fn with_trailing(content: &str, trailing: &str) -> String {
	if trailing.is_empty() {
		return content.to_string();
	}

	if trailing.starts_with(char::is_whitespace) {
		format!("{content}{trailing}")
	} else {
		format!("{content} {trailing}")
	}
}

/// Decode the reference target written in a tag argument into a dotted path.
///
/// Handles `[Target]`, `[Alias][Target]`, backticks, `<code>...</code>` and
/// `{@link Target}` wrappers, converts `#` member separators into `.` and
/// drops parameter lists.
pub fn decode_reference_target(token: &str) -> String {
	let mut target = token.trim().to_string();

	loop {
		let unwrapped = unwrap_reference(&target);
		if unwrapped == target {
			break;
		}
		target = unwrapped;
	}

	let mut decoded = String::with_capacity(target.len());
	let mut depth = 0usize;
	for character in target.chars() {
		match character {
			'(' => depth += 1,
			')' => depth = depth.saturating_sub(1),
			'#' if depth == 0 => decoded.push('.'),
			_ if depth == 0 => decoded.push(character),
			_ => {}
		}
	}

	decoded.trim_start_matches('.').trim().to_string()
}

fn unwrap_reference(target: &str) -> String {
	let target = target.trim();

	if let Some(inner) = target
		.strip_prefix("<code>")
		.and_then(|rest| rest.strip_suffix("</code>"))
	{
		return inner.trim().to_string();
	}

	for prefix in ["{@linkplain", "{@link"] {
		if let Some(inner) = target
			.strip_prefix(prefix)
			.and_then(|rest| rest.strip_suffix('}'))
		{
			return inner.split_whitespace().next().unwrap_or_default().to_string();
		}
	}

	if target.starts_with('[') && target.ends_with(']') && target.len() >= 2 {
		let inner = &target[1..target.len() - 1];
		return match inner.rfind("][") {
			Some(index) => inner[index + 2..].to_string(),
			None => inner.to_string(),
		};
	}

	if target.len() >= 2 && target.starts_with('`') && target.ends_with('`') {
		return target[1..target.len() - 1].to_string();
	}

	target.to_string()
}

/// Rewrite reference links so that they keep pointing at the same
/// declaration when the content moves to another scope.
///
/// `resolve` receives the raw link text and returns the fully qualified path
/// it refers to, or the text unchanged when it cannot be resolved. `[X]`
/// becomes `[X][path]` and `[Alias][X]` becomes `[Alias][path]`. Markdown
/// links, code spans, fences and escaped brackets are left alone.
pub fn rewrite_reference_links(content: &str, mut resolve: impl FnMut(&str) -> String) -> String {
	let groups = bracket_groups(content);
	let mut output = String::with_capacity(content.len());
	let mut cursor = 0;
	let mut index = 0;

	while index < groups.len() {
		let group = groups[index].clone();
		let followed_by = content[group.end..].chars().next();

		if let Some(next) = groups.get(index + 1).filter(|next| next.start == group.end) {
			let inner = &content[next.start + 1..next.end - 1];
			let resolved = resolve(inner);
			if !inner.is_empty() && resolved != inner {
				output.push_str(&content[cursor..next.start + 1]);
				output.push_str(&resolved);
				cursor = next.end - 1;
			}
			index += 2;
			continue;
		}

		index += 1;
		if matches!(followed_by, Some('(' | ':')) {
			continue;
		}

		let inner = &content[group.start + 1..group.end - 1];
		if inner.is_empty() {
			continue;
		}

		let resolved = resolve(inner);
		if resolved != inner {
			output.push_str(&content[cursor..group.end]);
			output.push('[');
			output.push_str(&resolved);
			output.push(']');
			cursor = group.end;
		}
	}

	output.push_str(&content[cursor..]);
	output
}

/// Top level `[...]` groups outside code.
fn bracket_groups(content: &str) -> Vec<Range<usize>> {
	let mut tracker = RegionTracker::default();
	let mut groups = Vec::new();
	let mut depth = 0usize;
	let mut start = 0;

	for lexeme in lex(content) {
		if depth == 0 {
			tracker.step(&lexeme);
		}

		if depth == 0 && tracker.in_code() {
			continue;
		}

		match lexeme.token {
			Some(RawToken::BracketOpen) => {
				if depth == 0 {
					start = lexeme.span.start;
				}
				depth += 1;
			}
			Some(RawToken::BracketClose) if depth > 0 => {
				depth -= 1;
				if depth == 0 {
					groups.push(start..lexeme.span.end);
				}
			}
			Some(RawToken::Newline) if depth > 0 => {
				// Reference links never span lines.
				depth = 0;
			}
			_ => {}
		}
	}

	groups
}

/// Remove the backslash in front of every escapable character.
pub fn remove_escape_chars(content: &str) -> String {
	let mut output = String::with_capacity(content.len());
	let mut chars = content.chars().peekable();

	while let Some(character) = chars.next() {
		if character == '\\' && chars.peek().is_some_and(|next| ESCAPABLE_CHARS.contains(next)) {
			continue;
		}
		output.push(character);
	}

	output
}
