use std::ops::Range;

use logos::Logos;

/// Raw tokens produced by logos for flat tokenization of documentation text.
///
/// Everything that is not structurally significant collapses into `Text`, so
/// the token stream always covers the whole input.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawToken {
	/// A backslash together with the character it escapes.
	#[regex(r"\\[^\n]")]
	Escaped,
	#[token("{@")]
	InlineTagOpen,
	#[token("${")]
	DollarBraceOpen,
	#[token("$")]
	Dollar,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token("[")]
	BracketOpen,
	#[token("]")]
	BracketClose,
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token("```")]
	Fence,
	#[token("`")]
	Backtick,
	#[token("@")]
	At,
	#[token("\n")]
	Newline,
	#[regex(r"[ \t\r]+")]
	Whitespace,
	#[regex(r#"[^\\{}\[\]()`@$\n \t\r]+"#)]
	Text,
}

/// A single token together with its byte span. Input logos cannot match (a
/// trailing lone backslash) is kept as `None` and treated as plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lexeme {
	pub token: Option<RawToken>,
	pub span: Range<usize>,
}

impl Lexeme {
	pub fn is(&self, token: RawToken) -> bool {
		self.token == Some(token)
	}
}

pub(crate) fn lex(source: &str) -> Vec<Lexeme> {
	RawToken::lexer(source)
		.spanned()
		.map(|(token, span)| Lexeme { token: token.ok(), span })
		.collect()
}

/// Tracks whether the walker is inside a code fence, an inline code span or
/// an open brace region while stepping through lexemes.
#[derive(Debug, Default, Clone)]
pub(crate) struct RegionTracker {
	fence: bool,
	code_span: bool,
	braces: usize,
}

impl RegionTracker {
	/// Advance over one lexeme.
	pub fn step(&mut self, lexeme: &Lexeme) {
		let Some(token) = lexeme.token else {
			return;
		};

		match token {
			RawToken::Fence if !self.code_span && self.braces == 0 => {
				self.fence = !self.fence;
			}
			_ if self.fence => {}
			RawToken::Newline => self.code_span = false,
			RawToken::Backtick if self.braces == 0 => self.code_span = !self.code_span,
			_ if self.code_span => {}
			RawToken::InlineTagOpen | RawToken::DollarBraceOpen => self.braces += 1,
			RawToken::BraceOpen if self.braces > 0 => self.braces += 1,
			RawToken::BraceClose => self.braces = self.braces.saturating_sub(1),
			_ => {}
		}
	}

	/// `true` while a fence or a tag region is still open. Inline code spans
	/// never continue across a newline.
	pub fn is_open(&self) -> bool {
		self.fence || self.braces > 0
	}

	pub fn in_code(&self) -> bool {
		self.fence || self.code_span
	}
}
