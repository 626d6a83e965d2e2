use std::collections::BTreeSet;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::tokenizer::DocBlock;
use crate::tokenizer::InlineTag;
use crate::tokenizer::RogueClosingChar;
use crate::tokenizer::decode_reference_target;
use crate::tokenizer::find_inline_tag_ranges;
use crate::tokenizer::get_tag_arguments;
use crate::tokenizer::get_tag_arguments_with;
use crate::tokenizer::get_tag_name;
use crate::tokenizer::remove_escape_chars;
use crate::tokenizer::rewrite_reference_links;
use crate::tokenizer::split_into_blocks;
use crate::tokenizer::tags_found_in;
use crate::tokenizer::with_trailing;

fn block_texts(content: &str) -> Vec<String> {
	split_into_blocks(content)
		.into_iter()
		.map(|block| block.text)
		.collect()
}

#[rstest]
#[case::description_only("Just a description.", vec!["Just a description."])]
#[case::block_tags(
	"Hello\n@param a the a\n@return x",
	vec!["Hello", "@param a the a", "@return x"]
)]
#[case::blank_lines_fold("Hello\n\nWorld\n@return x\n", vec!["Hello\n\nWorld", "@return x\n"])]
#[case::two_space_indent("Text\n  @param x", vec!["Text", "  @param x"])]
#[case::three_space_indent("Text\n   @param x", vec!["Text\n   @param x"])]
#[case::escaped_at("Text\n\\@include [X]", vec!["Text\n\\@include [X]"])]
#[case::fence(
	"Text\n```\n@notATag\n```\n@return x",
	vec!["Text\n```\n@notATag\n```", "@return x"]
)]
#[case::open_inline_tag(
	"{@include\n@notATag}\n@b",
	vec!["{@include\n@notATag}", "@b"]
)]
#[case::open_dollar_brace("${key\n@notATag}\n@b", vec!["${key\n@notATag}", "@b"])]
#[case::leading_tag("@include [A]\nmore", vec!["@include [A]\nmore"])]
fn split_blocks(#[case] content: &str, #[case] expected: Vec<&str>) {
	assert_eq!(block_texts(content), expected);
}

#[rstest]
#[case("")]
#[case("\n")]
#[case("a\n@b\n")]
#[case("@a\n\n\n@b x\n  @c\n```\n@d\n```")]
#[case("{@a {@b\n@c}}\n@d {")]
#[case("trailing backslash \\")]
fn split_blocks_round_trips(#[case] content: &str) {
	let joined = block_texts(content).join("\n");
	assert_eq!(joined, content);
}

#[test]
fn split_blocks_ranges_point_into_content() {
	let content = "Hello\n@param a\n@return b";
	let blocks = split_into_blocks(content);

	assert_eq!(blocks[1], DocBlock {
		text: "@param a".to_string(),
		range: 6..14,
	});
	assert_eq!(blocks[1].tag_name().as_deref(), Some("param"));
	assert_eq!(blocks[0].tag_name(), None);
}

#[rstest]
#[case::block("@include [X]", Some("include"))]
#[case::inline("{@getArg key}", Some("getArg"))]
#[case::leading_spaces("  @param x", Some("param"))]
#[case::brace_terminated("{@comment{@x}}", Some("comment"))]
#[case::no_tag("no tag here", None)]
#[case::lone_at("@ x", None)]
#[case::numeric("@1", None)]
fn tag_names(#[case] text: &str, #[case] expected: Option<&str>) {
	assert_eq!(get_tag_name(text).as_deref(), expected);
}

#[test]
fn inline_tags_are_ordered_deepest_first() {
	let tags = find_inline_tag_ranges("a {@comment {@comment x}} b {@getArg y}");

	assert_eq!(tags, vec![
		InlineTag {
			name: "comment".to_string(),
			range: 12..24,
			depth: 1,
		},
		InlineTag {
			name: "comment".to_string(),
			range: 2..25,
			depth: 0,
		},
		InlineTag {
			name: "getArg".to_string(),
			range: 28..39,
			depth: 0,
		},
	]);
}

#[rstest]
#[case::escaped_open("\\{@include [X]}")]
#[case::unclosed("{@include [X]")]
#[case::not_a_tag("{@ spaced}")]
#[case::plain_braces("{ not @a tag }")]
fn inline_tags_not_found(#[case] content: &str) {
	assert!(find_inline_tag_ranges(content).is_empty());
}

#[test]
fn inline_tag_ranges_nest_without_overlap() {
	let content = "{@a {@b x} {@c {@d y}}} {@e}";
	let tags = find_inline_tag_ranges(content);

	for first in &tags {
		for second in &tags {
			let disjoint = first.range.end <= second.range.start || second.range.end <= first.range.start;
			let nested = (first.range.start <= second.range.start && second.range.end <= first.range.end)
				|| (second.range.start <= first.range.start && first.range.end <= second.range.end);
			assert!(disjoint || nested, "{first:?} overlaps {second:?}");
		}
	}

	assert_eq!(tags.len(), 5);
	assert_eq!(tags[0].name, "d");
	assert_eq!(tags[0].depth, 2);
}

#[rstest]
#[case::target_and_trailing("@include [A B] trailing text", "include", 2, vec!["[A B]", "trailing text"])]
#[case::inline("{@getArg key}", "getArg", 2, vec!["key", ""])]
#[case::value_with_spaces("@setArg key value with spaces", "setArg", 2, vec!["key", "value with spaces"])]
#[case::keeps_leading_newline("@setArg key\nline", "setArg", 2, vec!["key", "\nline"])]
#[case::single_argument("@include [A] rest", "include", 1, vec!["[A] rest"])]
#[case::padded("@sample [A]", "sample", 3, vec!["[A]", "", ""])]
#[case::double_quotes("@x \"a b\" c", "x", 2, vec!["\"a b\"", "c"])]
#[case::backticks("@include `Foo Bar` baz", "include", 2, vec!["`Foo Bar`", "baz"])]
#[case::parentheses("@includeFile (my file.txt) after", "includeFile", 2, vec!["(my file.txt)", "after"])]
#[case::nested_inline("@include [A] {@getArg b c}", "include", 2, vec!["[A]", "{@getArg b c}"])]
#[case::no_arguments("@include", "include", 2, vec!["", ""])]
fn tag_arguments(#[case] text: &str, #[case] tag: &str, #[case] count: usize, #[case] expected: Vec<&str>) {
	assert_eq!(get_tag_arguments(text, tag, count), expected);
}

#[test]
fn tag_arguments_with_custom_splitter() {
	let arguments = get_tag_arguments_with("@x|a|b|c", "x", 3, |c| c == '|', |_| {});
	assert_eq!(arguments, vec!["a", "b", "c"]);
}

#[test]
fn tag_arguments_report_rogue_closing_chars() {
	let mut rogue = Vec::new();
	let arguments = get_tag_arguments_with("@include a) b", "include", 2, char::is_whitespace, |found| {
		rogue.push(found);
	});

	assert_eq!(arguments, vec!["a)", "b"]);
	assert_eq!(rogue, vec![RogueClosingChar {
		character: ')',
		argument: 0,
		offset: 10,
	}]);
}

#[rstest]
#[case::brackets("[Foo]", "Foo")]
#[case::aliased("[Alias][com.example.Foo]", "com.example.Foo")]
#[case::link("{@link Foo#bar(Int, String)}", "Foo.bar")]
#[case::code("<code>Foo.bar</code>", "Foo.bar")]
#[case::backticks("`Foo`", "Foo")]
#[case::backticks_in_brackets("[`Foo`]", "Foo")]
#[case::hash("Foo#bar", "Foo.bar")]
#[case::member_only("#bar", "bar")]
#[case::plain("com.example.Foo", "com.example.Foo")]
fn reference_targets(#[case] token: &str, #[case] expected: &str) {
	assert_eq!(decode_reference_target(token), expected);
}

fn resolve_bar(link: &str) -> String {
	if decode_reference_target(link) == "Bar" {
		"com.example.Bar".to_string()
	} else {
		link.to_string()
	}
}

#[rstest]
#[case::plain("See [Bar] and [Baz].", "See [Bar][com.example.Bar] and [Baz].")]
#[case::aliased("See [the bar][Bar].", "See [the bar][com.example.Bar].")]
#[case::backticks("See [`Bar`].", "See [`Bar`][com.example.Bar].")]
#[case::markdown_link("A [Bar](http://example.com)", "A [Bar](http://example.com)")]
#[case::code_span("Use `[Bar]` here", "Use `[Bar]` here")]
#[case::escaped("Not \\[Bar\\]", "Not \\[Bar\\]")]
#[case::fence("```\n[Bar]\n```", "```\n[Bar]\n```")]
fn reference_links(#[case] content: &str, #[case] expected: &str) {
	assert_eq!(rewrite_reference_links(content, resolve_bar), expected);
}

#[test]
fn escape_chars_removed() {
	assert_eq!(
		remove_escape_chars("\\@include \\{x\\} \\[y\\] \\$z \\`q\\` \\n"),
		"@include {x} [y] $z `q` \\n"
	);
}

#[test]
fn tags_found_in_content() {
	let tags = tags_found_in("Hello {@getArg a}\n@include [X]\n\\@comment");
	assert_eq!(tags, BTreeSet::from(["getArg".to_string(), "include".to_string()]));
}

#[rstest]
#[case::empty("A", "", "A")]
#[case::word("A", "b", "A b")]
#[case::newline("A", "\nb", "A\nb")]
#[case::space("A", " b", "A b")]
fn trailing_text(#[case] content: &str, #[case] trailing: &str, #[case] expected: &str) {
	assert_eq!(with_trailing(content, trailing), expected);
}

#[test]
fn document_tracks_tags_and_modification() {
	let mut document = doc("a", "Hello {@getArg x}");
	assert!(!document.is_modified());
	assert!(document.tags().contains("getArg"));

	document.set_content("Hello World");
	assert!(document.is_modified());
	assert!(document.tags().is_empty());

	document.set_content("Hello {@getArg x}");
	assert!(!document.is_modified());
	assert!(document.tags().contains("getArg"));
}

#[test]
fn document_set_assigns_identities() {
	let documents = set([doc("a", ""), doc("a", ""), doc("b", "")]);
	let ids: Vec<DocumentId> = documents.ids().collect();

	assert_eq!(ids, vec![DocumentId(0), DocumentId(1), DocumentId(2)]);
	assert_eq!(DocumentId(2).to_string(), "#2");
}

#[test]
fn document_set_parses_json() -> KodexResult<()> {
	let json = r#"[
		{ "path": "helloWorld", "content": "Hello World!" },
		{
			"path": "usage",
			"extensionPath": "Receiver.usage",
			"language": "java",
			"imports": [{ "path": "com.example", "wildcard": true }, { "path": "org.Foo", "alias": "Bar" }],
			"supertypes": ["com.example.Base"],
			"content": "@include [helloWorld]"
		}
	]"#;
	let documents = DocumentSet::parse(json, "json")?;

	assert_eq!(documents.len(), 2);
	let usage = &documents[1];
	assert_eq!(usage.id(), DocumentId(1));
	assert_eq!(usage.extension_path(), Some("Receiver.usage"));
	assert_eq!(usage.language(), Language::Java);
	assert_eq!(usage.imports(), &[Import::wildcard("com.example"), Import::aliased("org.Foo", "Bar")]);
	assert_eq!(usage.imports()[1].imported_name(), "Bar");
	assert_eq!(usage.supertypes(), &["com.example.Base".to_string()]);
	assert!(usage.tags().contains("include"));

	Ok(())
}

#[test]
fn document_set_parses_yaml() -> KodexResult<()> {
	let yaml = "- path: helloWorld\n  content: Hello World!\n- path: usage\n  content: '@include [helloWorld]'\n";
	let documents = DocumentSet::parse(yaml, "yaml")?;

	assert_eq!(documents.len(), 2);
	assert_eq!(documents[0].language(), Language::Kotlin);
	assert_eq!(documents[1].content(), "@include [helloWorld]");

	Ok(())
}

#[test]
fn document_set_rejects_unknown_format() {
	let result = DocumentSet::parse("", "txt");
	assert!(matches!(result, Err(KodexError::UnsupportedFormat(format)) if format == "txt"));
}

#[test]
fn candidate_paths_cover_scopes_supertypes_and_imports() {
	let documents = set([doc("com.example.Foo.bar", "")
		.with_supertype("com.example.Base")
		.with_import(Import::new("org.lib.Util"))
		.with_import(Import::wildcard("org.other"))]);
	let index = ReferenceIndex::new(&documents);

	assert_eq!(index.candidate_paths(&documents[0], "Util.helper"), vec![
		"com.example.Foo.bar.Util.helper",
		"com.example.Foo.Util.helper",
		"com.example.Util.helper",
		"com.Util.helper",
		"com.example.Base.Util.helper",
		"org.lib.Util.helper",
		"org.other.Util.helper",
		"Util.helper",
	]);
}

#[test]
fn candidate_paths_use_import_aliases() {
	let documents = set([doc("a", "").with_import(Import::aliased("org.lib.Util", "U"))]);
	let index = ReferenceIndex::new(&documents);
	let candidates = index.candidate_paths(&documents[0], "U.helper");

	assert!(candidates.contains(&"org.lib.Util.helper".to_string()));
	assert!(!candidates.contains(&"org.lib.Util".to_string()));
}

#[test]
fn candidate_paths_strip_synthetic_containers_for_java() {
	let documents = set([doc("com.example.UtilsKt.foo", "").with_language(Language::Java)]);
	let index = ReferenceIndex::new(&documents);
	let candidates = index.candidate_paths(&documents[0], "bar");

	assert!(candidates.contains(&"com.example.UtilsKt.bar".to_string()));
	assert!(candidates.contains(&"com.example.foo.bar".to_string()));
}

#[test]
fn query_distinguishes_unknown_from_filtered() {
	let documents = set([doc("a", ""), doc("b", "")]);
	let index = ReferenceIndex::new(&documents)
		.with_query_filter(DocumentFilter::new(|document| document.path() != "b"));

	assert_eq!(index.query(&documents, "a", View::Query), Some(vec![DocumentId(0)]));
	assert_eq!(index.query(&documents, "b", View::Query), Some(vec![]));
	assert_eq!(index.query(&documents, "b", View::Process), Some(vec![DocumentId(1)]));
	assert_eq!(index.query(&documents, "zzz", View::Query), None);
}

#[test]
fn changing_a_filter_returns_a_fresh_view() {
	let documents = set([doc("a", "")]);
	let index = ReferenceIndex::new(&documents);
	assert_eq!(index.query(&documents, "a", View::Query), Some(vec![DocumentId(0)]));

	let filtered = index.with_query_filter(DocumentFilter::new(|_| false));
	assert_eq!(filtered.query(&documents, "a", View::Query), Some(vec![]));
	assert_eq!(index.query(&documents, "a", View::Query), Some(vec![DocumentId(0)]));
}

#[test]
fn resolve_finds_siblings_and_extension_paths() {
	let documents = set([
		doc("com.example.Foo", ""),
		doc("com.example.Foo.bar", ""),
		doc("com.example.Foo.baz", ""),
		doc("com.example.greet", "").with_extension_path("com.example.Foo.greet"),
	]);
	let index = ReferenceIndex::new(&documents);
	let baz = &documents[2];

	assert_eq!(index.resolve(&documents, baz, "bar", &|_| true), Some(DocumentId(1)));
	assert_eq!(index.resolve(&documents, baz, "greet", &|_| true), Some(DocumentId(3)));
	assert_eq!(index.resolve(&documents, baz, "missing", &|_| true), None);
}

#[test]
fn resolve_walks_the_receiver_type_closure() {
	let documents = set([
		doc("com.example.Base", ""),
		doc("com.example.Base.greet", "Greets."),
		doc("com.example.Derived", "").with_supertype("com.example.Base"),
		doc("com.example.usage", ""),
	]);
	let index = ReferenceIndex::new(&documents);

	assert_eq!(index.type_closure(&documents, DocumentId(2)), vec![DocumentId(2), DocumentId(0)]);
	assert_eq!(
		index.resolve(&documents, &documents[3], "Derived.greet", &|_| true),
		Some(DocumentId(1))
	);
}

#[test]
fn resolve_skips_documents_rejected_by_the_extra_filter() {
	let documents = set([doc("a.b", ""), doc("a.b", ""), doc("a.c", "")]);
	let index = ReferenceIndex::new(&documents);
	let found = index.resolve(&documents, &documents[2], "b", &|document| document.id() != DocumentId(0));

	assert_eq!(found, Some(DocumentId(1)));
}

#[test]
fn include_scenario_single() -> KodexResult<()> {
	let mut documents = set([
		doc("helloWorld", "Hello World!"),
		doc("helloWorld2", "@include [helloWorld]"),
	]);
	let report = expand(&mut documents)?;

	assert_eq!(content_of(&documents, "helloWorld2"), "Hello World!");
	assert!(documents[1].is_modified());
	assert!(!documents[0].is_modified());
	insta::assert_debug_snapshot!(report, @r#"
	ExpansionReport {
	    stages: [
	        StageReport {
	            processor: "include",
	            passes: 1,
	        },
	        StageReport {
	            processor: "includeFile",
	            passes: 0,
	        },
	        StageReport {
	            processor: "arg",
	            passes: 0,
	        },
	        StageReport {
	            processor: "comment",
	            passes: 0,
	        },
	        StageReport {
	            processor: "sample",
	            passes: 0,
	        },
	        StageReport {
	            processor: "removeEscapeChars",
	            passes: 1,
	        },
	    ],
	    modified: [
	        DocumentId(
	            1,
	        ),
	    ],
	    warnings: [],
	}
	"#);

	Ok(())
}

#[test]
fn include_scenario_transitive() -> KodexResult<()> {
	let mut documents = hello_world_chain();
	let report = expand(&mut documents)?;

	for path in ["helloWorld", "helloWorld2", "helloWorld3"] {
		assert_eq!(content_of(&documents, path), "Hello World!");
	}
	assert_eq!(report.stages[0], StageReport {
		processor: "include".to_string(),
		passes: 1,
	});

	Ok(())
}

#[test]
fn include_scenario_self_reference() {
	let mut documents = set([doc("A", "@include [A]")]);
	let error = expand(&mut documents).unwrap_err();

	let KodexError::Processor(failure) = &error else {
		panic!("expected a processor failure, got {error:?}");
	};
	assert_eq!(failure.processor, "include");
	assert_eq!(failure.document, DocumentId(0));
	assert_eq!(failure.range, 0..12);
	assert_eq!(failure.cause, TagError::SelfReference {
		target: "A".to_string(),
	});
	assert_eq!(
		error.to_string(),
		"`include` could not expand `@include` in `A`: `A` refers to the document itself"
	);
	assert_eq!(content_of(&documents, "A"), "@include [A]");
}

#[test]
fn include_scenario_circular() {
	let mut documents = set([doc("A", "@include [B]"), doc("B", "@include [A]")]);
	let error = expand(&mut documents).unwrap_err();

	assert!(
		matches!(&error, KodexError::CircularInclude { documents } if documents == &["A", "B"]),
		"{error:?}"
	);
	assert_eq!(error.to_string(), "circular @include detected between: A, B");
}

#[test]
fn include_unresolved_lists_candidates() {
	let mut documents = set([doc("A", "@include [Missing]")]);
	let error = expand(&mut documents).unwrap_err();

	let KodexError::Processor(failure) = error else {
		panic!("expected a processor failure");
	};
	assert_eq!(failure.cause, TagError::UnresolvedReference {
		target: "Missing".to_string(),
		attempted: vec!["A.Missing".to_string(), "Missing".to_string()],
		filtered: vec![],
	});
	assert_eq!(
		failure.cause.to_string(),
		"could not resolve `Missing`; attempted: A.Missing, Missing"
	);
}

#[rstest]
#[case::trailing_text("@include [helloWorld] and more", "Hello World! and more")]
#[case::inline("Say: {@include [helloWorld]}", "Say: Hello World!")]
#[case::link_syntax("{@include {@link helloWorld}}", "Hello World!")]
#[case::escaped("\\@include [helloWorld]", "@include [helloWorld]")]
fn include_forms(#[case] content: &str, #[case] expected: &str) -> KodexResult<()> {
	let mut documents = set([doc("helloWorld", "Hello World!"), doc("usage", content)]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "usage"), expected);

	Ok(())
}

#[test]
fn include_rewrites_links_from_the_included_scope() -> KodexResult<()> {
	let mut documents = set([
		doc("com.example.Bar", "Bar docs."),
		doc("com.example.Foo", "See [Bar]."),
		doc("other.Usage", "@include [com.example.Foo]"),
	]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "other.Usage"), "See [Bar][com.example.Bar].");
	assert_eq!(content_of(&documents, "com.example.Foo"), "See [Bar].");

	Ok(())
}

#[test]
fn failed_runs_leave_documents_untouched() {
	let mut documents = set([
		doc("X", "Text"),
		doc("Y", "@include [X]"),
		doc("Z", "@include [Missing]"),
	]);
	let before = documents.clone();

	assert!(expand(&mut documents).is_err());
	assert_eq!(documents, before);
}

#[test]
fn process_filter_limits_rewriting() -> KodexResult<()> {
	let mut documents = set([
		doc("helloWorld", "Hello World!"),
		doc("internal.copy", "@include [helloWorld]"),
		doc("public.copy", "@include [helloWorld]"),
	]);
	let config = KodexConfig {
		filter: FilterConfig {
			include: vec![],
			exclude: vec!["internal.*".to_string()],
		},
		..KodexConfig::default()
	};
	let report = expand_documents(&mut documents, &config)?;

	assert_eq!(content_of(&documents, "internal.copy"), "@include [helloWorld]");
	assert_eq!(content_of(&documents, "public.copy"), "Hello World!");
	assert_eq!(report.modified, vec![DocumentId(2)]);

	Ok(())
}

#[test]
fn expansion_is_idempotent() -> KodexResult<()> {
	let mut documents = set([
		doc("helloWorld", "Hello World!"),
		doc("helloWorld2", "@include [helloWorld]"),
		doc("args", "{@setArg a 1}A is {@getArg a}. {@comment gone}"),
	]);

	expand(&mut documents)?;
	let expanded = documents.clone();
	expand(&mut documents)?;

	assert_eq!(documents, expanded);
	assert_eq!(content_of(&documents, "args"), "A is 1. ");

	Ok(())
}

#[rstest]
#[case::inline_set("{@setArg name World}Hello {@getArg name}!", "Hello World!")]
#[case::block_set("Hello {@getArg name}!\n@setArg name World", "Hello World!\n")]
#[case::short_aliases("{@set name World}Hello {@get name}!", "Hello World!")]
#[case::deprecated_aliases("Hello {@includeArg name}\n@arg name World", "Hello World\n")]
#[case::block_get("Hello\n@getArg name and more\n@setArg name World", "Hello\nWorld and more\n")]
#[case::last_value_wins("{@setArg a 1}{@setArg a 2}{@getArg a}", "2")]
fn arguments(#[case] content: &str, #[case] expected: &str) -> KodexResult<()> {
	let mut documents = set([doc("doc", content)]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "doc"), expected);

	Ok(())
}

#[test]
fn arguments_are_scoped_per_document() -> KodexResult<()> {
	let mut documents = set([
		doc("a", "{@setArg name A}{@getArg name}"),
		doc("b", "{@setArg name B}{@getArg name}"),
	]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "a"), "A");
	assert_eq!(content_of(&documents, "b"), "B");

	Ok(())
}

#[test]
fn included_arguments_take_the_including_documents_values() -> KodexResult<()> {
	let mut documents = set([
		doc("template", "Hello {@getArg name}!"),
		doc("usage", "@include [template]\n@setArg name World"),
	]);
	let report = expand(&mut documents)?;

	assert_eq!(content_of(&documents, "usage"), "Hello World!\n");
	// The template itself never receives a value.
	assert_eq!(content_of(&documents, "template"), "Hello {@getArg name}!");
	assert_eq!(report.warnings.len(), 1);

	Ok(())
}

#[test]
#[traced_test]
fn unresolved_arguments_warn() -> KodexResult<()> {
	let mut documents = set([doc("doc", "Hi {@getArg missing}")]);
	let report = expand(&mut documents)?;

	assert_eq!(content_of(&documents, "doc"), "Hi {@getArg missing}");
	assert_eq!(report.warnings, vec![ExpansionWarning::UnresolvedArgument {
		key: "missing".to_string(),
		document: DocumentId(0),
		path: "doc".to_string(),
		line: 1,
	}]);
	assert!(logs_contain("`missing` has no value for @getArg in `doc` (line 1)"));

	Ok(())
}

#[test]
#[traced_test]
fn unresolved_argument_logging_can_be_disabled() -> KodexResult<()> {
	let mut documents = set([doc("doc", "Hi {@getArg missing}")]);
	let config = KodexConfig {
		log_unresolved_get_arg: false,
		..KodexConfig::default()
	};
	let report = expand_documents(&mut documents, &config)?;

	assert!(report.has_warnings());
	assert!(!logs_contain("has no value"));

	Ok(())
}

#[test]
fn dollar_shorthand_reads_arguments() -> KodexResult<()> {
	let mut documents = set([doc(
		"doc",
		"{@setArg name World}Hello $name and ${name}! Costs \\$5",
	)]);
	let mut config = KodexConfig::default();
	config.arg.dollar_shorthand = true;
	expand_documents(&mut documents, &config)?;

	assert_eq!(content_of(&documents, "doc"), "Hello World and World! Costs $5");

	Ok(())
}

#[rstest]
#[case::fence(
	"{@setArg name World}Hi $name\n```kotlin\nval s = \"$name ${name}\"\n```",
	"Hi World\n```kotlin\nval s = \"$name ${name}\"\n```"
)]
#[case::code_span(
	"{@setArg name World}Hi ${name} and `$name`",
	"Hi World and `$name`"
)]
fn dollar_shorthand_skips_code(#[case] content: &str, #[case] expected: &str) -> KodexResult<()> {
	let mut documents = set([doc("doc", content)]);
	let mut config = KodexConfig::default();
	config.arg.dollar_shorthand = true;
	expand_documents(&mut documents, &config)?;

	assert_eq!(content_of(&documents, "doc"), expected);

	Ok(())
}

#[test]
fn dollar_shorthand_is_off_by_default() -> KodexResult<()> {
	let mut documents = set([doc("doc", "{@setArg name World}Hello $name")]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "doc"), "Hello $name");

	Ok(())
}

#[rstest]
#[case::inline("Before {@comment hidden text} after", "Before  after")]
#[case::nested("A{@comment {@comment x}}B", "AB")]
#[case::block("Text\n@comment hidden\n@return x", "Text\n@return x")]
#[case::block_spanning_lines("Text\n@comment hidden\nstill hidden\n@return x", "Text\n@return x")]
fn comments(#[case] content: &str, #[case] expected: &str) -> KodexResult<()> {
	let mut documents = set([doc("doc", content)]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "doc"), expected);

	Ok(())
}

#[test]
fn sample_copies_the_marked_excerpt() -> KodexResult<()> {
	let mut documents = set([
		doc("com.example.helloWorldSample", "").with_source(SAMPLE_SOURCE),
		doc("com.example.usage", "@sample [helloWorldSample]"),
	]);
	expand(&mut documents)?;

	insta::assert_snapshot!(content_of(&documents, "com.example.usage"), @r#"
	```kotlin
	println("Hello World!")
	```
	"#);

	Ok(())
}

#[test]
fn sample_no_comments_strips_doc_comments() -> KodexResult<()> {
	let source = "/**\n * Doc.\n */\nfun foo() {\n    bar()\n}";
	let mut documents = set([
		doc("foo", "").with_source(source),
		doc("usage", "@sampleNoComments [foo]"),
	]);
	expand(&mut documents)?;

	assert_eq!(
		content_of(&documents, "usage"),
		"```kotlin\nfun foo() {\n    bar()\n}\n```"
	);

	Ok(())
}

#[test]
fn sample_in_java_uses_escaped_pre() -> KodexResult<()> {
	let mut documents = set([
		doc("Foo.check", "").with_source("if (a < b) {}"),
		doc("Foo.usage", "{@sample [check]}").with_language(Language::Java),
	]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "Foo.usage"), "<pre>\nif (a &lt; b) {}\n</pre>");

	Ok(())
}

#[test]
fn sample_without_source_fails() {
	let mut documents = set([doc("foo", ""), doc("usage", "@sample [foo]")]);
	let error = expand(&mut documents).unwrap_err();

	assert!(matches!(
		error,
		KodexError::Processor(ProcessorFailure {
			cause: TagError::MissingSource { .. },
			..
		})
	));
}

#[test]
fn include_file_inlines_escaped_text() -> KodexResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let src = tmp.path().join("src");
	std::fs::create_dir_all(src.join("folder"))?;
	std::fs::write(src.join("snippet.txt"), "Hello from a file */ end\n")?;

	let mut documents = set([doc("usage", "@includeFile (snippet.txt)").with_file(src.join("Foo.kt"))]);
	expand(&mut documents)?;

	assert_eq!(content_of(&documents, "usage"), "Hello from a file *&#47; end");

	Ok(())
}

#[rstest]
#[case::missing("@includeFile (nope.txt)", true, "FileNotFound")]
#[case::directory("@includeFile (folder)", true, "NotAFile")]
#[case::no_file_handle("@includeFile (snippet.txt)", false, "MissingFileHandle")]
fn include_file_errors(#[case] content: &str, #[case] with_file: bool, #[case] expected: &str) {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	std::fs::create_dir_all(tmp.path().join("folder")).unwrap_or_else(|e| panic!("mkdir: {e}"));

	let mut document = doc("usage", content);
	if with_file {
		document = document.with_file(tmp.path().join("Foo.kt"));
	}
	let mut documents = set([document]);

	let Err(KodexError::Processor(failure)) = expand(&mut documents) else {
		panic!("expected a processor failure");
	};
	assert!(format!("{:?}", failure.cause).starts_with(expected), "{:?}", failure.cause);
}

#[test]
fn parallel_and_sequential_runs_agree() -> KodexResult<()> {
	let build = || {
		set((0..32).map(|index| {
			doc(
				&format!("doc{index}"),
				&format!("{{@setArg n {index}}}Number {{@getArg n}}{{@comment x}}\n@comment trailing"),
			)
		}))
	};

	let mut parallel = build();
	let mut sequential = build();
	expand(&mut parallel)?;
	expand_sequentially(&mut sequential)?;

	assert_eq!(parallel, sequential);
	assert_eq!(content_of(&parallel, "doc7"), "Number 7\n");

	Ok(())
}

/// Defers inline tags and rewrites block tags into a longer copy of
/// themselves.
struct Echo;

impl TagProcessor for Echo {
	fn name(&self) -> &str {
		"echo"
	}

	fn supports(&self, tag: &str) -> bool {
		tag == "echo"
	}

	fn expand_inline(
		&self,
		occurrence: &TagOccurrence<'_>,
		_document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		Ok(occurrence.text.to_string())
	}

	fn expand_block(
		&self,
		occurrence: &TagOccurrence<'_>,
		_document: &Document,
		_context: &ProcessContext<'_>,
	) -> Result<String, TagError> {
		Ok(format!("{} !", occurrence.text))
	}
}

#[test]
fn process_limit_stops_self_reproducing_tags() {
	let mut documents = set([doc("doc", "@echo")]);
	let expander = Expander::builder()
		.processor(Box::new(Echo))
		.options(options(5))
		.build();
	let error = expand_with(&mut documents, expander).unwrap_err();

	assert!(
		matches!(
			&error,
			KodexError::ProcessLimitExceeded { processor, limit: 5, documents }
				if processor == "echo" && documents == &["doc"]
		),
		"{error:?}"
	);
}

#[rstest]
#[case::comments(
	Box::new(CommentProcessor) as Box<dyn TagProcessor>,
	"{@comment a}{@comment b}{@comment c}{@comment d}",
	""
)]
#[case::unresolved_arguments(
	Box::new(ArgProcessor::new(false)) as Box<dyn TagProcessor>,
	"{@getArg a} {@getArg b} {@getArg c} {@getArg d}",
	"{@getArg a} {@getArg b} {@getArg c} {@getArg d}"
)]
fn process_limit_counts_passes_not_tags(
	#[case] processor: Box<dyn TagProcessor>,
	#[case] content: &str,
	#[case] expected: &str,
) -> KodexResult<()> {
	let mut documents = set([doc("doc", content)]);
	let expander = Expander::builder()
		.processor(processor)
		.options(options(3))
		.build();
	let report = expand_with(&mut documents, expander)?;

	assert_eq!(content_of(&documents, "doc"), expected);
	assert!(report.passes() <= 3, "{report:?}");

	Ok(())
}

#[test]
fn stalled_custom_processors_report_no_progress() {
	let mut documents = set([doc("doc", "{@echo}")]);
	let expander = Expander::builder().processor(Box::new(Echo)).build();
	let error = expand_with(&mut documents, expander).unwrap_err();

	assert!(
		matches!(&error, KodexError::NoProgress { processor, documents } if processor == "echo" && documents == &["doc"]),
		"{error:?}"
	);
}

#[test]
fn dependency_graph_orders_include_chains() {
	let documents = hello_world_chain();
	let index = ReferenceIndex::new(&documents);
	let ids: Vec<DocumentId> = documents.ids().collect();
	let graph = DependencyGraph::build(&documents, &index, &ids);

	assert_eq!(graph.edges().collect::<Vec<_>>(), vec![
		(DocumentId(1), DocumentId(0)),
		(DocumentId(2), DocumentId(1)),
	]);
	assert_eq!(
		graph.topological_order(),
		Some(vec![DocumentId(2), DocumentId(1), DocumentId(0)])
	);
}

#[test]
fn dependency_order_falls_back_on_cycles() {
	let documents = set([doc("A", "@include [B]"), doc("B", "@include [A]")]);
	let index = ReferenceIndex::new(&documents);
	let ids: Vec<DocumentId> = documents.ids().collect();

	assert_eq!(DependencyGraph::build(&documents, &index, &ids).topological_order(), None);
	assert_eq!(dependency_order(&documents, &index, &ids), ids);
}

#[test]
fn include_references_cover_block_and_inline_tags() {
	assert_eq!(include_references("@include [A] x\n{@include [B]}"), vec!["B", "A"]);
}

#[test]
fn registry_follows_config_order() -> KodexResult<()> {
	let registry = ProcessorRegistry::from_config(&KodexConfig::default())?;

	assert_eq!(registry.names(), DEFAULT_PROCESSORS.to_vec());
	assert_eq!(registry.find("getArg").map(|processor| processor.name()), Some("arg"));
	assert_eq!(
		registry.find("sampleNoComments").map(|processor| processor.name()),
		Some("sample")
	);
	assert!(registry.find("unknown").is_none());

	Ok(())
}

#[test]
fn unknown_processors_are_rejected() {
	let config = KodexConfig {
		processors: vec!["include".to_string(), "nope".to_string()],
		..KodexConfig::default()
	};
	let result = Expander::from_config(&config);

	assert!(matches!(result, Err(KodexError::UnknownProcessor(name)) if name == "nope"));
}

#[test]
fn config_parses_every_section() -> KodexResult<()> {
	let config = KodexConfig::parse(
		r#"
process_limit = 5
parallel = false
processors = ["comment"]

[filter]
exclude = ["internal.*"]

[arg]
dollar_shorthand = true

[sample]
start_marker = "Begin"
"#,
	)?;

	assert_eq!(config.process_limit, 5);
	assert!(!config.parallel);
	assert!(config.log_unresolved_get_arg);
	assert_eq!(config.processors, vec!["comment"]);
	assert_eq!(config.filter.exclude, vec!["internal.*"]);
	assert!(config.arg.dollar_shorthand);
	assert_eq!(config.sample.start_marker, "Begin");
	assert_eq!(config.sample.end_marker, "SampleEnd");

	Ok(())
}

#[test]
fn config_defaults_when_empty() -> KodexResult<()> {
	assert_eq!(KodexConfig::parse("")?, KodexConfig::default());
	Ok(())
}

#[test]
fn config_reports_parse_errors() {
	let result = KodexConfig::parse("process_limit = \"many\"");
	assert!(matches!(result, Err(KodexError::ConfigParse(_))));
}

#[rstest]
#[case::primary("kodex.toml")]
#[case::hidden(".kodex.toml")]
#[case::config_dir(".config/kodex.toml")]
fn config_is_discovered(#[case] candidate: &str) -> KodexResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let path = tmp.path().join(candidate);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(&path, "process_limit = 7\n")?;

	let config = KodexConfig::load(tmp.path())?;
	assert_eq!(config.map(|config| config.process_limit), Some(7));

	Ok(())
}

#[test]
fn config_missing_is_none() -> KodexResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	assert_eq!(KodexConfig::load(tmp.path())?, None);
	Ok(())
}

#[test]
fn invalid_filter_patterns_are_reported() {
	let config = KodexConfig {
		filter: FilterConfig {
			include: vec!["[abc".to_string()],
			exclude: vec![],
		},
		..KodexConfig::default()
	};

	assert!(matches!(
		config.process_filter(),
		Err(KodexError::InvalidFilterPattern { pattern, .. }) if pattern == "[abc"
	));
}
