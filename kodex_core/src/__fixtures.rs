use crate::Document;
use crate::DocumentSet;
use crate::ExpandOptions;
use crate::ExpansionReport;
use crate::Expander;
use crate::KodexConfig;
use crate::KodexResult;
use crate::ReferenceIndex;
use crate::expand_documents;

pub fn doc(path: &str, content: &str) -> Document {
	Document::new(path, content)
}

pub fn set(documents: impl IntoIterator<Item = Document>) -> DocumentSet {
	DocumentSet::new(documents)
}

/// Expand with the default configuration.
pub fn expand(documents: &mut DocumentSet) -> KodexResult<ExpansionReport> {
	expand_documents(documents, &KodexConfig::default())
}

/// Expand with the default pipeline on a single thread.
pub fn expand_sequentially(documents: &mut DocumentSet) -> KodexResult<ExpansionReport> {
	let config = KodexConfig {
		parallel: false,
		..KodexConfig::default()
	};
	expand_documents(documents, &config)
}

pub fn expand_with(documents: &mut DocumentSet, expander: Expander) -> KodexResult<ExpansionReport> {
	let index = ReferenceIndex::new(documents);
	expander.run(documents, &index)
}

pub fn options(process_limit: usize) -> ExpandOptions {
	ExpandOptions {
		process_limit,
		..ExpandOptions::default()
	}
}

pub fn content_of<'a>(documents: &'a DocumentSet, path: &str) -> &'a str {
	documents
		.find_by_path(path)
		.map(Document::content)
		.unwrap_or_else(|| panic!("no document at `{path}`"))
}

/// The three `helloWorld` documents used by the include scenarios.
pub fn hello_world_chain() -> DocumentSet {
	set([
		doc("helloWorld3", "@include [helloWorld2]"),
		doc("helloWorld2", "@include [helloWorld]"),
		doc("helloWorld", "Hello World!"),
	])
}

pub const SAMPLE_SOURCE: &str = r#"fun helloWorldSample() {
    /**
     * Not part of the sample.
     */
    val x = 1
    // SampleStart
    println("Hello World!")
    // SampleEnd
}"#;
