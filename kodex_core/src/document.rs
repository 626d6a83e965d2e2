use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use derive_more::Deref;
use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

use crate::KodexError;
use crate::KodexResult;
use crate::tokenizer::tags_found_in;

/// Stable identity of a document within a [`DocumentSet`]. Paths may be
/// shared between overloads, identities never are.
#[derive(
	Debug,
	Clone,
	Copy,
	Default,
	Display,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize
)]
#[display("#{_0}")]
pub struct DocumentId(pub usize);

/// The source dialect a document was written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Language {
	#[default]
	Kotlin,
	Java,
}

impl Language {
	/// The info string used for fenced code blocks.
	pub fn code_label(self) -> &'static str {
		match self {
			Self::Kotlin => "kotlin",
			Self::Java => "java",
		}
	}

	/// Whether references may name extension members through their receiver.
	pub fn supports_extensions(self) -> bool {
		matches!(self, Self::Kotlin)
	}

	/// Whether `segment` is a synthetic file-level container (`UtilsKt`)
	/// that references from this dialect may omit.
	pub fn is_synthetic_container(self, segment: &str) -> bool {
		match self {
			Self::Java => {
				segment.len() > 2
					&& segment.ends_with("Kt")
					&& segment.starts_with(char::is_uppercase)
			}
			Self::Kotlin => false,
		}
	}
}

/// An import visible from a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
	/// Fully qualified imported path, without a trailing `.*`.
	pub path: String,
	/// `true` for `import foo.bar.*`.
	#[serde(default)]
	pub wildcard: bool,
	/// `import foo.Bar as Baz` stores `Baz`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub alias: Option<String>,
}

impl Import {
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			wildcard: false,
			alias: None,
		}
	}

	pub fn wildcard(path: impl Into<String>) -> Self {
		Self {
			wildcard: true,
			..Self::new(path)
		}
	}

	pub fn aliased(path: impl Into<String>, alias: impl Into<String>) -> Self {
		Self {
			alias: Some(alias.into()),
			..Self::new(path)
		}
	}

	/// The identifier this import introduces into scope.
	pub fn imported_name(&self) -> &str {
		self.alias
			.as_deref()
			.unwrap_or_else(|| self.path.rsplit('.').next().unwrap_or(&self.path))
	}
}

/// A documentation unit attached to one declaration.
///
/// Only `content`, `tags` and `modified` change during a run, and they only
/// change together through [`Document::set_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
	id: DocumentId,
	path: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	extension_path: Option<String>,
	language: Language,
	#[serde(skip)]
	imports: Vec<Import>,
	#[serde(skip)]
	supertypes: Vec<String>,
	#[serde(skip)]
	source: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	file: Option<PathBuf>,
	#[serde(skip)]
	original: String,
	content: String,
	tags: BTreeSet<String>,
	modified: bool,
}

impl Document {
	pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
		let content = content.into();

		Self {
			id: DocumentId::default(),
			path: path.into(),
			extension_path: None,
			language: Language::default(),
			imports: Vec::new(),
			supertypes: Vec::new(),
			source: None,
			file: None,
			tags: tags_found_in(&content),
			original: content.clone(),
			content,
			modified: false,
		}
	}

	#[must_use]
	pub fn with_extension_path(mut self, extension_path: impl Into<String>) -> Self {
		self.extension_path = Some(extension_path.into());
		self
	}

	#[must_use]
	pub fn with_language(mut self, language: Language) -> Self {
		self.language = language;
		self
	}

	#[must_use]
	pub fn with_import(mut self, import: Import) -> Self {
		self.imports.push(import);
		self
	}

	#[must_use]
	pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
		self.supertypes.push(supertype.into());
		self
	}

	#[must_use]
	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		self.source = Some(source.into());
		self
	}

	#[must_use]
	pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
		self.file = Some(file.into());
		self
	}

	pub fn id(&self) -> DocumentId {
		self.id
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn extension_path(&self) -> Option<&str> {
		self.extension_path.as_deref()
	}

	pub fn language(&self) -> Language {
		self.language
	}

	pub fn imports(&self) -> &[Import] {
		&self.imports
	}

	pub fn supertypes(&self) -> &[String] {
		&self.supertypes
	}

	/// Raw source of the declaration, used by `@sample`.
	pub fn source(&self) -> Option<&str> {
		self.source.as_deref()
	}

	/// The file the declaration lives in, used to resolve `@includeFile`.
	pub fn file(&self) -> Option<&Path> {
		self.file.as_deref()
	}

	pub fn original(&self) -> &str {
		&self.original
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn tags(&self) -> &BTreeSet<String> {
		&self.tags
	}

	pub fn has_tag(&self, predicate: impl Fn(&str) -> bool) -> bool {
		self.tags.iter().any(|tag| predicate(tag))
	}

	pub fn is_modified(&self) -> bool {
		self.modified
	}

	/// Replace the content, recomputing the tag set and the modified flag.
	pub fn set_content(&mut self, content: impl Into<String>) {
		self.content = content.into();
		self.tags = tags_found_in(&self.content);
		self.modified = self.content != self.original;
	}

	/// An independent copy for callers that need an immutable view.
	pub fn snapshot(&self) -> Self {
		self.clone()
	}
}

/// The serialized form of a document as supplied by the external symbol
/// model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
	pub path: String,
	#[serde(default)]
	pub extension_path: Option<String>,
	#[serde(default)]
	pub language: Language,
	#[serde(default)]
	pub imports: Vec<Import>,
	#[serde(default)]
	pub supertypes: Vec<String>,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub file: Option<PathBuf>,
	#[serde(default)]
	pub content: String,
}

impl From<DocumentInput> for Document {
	fn from(input: DocumentInput) -> Self {
		let DocumentInput {
			path,
			extension_path,
			language,
			imports,
			supertypes,
			source,
			file,
			content,
		} = input;

		Self {
			extension_path,
			language,
			imports,
			supertypes,
			source,
			file,
			..Self::new(path, content)
		}
	}
}

/// Arena of every document taking part in a run. A document's
/// [`DocumentId`] is its index in the arena.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Serialize)]
#[serde(transparent)]
pub struct DocumentSet(Vec<Document>);

impl DocumentSet {
	pub fn new(documents: impl IntoIterator<Item = Document>) -> Self {
		let mut set = Self::default();
		for document in documents {
			set.push(document);
		}
		set
	}

	/// Add a document, assigning its identity.
	pub fn push(&mut self, mut document: Document) -> DocumentId {
		let id = DocumentId(self.0.len());
		document.id = id;
		self.0.push(document);
		id
	}

	pub fn get(&self, id: DocumentId) -> Option<&Document> {
		self.0.get(id.0)
	}

	pub fn get_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
		self.0.get_mut(id.0)
	}

	pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
		self.0.iter().map(Document::id)
	}

	/// Identities of documents whose content diverges from the original.
	pub fn modified(&self) -> Vec<DocumentId> {
		self.0
			.iter()
			.filter(|document| document.is_modified())
			.map(Document::id)
			.collect()
	}

	/// First document registered under `path`.
	pub fn find_by_path(&self, path: &str) -> Option<&Document> {
		self.0.iter().find(|document| document.path() == path)
	}

	/// Load a document set from a JSON or YAML file holding a list of
	/// [`DocumentInput`] entries.
	pub fn load(path: &Path) -> KodexResult<Self> {
		let extension = path
			.extension()
			.and_then(|extension| extension.to_str())
			.unwrap_or_default();
		let content = std::fs::read_to_string(path)?;

		Self::parse(&content, extension).map_err(|error| {
			match error {
				KodexError::DocumentSet { reason, .. } => {
					KodexError::DocumentSet {
						path: path.display().to_string(),
						reason,
					}
				}
				other => other,
			}
		})
	}

	/// Parse a document set from text in the given format (`json`, `yaml`
	/// or `yml`).
	pub fn parse(content: &str, format: &str) -> KodexResult<Self> {
		let inputs: Vec<DocumentInput> = match format {
			"json" => {
				serde_json::from_str(content).map_err(|e| {
					KodexError::DocumentSet {
						path: String::new(),
						reason: e.to_string(),
					}
				})?
			}
			"yaml" | "yml" => {
				serde_yaml_ng::from_str(content).map_err(|e| {
					KodexError::DocumentSet {
						path: String::new(),
						reason: e.to_string(),
					}
				})?
			}
			other => return Err(KodexError::UnsupportedFormat(other.to_string())),
		};

		Ok(Self::new(inputs.into_iter().map(Document::from)))
	}
}
