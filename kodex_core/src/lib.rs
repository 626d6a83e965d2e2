//! `kodex_core` expands macro-like tags inside KDoc and Javadoc comments
//! before they are rendered. Documentation written once can be included in
//! other declarations, parameterised with arguments, illustrated with code
//! samples taken from real source, or hidden behind `@comment`.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Document set (path, imports, supertypes, source, doc comment)
//!   → Reference index (fully qualified path → documents, query/process views)
//!   → Stages, in order: include, includeFile, arg, comment, sample, removeEscapeChars
//!       each stage repeats passes until no supported tag is left:
//!         inline phase: expand the deepest `{@tag}` first, rescan, repeat
//!         block phase:  replace every block starting with `@tag`
//!   → Expanded document set + report (passes, modified documents, warnings)
//! ```
//!
//! ## Modules
//!
//! - [`tokenizer`]: Block splitting, inline tag discovery, argument parsing and reference link rewriting.
//! - [`config`]: Configuration loading from `kodex.toml`.
//! - [`graph`]: Include dependency graph used to order the include stage.
//!
//! ## Tags
//!
//! | Tag | Effect |
//! | --- | --- |
//! | `@include [Target]` | Copies the documentation of `Target`. |
//! | `@includeFile (path)` | Copies a file next to the declaration's source. |
//! | `@setArg key value` / `{@getArg key}` | Stores and reads per-document values. |
//! | `@comment` | Removed from the output. |
//! | `@sample [Target]` | Copies the source of `Target` into a code block. |
//!
//! ## Quick Start
//!
//! ```rust
//! use kodex_core::Document;
//! use kodex_core::DocumentSet;
//! use kodex_core::KodexConfig;
//! use kodex_core::expand_documents;
//!
//! let mut documents = DocumentSet::new([
//! 	Document::new("helloWorld", "Hello World!"),
//! 	Document::new("helloWorld2", "@include [helloWorld]"),
//! ]);
//!
//! let report = expand_documents(&mut documents, &KodexConfig::default()).unwrap();
//!
//! assert_eq!(documents[1].content(), "Hello World!");
//! assert_eq!(report.modified.len(), 1);
//! ```

pub use config::*;
pub use document::*;
pub use engine::*;
pub use error::*;
pub use graph::*;
pub use index::*;
pub use processor::*;
pub use processors::*;

pub mod config;
mod document;
mod engine;
#[allow(unused_assignments)]
mod error;
pub mod graph;
mod index;
pub(crate) mod lexer;
mod processor;
mod processors;
pub mod tokenizer;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
