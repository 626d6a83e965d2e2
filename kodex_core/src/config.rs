use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use serde::Deserialize;

use crate::DEFAULT_PROCESSORS;
use crate::DocumentFilter;
use crate::KodexError;
use crate::KodexResult;

/// Passes each stage may take before the run is considered stuck.
pub const DEFAULT_PROCESS_LIMIT: usize = 10_000;
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["kodex.toml", ".kodex.toml", ".config/kodex.toml"];

/// Configuration loaded from a `kodex.toml` file.
///
/// ```toml
/// process_limit = 10000
/// log_unresolved_get_arg = true
/// parallel = true
/// processors = ["include", "includeFile", "arg", "comment", "sample", "removeEscapeChars"]
///
/// [filter]
/// include = ["com.example.**"]
/// exclude = ["com.example.internal.*"]
///
/// [arg]
/// dollar_shorthand = false
///
/// [sample]
/// start_marker = "SampleStart"
/// end_marker = "SampleEnd"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KodexConfig {
	/// Maximum number of passes per stage.
	#[serde(default = "default_process_limit")]
	pub process_limit: usize,
	/// Log `getArg` tags whose key never received a value.
	#[serde(default = "default_true")]
	pub log_unresolved_get_arg: bool,
	/// Expand documents concurrently for stages that allow it.
	#[serde(default = "default_true")]
	pub parallel: bool,
	/// Stage names in the order they run.
	#[serde(default = "default_processors")]
	pub processors: Vec<String>,
	/// Which documents may be rewritten.
	#[serde(default)]
	pub filter: FilterConfig,
	#[serde(default)]
	pub arg: ArgConfig,
	#[serde(default)]
	pub sample: SampleConfig,
}

impl Default for KodexConfig {
	fn default() -> Self {
		Self {
			process_limit: DEFAULT_PROCESS_LIMIT,
			log_unresolved_get_arg: true,
			parallel: true,
			processors: default_processors(),
			filter: FilterConfig::default(),
			arg: ArgConfig::default(),
			sample: SampleConfig::default(),
		}
	}
}

/// Glob patterns over fully qualified document paths. An empty `include`
/// list accepts every path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterConfig {
	#[serde(default)]
	pub include: Vec<String>,
	#[serde(default)]
	pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArgConfig {
	/// Treat `$key` and `${key}` as `{@getArg key}`.
	#[serde(default)]
	pub dollar_shorthand: bool,
}

/// Marker comments delimiting the excerpt copied by `@sample`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleConfig {
	#[serde(default = "default_start_marker")]
	pub start_marker: String,
	#[serde(default = "default_end_marker")]
	pub end_marker: String,
}

impl Default for SampleConfig {
	fn default() -> Self {
		Self {
			start_marker: default_start_marker(),
			end_marker: default_end_marker(),
		}
	}
}

fn default_process_limit() -> usize {
	DEFAULT_PROCESS_LIMIT
}

fn default_true() -> bool {
	true
}

fn default_processors() -> Vec<String> {
	DEFAULT_PROCESSORS.iter().map(ToString::to_string).collect()
}

fn default_start_marker() -> String {
	"SampleStart".to_string()
}

fn default_end_marker() -> String {
	"SampleEnd".to_string()
}

impl KodexConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> KodexResult<Option<KodexConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		Self::parse(&content).map(Some)
	}

	pub fn parse(content: &str) -> KodexResult<KodexConfig> {
		toml::from_str(content).map_err(|e| KodexError::ConfigParse(e.to_string()))
	}

	/// The process-view filter described by `[filter]`.
	pub fn process_filter(&self) -> KodexResult<DocumentFilter> {
		if self.filter.include.is_empty() && self.filter.exclude.is_empty() {
			return Ok(DocumentFilter::accept_all());
		}

		let include = build_glob_set(&self.filter.include)?;
		let exclude = build_glob_set(&self.filter.exclude)?;
		let include_all = self.filter.include.is_empty();

		Ok(DocumentFilter::new(move |document| {
			(include_all || include.is_match(document.path())) && !exclude.is_match(document.path())
		}))
	}
}

/// Build a `GlobSet` from a list of glob pattern strings.
fn build_glob_set(patterns: &[String]) -> KodexResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();

	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			KodexError::InvalidFilterPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| {
		KodexError::InvalidFilterPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}
