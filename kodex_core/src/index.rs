use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;

use crate::Document;
use crate::DocumentId;
use crate::DocumentSet;

type Predicate = dyn Fn(&Document) -> bool + Send + Sync;

/// A pure predicate over documents. Filters compose by logical AND and
/// default to accepting everything.
#[derive(Clone, Default)]
pub struct DocumentFilter {
	predicates: Vec<Arc<Predicate>>,
}

impl DocumentFilter {
	pub fn accept_all() -> Self {
		Self::default()
	}

	pub fn new(predicate: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
		Self {
			predicates: vec![Arc::new(predicate)],
		}
	}

	/// Both `self` and `other` must accept.
	#[must_use]
	pub fn and(mut self, other: Self) -> Self {
		self.predicates.extend(other.predicates);
		self
	}

	pub fn accepts(&self, document: &Document) -> bool {
		self.predicates.iter().all(|predicate| predicate(document))
	}
}

impl fmt::Debug for DocumentFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DocumentFilter")
			.field("predicates", &self.predicates.len())
			.finish()
	}
}

/// Which filtered projection of the document collection a query runs
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
	/// Documents that references may resolve to.
	Query,
	/// Documents that are eligible for rewriting.
	Process,
}

/// Maps fully qualified paths to the documents declared under them.
///
/// The path table is shared between views. Changing a filter returns a new
/// index with its own empty caches.
pub struct ReferenceIndex {
	paths: Arc<HashMap<String, Vec<DocumentId>>>,
	query_filter: DocumentFilter,
	process_filter: DocumentFilter,
	cache: RwLock<HashMap<(String, View), Option<Vec<DocumentId>>>>,
	type_closures: RwLock<HashMap<DocumentId, Vec<DocumentId>>>,
}

impl fmt::Debug for ReferenceIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReferenceIndex")
			.field("paths", &self.paths.len())
			.field("query_filter", &self.query_filter)
			.field("process_filter", &self.process_filter)
			.finish_non_exhaustive()
	}
}

impl ReferenceIndex {
	/// Index every document under its path and, when present, its extension
	/// path.
	pub fn new(documents: &DocumentSet) -> Self {
		let mut paths: HashMap<String, Vec<DocumentId>> = HashMap::new();

		for document in documents.iter() {
			paths
				.entry(document.path().to_string())
				.or_default()
				.push(document.id());

			if let Some(extension_path) = document.extension_path() {
				paths
					.entry(extension_path.to_string())
					.or_default()
					.push(document.id());
			}
		}

		Self::from_parts(
			Arc::new(paths),
			DocumentFilter::accept_all(),
			DocumentFilter::accept_all(),
		)
	}

	fn from_parts(
		paths: Arc<HashMap<String, Vec<DocumentId>>>,
		query_filter: DocumentFilter,
		process_filter: DocumentFilter,
	) -> Self {
		Self {
			paths,
			query_filter,
			process_filter,
			cache: RwLock::default(),
			type_closures: RwLock::default(),
		}
	}

	/// A view whose query filter additionally requires `filter`.
	#[must_use]
	pub fn with_query_filter(&self, filter: DocumentFilter) -> Self {
		Self::from_parts(
			Arc::clone(&self.paths),
			self.query_filter.clone().and(filter),
			self.process_filter.clone(),
		)
	}

	/// A view whose process filter additionally requires `filter`.
	#[must_use]
	pub fn with_process_filter(&self, filter: DocumentFilter) -> Self {
		Self::from_parts(
			Arc::clone(&self.paths),
			self.query_filter.clone(),
			self.process_filter.clone().and(filter),
		)
	}

	fn filter(&self, view: View) -> &DocumentFilter {
		match view {
			View::Query => &self.query_filter,
			View::Process => &self.process_filter,
		}
	}

	/// Whether `document` may be rewritten in this run.
	pub fn is_processable(&self, document: &Document) -> bool {
		self.process_filter.accepts(document)
	}

	/// Documents registered under `path` that pass the view's filter.
	///
	/// `None` means the path is unknown. `Some(empty)` means the path exists
	/// but every document under it is filtered out.
	pub fn query(&self, documents: &DocumentSet, path: &str, view: View) -> Option<Vec<DocumentId>> {
		let key = (path.to_string(), view);

		if let Some(hit) = self.cache.read().ok().and_then(|cache| cache.get(&key).cloned()) {
			return hit;
		}

		let filter = self.filter(view);
		let result = self.paths.get(path).map(|ids| {
			ids.iter()
				.copied()
				.filter(|id| documents.get(*id).is_some_and(|document| filter.accepts(document)))
				.collect::<Vec<_>>()
		});

		if let Ok(mut cache) = self.cache.write() {
			cache.insert(key, result.clone());
		}

		result
	}

	/// Every fully qualified path `target` may refer to from `from`, most
	/// specific first.
	pub fn candidate_paths(&self, from: &Document, target: &str) -> Vec<String> {
		let target = target.trim_start_matches('.');
		let mut candidates = Vec::new();

		for base in std::iter::once(from.path()).chain(from.extension_path()) {
			let mut scope = base;
			loop {
				candidates.push(format!("{scope}.{target}"));
				match scope.rsplit_once('.') {
					Some((parent, _)) => scope = parent,
					None => break,
				}
			}
		}

		for supertype in from.supertypes() {
			candidates.push(format!("{supertype}.{target}"));
		}

		for import in from.imports() {
			if import.wildcard {
				candidates.push(format!("{}.{target}", import.path));
				continue;
			}

			let name = import.imported_name();
			if target == name {
				candidates.push(import.path.clone());
			} else if let Some(member) = target
				.strip_prefix(name)
				.filter(|rest| rest.starts_with('.'))
			{
				candidates.push(format!("{}{member}", import.path));
			}
		}

		candidates.push(target.to_string());

		let language = from.language();
		let stripped: Vec<String> = candidates
			.iter()
			.filter(|candidate| {
				candidate
					.split('.')
					.any(|segment| language.is_synthetic_container(segment))
			})
			.map(|candidate| {
				candidate
					.split('.')
					.filter(|segment| !language.is_synthetic_container(segment))
					.collect::<Vec<_>>()
					.join(".")
			})
			.collect();
		candidates.extend(stripped);

		let mut seen = BTreeSet::new();
		candidates.retain(|candidate| seen.insert(candidate.clone()));
		candidates
	}

	/// Candidate paths that exist but hold nothing visible to the query view.
	pub fn filtered_candidates(&self, documents: &DocumentSet, from: &Document, target: &str) -> Vec<String> {
		self.candidate_paths(from, target)
			.into_iter()
			.filter(|candidate| {
				self.query(documents, candidate, View::Query)
					.is_some_and(|ids| ids.is_empty())
			})
			.collect()
	}

	/// Resolve `target` as written in `from` to a single document.
	///
	/// Candidates are tried in order; the first that yields a document
	/// accepted by `extra_filter` wins. For dialects with extension members,
	/// `Receiver.member` is also looked up as a member of every type in the
	/// receiver's type closure.
	pub fn resolve(
		&self,
		documents: &DocumentSet,
		from: &Document,
		target: &str,
		extra_filter: &dyn Fn(&Document) -> bool,
	) -> Option<DocumentId> {
		let accepted = |id: &DocumentId| documents.get(*id).is_some_and(extra_filter);

		for candidate in self.candidate_paths(from, target) {
			let hit = self
				.query(documents, &candidate, View::Query)
				.and_then(|ids| ids.into_iter().find(accepted));

			if hit.is_some() {
				return hit;
			}
		}

		if !from.language().supports_extensions() {
			return None;
		}

		let (receiver, member) = target.rsplit_once('.')?;
		let receiver_id = self.resolve(documents, from, receiver, &|_| true)?;

		self.type_closure(documents, receiver_id)
			.into_iter()
			.filter_map(|type_id| documents.get(type_id))
			.find_map(|ty| {
				self.query(documents, &format!("{}.{member}", ty.path()), View::Query)
					.and_then(|ids| ids.into_iter().find(accepted))
			})
	}

	/// The document itself followed by all of its supertypes, transitively.
	pub fn type_closure(&self, documents: &DocumentSet, id: DocumentId) -> Vec<DocumentId> {
		if let Some(hit) = self
			.type_closures
			.read()
			.ok()
			.and_then(|closures| closures.get(&id).cloned())
		{
			return hit;
		}

		let mut closure = vec![id];
		let mut seen = BTreeSet::from([id]);
		let mut queue = VecDeque::from([id]);

		while let Some(current) = queue.pop_front() {
			let Some(document) = documents.get(current) else {
				continue;
			};

			for supertype in document.supertypes() {
				for found in self.query(documents, supertype, View::Query).unwrap_or_default() {
					if seen.insert(found) {
						closure.push(found);
						queue.push_back(found);
					}
				}
			}
		}

		if let Ok(mut closures) = self.type_closures.write() {
			closures.insert(id, closure.clone());
		}

		closure
	}
}
