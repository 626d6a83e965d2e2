use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::DocumentId;
use crate::DocumentSet;
use crate::INCLUDE;
use crate::ReferenceIndex;
use crate::tokenizer::decode_reference_target;
use crate::tokenizer::find_inline_tag_ranges;
use crate::tokenizer::get_tag_arguments;
use crate::tokenizer::split_into_blocks;

/// "Must be expanded before" edges between documents, derived from their
/// `@include` references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
	nodes: Vec<DocumentId>,
	/// target -> documents that include it
	dependents: BTreeMap<DocumentId, BTreeSet<DocumentId>>,
}

impl DependencyGraph {
	/// Build the graph over `nodes`. References are resolved read-only the
	/// same way `@include` resolves them; unresolvable ones add no edge.
	pub fn build(documents: &DocumentSet, index: &ReferenceIndex, nodes: &[DocumentId]) -> Self {
		let mut graph = Self {
			nodes: nodes.to_vec(),
			dependents: BTreeMap::new(),
		};

		for &id in nodes {
			let Some(document) = documents.get(id) else {
				continue;
			};

			for reference in include_references(document.content()) {
				let target = index.resolve(documents, document, &reference, &|candidate| {
					candidate.id() != id
				});

				if let Some(target) = target {
					graph.add_edge(target, id);
				}
			}
		}

		graph
	}

	pub fn add_edge(&mut self, from: DocumentId, to: DocumentId) {
		self.dependents.entry(from).or_default().insert(to);
	}

	pub fn edges(&self) -> impl Iterator<Item = (DocumentId, DocumentId)> + '_ {
		self.dependents
			.iter()
			.flat_map(|(from, dependents)| dependents.iter().map(move |to| (*from, *to)))
	}

	/// A stable topological order of the nodes: among documents that are
	/// ready, the one listed first goes first. `None` when the graph has a
	/// cycle.
	pub fn topological_order(&self) -> Option<Vec<DocumentId>> {
		let position: BTreeMap<DocumentId, usize> = self
			.nodes
			.iter()
			.enumerate()
			.map(|(index, id)| (*id, index))
			.collect();

		let mut in_degree: BTreeMap<DocumentId, usize> = self.nodes.iter().map(|id| (*id, 0)).collect();
		for (from, to) in self.edges() {
			if position.contains_key(&from) {
				if let Some(degree) = in_degree.get_mut(&to) {
					*degree += 1;
				}
			}
		}

		let mut ready: BinaryHeap<Reverse<(usize, DocumentId)>> = in_degree
			.iter()
			.filter(|(_, degree)| **degree == 0)
			.filter_map(|(id, _)| position.get(id).map(|index| Reverse((*index, *id))))
			.collect();
		let mut order = Vec::with_capacity(self.nodes.len());

		while let Some(Reverse((_, id))) = ready.pop() {
			order.push(id);

			for dependent in self.dependents.get(&id).into_iter().flatten() {
				let Some(degree) = in_degree.get_mut(dependent) else {
					continue;
				};
				*degree -= 1;

				if *degree == 0 {
					if let Some(index) = position.get(dependent) {
						ready.push(Reverse((*index, *dependent)));
					}
				}
			}
		}

		(order.len() == self.nodes.len()).then_some(order)
	}
}

/// Decoded targets of every `@include` in `content`, block and inline.
pub fn include_references(content: &str) -> Vec<String> {
	let inline = find_inline_tag_ranges(content)
		.into_iter()
		.filter(|tag| tag.name == INCLUDE)
		.map(|tag| content[tag.range].to_string());

	let blocks = split_into_blocks(content)
		.into_iter()
		.filter(|block| block.tag_name().as_deref() == Some(INCLUDE))
		.map(|block| block.text);

	inline
		.chain(blocks)
		.filter_map(|text| {
			let target = get_tag_arguments(&text, INCLUDE, 2).into_iter().next()?;
			let reference = decode_reference_target(&target);
			(!reference.is_empty()).then_some(reference)
		})
		.collect()
}

/// Order `ids` so that include targets come before the documents including
/// them. Falls back to the given order when the references form a cycle.
pub fn dependency_order(documents: &DocumentSet, index: &ReferenceIndex, ids: &[DocumentId]) -> Vec<DocumentId> {
	let graph = DependencyGraph::build(documents, index, ids);

	if let Some(order) = graph.topological_order() {
		debug!(documents = order.len(), "computed include dependency order");
		order
	} else {
		debug!(documents = ids.len(), "include references form a cycle, keeping the original order");
		ids.to_vec()
	}
}
