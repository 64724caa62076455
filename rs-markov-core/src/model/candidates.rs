use serde::Serialize;

use super::random::RandomSource;

/// A word observed after a context, with the number of times it was seen.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct WordFrequency {
	pub word: String,
	pub frequency: usize,
}

/// All the words ever observed following one context.
///
/// A `CandidateSet` is a node of the Markov chain: its entries are the
/// outgoing edges, weighted by how many times each one was observed.
///
/// ## Responsibilities:
/// - Accumulate observations during training
/// - Pick the next word using frequency-weighted sampling
/// - Answer frequency lookups for a single word
///
/// ## Invariants
/// - `total` is the sum of every entry's `frequency`
/// - A word appears at most once in `entries`
/// - Every frequency is strictly positive
/// - Entries keep their first-observation order
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateSet {
	entries: Vec<WordFrequency>,
	total: usize,
}

impl CandidateSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one observation of `word`.
	///
	/// - If the word is already present, its frequency is increased.
	/// - Otherwise, it is appended with a frequency of 1.
	pub fn record(&mut self, word: &str) {
		self.total += 1;

		if let Some(entry) = self.entries.iter_mut().find(|entry| entry.word == word) {
			entry.frequency += 1;
			return;
		}

		self.entries.push(WordFrequency { word: word.to_owned(), frequency: 1 });
	}

	/// Picks a word with a probability proportional to its frequency.
	///
	/// Draws `r` in `[0, total)` from `random`, then walks the entries in
	/// insertion order and returns the first one whose cumulative frequency
	/// exceeds `r`.
	///
	/// Returns `None` if the set is empty, in which case `random` is not
	/// called. Also returns `None` if the walk never crosses `r`, which
	/// only happens when `total` and the frequencies disagree.
	pub fn sample(&self, random: &RandomSource) -> Option<String> {
		if self.total == 0 {
			return None;
		}

		let r = random(self.total);

		let mut cumulative = 0;
		for entry in &self.entries {
			cumulative += entry.frequency;
			if cumulative > r {
				return Some(entry.word.clone());
			}
		}

		None
	}

	/// Returns a copy of the entry for `word`, if it was ever observed.
	pub fn lookup(&self, word: &str) -> Option<WordFrequency> {
		self.entries.iter().find(|entry| entry.word == word).cloned()
	}

	/// Number of observations recorded so far.
	pub fn total(&self) -> usize {
		self.total
	}

	/// Entries in first-observation order.
	pub fn entries(&self) -> &[WordFrequency] {
		&self.entries
	}

	/// Number of distinct words.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
