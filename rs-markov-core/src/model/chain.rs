use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::{BufReader, Read};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::candidates::CandidateSet;
use super::random::{thread_random_source, RandomSource};
use crate::error::{ChainError, Result};
use crate::io::Tokens;

/// Contexts, their candidates and the generation seeds.
///
/// Kept behind a single lock so that a context and its seed flag are
/// always updated together.
#[derive(Default)]
struct Table {
	/// Mapping from a context (n-1 words joined by a space) to its candidates
	candidates: HashMap<String, CandidateSet>,
	/// Every context, in first-observation order
	contexts: Vec<String>,
	/// Contexts starting with an uppercase ASCII letter, in first-observation order
	seeds: Vec<String>,
}

/// Counters reported at the end of a training call.
#[derive(Default)]
struct TrainStats {
	windows: usize,
	contexts: usize,
	seeds: usize,
}

/// An n-gram Markov chain over words.
///
/// The `Chain` learns which words follow each sequence of `n-1` words and
/// generates text by repeatedly sampling a next word weighted by the
/// observed frequencies.
///
/// # Responsibilities
/// - Slide a window of `n` tokens over a token stream and record each
///   (context, candidate) observation
/// - Flag capitalized contexts as seeds (likely sentence starts)
/// - Generate text, single next words and candidate probabilities
///
/// # Concurrency
/// A `Chain` is shared by reference between threads. Training takes the
/// write lock once per window, so long streams do not starve readers.
/// Queries take the read lock; `generate` keeps it for its whole walk and
/// therefore sees a single consistent table.
///
/// # Invariants
/// - `n` is always >= 2 and never changes
/// - Every key of the table is listed exactly once in the context list
/// - Every seed is a key of the table
pub struct Chain {
	/// The order of the model (number of words in an n-gram)
	n: usize,
	table: RwLock<Table>,
	random: RandomSource,
}

impl Chain {
	/// Creates an empty chain of order `n` drawing from the thread RNG.
	///
	/// # Errors
	/// Returns `ChainError::InvalidArity` if `n < 2`.
	pub fn new(n: usize) -> Result<Self> {
		Self::with_random_source(n, thread_random_source())
	}

	/// Creates an empty chain of order `n` drawing from `random`.
	///
	/// # Errors
	/// Returns `ChainError::InvalidArity` if `n < 2`.
	pub fn with_random_source(n: usize, random: RandomSource) -> Result<Self> {
		if n < 2 {
			return Err(ChainError::InvalidArity { n });
		}
		Ok(Self { n, table: RwLock::new(Table::default()), random })
	}

	/// Order of the model.
	pub fn n(&self) -> usize {
		self.n
	}

	/// Number of distinct contexts learnt so far.
	pub fn len(&self) -> usize {
		self.read().contexts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.read().contexts.is_empty()
	}

	/// Copy of the seed list, in first-observation order.
	pub fn seeds(&self) -> Vec<String> {
		self.read().seeds.clone()
	}

	/// Copy of every known context, in first-observation order.
	pub fn contexts(&self) -> Vec<String> {
		self.read().contexts.clone()
	}

	/// Copy of the candidates observed after `context`.
	pub fn candidates(&self, context: &str) -> Option<CandidateSet> {
		self.read().candidates.get(context).cloned()
	}

	/// Trains the chain on a stream of tokens.
	///
	/// Every window of `n` consecutive tokens is recorded: the first `n-1`
	/// tokens form the context and the last one is the candidate. Streams
	/// shorter than `n` leave the chain untouched.
	///
	/// # Notes
	/// - Tokens are used as-is: no casing, trimming or punctuation handling.
	/// - The lock is taken once per window, not for the whole stream.
	///
	/// # Errors
	/// Returns `ChainError::InvalidToken` on an empty token or one holding
	/// whitespace. Windows seen before it stay recorded.
	pub fn train<I, S>(&self, tokens: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.train_fallible(tokens.into_iter().map(|token| Ok(token.into())))
	}

	/// Trains the chain on the whitespace-delimited words of `reader`.
	///
	/// Windows span line boundaries.
	///
	/// # Errors
	/// Returns `ChainError::Io` if reading fails. Windows seen before the
	/// failure stay recorded.
	pub fn train_reader<R: Read>(&self, reader: R) -> Result<()> {
		let tokens = Tokens::new(BufReader::new(reader)).map(|token| token.map_err(ChainError::from));
		self.train_fallible(tokens)
	}

	/// Records a single window of exactly `n` tokens.
	///
	/// # Errors
	/// Returns `ChainError::Arity` if `window.len() != n`, and
	/// `ChainError::InvalidToken` if a token is empty or holds whitespace.
	pub fn train_window<S: AsRef<str>>(&self, window: &[S]) -> Result<()> {
		self.observe(window, &mut TrainStats::default())
	}

	fn train_fallible<I>(&self, tokens: I) -> Result<()>
	where
		I: Iterator<Item = Result<String>>,
	{
		let mut stats = TrainStats::default();
		let mut window: VecDeque<String> = VecDeque::with_capacity(self.n);

		for token in tokens {
			window.push_back(token?);
			if window.len() < self.n {
				continue;
			}
			self.observe(window.make_contiguous(), &mut stats)?;
			window.pop_front();
		}

		log::debug!(
			"trained {} windows: {} new contexts, {} new seeds",
			stats.windows,
			stats.contexts,
			stats.seeds
		);
		Ok(())
	}

	fn observe<S: AsRef<str>>(&self, window: &[S], stats: &mut TrainStats) -> Result<()> {
		let arity_error = || ChainError::Arity { expected: self.n, got: window.len() };
		if window.len() != self.n {
			return Err(arity_error());
		}
		let (candidate, context) = window.split_last().ok_or_else(arity_error)?;

		// A space inside a token would make two different windows share a key
		if let Some(token) = window
			.iter()
			.map(AsRef::<str>::as_ref)
			.find(|token| token.is_empty() || token.contains(char::is_whitespace))
		{
			return Err(ChainError::InvalidToken(token.to_owned()));
		}

		// Joining with a single space keeps "a bc" and "ab c" apart
		let key = context.iter().map(AsRef::<str>::as_ref).collect::<Vec<&str>>().join(" ");
		let candidate: &str = candidate.as_ref();

		let mut table = self.write();
		stats.windows += 1;

		if let Some(set) = table.candidates.get_mut(&key) {
			set.record(candidate);
			return Ok(());
		}

		let mut set = CandidateSet::new();
		set.record(candidate);
		table.candidates.insert(key.clone(), set);
		stats.contexts += 1;
		log::trace!("new context {key:?}");

		if key.as_bytes().first().is_some_and(u8::is_ascii_uppercase) {
			log::trace!("new seed {key:?}");
			table.seeds.push(key.clone());
			stats.seeds += 1;
		}
		table.contexts.push(key);

		Ok(())
	}

	/// Generates text by walking the chain for at most `max_words` steps.
	///
	/// The walk starts from a random seed, or from any context if no seed
	/// was learnt, and stops early when the current context has no
	/// candidates. A trailing `.` is appended unless the text already
	/// ends with one.
	///
	/// Returns an empty string if the chain is empty.
	pub fn generate(&self, max_words: usize) -> String {
		let table = self.read();
		if table.candidates.is_empty() {
			return String::new();
		}

		let Some(start) = self.pick_start(&table) else {
			return String::new();
		};

		let mut output = start.to_owned();
		let mut context = start.to_owned();

		for _ in 0..max_words {
			let Some(set) = table.candidates.get(&context) else {
				break;
			};
			let Some(candidate) = set.sample(&self.random) else {
				break;
			};

			output.push(' ');
			output.push_str(&candidate);
			context = Self::advance(&context, &candidate);
		}

		if !output.ends_with('.') {
			output.push('.');
		}

		output
	}

	/// Samples one word following `context`.
	///
	/// Returns `None` if the context was never observed.
	pub fn next_candidate(&self, context: &str) -> Option<String> {
		self.read().candidates.get(context)?.sample(&self.random)
	}

	/// Probability that `word` follows `context`, as `frequency / total`.
	///
	/// An unseen word in a known context has a probability of 0.
	///
	/// # Errors
	/// Returns `ChainError::ContextNotFound` if `context` was never observed.
	pub fn candidate_probability(&self, context: &str, word: &str) -> Result<f64> {
		let table = self.read();
		let set = table
			.candidates
			.get(context)
			.ok_or_else(|| ChainError::ContextNotFound(context.to_owned()))?;

		Ok(match set.lookup(word) {
			Some(entry) => entry.frequency as f64 / set.total() as f64,
			None => 0.0,
		})
	}

	/// Picks the starting context of a generation.
	///
	/// Seeds are preferred. Without seeds, the pick is made over every
	/// context in first-observation order.
	fn pick_start<'a>(&self, table: &'a Table) -> Option<&'a str> {
		let pool = if table.seeds.is_empty() { &table.contexts } else { &table.seeds };
		if pool.is_empty() {
			return None;
		}

		let index = (self.random)(pool.len());
		let start = pool.get(index).map(String::as_str);
		if start.is_none() {
			log::warn!("random source returned {index} for a bound of {}", pool.len());
		}
		start
	}

	/// Drops the first word of `context` and appends `candidate`.
	fn advance(context: &str, candidate: &str) -> String {
		match context.split_once(' ') {
			Some((_, rest)) => format!("{rest} {candidate}"),
			None => candidate.to_owned(),
		}
	}

	fn read(&self) -> RwLockReadGuard<'_, Table> {
		self.table.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, Table> {
		self.table.write().unwrap_or_else(PoisonError::into_inner)
	}
}

impl fmt::Debug for Chain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let table = self.read();
		f.debug_struct("Chain")
			.field("n", &self.n)
			.field("contexts", &table.contexts.len())
			.field("seeds", &table.seeds.len())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::candidates::WordFrequency;
	use crate::model::random::fixed_random_source;

	fn entries(words: &[(&str, usize)]) -> Vec<WordFrequency> {
		words.iter().map(|(word, frequency)| WordFrequency { word: (*word).to_owned(), frequency: *frequency }).collect()
	}

	/// Builds a chain with a hand-written table.
	fn chain_with(n: usize, contexts: Vec<(&str, Vec<(&str, usize)>)>, seeds: &[&str], random: RandomSource) -> Chain {
		let mut table = Table::default();
		for (context, words) in contexts {
			let mut set = CandidateSet::new();
			for (word, frequency) in words {
				for _ in 0..frequency {
					set.record(word);
				}
			}
			table.candidates.insert(context.to_owned(), set);
			table.contexts.push(context.to_owned());
		}
		table.seeds = seeds.iter().map(|seed| (*seed).to_owned()).collect();

		Chain { n, table: RwLock::new(table), random }
	}

	fn batman_chain() -> Chain {
		chain_with(3, vec![("I am", vec![("batman", 4)])], &["I am"], fixed_random_source(0))
	}

	fn wonderful_chain(seeds: &[&str], random: RandomSource) -> Chain {
		chain_with(
			3,
			vec![
				("It's a", vec![("trap", 1), ("wonderful", 5)]),
				("I am", vec![("batman", 4)]),
				("a wonderful", vec![("world.", 2), ("planet", 3), ("day", 2)]),
				("wonderful planet", vec![("we", 9)]),
				("planet we", vec![("live", 3)]),
				("we live", vec![("on", 5), ("tomorrow", 1)]),
			],
			seeds,
			random,
		)
	}

	#[test]
	fn new_rejects_small_arity() {
		assert!(matches!(Chain::new(1), Err(ChainError::InvalidArity { n: 1 })));
		assert!(matches!(Chain::new(0), Err(ChainError::InvalidArity { n: 0 })));
		assert_eq!(Chain::new(2).map(|chain| chain.n()).ok(), Some(2));
	}

	#[test]
	fn train_records_trigrams() {
		let chain = Chain::new(3).unwrap();
		chain.train(["a", "b", "c", "d", "e", "f"]).unwrap();

		assert_eq!(chain.contexts(), vec!["a b", "b c", "c d", "d e"]);
		for (context, word) in [("a b", "c"), ("b c", "d"), ("c d", "e"), ("d e", "f")] {
			let set = chain.candidates(context).unwrap();
			assert_eq!(set.entries(), entries(&[(word, 1)]).as_slice());
			assert_eq!(set.total(), 1);
		}
		assert!(chain.seeds().is_empty());
	}

	#[test]
	fn train_records_four_grams() {
		let chain = Chain::new(4).unwrap();
		chain.train("a b c d e f".split_whitespace()).unwrap();

		assert_eq!(chain.contexts(), vec!["a b c", "b c d", "c d e"]);
		assert_eq!(chain.candidates("c d e").unwrap().entries(), entries(&[("f", 1)]).as_slice());
	}

	#[test]
	fn short_stream_is_a_no_op() {
		let chain = Chain::new(3).unwrap();
		chain.train(["only", "two"]).unwrap();
		chain.train(Vec::<String>::new()).unwrap();

		assert!(chain.is_empty());
		assert_eq!(chain.generate(10), "");
	}

	#[test]
	fn repeated_window_counts_every_time() {
		let chain = Chain::new(3).unwrap();
		for _ in 0..4 {
			chain.train_window(&["I", "am", "batman"]).unwrap();
		}
		chain.train_window(&["I", "am", "groot"]).unwrap();

		let set = chain.candidates("I am").unwrap();
		assert_eq!(set.entries(), entries(&[("batman", 4), ("groot", 1)]).as_slice());
		assert_eq!(set.total(), 5);
		assert_eq!(chain.candidate_probability("I am", "batman").unwrap(), 0.8);
		assert_eq!(chain.seeds(), vec!["I am"]);
	}

	#[test]
	fn train_window_checks_length() {
		let chain = batman_chain();

		let err = chain.train_window(&["I", "am"]).unwrap_err();
		assert!(matches!(err, ChainError::Arity { expected: 3, got: 2 }));
		assert_eq!(err.to_string(), "invalid window: expected 3 tokens, got 2");
		assert_eq!(chain.candidates("I am").unwrap().total(), 4);
	}

	#[test]
	fn tokens_with_whitespace_are_rejected() {
		let chain = Chain::new(3).unwrap();

		let err = chain.train_window(&["a b", "c", "x"]).unwrap_err();
		assert!(matches!(err, ChainError::InvalidToken(ref token) if token == "a b"));
		assert!(matches!(chain.train(["a", "b\tc", "y"]), Err(ChainError::InvalidToken(_))));
		assert!(matches!(chain.train_window(&["a", "", "z"]), Err(ChainError::InvalidToken(_))));

		assert!(chain.is_empty());
	}

	#[test]
	fn seeds_are_added_on_first_observation_only() {
		let chain = Chain::new(3).unwrap();
		chain.train("I am batman I am groot".split_whitespace()).unwrap();

		assert_eq!(chain.contexts(), vec!["I am", "am batman", "batman I"]);
		assert_eq!(chain.seeds(), vec!["I am"]);
		assert_eq!(chain.candidates("I am").unwrap().entries(), entries(&[("batman", 1), ("groot", 1)]).as_slice());
	}

	#[test]
	fn new_context_without_capital_is_not_a_seed() {
		let chain = batman_chain();
		chain.train_window(&["maybe", "another", "time"]).unwrap();
		chain.train_window(&["It's", "a", "trap"]).unwrap();

		assert_eq!(chain.seeds(), vec!["I am", "It's a"]);
		assert_eq!(chain.len(), 3);
	}

	#[test]
	fn train_reader_spans_lines() {
		let chain = Chain::new(3).unwrap();
		chain.train_reader("a b\nc  d\te\n\nf".as_bytes()).unwrap();

		assert_eq!(chain.contexts(), vec!["a b", "b c", "c d", "d e"]);
	}

	#[test]
	fn generate_on_empty_chain_is_empty() {
		let chain = Chain::new(3).unwrap();
		assert_eq!(chain.generate(100), "");
	}

	#[test]
	fn generate_without_seeds_uses_contexts() {
		let chain = chain_with(3, vec![("i am", vec![("batman", 4)])], &[], fixed_random_source(0));
		assert_eq!(chain.generate(100), "i am batman.");
	}

	#[test]
	fn generate_keeps_existing_period() {
		let chain = wonderful_chain(&["I am", "It's a"], fixed_random_source(1));
		assert_eq!(chain.generate(100), "It's a wonderful world.");
	}

	#[test]
	fn generate_walks_until_chain_ends() {
		let chain = wonderful_chain(&["I am", "Nope", "It's a"], fixed_random_source(2));
		assert_eq!(chain.generate(100), "It's a wonderful planet we live on.");
	}

	#[test]
	fn generate_appends_period() {
		let chain = wonderful_chain(&["I am", "It's a"], fixed_random_source(0));
		assert_eq!(chain.generate(100), "I am batman.");
	}

	#[test]
	fn generate_respects_max_words() {
		let chain = Chain::with_random_source(2, fixed_random_source(0)).unwrap();
		chain.train("The cat sat. The dog ran.".split_whitespace()).unwrap();

		assert_eq!(chain.seeds(), vec!["The"]);
		assert_eq!(chain.generate(4), "The cat sat. The cat.");
		assert_eq!(chain.generate(0), "The.");
	}

	#[test]
	fn generate_tolerates_out_of_range_source() {
		let chain = chain_with(3, vec![("I am", vec![("batman", 1)])], &["I am"], std::sync::Arc::new(|bound: usize| bound));
		assert_eq!(chain.generate(10), "");
	}

	#[test]
	fn next_candidate_samples_or_none() {
		let chain = batman_chain();

		assert_eq!(chain.next_candidate("I am").as_deref(), Some("batman"));
		assert_eq!(chain.next_candidate("You are"), None);
	}

	#[test]
	fn candidate_probability_cases() {
		let chain = batman_chain();

		assert_eq!(chain.candidate_probability("I am", "batman").unwrap(), 1.0);
		assert_eq!(chain.candidate_probability("I am", "groot").unwrap(), 0.0);
		assert!(matches!(
			chain.candidate_probability("You are", "batman"),
			Err(ChainError::ContextNotFound(context)) if context == "You are"
		));
	}

	#[test]
	fn concurrent_training_loses_no_update() {
		let chain = Chain::new(3).unwrap();
		let trigrams = [["a", "a", "b"], ["a", "a", "c"], ["a", "a", "d"]];

		std::thread::scope(|scope| {
			for trigram in &trigrams {
				let chain = &chain;
				scope.spawn(move || {
					for _ in 0..25 {
						chain.train_window(trigram).unwrap();
					}
				});
			}
			for _ in 0..75 {
				let chain = &chain;
				scope.spawn(move || {
					chain.generate(100);
				});
			}
		});

		let set = chain.candidates("a a").unwrap();
		let mut words = set.entries().to_vec();
		words.sort_by(|a, b| a.word.cmp(&b.word));

		assert_eq!(words, entries(&[("b", 25), ("c", 25), ("d", 25)]));
		assert_eq!(set.total(), 75);
		assert_eq!(chain.len(), 1);
	}
}
