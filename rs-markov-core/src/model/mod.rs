//! Word-level n-gram Markov chain.
//!
//! - Candidate sets counting the words observed after a context (`CandidateSet`)
//! - The chain mapping contexts to candidate sets (`Chain`)
//! - Pluggable uniform random sources (`RandomSource`)

/// Thread-safe n-gram chain.
///
/// Handles training over token streams, seed tracking, text generation,
/// next-word sampling and probability queries.
pub mod chain;

/// Candidates observed after one context, with frequency-weighted sampling.
pub mod candidates;

/// Uniform integer sources injected into a chain.
pub mod random;
