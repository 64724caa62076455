use std::io;

/// Errors returned by the chain and its glue layers.
///
/// Missing candidates and unseen words are not errors: they are reported
/// as `None` or a zero probability by the query methods.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
	/// The chain was built with `n <= 1`. A context needs at least one word.
	#[error("invalid arity {n}: n must be at least 2")]
	InvalidArity { n: usize },

	/// A training window did not hold exactly `n` tokens.
	#[error("invalid window: expected {expected} tokens, got {got}")]
	Arity { expected: usize, got: usize },

	/// A token was empty or contained whitespace, so it cannot be part of a
	/// space-joined context.
	#[error("invalid token {0:?}: tokens must be non-empty and free of whitespace")]
	InvalidToken(String),

	/// A probability query targeted a context that was never observed.
	#[error("context not found: {0:?}")]
	ContextNotFound(String),

	/// Reading tokens from the underlying source failed.
	#[error("failed to read tokens: {0}")]
	Io(#[from] io::Error),

	/// The configuration could not be parsed.
	#[error("invalid configuration: {0}")]
	Config(#[from] toml::de::Error),
}

/// Shorthand used across the crate.
pub type Result<T> = std::result::Result<T, ChainError>;
