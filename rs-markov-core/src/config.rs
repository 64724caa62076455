use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::model::chain::Chain;
use crate::model::random::{seeded_random_source, thread_random_source, RandomSource};

/// Settings used to build a [`Chain`] and to drive generation.
///
/// Every field has a default, so an empty TOML document is valid:
///
/// ```toml
/// n = 3
/// max_words = 100
/// random_seed = 42
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChainConfig {
	/// Order of the model (context length + 1).
	pub n: usize,

	/// Maximum number of words appended by a generation.
	pub max_words: usize,

	/// Seed of a deterministic random source. The thread RNG is used when unset.
	pub random_seed: Option<u64>,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self { n: 3, max_words: 100, random_seed: None }
	}
}

impl ChainConfig {
	/// Parses a configuration from a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a TOML configuration file.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let contents = fs::read_to_string(path)?;
		Self::from_toml_str(&contents)
	}

	/// Random source matching `random_seed`.
	pub fn random_source(&self) -> RandomSource {
		match self.random_seed {
			Some(seed) => seeded_random_source(seed),
			None => thread_random_source(),
		}
	}

	/// Builds an empty chain from this configuration.
	///
	/// # Errors
	/// Returns `ChainError::InvalidArity` if `n < 2`.
	pub fn build(&self) -> Result<Chain> {
		Chain::with_random_source(self.n, self.random_source())
	}
}
