//! Word-level n-gram Markov chain library.
//!
//! This crate provides:
//! - A trainable n-gram model over whitespace-delimited words
//! - Frequency-weighted generation with an injectable random source
//! - Safe concurrent training and querying of a shared chain
//! - Token, file and configuration helpers for front ends
//!
//! ```
//! use rs_markov_core::Chain;
//!
//! let chain = Chain::new(3)?;
//! chain.train_reader("I am batman.\nI am groot.\nI am your father.".as_bytes())?;
//!
//! let probability = chain.candidate_probability("I am", "batman.")?;
//! assert_eq!(format!("{probability:.2}"), "0.33");
//! assert!(chain.generate(10).ends_with('.'));
//! # Ok::<(), rs_markov_core::ChainError>(())
//! ```

/// Chain model, candidate sets and random sources.
pub mod model;

/// Token source and file helpers.
pub mod io;

/// TOML configuration.
pub mod config;

mod error;

pub use config::ChainConfig;
pub use error::{ChainError, Result};
pub use model::candidates::{CandidateSet, WordFrequency};
pub use model::chain::Chain;
pub use model::random::{fixed_random_source, seeded_random_source, thread_random_source, RandomSource};
