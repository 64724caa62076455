use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rs_markov_core::{Chain, ChainConfig};

/// Train a word n-gram chain on text, then generate from it or query it.
#[derive(Parser, Debug)]
#[command(name = "rs-markov", version)]
struct Cli {
    /// TOML configuration file (n, max_words, random_seed)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Order of the model; the context is n-1 words long
    #[arg(short, long)]
    n: Option<usize>,

    /// Maximum number of words appended by a generation
    #[arg(short, long)]
    max_words: Option<usize>,

    /// Seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,

    /// Training text files, read in order. Reads stdin when none is given
    #[arg(short, long = "input")]
    inputs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Generate random text
    Generate {
        /// Number of texts to generate
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Sample one word following a context
    Next {
        /// Context words, separated by single spaces
        context: String,
    },
    /// Probability that a word follows a context
    Probability {
        context: String,
        word: String,
    },
}

impl Cli {
    /// Loads the configuration file, if any, and applies command line overrides.
    fn chain_config(&self) -> anyhow::Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_file(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => ChainConfig::default(),
        };

        if let Some(n) = self.n {
            config.n = n;
        }
        if let Some(max_words) = self.max_words {
            config.max_words = max_words;
        }
        if self.seed.is_some() {
            config.random_seed = self.seed;
        }

        Ok(config)
    }

    /// Feeds every input (or stdin) into the chain.
    fn train(&self, chain: &Chain) -> anyhow::Result<()> {
        if self.inputs.is_empty() {
            chain.train_reader(io::stdin().lock()).context("failed to train from stdin")?;
        }

        for path in &self.inputs {
            let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            chain
                .train_reader(file)
                .with_context(|| format!("failed to train from {}", path.display()))?;
            log::info!("trained on {} ({} contexts)", path.display(), chain.len());
        }

        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = cli.chain_config()?;
    let chain = config.build()?;
    cli.train(&chain)?;

    if chain.is_empty() {
        log::warn!("no context learnt: the input holds fewer than {} words", config.n);
    }

    match &cli.command {
        Command::Generate { count } => {
            for _ in 0..*count {
                println!("{}", chain.generate(config.max_words));
            }
        }
        Command::Next { context } => match chain.next_candidate(context) {
            Some(word) => println!("{word}"),
            None => bail!("no word follows {context:?}"),
        },
        Command::Probability { context, word } => {
            let probability = chain.candidate_probability(context, word)?;
            println!("{probability:.4}");
        }
    }

    Ok(())
}
