use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};

use rs_markov_core::{Chain, ChainConfig, ChainError};
use serde::Deserialize;

/// Server settings, read from an optional TOML file given as first argument.
///
/// Chain settings (`n`, `max_words`, `random_seed`) live at the top level
/// of the same document.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
struct ServerConfig {
	host: String,
	port: u16,
	/// Folder holding the `.txt` corpora served by `/v1/corpora`
	data_dir: String,
	#[serde(flatten)]
	chain: ChainConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_owned(),
			port: 5000,
			data_dir: "./data".to_owned(),
			chain: ChainConfig::default(),
		}
	}
}

impl ServerConfig {
	fn from_file(path: &str) -> io::Result<Self> {
		let contents = fs::read_to_string(path)?;
		toml::from_str(&contents).map_err(io::Error::other)
	}

	fn data_dir(&self) -> PathBuf {
		PathBuf::from(&self.data_dir)
	}
}

/// Names of the `.txt` corpora directly inside `folder`, sorted.
fn corpus_names(folder: &Path) -> io::Result<Vec<String>> {
	let mut names = Vec::new();

	for entry in fs::read_dir(folder)? {
		let path = entry?.path();
		if !path.is_file() || path.extension().is_none_or(|extension| extension != "txt") {
			continue;
		}
		if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
			names.push(stem.to_owned());
		}
	}

	names.sort();
	Ok(names)
}

/// State shared by every worker. The chain does its own locking.
struct AppState {
	chain: Chain,
	config: ServerConfig,
}

/// Struct representing query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	max_words: Option<usize>,
}

#[derive(Deserialize)]
struct ContextQuery {
	context: String,
}

#[derive(Deserialize)]
struct ProbabilityQuery {
	context: String,
	word: String,
}

#[derive(Deserialize)]
struct CorpusQuery {
	names: Option<String>,
}

/// Maps a chain error to an HTTP response.
fn error_response(error: &ChainError) -> HttpResponse {
	match error {
		ChainError::ContextNotFound(_) => HttpResponse::NotFound().body(error.to_string()),
		ChainError::Io(e) if e.kind() == io::ErrorKind::NotFound => HttpResponse::NotFound().body(error.to_string()),
		ChainError::InvalidArity { .. } | ChainError::Arity { .. } | ChainError::InvalidToken(_) => HttpResponse::BadRequest().body(error.to_string()),
		_ => HttpResponse::InternalServerError().body(error.to_string()),
	}
}

/// Runs a training job on the blocking pool and reports the context count.
async fn run_training<F>(data: web::Data<AppState>, job: F) -> HttpResponse
where
	F: FnOnce(&Chain) -> Result<(), ChainError> + Send + 'static,
{
	let state = data.clone();
	match web::block(move || job(&state.chain)).await {
		Ok(Ok(())) => HttpResponse::Ok().body(data.chain.len().to_string()),
		Ok(Err(e)) => error_response(&e),
		Err(_) => HttpResponse::InternalServerError().body("Training task failed"),
	}
}

/// GET /v1/generate
///
/// Generates text from the shared chain.
/// Returns an empty body while nothing has been learnt.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<AppState>, query: web::Query<GenerateParams>) -> impl Responder {
	let max_words = query.max_words.unwrap_or(data.config.chain.max_words);
	HttpResponse::Ok().body(data.chain.generate(max_words))
}

#[get("/v1/next")]
async fn get_next(data: web::Data<AppState>, query: web::Query<ContextQuery>) -> impl Responder {
	match data.chain.next_candidate(&query.context) {
		Some(word) => HttpResponse::Ok().body(word),
		None => HttpResponse::NotFound().body(format!("No candidate for {:?}", query.context)),
	}
}

#[get("/v1/probability")]
async fn get_probability(data: web::Data<AppState>, query: web::Query<ProbabilityQuery>) -> impl Responder {
	match data.chain.candidate_probability(&query.context, &query.word) {
		Ok(probability) => HttpResponse::Ok().body(probability.to_string()),
		Err(e) => error_response(&e),
	}
}

#[get("/v1/candidates")]
async fn get_candidates(data: web::Data<AppState>, query: web::Query<ContextQuery>) -> impl Responder {
	match data.chain.candidates(&query.context) {
		Some(set) => HttpResponse::Ok().json(set),
		None => error_response(&ChainError::ContextNotFound(query.context.clone())),
	}
}

/// PUT /v1/train
///
/// Trains the shared chain on the request body.
#[put("/v1/train")]
async fn put_train(data: web::Data<AppState>, body: web::Bytes) -> impl Responder {
	run_training(data, move |chain| chain.train_reader(&body[..])).await
}

/// PUT /v1/train_corpus?names=a,b
///
/// Trains the shared chain on `<data_dir>/<name>.txt` for every name.
#[put("/v1/train_corpus")]
async fn put_train_corpus(data: web::Data<AppState>, query: web::Query<CorpusQuery>) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty corpus name"),
	};

	let names: Vec<String> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.map(str::to_owned)
		.collect();

	if names.iter().any(|name| name.contains(['/', '\\']) || name.contains("..")) {
		return HttpResponse::BadRequest().body("Corpus names cannot contain paths");
	}

	let folder = data.config.data_dir();
	run_training(data, move |chain| {
		for name in names {
			let path = folder.join(format!("{name}.txt"));
			chain.train_reader(File::open(&path)?)?;
			log::info!("trained on corpus {name} ({} contexts)", chain.len());
		}
		Ok(())
	})
	.await
}

#[get("/v1/corpora")]
async fn get_corpora(data: web::Data<AppState>) -> impl Responder {
	match corpus_names(&data.config.data_dir()) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(e) => {
			log::warn!("failed to list corpora: {e}");
			HttpResponse::InternalServerError().body("Failed to list corpora")
		}
	}
}

fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(get_generated)
		.service(get_next)
		.service(get_probability)
		.service(get_candidates)
		.service(put_train)
		.service(put_train_corpus)
		.service(get_corpora);
}

/// Main entry point for the server.
///
/// Builds an empty chain from the configuration and serves it to every
/// worker. Requests run concurrently: the chain serializes writers and
/// lets readers share it.
#[actix_web::main]
async fn main() -> io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = match std::env::args().nth(1) {
		Some(path) => ServerConfig::from_file(&path)?,
		None => ServerConfig::default(),
	};
	let chain = config.chain.build().map_err(io::Error::other)?;

	log::info!("serving a {}-gram chain on {}:{}", chain.n(), config.host, config.port);

	let bind = (config.host.clone(), config.port);
	let state = web::Data::new(AppState { chain, config });

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.wrap(Logger::default())
			.app_data(state.clone())
			.configure(routes)
	})
		.bind(bind)?
		.run()
		.await
}
