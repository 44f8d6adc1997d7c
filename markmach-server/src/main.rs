use std::env;
use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};

use markmach_core::{AnswerGenerator, GeneratorConfig, MarkovChain};

const DEFAULT_MODEL: &str = "output/markov_model.json";
const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_THEMATIC_LIMIT: usize = 15;

/// Query parameters of the `/v1/answer` endpoint
#[derive(Deserialize)]
struct AnswerParams {
	question: Option<String>,
}

/// Query parameters of the `/v1/thematic` endpoint
#[derive(Deserialize)]
struct ThematicParams {
	limit: Option<usize>,
}

#[derive(Serialize)]
struct ThematicToken<'a> {
	token: &'a str,
	entropy: f64,
}

struct SharedData {
	generator: AnswerGenerator,
}

/// HTTP GET endpoint `/v1/answer`
///
/// Answers the `question` query parameter with plain text.
#[get("/v1/answer")]
async fn get_answer(data: web::Data<Mutex<SharedData>>, query: web::Query<AnswerParams>) -> impl Responder {
	let question = match &query.question {
		Some(q) if !q.trim().is_empty() => q.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty question"),
	};

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Generator lock failed"),
	};

	let answer = shared_data.generator.generate_answer(question);
	log::debug!("Q: {question} / A: {answer}");
	HttpResponse::Ok().body(answer)
}

/// HTTP GET endpoint `/v1/stats`
///
/// Returns the statistics of the loaded chain as JSON.
#[get("/v1/stats")]
async fn get_stats(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Generator lock failed"),
	};
	HttpResponse::Ok().json(shared_data.generator.chain().stats())
}

/// HTTP GET endpoint `/v1/thematic`
///
/// Returns the `limit` lowest-entropy tokens as JSON.
#[get("/v1/thematic")]
async fn get_thematic(data: web::Data<Mutex<SharedData>>, query: web::Query<ThematicParams>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Generator lock failed"),
	};

	let limit = query.limit.unwrap_or(DEFAULT_THEMATIC_LIMIT);
	let tokens: Vec<ThematicToken> = shared_data
		.generator
		.entropy()
		.most_thematic(limit)
		.into_iter()
		.map(|(token, entropy)| ThematicToken { token, entropy })
		.collect();
	HttpResponse::Ok().json(tokens)
}

/// Main entry point for the server.
///
/// Loads the chain, builds the answer generator, wraps it in a `Mutex`
/// (answering draws from its random source) and starts an Actix-web server.
///
/// # Notes
/// - The model path is the first argument, else `MARKMACH_MODEL`, else
///   `output/markov_model.json`.
/// - The bind address comes from `MARKMACH_BIND` (default `127.0.0.1:5000`).
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let model_path = env::args()
		.nth(1)
		.or_else(|| env::var("MARKMACH_MODEL").ok())
		.unwrap_or_else(|| DEFAULT_MODEL.to_owned());
	let bind = env::var("MARKMACH_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());

	let chain = MarkovChain::load(&model_path).map_err(std::io::Error::other)?;
	let shared_data = SharedData {
		generator: AnswerGenerator::new(Arc::new(chain), GeneratorConfig::default()),
	};
	let shared_generator = web::Data::new(Mutex::new(shared_data));

	log::info!("Listening on {bind}");
	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_generator.clone())
			.service(get_answer)
			.service(get_stats)
			.service(get_thematic)
	})
		.bind(bind)?
		.run()
		.await
}
