use std::{env, path::Path, sync::Arc};

use quizdeck::{ApiClient, Config, LocalIdentity, QuizBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod terminal;

const USAGE: &str =
    "usage: quizdeck [quizzes | take <quiz-id> | create <quiz.json> | route <path>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "quizdeck=info".into()),
        ))
        // stdout belongs to the quiz itself
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Config::from_env()?;
    let backend: Arc<dyn QuizBackend> = Arc::new(ApiClient::from_config(&cfg)?);
    let identity = match &cfg.identity {
        Some(who) => LocalIdentity::signed_in(who),
        None => LocalIdentity::new(),
    };
    tracing::debug!(api = %cfg.api_url, signed_in = cfg.identity.is_some(), "starting");

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        [] | ["quizzes"] => terminal::list(backend).await,
        ["take", id] => {
            let id = id.parse().map_err(|_| anyhow::anyhow!("not a quiz id: {id}"))?;
            terminal::take(backend, &identity, cfg.answer_failures, id).await
        }
        ["create", file] => terminal::create(backend, &identity, Path::new(file)).await,
        ["route", path] => terminal::route(path),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}
