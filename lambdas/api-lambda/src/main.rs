use lambda_http::{run, service_fn, tracing, Error, Request};
use staj_shared::backend::appwrite::AppwriteClient;
use staj_shared::config::Config;
use staj_shared::AppState;
use std::sync::Arc;

mod api;
mod http_handler;
mod pages;
mod viewer;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Fail fast on missing configuration
    let config = Config::from_env()?;
    tracing::info!(
        "Starting staj-takip for project {} at {}",
        config.project_id,
        config.endpoint
    );

    let backend = AppwriteClient::new(&config)?;
    let state = AppState::new(Arc::new(backend), config);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
