use stututor::{
    api,
    completion::{CompletionClient, GeminiClient, GeminiSettings, RetryPolicy, RetryingClient},
    config, logging,
    processing::{DocumentService, DocumentValidator},
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();
    config.log_summary();

    let gemini =
        GeminiClient::new(GeminiSettings::from(config)).expect("Failed to build Gemini client");
    let client: Arc<dyn CompletionClient> =
        Arc::new(RetryingClient::new(gemini, RetryPolicy::from(config)));
    let service = Arc::new(DocumentService::new(
        client,
        DocumentValidator::new(config.max_upload_bytes),
    ));
    let app = api::create_router(service, &api::ApiSettings::from(config));

    let listener = bind_listener(config.port)
        .await
        .expect("Failed to bind listener");
    tracing::info!(
        environment = %config.environment,
        "Listening on http://0.0.0.0:{}",
        config.port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server terminated unexpectedly");
}

async fn bind_listener(port: u16) -> Result<TcpListener, std::io::Error> {
    use std::net::Ipv4Addr;

    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
