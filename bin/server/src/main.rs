use roster_conversation::{ConversationEngine, InMemoryStateStore};
use roster_server::{config::ServerConfig, health, telegram};
use roster_store::{GithubStore, RecordGateway};
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(
        github = ?config.github,
        telegram = ?config.telegram,
        "Loaded configuration"
    );

    // Record store
    let store = GithubStore::new(config.github.clone()).expect("failed to build GitHub client");
    let records = RecordGateway::new(Arc::new(store));
    let status = records.status().await;
    if status.exists {
        tracing::info!(location = %records.location(), "Record document found");
    } else {
        tracing::warn!(
            location = %records.location(),
            status = ?status.status_code,
            "Record document not reachable, saves will fail until it exists"
        );
    }

    let engine = Arc::new(ConversationEngine::new(
        Arc::new(InMemoryStateStore::new()),
        records,
        config.conversation.clone(),
    ));

    let bot = Bot::new(config.telegram.bot_token.clone());
    bot.set_my_commands(telegram::bot_commands())
        .await
        .expect("failed to register bot commands");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let url = config
        .telegram
        .webhook_url()
        .expect("public host was validated");
    tracing::info!(%url, "Registering webhook");

    let (listener, stop_flag, webhook_router) =
        webhooks::axum_to_router(bot.clone(), webhooks::Options::new(addr, url))
            .await
            .expect("failed to register webhook");

    let app = webhook_router
        .merge(health::router())
        .layer(TraceLayer::new_for_http());

    let tcp_listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");
    tracing::info!("listening on http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp_listener, app)
            .with_graceful_shutdown(stop_flag)
            .await
        {
            tracing::error!(error = %e, "server error");
        }
    });

    Dispatcher::builder(bot, telegram::schema())
        .dependencies(dptree::deps![engine])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in update handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Error from webhook listener"),
        )
        .await;

    tracing::info!("Dispatcher stopped");
}
