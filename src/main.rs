use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use tessera_billing::billing::CheckoutUrls;
use tessera_billing::config::{configure_sqlite_pool, Config};
use tessera_billing::notify::LogNotifier;
use tessera_billing::payments::MockPaymentProvider;
use tessera_billing::routes::create_routes;
use tessera_billing::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = configure_sqlite_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let state = AppState {
        pool,
        provider: MockPaymentProvider::shared(),
        notifier: LogNotifier::shared(),
        webhook_secret: config.webhook_secret,
        checkout_urls: CheckoutUrls {
            success: config.checkout_success_url,
            cancel: config.checkout_cancel_url,
        },
    };

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
