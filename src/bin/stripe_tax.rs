use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use stripe_tax::{
    configs::settings::Settings,
    connector::StripeTax,
    db::{cache::InMemoryCacheStore, MockDb},
    routes::app::{AppState, Webhooks},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let conf = Settings::new().expect("failed to load application configuration");
    let server = conf.server.clone();

    let connector =
        Arc::new(StripeTax::new(&conf.stripe_tax).expect("failed to construct the tax api client"));
    let state = web::Data::new(AppState::new(
        conf,
        Arc::new(MockDb::new()),
        Arc::new(InMemoryCacheStore::new()),
        connector,
    ));
    state
        .validate()
        .expect("event handler registries are incomplete");

    tracing::info!(host = %server.host, port = server.port, "starting stripe tax server");
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .service(Webhooks::server(state.clone()))
    })
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
