use std::sync::Arc;

use anyhow::Result;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{extract::State, response::Html, routing::get, Router};
use tracing::info;
use tracing_subscriber::EnvFilter;

use confhub_common::Config;
use confhub_store::{DynStore, PgStore};

use confhub_api::graphql::{build_schema, context::request_scope, ApiSchema};

pub struct AppState {
    pub schema: ApiSchema,
    pub store: DynStore,
}

async fn graphql_handler(
    State(state): State<Arc<AppState>>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    // Fresh loaders per request: batch and cache state never crosses requests.
    let request = request_scope(req.into_inner(), &state.store);
    state.schema.execute(request).await.into()
}

async fn graphiql() -> Html<String> {
    Html(async_graphql::http::GraphiQLSource::build().endpoint("/graphql").finish())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("confhub=info".parse()?))
        .init();

    let config = Config::from_env();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store: DynStore = Arc::new(store);

    let schema = build_schema(store.clone());
    let state = Arc::new(AppState { schema, store });

    let app = Router::new()
        // GraphQL
        .route("/graphql", get(graphiql).post(graphql_handler))
        // Health check
        .route("/", get(|| async { "ok" }))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("ConfHub API starting on {addr}");
    info!("GraphiQL IDE available at http://{addr}/graphql");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
