use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Response, StatusCode},
    routing::get,
    Router,
};
use cards::tcgdex::CatalogClient;
use config::{Config, USAGE};
use opener::handlers::{self, AppState};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

mod cards;
mod config;
mod opener;

pub type Res<T> = Result<T, String>;

pub fn err<T, S: ToString>(message: S) -> Res<T> {
    Err(message.to_string())
}

#[derive(serde::Serialize)]
struct Resp {
    message: String,
    success: bool,
}

impl Resp {
    fn with_body(body: String, status: StatusCode) -> Response<String> {
        let mut resp = Response::new(body);
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        resp
    }

    fn axum<S: ToString>(message: S, status: StatusCode) -> Response<String> {
        Self::json_with_status(
            &Self {
                message: message.to_string(),
                success: status == StatusCode::OK,
            },
            status,
        )
    }

    fn json_with_status<T: serde::Serialize>(value: &T, status: StatusCode) -> Response<String> {
        match serde_json::ser::to_string(value) {
            Ok(body) => Self::with_body(body, status),
            Err(e) => {
                let mut resp = Response::new(format!("Failed to JSON encode response: {e}"));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            }
        }
    }

    fn json<T: serde::Serialize>(value: &T) -> Response<String> {
        Self::json_with_status(value, StatusCode::OK)
    }

    fn e404<S: ToString>(message: S) -> Response<String> {
        Self::axum(message, StatusCode::NOT_FOUND)
    }
}

fn router(state: Arc<AppState>) -> Router<()> {
    Router::new()
        .route("/api/sets", get(handlers::list_sets))
        .route("/api/sets/:id", get(handlers::get_set))
        .route("/api/sets/:id/pack", get(handlers::open_pack))
        .route("/ws/:id", get(handlers::session_socket))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };
    tracing::debug!(
        "Serving {} with catalog {}.",
        config.content.display(),
        config.catalog.base_url
    );

    let catalog = match CatalogClient::new(config.catalog.clone()) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Failed to create catalog client: {e}");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        catalog,
        open_delay: config.open_delay,
    });
    let app = router(state)
        .fallback_service(ServeDir::new(&config.content).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http());

    let port = config.port;
    let listener = match TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to open port {port}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on port {port}.");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Closed due to error: {e}");
    }
}
