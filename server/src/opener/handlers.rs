use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use uuid::Uuid;

use crate::{
    cards::{tcgdex::CatalogClient, Card, CardSet},
    Res, Resp,
};

use super::{
    packs::{generate_pack, Pack},
    server::{SessionMessage, SessionRequest, SessionServer},
    session::Intent,
};

pub struct AppState {
    pub catalog: CatalogClient,
    pub open_delay: Duration,
}

type Response = axum::http::Response<String>;

/// Fetch a set and its pool together. None unless both are available.
async fn load_set(catalog: &CatalogClient, id: &str) -> Option<(CardSet, Vec<Card>)> {
    let (set, pool) = tokio::join!(catalog.get_set(id), catalog.card_pool(id));
    let mut set = set?;
    if pool.is_empty() {
        return None;
    }

    // The pool replaces the brief list embedded in the set.
    set.cards = None;
    Some((set, pool))
}

pub async fn list_sets(State(state): State<Arc<AppState>>) -> Response {
    Resp::json(&state.catalog.list_sets().await)
}

pub async fn get_set(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.catalog.get_set(&id).await {
        Some(set) => Resp::json(&set),
        None => Resp::e404(format!("Set not found: {id}")),
    }
}

pub async fn open_pack(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    #[derive(serde::Serialize)]
    struct OpenedPack {
        set: CardSet,
        pack: Pack,
    }

    let Some((set, pool)) = load_set(&state.catalog, &id).await else {
        return Resp::e404(format!("Set not found or empty: {id}"));
    };
    let pack = generate_pack(&pool);
    tracing::debug!("Opened pack of {} cards from {id}.", pack.len());
    Resp::json(&OpenedPack { set, pack })
}

pub async fn session_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state, id))
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &SessionMessage,
) -> Res<()> {
    let text = serde_json::to_string(message).map_err(|e| e.to_string())?;
    sink.send(Message::Text(text)).await.map_err(|e| e.to_string())
}

async fn handle_session(socket: WebSocket, state: Arc<AppState>, set_id: String) {
    let id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();

    let Some((set, pool)) = load_set(&state.catalog, &set_id).await else {
        tracing::debug!(session = %id, "Set {set_id} unavailable.");
        send_message(&mut sink, &SessionMessage::Unavailable).await.ok();
        sink.close().await.ok();
        return;
    };

    let ready = SessionMessage::ready(set, pool.len());
    if let Err(e) = send_message(&mut sink, &ready).await {
        tracing::debug!(session = %id, "Client left before session start: {e}");
        return;
    }

    let (client, mut messages) = tokio::sync::mpsc::unbounded_channel();
    let (server, requests) = SessionServer::new(id, pool, state.open_delay, client);
    tokio::spawn(server.run());

    tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            if let Err(e) = send_message(&mut sink, &message).await {
                tracing::debug!(session = %id, "Failed to send to client: {e}");
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<Intent>(&text) {
                Ok(intent) => {
                    if requests.send(SessionRequest::Intent(intent)).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::debug!(session = %id, "Ignoring message {text:?}: {e}"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use axum::{
        extract::{Path, State},
        http::StatusCode,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

    use crate::cards::tcgdex::{test::fake_catalog, CatalogClient, CatalogConfig};

    use super::{get_set, list_sets, open_pack, AppState};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn state() -> Arc<AppState> {
        let catalog = CatalogClient::new(CatalogConfig {
            base_url: fake_catalog().await,
            ..Default::default()
        })
        .unwrap();
        Arc::new(AppState {
            catalog,
            open_delay: Duration::from_millis(10),
        })
    }

    #[tokio::test]
    async fn test_list_sets() {
        let resp = list_sets(State(state().await)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let sets: serde_json::Value = serde_json::from_str(resp.body()).unwrap();
        assert_eq!(sets.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_set() {
        let state = state().await;
        let resp = get_set(State(state.clone()), Path("tst".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_set(State(state), Path("missing".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(resp.body()).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_open_pack() {
        let state = state().await;
        let resp = open_pack(State(state.clone()), Path("tst".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(resp.body()).unwrap();
        assert_eq!(body["set"]["id"], "tst");
        assert!(body["set"]["cards"].is_null());

        // Pool of four is smaller than a pack, so every card is in it.
        assert_eq!(body["pack"].as_array().unwrap().len(), 4);

        for id in ["empty", "missing"] {
            let resp = open_pack(State(state.clone()), Path(id.to_string())).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    /// Serve the full router on a random local port. Returns the ws base URL.
    async fn serve() -> String {
        let app = crate::router(state().await);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("ws://{addr}/ws")
    }

    async fn connect(url: String) -> Client {
        tokio_tungstenite::connect_async(url).await.unwrap().0
    }

    async fn send(client: &mut Client, text: &str) {
        client.send(Message::Text(text.into())).await.unwrap();
    }

    async fn next_json(client: &mut Client) -> serde_json::Value {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => panic!("Expected text frame, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_session_socket() {
        let mut client = connect(format!("{}/tst", serve().await)).await;

        let ready = next_json(&mut client).await;
        assert_eq!(ready["type"], "ready");
        assert_eq!(ready["set"]["id"], "tst");
        assert_eq!(ready["pool_size"], 4);

        // Unparseable frames are dropped without a reply.
        send(&mut client, "garbage").await;
        send(&mut client, r#"{"type":"shuffle"}"#).await;
        send(&mut client, r#"{"type":"open"}"#).await;

        let opening = next_json(&mut client).await;
        assert_eq!(opening["type"], "snapshot");
        assert_eq!(opening["session"]["stage"], "opening");

        let opened = next_json(&mut client).await;
        assert_eq!(opened["session"]["stage"], "opened");
        assert_eq!(opened["session"]["pack"].as_array().unwrap().len(), 4);
        assert_eq!(opened["current"]["index"], 0);

        send(&mut client, r#"{"type":"reveal","index":0}"#).await;
        assert_eq!(next_json(&mut client).await["session"]["revealed"][0], 0);

        send(&mut client, r#"{"type":"reset"}"#).await;
        let reset = next_json(&mut client).await;
        assert_eq!(reset["session"]["stage"], "unopened");
        assert!(reset["session"]["pack"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_socket_unavailable() {
        let base = serve().await;
        for id in ["empty", "missing"] {
            let mut client = connect(format!("{base}/{id}")).await;
            assert_eq!(next_json(&mut client).await["type"], "unavailable");
            match client.next().await {
                Some(Ok(Message::Close(_))) | None => {}
                other => panic!("Expected close, got {other:?}"),
            }
        }
    }
}
