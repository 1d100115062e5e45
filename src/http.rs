//! HTTP query interface
//!
//! Read-only endpoints over the live state: history pagination and a
//! presence snapshot. Reads go through the actor's command channel as
//! oneshot queries, so they see a consistent snapshot without holding
//! any lock; a concurrent append may or may not be visible, which is
//! acceptable for history reads.

use std::convert::Infallible;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use warp::Filter;

use crate::server::ServerCommand;

/// Query parameters for `GET /api/messages`
///
/// `before` is the pagination cursor (RFC 3339). Callers must supply
/// the oldest loaded timestamp after the first page; with no cursor
/// the room's tail is returned.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub room: String,
    pub before: Option<DateTime<Utc>>,
}

/// The actor stopped; nothing sensible to serve.
#[derive(Debug)]
struct ServerGone;

impl warp::reject::Reject for ServerGone {}

fn with_server(
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> impl Filter<Extract = (mpsc::Sender<ServerCommand>,), Error = Infallible> + Clone {
    warp::any().map(move || cmd_tx.clone())
}

/// Build the HTTP routes
///
/// - `GET /api/messages?room=<name>&before=<RFC3339>`: up to 20 room
///   messages older than the cursor, oldest-to-newest
/// - `GET /api/users`: presence snapshot
/// - `GET /`: liveness line
pub fn routes(
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let messages = warp::path!("api" / "messages")
        .and(warp::get())
        .and(warp::query::<HistoryQuery>())
        .and(with_server(cmd_tx.clone()))
        .and_then(page_messages);

    let users = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_server(cmd_tx))
        .and_then(list_users);

    let health = warp::path::end()
        .and(warp::get())
        .map(|| "Chat server is running");

    messages
        .or(users)
        .or(health)
        .with(warp::cors().allow_any_origin())
}

async fn page_messages(
    query: HistoryQuery,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (respond_to, response) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::PageMessages {
            room: query.room,
            before: query.before,
            respond_to,
        })
        .await
        .map_err(|_| warp::reject::custom(ServerGone))?;
    let page = response
        .await
        .map_err(|_| warp::reject::custom(ServerGone))?;
    Ok(warp::reply::json(&page))
}

async fn list_users(
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (respond_to, response) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::ListUsers { respond_to })
        .await
        .map_err(|_| warp::reject::custom(ServerGone))?;
    let users = response
        .await
        .map_err(|_| warp::reject::custom(ServerGone))?;
    Ok(warp::reply::json(&users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChatMessage, UserInfo};
    use crate::server::ChatServer;
    use crate::types::{ConnectionId, DEFAULT_ROOM};

    fn spawn_server() -> mpsc::Sender<ServerCommand> {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        tokio::spawn(ChatServer::new(cmd_rx).run());
        cmd_tx
    }

    async fn join(cmd_tx: &mpsc::Sender<ServerCommand>, username: &str) -> ConnectionId {
        let conn_id = ConnectionId::new();
        // The receiver is dropped: fan-out sends fail fast and are
        // ignored, which is exactly the departed-client path.
        let (tx, _) = mpsc::channel(64);
        cmd_tx
            .send(ServerCommand::Join {
                conn_id,
                username: username.to_string(),
                sender: tx,
            })
            .await
            .unwrap();
        conn_id
    }

    async fn send_messages(cmd_tx: &mpsc::Sender<ServerCommand>, from: ConnectionId, n: usize) {
        for i in 0..n {
            let (ack_tx, ack_rx) = oneshot::channel();
            cmd_tx
                .send(ServerCommand::RoomMessage {
                    conn_id: from,
                    message: format!("message {i}"),
                    ack: Some(ack_tx),
                })
                .await
                .unwrap();
            ack_rx.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_health_route() {
        let api = routes(spawn_server());
        let res = warp::test::request().method("GET").path("/").reply(&api).await;

        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), "Chat server is running");
    }

    #[tokio::test]
    async fn test_messages_route_returns_room_tail() {
        let cmd_tx = spawn_server();
        let alice = join(&cmd_tx, "Alice").await;
        send_messages(&cmd_tx, alice, 25).await;

        let api = routes(cmd_tx.clone());
        let res = warp::test::request()
            .method("GET")
            .path("/api/messages?room=general")
            .reply(&api)
            .await;

        assert_eq!(res.status(), 200);
        let page: Vec<ChatMessage> = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(page.len(), 20);
        assert!(page.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(page.last().unwrap().sender, "Alice");
    }

    #[tokio::test]
    async fn test_messages_route_honors_cursor() {
        let cmd_tx = spawn_server();
        let alice = join(&cmd_tx, "Alice").await;
        send_messages(&cmd_tx, alice, 10).await;

        let api = routes(cmd_tx.clone());
        let res = warp::test::request()
            .method("GET")
            .path("/api/messages?room=general")
            .reply(&api)
            .await;
        let page: Vec<ChatMessage> = serde_json::from_slice(res.body()).unwrap();
        let cursor = page[5].timestamp;

        // Serde gives the exact wire form of the cursor (Z-suffixed).
        let cursor_str = serde_json::to_string(&cursor).unwrap();
        let res = warp::test::request()
            .method("GET")
            .path(&format!(
                "/api/messages?room=general&before={}",
                cursor_str.trim_matches('"')
            ))
            .reply(&api)
            .await;

        assert_eq!(res.status(), 200);
        let older: Vec<ChatMessage> = serde_json::from_slice(res.body()).unwrap();
        assert!(!older.is_empty());
        assert!(older.iter().all(|m| m.timestamp < cursor));
        assert!(older.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_messages_route_empty_for_unknown_room() {
        let cmd_tx = spawn_server();
        let alice = join(&cmd_tx, "Alice").await;
        send_messages(&cmd_tx, alice, 3).await;

        let api = routes(cmd_tx.clone());
        let res = warp::test::request()
            .method("GET")
            .path("/api/messages?room=nowhere")
            .reply(&api)
            .await;

        assert_eq!(res.status(), 200);
        let page: Vec<ChatMessage> = serde_json::from_slice(res.body()).unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_users_route_lists_presence_in_join_order() {
        let cmd_tx = spawn_server();
        let alice = join(&cmd_tx, "Alice").await;
        let bob = join(&cmd_tx, "Bob").await;

        let api = routes(cmd_tx.clone());
        let res = warp::test::request()
            .method("GET")
            .path("/api/users")
            .reply(&api)
            .await;

        assert_eq!(res.status(), 200);
        let users: Vec<UserInfo> = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, alice);
        assert_eq!(users[1].id, bob);
        assert!(users.iter().all(|u| u.room == DEFAULT_ROOM));
    }
}
