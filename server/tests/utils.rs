use async_trait::async_trait;
use puzzle_scores_server::error::PersistenceError;
use puzzle_scores_server::server::{ServerConfig, ServerNode, StoreBackend};
use puzzle_scores_server::storage::{DocumentEdit, MemoryScoreConnector, ScoreConnector};
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

pub fn get_server_config_memory() -> ServerConfig {
    ServerConfig {
        address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        backend: StoreBackend::Memory,
    }
}

/// Stands in for a store that cannot be reached.
pub struct UnreachableConnector;

fn unreachable() -> PersistenceError {
    PersistenceError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

#[async_trait]
impl ScoreConnector for UnreachableConnector {
    async fn fetch_document(&self) -> Result<Option<String>, PersistenceError> {
        Err(unreachable())
    }

    async fn update_document(&self, _edit: DocumentEdit) -> Result<bool, PersistenceError> {
        Err(unreachable())
    }
}

pub fn launch_server_node(connector: Arc<dyn ScoreConnector>) -> (ServerNode, Client) {
    let node = ServerNode::with_connector(get_server_config_memory(), connector);
    let client = Client::tracked(node.build()).expect("valid rocket instance");
    (node, client)
}

pub fn launch_memory_server_node() -> (Arc<MemoryScoreConnector>, Client) {
    let connector = Arc::new(MemoryScoreConnector::new());
    let (_, client) = launch_server_node(connector.clone());
    (connector, client)
}

pub fn get_scores(client: &Client) -> (Status, Value) {
    let response = client.get("/api/highscores").dispatch();
    let status = response.status();
    (status, response.into_json().expect("json body"))
}

pub fn post_score(client: &Client, body: &Value) -> (Status, Value) {
    let response = client
        .post("/api/highscores")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch();
    let status = response.status();
    (status, response.into_json().expect("json body"))
}
