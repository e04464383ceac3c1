use log::{debug, error, info};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::{self, Json};
use rocket::{get, options, post, routes, Build, Request, Response, Rocket, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use url::Url;

use crate::error::{PersistenceError, ScoreError, ValidationError};
use crate::level::Level;
use crate::model::{positive_moves, HighScores};
use crate::score_store::ScoreStore;
use crate::storage::{MemoryScoreConnector, RedisScoreConnector, ScoreConnector};
use crate::util::redact_url;

const FETCH_FAILED: &str = "Server error fetching high scores";
const UPDATE_FAILED: &str = "Server error updating high score";

/// Body of `POST /api/highscores`. Every field is optional here so that
/// missing or mistyped fields get the validation message instead of a
/// deserialization error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub level: Option<String>,
    pub image_name: Option<String>,
    pub moves: Option<Value>,
}

impl ScoreSubmission {
    pub fn validate(&self) -> Result<(Level, &str, u64), ValidationError> {
        let level = self.level.as_deref().filter(|level| !level.is_empty());
        let image_name = self.image_name.as_deref().filter(|name| !name.is_empty());
        let moves = self.moves.as_ref().and_then(positive_moves);
        match (level, image_name, moves) {
            (Some(level), Some(image_name), Some(moves)) => Ok((level.parse()?, image_name, moves)),
            _ => Err(ValidationError::MissingFields),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub message: String,
    pub is_new_high_score: bool,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

/// Error reply carrying a status and a `{ "message": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    status: Status,
    message: String,
}

impl ApiError {
    fn bad_request(err: ValidationError) -> Self {
        Self {
            status: Status::BadRequest,
            message: err.to_string(),
        }
    }

    /// Persistence failures are logged and hidden behind `generic`.
    fn from_score_error(err: ScoreError, generic: &'static str) -> Self {
        match err {
            ScoreError::Validation(err) => Self::bad_request(err),
            ScoreError::Persistence(err) => {
                error!("{}: {}", generic, err);
                Self {
                    status: Status::InternalServerError,
                    message: String::from(generic),
                }
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(MessageBody { message: self.message })).respond_to(req)
    }
}

/// Adds permissive CORS headers so the browser game can call the API from
/// another origin.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        res.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
    }
}

#[get("/")]
fn health_check() -> &'static str {
    "Healthy\n"
}

#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

#[get("/api/highscores")]
async fn get_high_scores(store: &State<Arc<ScoreStore>>) -> Result<Json<HighScores>, ApiError> {
    store
        .get_all()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_score_error(e, FETCH_FAILED))
}

#[post("/api/highscores", data = "<submission>")]
async fn submit_high_score(
    submission: Result<Json<ScoreSubmission>, json::Error<'_>>,
    store: &State<Arc<ScoreStore>>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submission = submission.map_err(|e| {
        debug!("unreadable score submission: {}", e);
        ApiError::bad_request(ValidationError::MissingFields)
    })?;
    let (level, image_name, moves) = submission.validate().map_err(ApiError::bad_request)?;
    let outcome = store
        .submit_score(level, image_name, moves)
        .await
        .map_err(|e| ApiError::from_score_error(e, UPDATE_FAILED))?;
    Ok(Json(SubmitResponse {
        message: outcome.message,
        is_new_high_score: outcome.accepted,
    }))
}

/// Where the score document lives.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Redis { url: Url, key: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub backend: StoreBackend,
}

pub struct ServerNode {
    config: ServerConfig,
    store: Arc<ScoreStore>,
}

impl ServerNode {
    /// Builds the connector named by `config.backend`. An unreachable redis
    /// is logged but not fatal; requests fail with 500 until it comes back.
    pub async fn new(config: ServerConfig) -> Result<Self, PersistenceError> {
        let connector: Arc<dyn ScoreConnector> = match &config.backend {
            StoreBackend::Redis { url, key } => {
                info!("Using Redis score store at {}.", redact_url(url));
                let connector = RedisScoreConnector::new(url, key.clone())?;
                match connector.ping().await {
                    Ok(()) => info!("Redis connected successfully"),
                    Err(e) => error!("Redis connection error: {}", e),
                }
                Arc::new(connector)
            }
            StoreBackend::Memory => {
                info!("Using in-memory score store.");
                Arc::new(MemoryScoreConnector::new())
            }
        };
        Ok(Self::with_connector(config, connector))
    }

    /// Uses `connector` regardless of `config.backend`.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn ScoreConnector>) -> Self {
        Self {
            config,
            store: Arc::new(ScoreStore::new(connector)),
        }
    }

    pub fn store(&self) -> Arc<ScoreStore> {
        self.store.clone()
    }

    pub fn build(&self) -> Rocket<Build> {
        rocket::build()
            .configure(
                rocket::Config::figment()
                    .merge(("port", self.config.port))
                    .merge(("address", self.config.address)),
            )
            .manage(self.store.clone())
            .attach(Cors)
            .mount(
                "/",
                routes![health_check, preflight, get_high_scores, submit_high_score],
            )
    }
}
