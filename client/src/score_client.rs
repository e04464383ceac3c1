use async_trait::async_trait;
use log::debug;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error type for the score client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid server url {0}")]
    InvalidUrl(String),
    #[error("server answered {status}: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ImageScore {
    pub moves: u64,
}

/// The full table: level name -> sanitized image name -> best score.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScores {
    pub level_scores: BTreeMap<String, BTreeMap<String, ImageScore>>,
}

/// Level names from easiest to hardest.
pub const LEVELS: [&str; 4] = ["veryEasy", "easy", "medium", "hard"];

impl HighScores {
    /// Levels in difficulty order. Names the server adds that are not in
    /// [`LEVELS`] come last, alphabetically.
    pub fn by_difficulty(&self) -> Vec<(&str, &BTreeMap<String, ImageScore>)> {
        let known = LEVELS
            .iter()
            .filter_map(|level| self.level_scores.get_key_value(*level));
        let unknown = self
            .level_scores
            .iter()
            .filter(|(level, _)| !LEVELS.contains(&level.as_str()));
        known
            .chain(unknown)
            .map(|(level, images)| (level.as_str(), images))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub message: String,
    pub is_new_high_score: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreSubmission<'a> {
    level: &'a str,
    image_name: &'a str,
    moves: u64,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

/// [`HighScoreApi`] is what a game front end needs from the high scores service.
#[async_trait]
pub trait HighScoreApi: Send + Sync {
    /// Fetches every level's best scores.
    async fn high_scores(&self) -> Result<HighScores, ClientError>;

    /// Submits a finished puzzle. The server decides whether it is a new best.
    async fn submit_score(
        &self,
        level: &str,
        image_name: &str,
        moves: u64,
    ) -> Result<SubmitOutcome, ClientError>;
}

/// Talks to the service over HTTP
pub struct HttpScoreClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpScoreClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint_url(base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Resolves `api/highscores` below `base_url`, keeping any path prefix.
fn endpoint_url(base_url: &str) -> Result<Url, ClientError> {
    let mut base =
        Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if base.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(String::from(base_url)));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("api/highscores")
        .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await?;
    Err(rejection(status, &body))
}

fn rejection(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<MessageBody>(body)
        .map(|body| body.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
    ClientError::Rejected { status, message }
}

#[async_trait]
impl HighScoreApi for HttpScoreClient {
    async fn high_scores(&self) -> Result<HighScores, ClientError> {
        debug!("GET {}", self.endpoint);
        let response = self.http.get(self.endpoint.clone()).send().await?;
        read_json(response).await
    }

    async fn submit_score(
        &self,
        level: &str,
        image_name: &str,
        moves: u64,
    ) -> Result<SubmitOutcome, ClientError> {
        debug!("POST {} ({} {} {})", self.endpoint, level, image_name, moves);
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&ScoreSubmission {
                level,
                image_name,
                moves,
            })
            .send()
            .await?;
        read_json(response).await
    }
}
