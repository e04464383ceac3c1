// model.rs
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::PersistenceError;
use crate::level::Level;
use crate::util::ImageKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageScore {
    pub moves: u64,
}

/// Best scores for one level, keyed by sanitized image name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEntry {
    pub image_scores: BTreeMap<ImageKey, ImageScore>,
}

/// One entry per [`Level`]. A field per level keeps all four present in
/// every document without runtime checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelScores {
    pub very_easy: LevelEntry,
    pub easy: LevelEntry,
    pub medium: LevelEntry,
    pub hard: LevelEntry,
}

impl LevelScores {
    pub fn get(&self, level: Level) -> &LevelEntry {
        match level {
            Level::VeryEasy => &self.very_easy,
            Level::Easy => &self.easy,
            Level::Medium => &self.medium,
            Level::Hard => &self.hard,
        }
    }

    pub fn get_mut(&mut self, level: Level) -> &mut LevelEntry {
        match level {
            Level::VeryEasy => &mut self.very_easy,
            Level::Easy => &mut self.easy,
            Level::Medium => &mut self.medium,
            Level::Hard => &mut self.hard,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, &LevelEntry)> + '_ {
        Level::ALL.iter().map(move |level| (*level, self.get(*level)))
    }
}

/// The singleton document as it sits in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDocument {
    pub level_scores: LevelScores,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `GET /api/highscores`: level -> image key -> `{ moves }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScores {
    pub level_scores: BTreeMap<Level, BTreeMap<ImageKey, ImageScore>>,
}

impl ScoreDocument {
    /// A fresh document with all four levels and no scores.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            level_scores: LevelScores::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Decodes whatever is stored into a well-formed document. Anything that
    /// does not fit the expected shape is repaired and reported with a
    /// warning; this never fails.
    pub fn from_stored(raw: &str, now: DateTime<Utc>) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Stored score document is not valid JSON ({}), resetting it", e);
                return Self::new(now);
            }
        };
        let root = match value.as_object() {
            Some(root) => root,
            None => {
                warn!("Stored score document is not an object, resetting it");
                return Self::new(now);
            }
        };
        let level_scores = match root.get("levelScores").and_then(Value::as_object) {
            Some(levels) => normalize_levels(levels),
            None => {
                warn!("Fixing malformed levelScores structure.");
                LevelScores::default()
            }
        };
        Self {
            level_scores,
            created_at: parse_timestamp(root.get("createdAt")).unwrap_or(now),
            updated_at: parse_timestamp(root.get("updatedAt")).unwrap_or(now),
        }
    }

    pub fn to_stored(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn best_moves(&self, level: Level, image_key: &str) -> Option<u64> {
        self.level_scores
            .get(level)
            .image_scores
            .get(image_key)
            .map(|score| score.moves)
    }

    /// Stores `moves` if it is strictly below the current best for the cell.
    /// Returns whether the document changed.
    pub fn record_if_better(
        &mut self,
        level: Level,
        image_key: &str,
        moves: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let improves = self
            .best_moves(level, image_key)
            .map_or(true, |best| moves < best);
        if improves {
            self.level_scores
                .get_mut(level)
                .image_scores
                .insert(image_key.to_string(), ImageScore { moves });
            self.updated_at = now;
        }
        improves
    }

    pub fn high_scores(&self) -> HighScores {
        HighScores {
            level_scores: self
                .level_scores
                .iter()
                .map(|(level, entry)| (level, entry.image_scores.clone()))
                .collect(),
        }
    }
}

fn normalize_levels(levels: &Map<String, Value>) -> LevelScores {
    for name in levels.keys() {
        if name.parse::<Level>().is_err() {
            warn!("Dropping unknown level {:?} from stored scores", name);
        }
    }
    let mut scores = LevelScores::default();
    for level in Level::ALL.iter() {
        let images = levels
            .get(level.as_str())
            .and_then(|entry| entry.get("imageScores"))
            .and_then(Value::as_object);
        match images {
            Some(images) => scores.get_mut(*level).image_scores = normalize_images(*level, images),
            None => warn!("Level {} has no usable imageScores, resetting it", level),
        }
    }
    scores
}

fn normalize_images(level: Level, images: &Map<String, Value>) -> BTreeMap<ImageKey, ImageScore> {
    images
        .iter()
        .filter_map(|(key, value)| {
            match value.get("moves").and_then(positive_moves) {
                Some(moves) => Some((key.clone(), ImageScore { moves })),
                None => {
                    warn!("Dropping malformed score for {} on {}: {}", key, level, value);
                    None
                }
            }
        })
        .collect()
}

/// Reads a move count: any JSON number with a positive whole value, so
/// `10` and `10.0` are the same score.
pub fn positive_moves(value: &Value) -> Option<u64> {
    if let Some(moves) = value.as_u64() {
        return Some(moves).filter(|moves| *moves > 0);
    }
    value
        .as_f64()
        .filter(|moves| *moves > 0.0 && moves.fract() == 0.0 && *moves < u64::MAX as f64)
        .map(|moves| moves as u64)
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
}
