// score_store.rs
use chrono::Utc;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PersistenceError, ScoreResult, ValidationError};
use crate::level::Level;
use crate::model::{HighScores, ScoreDocument};
use crate::storage::ScoreConnector;
use crate::util::sanitize_image_name;

/// Result of a score submission as reported to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub message: String,
}

/// Reads and conditionally updates the singleton score document through a
/// [`ScoreConnector`].
pub struct ScoreStore {
    connector: Arc<dyn ScoreConnector>,
}

impl ScoreStore {
    pub fn new(connector: Arc<dyn ScoreConnector>) -> Self {
        Self { connector }
    }

    /// Returns the full table, creating the default document on first use.
    pub async fn get_all(&self) -> ScoreResult<HighScores> {
        if let Some(raw) = self.connector.fetch_document().await? {
            return Ok(ScoreDocument::from_stored(&raw, Utc::now()).high_scores());
        }
        // Only create if still absent, a concurrent writer may have beaten us.
        let created = self
            .connector
            .update_document(Box::new(
                move |current: Option<&str>| -> Result<Option<String>, PersistenceError> {
                    match current {
                        Some(_) => Ok(None),
                        None => Ok(Some(ScoreDocument::new(Utc::now()).to_stored()?)),
                    }
                },
            ))
            .await?;
        if created {
            info!("Created new high score document.");
        }
        let document = match self.connector.fetch_document().await? {
            Some(raw) => ScoreDocument::from_stored(&raw, Utc::now()),
            None => ScoreDocument::new(Utc::now()),
        };
        Ok(document.high_scores())
    }

    /// Records `moves` for `(level, image_name)` if it beats the stored best.
    /// A tie is not an improvement.
    pub async fn submit_score(
        &self,
        level: Level,
        image_name: &str,
        moves: u64,
    ) -> ScoreResult<SubmitOutcome> {
        if image_name.is_empty() || moves == 0 {
            return Err(ValidationError::MissingFields.into());
        }
        let image_key = sanitize_image_name(image_name);
        debug!("submit {} moves for {} on {} (key {})", moves, level, image_name, image_key);

        // The edit may run several times under contention, so it only
        // records what the last run saw; logging happens after the write.
        let edit_key = image_key.clone();
        let started_empty = Arc::new(AtomicBool::new(false));
        let saw_empty = started_empty.clone();
        let accepted = self
            .connector
            .update_document(Box::new(
                move |current: Option<&str>| -> Result<Option<String>, PersistenceError> {
                    saw_empty.store(current.is_none(), Ordering::SeqCst);
                    let now = Utc::now();
                    let mut document = match current {
                        Some(raw) => ScoreDocument::from_stored(raw, now),
                        None => ScoreDocument::new(now),
                    };
                    if document.record_if_better(level, &edit_key, moves, now) {
                        Ok(Some(document.to_stored()?))
                    } else {
                        Ok(None)
                    }
                },
            ))
            .await?;

        if accepted && started_empty.load(Ordering::SeqCst) {
            info!("Created new high score document.");
        }
        let message = if accepted {
            info!("New best for {} on {}: {} moves", level, image_key, moves);
            format!(
                "New high score for {} level on {}: {} moves.",
                level, image_name, moves
            )
        } else {
            format!("Score not high enough for {} level on {}.", level, image_name)
        };
        Ok(SubmitOutcome { accepted, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use crate::storage::{DocumentEdit, MemoryScoreConnector};
    use serde_json::{json, Value};

    /// Replays every edit the way a redis `WATCH` retry does: the first run
    /// sees an empty store and is thrown away, then another writer stores
    /// `competitor` and the edit runs again against that.
    struct ContendedConnector {
        inner: MemoryScoreConnector,
        competitor: String,
    }

    #[async_trait::async_trait]
    impl ScoreConnector for ContendedConnector {
        async fn fetch_document(&self) -> Result<Option<String>, PersistenceError> {
            self.inner.fetch_document().await
        }

        async fn update_document(&self, mut edit: DocumentEdit) -> Result<bool, PersistenceError> {
            let _aborted = edit(None)?;
            let competitor = self.competitor.clone();
            self.inner
                .update_document(Box::new(
                    move |_: Option<&str>| -> Result<Option<String>, PersistenceError> {
                        Ok(Some(competitor.clone()))
                    },
                ))
                .await?;
            self.inner.update_document(edit).await
        }
    }

    fn store_with(connector: MemoryScoreConnector) -> (ScoreStore, Arc<MemoryScoreConnector>) {
        let connector = Arc::new(connector);
        (ScoreStore::new(connector.clone()), connector)
    }

    async fn best(store: &ScoreStore, level: Level, key: &str) -> Option<u64> {
        let scores = store.get_all().await.unwrap();
        scores.level_scores[&level].get(key).map(|score| score.moves)
    }

    #[tokio::test]
    async fn get_all_creates_and_persists_default() {
        let (store, connector) = store_with(MemoryScoreConnector::new());
        let scores = store.get_all().await.unwrap();
        assert_eq!(
            serde_json::to_value(scores).unwrap(),
            json!({ "levelScores": { "veryEasy": {}, "easy": {}, "medium": {}, "hard": {} } })
        );
        let stored: Value = serde_json::from_str(&connector.document().unwrap()).unwrap();
        assert!(stored["levelScores"]["hard"]["imageScores"].is_object());
        assert!(stored["createdAt"].is_string());
    }

    #[tokio::test]
    async fn get_all_repairs_malformed_document_without_error() {
        let (store, connector) =
            store_with(MemoryScoreConnector::with_document(r#"{"levelScores": 3}"#));
        let scores = store.get_all().await.unwrap();
        assert_eq!(scores.level_scores.len(), 4);
        assert!(scores.level_scores.values().all(|images| images.is_empty()));
        // Reads repair in memory only.
        assert_eq!(connector.document().as_deref(), Some(r#"{"levelScores": 3}"#));
    }

    #[tokio::test]
    async fn improving_scores_replace_the_best() {
        let (store, _) = store_with(MemoryScoreConnector::new());

        let outcome = store.submit_score(Level::Easy, "a.png", 10).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome {
                accepted: true,
                message: String::from("New high score for easy level on a.png: 10 moves."),
            }
        );
        assert_eq!(best(&store, Level::Easy, "a_png").await, Some(10));

        let outcome = store.submit_score(Level::Easy, "a.png", 15).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome {
                accepted: false,
                message: String::from("Score not high enough for easy level on a.png."),
            }
        );
        assert_eq!(best(&store, Level::Easy, "a_png").await, Some(10));

        let outcome = store.submit_score(Level::Easy, "a.png", 5).await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(best(&store, Level::Easy, "a_png").await, Some(5));
    }

    #[tokio::test]
    async fn ties_and_repeats_do_not_write() {
        let (store, connector) = store_with(MemoryScoreConnector::new());
        assert!(store.submit_score(Level::Hard, "x.jpg", 8).await.unwrap().accepted);
        let before = connector.document();

        for _ in 0..3 {
            assert!(!store.submit_score(Level::Hard, "x.jpg", 8).await.unwrap().accepted);
            assert!(!store.submit_score(Level::Hard, "x.jpg", 20).await.unwrap().accepted);
        }
        assert_eq!(connector.document(), before);
    }

    #[tokio::test]
    async fn dotted_and_underscored_names_share_a_cell() {
        let (store, _) = store_with(MemoryScoreConnector::new());
        assert!(store.submit_score(Level::Medium, "cat.png", 12).await.unwrap().accepted);
        let outcome = store.submit_score(Level::Medium, "cat_png", 12).await.unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.message, "Score not high enough for medium level on cat_png.");
        assert!(store.submit_score(Level::Medium, "cat_png", 11).await.unwrap().accepted);
        assert_eq!(best(&store, Level::Medium, "cat_png").await, Some(11));
    }

    #[tokio::test]
    async fn levels_are_independent() {
        let (store, _) = store_with(MemoryScoreConnector::new());
        assert!(store.submit_score(Level::VeryEasy, "a", 3).await.unwrap().accepted);
        assert!(store.submit_score(Level::Hard, "a", 30).await.unwrap().accepted);
        assert_eq!(best(&store, Level::VeryEasy, "a").await, Some(3));
        assert_eq!(best(&store, Level::Hard, "a").await, Some(30));
        assert_eq!(best(&store, Level::Easy, "a").await, None);
    }

    #[tokio::test]
    async fn submit_heals_malformed_document() {
        let (store, _) = store_with(MemoryScoreConnector::with_document(
            r#"{"levelScores": {"easy": {"imageScores": "broken"}}}"#,
        ));
        assert!(store.submit_score(Level::Easy, "a.png", 4).await.unwrap().accepted);
        let scores = store.get_all().await.unwrap();
        assert_eq!(scores.level_scores.len(), 4);
        assert_eq!(best(&store, Level::Easy, "a_png").await, Some(4));
    }

    #[tokio::test]
    async fn rejects_empty_image_or_zero_moves() {
        let (store, connector) = store_with(MemoryScoreConnector::new());
        let err = store.submit_score(Level::Easy, "", 4).await.unwrap_err();
        assert!(matches!(err, ScoreError::Validation(ValidationError::MissingFields)));
        let err = store.submit_score(Level::Easy, "a.png", 0).await.unwrap_err();
        assert!(matches!(err, ScoreError::Validation(ValidationError::MissingFields)));
        assert_eq!(connector.document(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_keep_the_minimum() {
        let (store, _) = store_with(MemoryScoreConnector::new());
        let store = Arc::new(store);
        let handles: Vec<_> = (1..=40u64)
            .rev()
            .map(|moves| {
                let store = store.clone();
                tokio::spawn(async move { store.submit_score(Level::Easy, "race.png", moves).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(best(&store, Level::Easy, "race_png").await, Some(1));
    }

    #[tokio::test]
    async fn retried_edit_reports_only_the_final_run() {
        let mut competitor = ScoreDocument::new(Utc::now());
        competitor.record_if_better(Level::Easy, "a_png", 3, Utc::now());
        let competitor = competitor.to_stored().unwrap();
        let connector = Arc::new(ContendedConnector {
            inner: MemoryScoreConnector::new(),
            competitor: competitor.clone(),
        });
        let store = ScoreStore::new(connector.clone());

        // The discarded first run would have accepted 5 on an empty store.
        let outcome = store.submit_score(Level::Easy, "a.png", 5).await.unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.message, "Score not high enough for easy level on a.png.");
        assert_eq!(connector.inner.document(), Some(competitor));

        let outcome = store.submit_score(Level::Easy, "a.png", 2).await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(best(&store, Level::Easy, "a_png").await, Some(2));
    }
}
