pub mod score_client;

pub use score_client::{ClientError, HighScoreApi, HighScores, HttpScoreClient, ImageScore, SubmitOutcome, LEVELS};
