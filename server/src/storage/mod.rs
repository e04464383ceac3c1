pub mod memory_score_connector;
pub mod redis_score_connector;
pub mod score_connector;

pub use memory_score_connector::MemoryScoreConnector;
pub use redis_score_connector::RedisScoreConnector;
pub use score_connector::{DocumentEdit, ScoreConnector};
