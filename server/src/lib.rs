pub mod error;
pub mod level;
pub mod model;
pub mod score_store;
pub mod server;
pub mod storage;
pub mod util;
