// Character Ranking - Core Library
// Exposes all modules for use in the admin CLI, the API server, and tests

pub mod character;
pub mod config;
pub mod db;
pub mod directory;
pub mod enroll;
pub mod error;
pub mod leaderboard;
pub mod moderation;
pub mod pairing;
pub mod service;
pub mod store;
pub mod voting;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use character::{Character, CharacterId, Gender, LEADERBOARD_LIMIT, REPORT_THRESHOLD};
pub use config::Config;
pub use db::{setup_database, Event};
pub use directory::{Directory, DirectoryError, DirectoryProfile, HttpDirectory};
pub use enroll::CreateRequest;
pub use error::{RankingError, RankingResult};
pub use leaderboard::{Leader, Stats, TopFilter};
pub use moderation::ReportOutcome;
pub use pairing::Pair;
pub use service::RankingService;
pub use store::Store;
pub use voting::{VoteOutcome, VoteRequest};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
