//! The progression and reward engines.
//!
//! Each submodule is a set of free functions over [`crate::storage::Database`];
//! the service layer composes them inside one transaction per request.

pub mod badges;
pub mod criteria;
pub mod goals;
pub mod leaderboard;
pub mod ledger;
pub mod progression;
pub mod review;

pub use goals::GoalProgress;
pub use leaderboard::RankingEntry;
pub use progression::CompletionOutcome;
