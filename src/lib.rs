//! trailhead - progression and reward engine for a learning platform
//!
//! Users advance through units of ordered modules, earn XP and gems into a
//! per-day activity ledger, keep streaks, work toward time-windowed goals,
//! and unlock badges evaluated from declarative criteria expressions. This
//! crate is the engine behind those rules; HTTP routing, authentication, and
//! content storage are collaborators that call into [`service::Platform`].

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod seed;
pub mod service;
pub mod storage;

pub use config::Config;
pub use engine::{CompletionOutcome, GoalProgress, RankingEntry};
pub use error::{Result, TrailheadError};
pub use model::{
    Badge, BadgeEvent, BadgeKind, DailyActivity, Goal, GoalMetric, Module, ModuleKind, Runtime,
    TimePeriod, Unit, User, UserBadge, UserGoal, UserModule, UserUnit,
};
pub use service::Platform;
pub use storage::{Database, FileStore, MemoryStore, Store};
