//! Configuration and policy constants for trailhead.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. User config (`~/.trailhead/config.toml`)
//! 3. Defaults (lowest priority)
//!
//! All configuration is optional. The engines run with the default policy
//! when no config exists. Every tunable the spec calls a "policy constant"
//! (XP amounts, the quiz threshold, goal caps and personal-goal bounds,
//! review sizes, purchase costs, the leaderboard reward) lives here rather
//! than inline in engine code.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrailheadError};
use crate::model::{GoalMetric, TimePeriod};

/// Main configuration struct for trailhead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// XP credited per module completion, by module kind.
    pub xp: XpConfig,
    /// Quiz acceptance policy.
    pub quiz: QuizConfig,
    /// Goal rotation and personal-goal policy.
    pub goals: GoalsConfig,
    /// Weekly review selection policy.
    pub review: ReviewConfig,
    /// Weekly leaderboard reward policy.
    pub rewards: RewardsConfig,
    /// Gem costs for purchasable content.
    pub shop: ShopConfig,
}

/// XP credited per module completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct XpConfig {
    /// Guides, quizzes, and solution write-ups.
    pub guide_xp: u32,
    /// Code challenges and bonus challenges.
    pub challenge_xp: u32,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            guide_xp: 10,
            challenge_xp: 25,
        }
    }
}

/// Quiz acceptance policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuizConfig {
    /// Minimum accuracy (0-100) for a quiz submission to complete the module.
    pub pass_threshold: u32,
}

impl QuizConfig {
    pub fn is_valid_threshold(value: u32) -> bool {
        value <= 100
    }
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self { pass_threshold: 80 }
    }
}

/// Inclusive requirement bounds for a personal goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
}

impl Bounds {
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Goal rotation and personal-goal policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GoalsConfig {
    /// Number of goals assigned per period window.
    pub per_period: usize,
    /// Upper bound on rejection-sampling draws before the distinct-metric
    /// requirement is dropped and duplicates are accepted.
    pub max_distinct_draws: u32,
    pub daily_modules: Bounds,
    pub daily_gems: Bounds,
    pub daily_streak: Bounds,
    pub weekly_modules: Bounds,
    pub weekly_gems: Bounds,
    pub weekly_streak: Bounds,
    pub monthly_modules: Bounds,
    pub monthly_gems: Bounds,
    pub monthly_streak: Bounds,
}

impl GoalsConfig {
    /// Valid requirement range for a personal goal of this metric and period.
    pub fn personal_bounds(&self, metric: GoalMetric, period: TimePeriod) -> Bounds {
        match (period, metric) {
            (TimePeriod::Daily, GoalMetric::CompleteModules) => self.daily_modules,
            (TimePeriod::Daily, GoalMetric::EarnGems) => self.daily_gems,
            (TimePeriod::Daily, GoalMetric::ExtendStreak) => self.daily_streak,
            (TimePeriod::Weekly, GoalMetric::CompleteModules) => self.weekly_modules,
            (TimePeriod::Weekly, GoalMetric::EarnGems) => self.weekly_gems,
            (TimePeriod::Weekly, GoalMetric::ExtendStreak) => self.weekly_streak,
            (TimePeriod::Monthly, GoalMetric::CompleteModules) => self.monthly_modules,
            (TimePeriod::Monthly, GoalMetric::EarnGems) => self.monthly_gems,
            (TimePeriod::Monthly, GoalMetric::ExtendStreak) => self.monthly_streak,
        }
    }
}

impl Default for GoalsConfig {
    fn default() -> Self {
        Self {
            per_period: 3,
            max_distinct_draws: 12,
            daily_modules: Bounds { min: 1, max: 20 },
            daily_gems: Bounds { min: 1, max: 50 },
            // The streak can extend once per day, so a daily streak goal can
            // only ever require 1.
            daily_streak: Bounds { min: 1, max: 1 },
            weekly_modules: Bounds { min: 3, max: 60 },
            weekly_gems: Bounds { min: 5, max: 200 },
            weekly_streak: Bounds { min: 1, max: 7 },
            monthly_modules: Bounds { min: 10, max: 200 },
            monthly_gems: Bounds { min: 30, max: 100 },
            monthly_streak: Bounds { min: 1, max: 31 },
        }
    }
}

/// Weekly review selection policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Number of questions in a review set.
    pub set_size: usize,
    /// Share of the set drawn from the most recently completed unit.
    pub recent_share: f64,
    /// How far back practiced questions are eligible, in days.
    pub lookback_days: u32,
}

impl ReviewConfig {
    pub fn is_valid_share(value: f64) -> bool {
        value > 0.0 && value <= 1.0
    }

    /// Question slots reserved for the most recent unit.
    pub fn recent_slots(&self) -> usize {
        (self.recent_share * self.set_size as f64) as usize
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            set_size: 10,
            recent_share: 0.65,
            lookback_days: 90,
        }
    }
}

/// Weekly leaderboard reward policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardsConfig {
    /// Gems credited to each of last week's top finishers.
    pub leaderboard_gems: u32,
    /// How many finishers earn the reward.
    pub leaderboard_top_n: usize,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            leaderboard_gems: 20,
            leaderboard_top_n: 5,
        }
    }
}

/// Gem costs for purchasable content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShopConfig {
    pub hint_cost: u32,
    pub bonus_challenge_cost: u32,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            hint_cost: 5,
            bonus_challenge_cost: 30,
        }
    }
}

impl Config {
    /// Load configuration using the full precedence chain.
    pub fn load() -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = user_config;
        }

        config.apply_env_overrides();
        config
    }

    /// Load user config from `~/.trailhead/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = trailhead_home()?;
        let config_path = home.join("config.toml");
        Self::load_from_file(&config_path).ok()
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| TrailheadError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| TrailheadError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("TRAILHEAD_QUIZ_THRESHOLD") {
            match val.parse::<u32>() {
                Ok(n) if QuizConfig::is_valid_threshold(n) => {
                    self.quiz.pass_threshold = n;
                }
                _ => eprintln!(
                    "Warning: Invalid TRAILHEAD_QUIZ_THRESHOLD value '{}'. \
                    Expected an integer between 0 and 100. Using '{}'.",
                    val, self.quiz.pass_threshold
                ),
            }
        }

        if let Ok(val) = env::var("TRAILHEAD_LEADERBOARD_GEMS") {
            match val.parse::<u32>() {
                Ok(n) => self.rewards.leaderboard_gems = n,
                Err(_) => eprintln!(
                    "Warning: Invalid TRAILHEAD_LEADERBOARD_GEMS value '{}'. \
                    Expected a non-negative integer. Using '{}'.",
                    val, self.rewards.leaderboard_gems
                ),
            }
        }
    }
}

/// Get the trailhead home directory.
///
/// Checks `TRAILHEAD_HOME` first, then falls back to `~/.trailhead`.
pub fn trailhead_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("TRAILHEAD_HOME") {
        if home.is_empty() {
            tracing::warn!("TRAILHEAD_HOME is empty, using default");
        } else {
            return Some(PathBuf::from(home));
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".trailhead"));
    }

    // Fallback for containerized/minimal environments without HOME
    let fallback = env::temp_dir().join("trailhead");
    tracing::warn!("HOME not set, using fallback location: {}", fallback.display());
    Some(fallback)
}

/// Path of the JSON snapshot inside a data directory.
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join("platform.json")
}
