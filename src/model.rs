//! Core entities for the progression and reward engine.
//!
//! Ids are plain integers matching the relational rows they mirror. Every
//! enum here is the single, versioned vocabulary for its concept; route-level
//! code never compares against historical string spellings.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type CourseId = u64;
pub type UnitId = u64;
pub type ModuleId = u64;
pub type GoalId = u64;
pub type BadgeId = u64;
pub type QuestionId = u64;
pub type HintId = u64;
pub type TestCaseId = u64;

/// The kind of content a module holds.
///
/// Bonus modules sit outside the unit's completion order: they neither count
/// toward "all modules complete" nor open successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    ConceptGuide,
    RecognitionGuide,
    Quiz,
    Challenge,
    ChallengeSolution,
    BonusChallenge,
    BonusSolution,
}

impl ModuleKind {
    /// Bonus modules are excluded from unit-completion accounting.
    pub fn is_bonus(&self) -> bool {
        matches!(self, Self::BonusChallenge | Self::BonusSolution)
    }

    /// Whether completing this module counts toward unit completion.
    pub fn counts_toward_unit(&self) -> bool {
        !self.is_bonus()
    }

    /// Challenge-kind modules may carry a target runtime and accept runtime
    /// submissions; guides, quizzes, and solution write-ups may not.
    pub fn accepts_runtime(&self) -> bool {
        matches!(self, Self::Challenge | Self::BonusChallenge)
    }

    /// Whether hints and test cases may attach to this module.
    pub fn is_challenge_content(&self) -> bool {
        matches!(
            self,
            Self::Challenge | Self::ChallengeSolution | Self::BonusChallenge | Self::BonusSolution
        )
    }
}

/// What a goal measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    CompleteModules,
    EarnGems,
    ExtendStreak,
}

impl fmt::Display for GoalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CompleteModules => "complete_modules",
            Self::EarnGems => "earn_gems",
            Self::ExtendStreak => "extend_streak",
        };
        f.write_str(s)
    }
}

impl FromStr for GoalMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "complete_modules" => Ok(Self::CompleteModules),
            "earn_gems" => Ok(Self::EarnGems),
            "extend_streak" => Ok(Self::ExtendStreak),
            other => Err(format!("unknown goal metric: {other}")),
        }
    }
}

/// The window a goal is assigned and measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl FromStr for TimePeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown time period: {other}")),
        }
    }
}

/// Badge category, for display grouping only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    /// Tied to a piece of content (a unit, a course).
    Content,
    /// Tied to an achievement (streaks, perfect scores).
    Award,
}

/// The trigger that causes a badge's criteria to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeEvent {
    CompleteModule,
    UnitCompletion,
    QuizPerfectScore,
    StreakAchievement,
}

/// Asymptotic runtime classes for code challenges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Runtime {
    #[serde(rename = "O(1)")]
    Constant,
    #[serde(rename = "O(log n)")]
    Logarithmic,
    #[serde(rename = "O(n)")]
    Linear,
    #[serde(rename = "O(n log n)")]
    Linearithmic,
    #[serde(rename = "O(n^2)")]
    Quadratic,
    #[serde(rename = "O(n^3)")]
    Cubic,
    #[serde(rename = "O(2^n)")]
    Exponential,
    #[serde(rename = "O(n!)")]
    Factorial,
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Constant => "O(1)",
            Self::Logarithmic => "O(log n)",
            Self::Linear => "O(n)",
            Self::Linearithmic => "O(n log n)",
            Self::Quadratic => "O(n^2)",
            Self::Cubic => "O(n^3)",
            Self::Exponential => "O(2^n)",
            Self::Factorial => "O(n!)",
        };
        f.write_str(s)
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "O(1)" => Ok(Self::Constant),
            "O(log n)" => Ok(Self::Logarithmic),
            "O(n)" => Ok(Self::Linear),
            "O(n log n)" => Ok(Self::Linearithmic),
            "O(n^2)" => Ok(Self::Quadratic),
            "O(n^3)" => Ok(Self::Cubic),
            "O(2^n)" => Ok(Self::Exponential),
            "O(n!)" => Ok(Self::Factorial),
            other => Err(format!("unknown runtime: {other}")),
        }
    }
}

/// A learner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Consecutive active days. Extended at most once per day.
    pub streak: u32,
    pub gems: u32,
    pub xp: u32,
    /// Latch for the weekly leaderboard gem reward.
    pub last_leaderboard_reward: Option<NaiveDate>,
    pub date_joined: NaiveDate,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, date_joined: NaiveDate) -> Self {
        Self {
            id,
            username: username.into(),
            streak: 0,
            gems: 0,
            xp: 0,
            last_leaderboard_reward: None,
            date_joined,
        }
    }
}

/// A course: an ordered collection of units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
}

/// A unit within a course: an ordered collection of modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    pub course_id: CourseId,
    pub title: String,
    pub order: u32,
}

/// A content module within a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Module {
    pub id: ModuleId,
    pub unit_id: UnitId,
    pub title: String,
    /// Position within the unit. Order 1 is implicitly open for every user.
    pub order: u32,
    pub kind: ModuleKind,
    /// Expected asymptotic runtime; only present on challenge-kind modules.
    pub target_runtime: Option<Runtime>,
}

/// Per-user progression record for a module. Created lazily on first
/// interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserModule {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub open: bool,
    pub completed: bool,
    pub completed_date: Option<NaiveDate>,
    /// The runtime the user claimed for their solution; challenge-kind only.
    pub submitted_runtime: Option<Runtime>,
}

impl UserModule {
    pub fn new(user_id: UserId, module_id: ModuleId) -> Self {
        Self {
            user_id,
            module_id,
            open: false,
            completed: false,
            completed_date: None,
            submitted_runtime: None,
        }
    }
}

/// Per-user unit completion record. `completed` is set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserUnit {
    pub user_id: UserId,
    pub unit_id: UnitId,
    pub completed: bool,
    pub completed_date: Option<NaiveDate>,
}

impl UserUnit {
    pub fn new(user_id: UserId, unit_id: UnitId) -> Self {
        Self {
            user_id,
            unit_id,
            completed: false,
            completed_date: None,
        }
    }
}

/// The per-user per-day activity ledger row.
///
/// This is the single source of truth for time-windowed aggregates: goal
/// progress and streak checks read it, nothing else does its own counting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyActivity {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub xp_earned: u32,
    pub gems_earned: u32,
    pub modules_completed: u32,
    /// Set at most once per day, by the first XP-earning action.
    pub streak_extended: bool,
}

impl DailyActivity {
    pub fn new(user_id: UserId, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            xp_earned: 0,
            gems_earned: 0,
            modules_completed: 0,
            streak_extended: false,
        }
    }
}

/// A goal definition, either from the rotation pool or user-created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    pub metric: GoalMetric,
    /// Target value for the metric over the goal's window.
    pub requirement: u32,
    pub period: TimePeriod,
    /// User-created goals are excluded from the rotation pool.
    pub custom: bool,
}

/// An assignment of a goal to a user for one period window.
///
/// `date_assigned` anchors the window; `date_completed` transitions from
/// `None` to `Some` exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserGoal {
    pub user_id: UserId,
    pub goal_id: GoalId,
    pub date_assigned: NaiveDate,
    pub date_completed: Option<NaiveDate>,
}

/// A badge definition with a declarative award criteria expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub id: BadgeId,
    pub title: String,
    pub description: String,
    pub kind: BadgeKind,
    pub event: BadgeEvent,
    /// Boolean predicate over named event variables, e.g.
    /// `"user.streak >= 7"` or `"quiz_score == 100"`. Parsed by
    /// [`crate::engine::criteria`]; never executed as code.
    pub criteria: String,
}

/// An awarded badge. Row existence is the at-most-once guarantee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserBadge {
    pub user_id: UserId,
    pub badge_id: BadgeId,
    pub date_earned: NaiveDate,
}

/// A single quiz question with its answer options embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub module_id: ModuleId,
    pub title: String,
    pub options: Vec<QuizOption>,
}

/// One answer option on a quiz question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizOption {
    pub text: String,
    pub correct: bool,
}

/// Per-user spaced-practice record for a quiz question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserQuizQuestion {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub last_practiced: NaiveDate,
}

/// A purchasable hint attached to a challenge module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hint {
    pub id: HintId,
    pub module_id: ModuleId,
    pub text: String,
}

/// A hint unlock. Row existence means the user paid for it once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserHint {
    pub user_id: UserId,
    pub hint_id: HintId,
    pub unlocked_on: NaiveDate,
}

/// A test case attached to a challenge module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub id: TestCaseId,
    pub module_id: ModuleId,
    pub input: String,
    pub expected_output: String,
}

/// A per-user record of a verified (passing) test case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserTestCase {
    pub user_id: UserId,
    pub test_case_id: TestCaseId,
    pub verified_on: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_kind_bonus_partition() {
        assert!(ModuleKind::BonusChallenge.is_bonus());
        assert!(ModuleKind::BonusSolution.is_bonus());
        assert!(!ModuleKind::Quiz.is_bonus());
        assert!(ModuleKind::Quiz.counts_toward_unit());
        assert!(!ModuleKind::BonusSolution.counts_toward_unit());
    }

    #[test]
    fn test_module_kind_runtime_rules() {
        assert!(ModuleKind::Challenge.accepts_runtime());
        assert!(ModuleKind::BonusChallenge.accepts_runtime());
        assert!(!ModuleKind::ChallengeSolution.accepts_runtime());
        assert!(!ModuleKind::ConceptGuide.accepts_runtime());
    }

    #[test]
    fn test_module_kind_challenge_content() {
        assert!(ModuleKind::Challenge.is_challenge_content());
        assert!(ModuleKind::ChallengeSolution.is_challenge_content());
        assert!(!ModuleKind::Quiz.is_challenge_content());
    }

    #[test]
    fn test_metric_round_trip() {
        for metric in [
            GoalMetric::CompleteModules,
            GoalMetric::EarnGems,
            GoalMetric::ExtendStreak,
        ] {
            let parsed: GoalMetric = metric.to_string().parse().unwrap();
            assert_eq!(parsed, metric);
        }
        assert!("streakiness".parse::<GoalMetric>().is_err());
    }

    #[test]
    fn test_period_round_trip() {
        for period in [TimePeriod::Daily, TimePeriod::Weekly, TimePeriod::Monthly] {
            let parsed: TimePeriod = period.to_string().parse().unwrap();
            assert_eq!(parsed, period);
        }
        assert!("fortnightly".parse::<TimePeriod>().is_err());
    }

    #[test]
    fn test_runtime_serde_uses_big_o_notation() {
        let json = serde_json::to_string(&Runtime::Linearithmic).unwrap();
        assert_eq!(json, "\"O(n log n)\"");
        let back: Runtime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Runtime::Linearithmic);
    }

    #[test]
    fn test_module_kind_serde_snake_case() {
        let json = serde_json::to_string(&ModuleKind::ChallengeSolution).unwrap();
        assert_eq!(json, "\"challenge_solution\"");
    }

    #[test]
    fn test_new_user_defaults() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let user = User::new(1, "ada", date);
        assert_eq!(user.streak, 0);
        assert_eq!(user.gems, 0);
        assert_eq!(user.xp, 0);
        assert!(user.last_leaderboard_reward.is_none());
    }
}
