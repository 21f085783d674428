//! The collaborator-facing service surface.
//!
//! [`Platform`] wraps a [`Store`] and a [`Config`] and exposes the operations
//! HTTP handlers call, with typed request/reply structs. Each operation runs
//! in a single transaction, so a failure mid-cascade rolls back completely
//! and every reply reflects a committed state. Routing, authentication, and
//! content-file serving live outside this crate.

use chrono::Utc;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::config::Config;
use crate::engine::{goals, leaderboard, ledger, progression, review};
use crate::engine::{CompletionOutcome, GoalProgress};
use crate::error::{Result, TrailheadError};
use crate::model::{
    BadgeId, BadgeKind, GoalId, GoalMetric, HintId, ModuleId, ModuleKind, QuestionId, Runtime,
    TimePeriod, UserId,
};
use crate::storage::Store;

/// Generic message reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageReply {
    pub message: String,
}

impl MessageReply {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Quiz submission body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizScoreRequest {
    pub accuracy: u32,
}

/// Personal goal creation body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalGoalRequest {
    pub time_period: TimePeriod,
    pub metric: GoalMetric,
    pub target: u32,
}

/// One goal with its progress, as shown to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalView {
    pub goal_id: GoalId,
    pub title: String,
    pub metric: GoalMetric,
    pub time_period: TimePeriod,
    pub current_value: u32,
    pub target_value: u32,
    pub progress_percentage: f64,
    pub completed: bool,
}

impl From<&GoalProgress> for GoalView {
    fn from(progress: &GoalProgress) -> Self {
        Self {
            goal_id: progress.goal_id,
            title: progress.title.clone(),
            metric: progress.metric,
            time_period: progress.period,
            current_value: progress.current,
            target_value: progress.target,
            progress_percentage: progress.percent,
            completed: progress.completed,
        }
    }
}

/// Goal progress reply; newly completed goals are reported separately so the
/// client can celebrate them exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProgressReply {
    pub goals: Vec<GoalView>,
    pub newly_completed_goals: Vec<GoalView>,
}

/// Derived user stats read model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStatsReply {
    pub streak: u32,
    pub gems: u32,
    pub xp: u32,
}

/// An earned badge, for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BadgeView {
    pub badge_id: BadgeId,
    pub title: String,
    pub description: String,
    pub kind: BadgeKind,
    pub date_earned: chrono::NaiveDate,
}

/// A quiz question with its options, for review sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub title: String,
    pub options: Vec<QuestionOptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionOptionView {
    pub text: String,
    pub correct: bool,
}

/// One weekly leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingView {
    pub username: String,
    pub xp: u32,
}

/// Result of a runtime submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeCheckReply {
    pub matches_target: bool,
}

/// An unlocked hint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HintReply {
    pub hint_id: HintId,
    pub text: String,
}

/// Reply to a successful registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterReply {
    pub user_id: UserId,
    pub username: String,
}

/// Reply to a login, reporting the bookkeeping that ran.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginReply {
    pub streak: u32,
    pub streak_reset: bool,
    pub daily_goals_assigned: usize,
    pub monthly_goals_assigned: usize,
    pub leaderboard_reward: Option<u32>,
}

/// The platform facade.
pub struct Platform<S: Store> {
    store: S,
    config: Config,
}

impl<S: Store> Platform<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access to the underlying store, for seeding and admin tasks.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn today() -> chrono::NaiveDate {
        Utc::now().date_naive()
    }

    /// Create an account and assign its first goal sets, so signups mid-day
    /// or mid-month do not miss their first window.
    pub fn register(&self, username: &str) -> Result<RegisterReply> {
        let today = Self::today();
        let config = &self.config;
        self.store.with_tx(|db| {
            let user_id = db.add_user(username, today)?;
            let mut rng = thread_rng();
            goals::ensure_period_goals(db, config, user_id, TimePeriod::Daily, today, &mut rng)?;
            goals::ensure_period_goals(db, config, user_id, TimePeriod::Monthly, today, &mut rng)?;
            Ok(RegisterReply {
                user_id,
                username: db.user(user_id)?.username.clone(),
            })
        })
    }

    /// Login bookkeeping: streak correction, goal rotation, and the weekly
    /// leaderboard reward check.
    pub fn login(&self, user_id: UserId) -> Result<LoginReply> {
        let today = Self::today();
        let config = &self.config;
        self.store.with_tx(|db| {
            let streak_reset = ledger::reset_streak_if_inactive(db, user_id, today)?;
            let mut rng = thread_rng();
            let daily =
                goals::ensure_period_goals(db, config, user_id, TimePeriod::Daily, today, &mut rng)?;
            let monthly = goals::ensure_period_goals(
                db,
                config,
                user_id,
                TimePeriod::Monthly,
                today,
                &mut rng,
            )?;
            let reward = leaderboard::maybe_award_weekly_gems(db, config, user_id, today)?;
            Ok(LoginReply {
                streak: db.user(user_id)?.streak,
                streak_reset,
                daily_goals_assigned: daily.len(),
                monthly_goals_assigned: monthly.len(),
                leaderboard_reward: reward,
            })
        })
    }

    /// `POST /modules/{id}/complete`
    pub fn complete_module(&self, user_id: UserId, module_id: ModuleId) -> Result<MessageReply> {
        let today = Self::today();
        let config = &self.config;
        let outcome = self
            .store
            .with_tx(|db| progression::complete_module(db, config, user_id, module_id, today))?;
        Ok(MessageReply::new(match outcome {
            CompletionOutcome::AlreadyCompleted => "Module already completed",
            CompletionOutcome::Completed {
                unit_completed: true,
            } => "Module marked as complete and unit completed",
            CompletionOutcome::Completed {
                unit_completed: false,
            } => "Module marked as complete and next modules opened",
        }))
    }

    /// `POST /modules/{id}/quiz-scores`
    pub fn submit_quiz_score(
        &self,
        user_id: UserId,
        module_id: ModuleId,
        request: QuizScoreRequest,
    ) -> Result<MessageReply> {
        let today = Self::today();
        let config = &self.config;
        self.store.with_tx(|db| {
            progression::submit_quiz_score(db, config, user_id, module_id, request.accuracy, today)
        })?;
        Ok(MessageReply::new("Submitted quiz successfully"))
    }

    /// Record the runtime a user claims for a challenge solution.
    pub fn submit_runtime(
        &self,
        user_id: UserId,
        module_id: ModuleId,
        runtime: Runtime,
    ) -> Result<RuntimeCheckReply> {
        let matches_target = self
            .store
            .with_tx(|db| progression::submit_runtime(db, user_id, module_id, runtime))?;
        Ok(RuntimeCheckReply { matches_target })
    }

    /// `GET /goals/{daily|weekly|monthly}`
    ///
    /// Runs in a transaction because observing a completed goal stamps its
    /// completion date.
    pub fn goal_progress(&self, user_id: UserId, period: TimePeriod) -> Result<GoalProgressReply> {
        let today = Self::today();
        let progress = self
            .store
            .with_tx(|db| goals::evaluate_goals(db, user_id, period, today))?;

        let newly_completed_goals = progress
            .iter()
            .filter(|p| p.newly_completed)
            .map(GoalView::from)
            .collect();
        let goals = progress.iter().map(GoalView::from).collect();
        Ok(GoalProgressReply {
            goals,
            newly_completed_goals,
        })
    }

    /// `POST /goals/add-personal`
    pub fn add_personal_goal(
        &self,
        user_id: UserId,
        request: PersonalGoalRequest,
    ) -> Result<MessageReply> {
        let today = Self::today();
        let config = &self.config;
        self.store.with_tx(|db| {
            goals::add_personal_goal(
                db,
                config,
                user_id,
                request.time_period,
                request.metric,
                request.target,
                today,
            )
        })?;
        Ok(MessageReply::new("Personal goal added"))
    }

    /// `POST /bonus-challenges/{id}/buy`
    ///
    /// Opening an already-open bonus challenge is free and succeeds.
    pub fn buy_bonus_challenge(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<MessageReply> {
        let config = &self.config;
        self.store.with_tx(|db| {
            let module = db.module(module_id)?;
            if module.kind != ModuleKind::BonusChallenge {
                return Err(TrailheadError::validation(
                    "only bonus challenges can be purchased",
                ));
            }
            if db
                .user_module(user_id, module_id)
                .is_some_and(|um| um.open)
            {
                return Ok(MessageReply::new("Bonus challenge already unlocked"));
            }
            ledger::spend_gems(db, user_id, config.shop.bonus_challenge_cost)?;
            db.ensure_user_module(user_id, module_id).open = true;
            Ok(MessageReply::new("Bonus challenge unlocked"))
        })
    }

    /// `POST /hints/{id}/buy`
    ///
    /// A hint is paid for at most once; later calls return it for free.
    pub fn buy_hint(&self, user_id: UserId, hint_id: HintId) -> Result<HintReply> {
        let today = Self::today();
        let config = &self.config;
        self.store.with_tx(|db| {
            let hint = db.hint(hint_id)?.clone();
            db.user(user_id)?;
            if !db.user_hints.contains_key(&(user_id, hint_id)) {
                ledger::spend_gems(db, user_id, config.shop.hint_cost)?;
                db.user_hints.insert(
                    (user_id, hint_id),
                    crate::model::UserHint {
                        user_id,
                        hint_id,
                        unlocked_on: today,
                    },
                );
            }
            Ok(HintReply {
                hint_id,
                text: hint.text,
            })
        })
    }

    /// `GET /user/{id}/stats`
    pub fn user_stats(&self, user_id: UserId) -> Result<UserStatsReply> {
        self.store.with_read(|db| {
            let user = db.user(user_id)?;
            Ok(UserStatsReply {
                streak: user.streak,
                gems: user.gems,
                xp: user.xp,
            })
        })
    }

    /// Earned badges, oldest first.
    pub fn badges(&self, user_id: UserId) -> Result<Vec<BadgeView>> {
        self.store.with_read(|db| {
            db.user(user_id)?;
            let mut views: Vec<BadgeView> = db
                .user_badges
                .values()
                .filter(|ub| ub.user_id == user_id)
                .filter_map(|ub| {
                    let badge = db.badges.get(&ub.badge_id)?;
                    Some(BadgeView {
                        badge_id: badge.id,
                        title: badge.title.clone(),
                        description: badge.description.clone(),
                        kind: badge.kind,
                        date_earned: ub.date_earned,
                    })
                })
                .collect();
            views.sort_by_key(|v| (v.date_earned, v.badge_id));
            Ok(views)
        })
    }

    /// `GET /weekly-review/questions`
    pub fn review_questions(&self, user_id: UserId) -> Result<Vec<QuestionView>> {
        let today = Self::today();
        let config = &self.config;
        self.store.with_read(|db| {
            let mut rng = thread_rng();
            let ids = review::pick_review_questions(db, config, user_id, today, &mut rng)?;
            let views = ids
                .into_iter()
                .filter_map(|id| {
                    let question = db.quiz_questions.get(&id)?;
                    Some(QuestionView {
                        question_id: question.id,
                        title: question.title.clone(),
                        options: question
                            .options
                            .iter()
                            .map(|o| QuestionOptionView {
                                text: o.text.clone(),
                                correct: o.correct,
                            })
                            .collect(),
                    })
                })
                .collect();
            Ok(views)
        })
    }

    /// `GET /leaderboard/weekly-rankings`
    pub fn weekly_rankings(&self) -> Result<Vec<RankingView>> {
        let today = Self::today();
        Ok(self.store.with_read(|db| {
            leaderboard::weekly_rankings(db, today)
                .into_iter()
                .map(|entry| RankingView {
                    username: entry.username,
                    xp: entry.xp,
                })
                .collect()
        }))
    }

    /// `GET /leaderboard/days-left`
    pub fn days_left_in_week(&self) -> i64 {
        clock::days_left_in_week(Self::today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BadgeEvent, QuizOption};
    use crate::storage::{Database, MemoryStore};

    struct Harness {
        platform: Platform<MemoryStore>,
        user: UserId,
        guide: ModuleId,
        quiz: ModuleId,
        bonus: ModuleId,
        hint: HintId,
    }

    fn harness() -> Harness {
        let mut db = Database::new();
        let course = db.add_course("Technical Interview Prep");
        let unit = db.add_unit(course, "Hash Maps", 1).unwrap();
        let guide = db
            .add_module(unit, "Hash Maps", 1, ModuleKind::ConceptGuide, None)
            .unwrap();
        let quiz = db
            .add_module(unit, "Hash Maps Quiz", 2, ModuleKind::Quiz, None)
            .unwrap();
        let challenge = db
            .add_module(unit, "Two Sum", 3, ModuleKind::Challenge, Some(Runtime::Linear))
            .unwrap();
        let bonus = db
            .add_module(unit, "Bonus: LRU Cache", 4, ModuleKind::BonusChallenge, None)
            .unwrap();
        db.add_quiz_question(
            quiz,
            "What is a hash map?",
            vec![QuizOption {
                text: "A data structure that maps keys to values".into(),
                correct: true,
            }],
        )
        .unwrap();
        let hint = db.add_hint(challenge, "Try a single pass with a map").unwrap();
        db.add_badge(
            "Quiz Master",
            "Score 100% on a quiz.",
            BadgeKind::Award,
            BadgeEvent::QuizPerfectScore,
            "quiz_score == 100",
        )
        .unwrap();
        db.add_goal(
            "Earn 10 gems",
            GoalMetric::EarnGems,
            10,
            TimePeriod::Daily,
            false,
        )
        .unwrap();
        db.add_goal(
            "Complete 2 modules",
            GoalMetric::CompleteModules,
            2,
            TimePeriod::Daily,
            false,
        )
        .unwrap();

        let platform = Platform::new(MemoryStore::with_database(db), Config::default());
        let user = platform.register("ada").unwrap().user_id;
        Harness {
            platform,
            user,
            guide,
            quiz,
            bonus,
            hint,
        }
    }

    #[test]
    fn test_register_assigns_goals() {
        let h = harness();
        let reply = h.platform.goal_progress(h.user, TimePeriod::Daily).unwrap();
        assert_eq!(reply.goals.len(), 2);
        assert!(reply.newly_completed_goals.is_empty());
    }

    #[test]
    fn test_login_is_idempotent_for_goals() {
        let h = harness();
        let first = h.platform.login(h.user).unwrap();
        assert_eq!(first.daily_goals_assigned, 0, "register already assigned");
        let second = h.platform.login(h.user).unwrap();
        assert_eq!(second.daily_goals_assigned, 0);
    }

    #[test]
    fn test_complete_module_end_to_end() {
        let h = harness();
        let reply = h.platform.complete_module(h.user, h.guide).unwrap();
        assert!(reply.message.contains("complete"));

        let stats = h.platform.user_stats(h.user).unwrap();
        assert_eq!(stats.xp, h.platform.config().xp.guide_xp);
        assert_eq!(stats.streak, 1);

        let again = h.platform.complete_module(h.user, h.guide).unwrap();
        assert_eq!(again.message, "Module already completed");
        let stats_again = h.platform.user_stats(h.user).unwrap();
        assert_eq!(stats_again.xp, stats.xp);
    }

    #[test]
    fn test_complete_module_not_found_maps_to_user_error() {
        let h = harness();
        let err = h.platform.complete_module(h.user, 9999).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_quiz_flow_awards_badge_and_practices() {
        let h = harness();
        let err = h
            .platform
            .submit_quiz_score(h.user, h.quiz, QuizScoreRequest { accuracy: 79 })
            .unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(h.platform.user_stats(h.user).unwrap().xp, 0);

        h.platform
            .submit_quiz_score(h.user, h.quiz, QuizScoreRequest { accuracy: 100 })
            .unwrap();
        let badges = h.platform.badges(h.user).unwrap();
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].title, "Quiz Master");
    }

    #[test]
    fn test_goal_progress_reports_newly_completed_once() {
        let h = harness();
        h.platform.complete_module(h.user, h.guide).unwrap();
        h.platform
            .submit_quiz_score(h.user, h.quiz, QuizScoreRequest { accuracy: 90 })
            .unwrap();

        let first = h.platform.goal_progress(h.user, TimePeriod::Daily).unwrap();
        let newly: Vec<&str> = first
            .newly_completed_goals
            .iter()
            .map(|g| g.title.as_str())
            .collect();
        assert_eq!(newly, ["Complete 2 modules"]);

        let second = h.platform.goal_progress(h.user, TimePeriod::Daily).unwrap();
        assert!(second.newly_completed_goals.is_empty());
        assert!(second
            .goals
            .iter()
            .any(|g| g.title == "Complete 2 modules" && g.completed));
    }

    #[test]
    fn test_add_personal_goal_validation() {
        let h = harness();
        let err = h
            .platform
            .add_personal_goal(
                h.user,
                PersonalGoalRequest {
                    time_period: TimePeriod::Daily,
                    metric: GoalMetric::CompleteModules,
                    target: 0,
                },
            )
            .unwrap_err();
        assert!(err.is_user_error());

        h.platform
            .add_personal_goal(
                h.user,
                PersonalGoalRequest {
                    time_period: TimePeriod::Daily,
                    metric: GoalMetric::CompleteModules,
                    target: 5,
                },
            )
            .unwrap();
        let reply = h.platform.goal_progress(h.user, TimePeriod::Daily).unwrap();
        assert!(reply.goals.iter().any(|g| g.title == "Complete 5 modules"));
    }

    #[test]
    fn test_buy_bonus_challenge_gem_gated() {
        let h = harness();
        let err = h.platform.buy_bonus_challenge(h.user, h.bonus).unwrap_err();
        assert!(matches!(err, TrailheadError::InsufficientGems { .. }));

        // A guide is not purchasable
        let err = h.platform.buy_bonus_challenge(h.user, h.guide).unwrap_err();
        assert!(matches!(err, TrailheadError::Validation { .. }));
    }

    #[test]
    fn test_buy_hint_charges_once() {
        let h = harness();
        let err = h.platform.buy_hint(h.user, h.hint).unwrap_err();
        assert!(matches!(err, TrailheadError::InsufficientGems { .. }));

        // Fund the account through the store directly
        let cost = h.platform.config().shop.hint_cost;
        h.platform
            .store
            .with_tx(|db| {
                db.user_mut(h.user)?.gems = cost;
                Ok(())
            })
            .unwrap();

        let reply = h.platform.buy_hint(h.user, h.hint).unwrap();
        assert_eq!(reply.text, "Try a single pass with a map");
        assert_eq!(h.platform.user_stats(h.user).unwrap().gems, 0);

        // Second purchase is free
        let reply = h.platform.buy_hint(h.user, h.hint).unwrap();
        assert_eq!(reply.hint_id, h.hint);
        assert_eq!(h.platform.user_stats(h.user).unwrap().gems, 0);
    }

    #[test]
    fn test_review_questions_empty_without_history() {
        let h = harness();
        let set = h.platform.review_questions(h.user).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_review_questions_after_quiz() {
        let h = harness();
        h.platform
            .submit_quiz_score(h.user, h.quiz, QuizScoreRequest { accuracy: 90 })
            .unwrap();
        let set = h.platform.review_questions(h.user).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].title, "What is a hash map?");
    }

    #[test]
    fn test_weekly_rankings_after_activity() {
        let h = harness();
        h.platform.complete_module(h.user, h.guide).unwrap();
        let rankings = h.platform.weekly_rankings().unwrap();
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].username, "ada");
        assert!(rankings[0].xp > 0);
    }

    #[test]
    fn test_days_left_in_week_in_range() {
        let h = harness();
        let days = h.platform.days_left_in_week();
        assert!((1..=7).contains(&days));
    }
}
