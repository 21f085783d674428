//! The in-memory relational snapshot all engines operate on.
//!
//! Tables are `BTreeMap`s keyed by their (composite) primary keys. Map-key
//! uniqueness is the authoritative guard for at-most-once rows: a badge award
//! or goal assignment that already exists is observed as occupied, never
//! inserted twice. Insert helpers enforce the write-time invariants (runtime
//! targets only on challenge-kind modules, hints and test cases only on
//! challenge content, module order starting at 1).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrailheadError};
use crate::model::{
    Badge, BadgeEvent, BadgeId, BadgeKind, Course, CourseId, DailyActivity, Goal, GoalId,
    GoalMetric, Hint, HintId, Module, ModuleId, ModuleKind, QuestionId, QuizOption, QuizQuestion,
    Runtime, TestCase, TestCaseId, TimePeriod, Unit, UnitId, User, UserBadge, UserGoal, UserHint,
    UserId, UserModule, UserQuizQuestion, UserTestCase, UserUnit,
};

/// All platform state as one snapshot.
///
/// Cloning is cheap enough for the transaction scratch-copy pattern used by
/// the stores; commit replaces the previous snapshot wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Database {
    pub users: BTreeMap<UserId, User>,
    pub courses: BTreeMap<CourseId, Course>,
    pub units: BTreeMap<UnitId, Unit>,
    pub modules: BTreeMap<ModuleId, Module>,
    pub goals: BTreeMap<GoalId, Goal>,
    pub badges: BTreeMap<BadgeId, Badge>,
    pub quiz_questions: BTreeMap<QuestionId, QuizQuestion>,
    pub hints: BTreeMap<HintId, Hint>,
    pub test_cases: BTreeMap<TestCaseId, TestCase>,

    pub user_modules: BTreeMap<(UserId, ModuleId), UserModule>,
    pub user_units: BTreeMap<(UserId, UnitId), UserUnit>,
    pub activities: BTreeMap<(UserId, NaiveDate), DailyActivity>,
    pub user_goals: BTreeMap<(UserId, GoalId, NaiveDate), UserGoal>,
    pub user_badges: BTreeMap<(UserId, BadgeId), UserBadge>,
    pub user_questions: BTreeMap<(UserId, QuestionId), UserQuizQuestion>,
    pub user_hints: BTreeMap<(UserId, HintId), UserHint>,
    pub user_test_cases: BTreeMap<(UserId, TestCaseId), UserTestCase>,
}

fn next_id<V>(map: &BTreeMap<u64, V>) -> u64 {
    map.last_key_value().map(|(id, _)| id + 1).unwrap_or(1)
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| TrailheadError::not_found("user", id))
    }

    pub fn user_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| TrailheadError::not_found("user", id))
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.units
            .get(&id)
            .ok_or_else(|| TrailheadError::not_found("unit", id))
    }

    pub fn module(&self, id: ModuleId) -> Result<&Module> {
        self.modules
            .get(&id)
            .ok_or_else(|| TrailheadError::not_found("module", id))
    }

    pub fn goal(&self, id: GoalId) -> Result<&Goal> {
        self.goals
            .get(&id)
            .ok_or_else(|| TrailheadError::not_found("goal", id))
    }

    pub fn hint(&self, id: HintId) -> Result<&Hint> {
        self.hints
            .get(&id)
            .ok_or_else(|| TrailheadError::not_found("hint", id))
    }

    /// Modules of a unit in position order.
    pub fn modules_in_unit(&self, unit_id: UnitId) -> Vec<&Module> {
        let mut modules: Vec<&Module> = self
            .modules
            .values()
            .filter(|m| m.unit_id == unit_id)
            .collect();
        modules.sort_by_key(|m| (m.order, m.id));
        modules
    }

    /// Quiz questions belonging to a module, in id order.
    pub fn questions_in_module(&self, module_id: ModuleId) -> Vec<&QuizQuestion> {
        self.quiz_questions
            .values()
            .filter(|q| q.module_id == module_id)
            .collect()
    }

    /// Badges registered for a trigger event, in id order.
    pub fn badges_for_event(&self, event: BadgeEvent) -> Vec<&Badge> {
        self.badges.values().filter(|b| b.event == event).collect()
    }

    /// Total completed modules for a user, across all units.
    pub fn completed_module_count(&self, user_id: UserId) -> u32 {
        self.user_modules
            .values()
            .filter(|um| um.user_id == user_id && um.completed)
            .count() as u32
    }

    /// Whether a module is open for a user.
    ///
    /// The first module of every unit is implicitly open even before a
    /// progression record exists.
    pub fn is_module_open(&self, user_id: UserId, module: &Module) -> bool {
        module.order == 1
            || self
                .user_modules
                .get(&(user_id, module.id))
                .is_some_and(|um| um.open)
    }

    // =========================================================================
    // Ledger access
    // =========================================================================

    /// Today's ledger row for a user, created on first touch.
    pub fn activity_mut(&mut self, user_id: UserId, date: NaiveDate) -> &mut DailyActivity {
        self.activities
            .entry((user_id, date))
            .or_insert_with(|| DailyActivity::new(user_id, date))
    }

    pub fn activity(&self, user_id: UserId, date: NaiveDate) -> Option<&DailyActivity> {
        self.activities.get(&(user_id, date))
    }

    /// Ledger rows for a user with `date >= start`, oldest first.
    pub fn activities_since(
        &self,
        user_id: UserId,
        start: NaiveDate,
    ) -> impl Iterator<Item = &DailyActivity> {
        self.activities
            .range((user_id, start)..=(user_id, NaiveDate::MAX))
            .map(|(_, activity)| activity)
    }

    // =========================================================================
    // Progression records
    // =========================================================================

    /// Progression record for (user, module), created lazily.
    pub fn ensure_user_module(&mut self, user_id: UserId, module_id: ModuleId) -> &mut UserModule {
        self.user_modules
            .entry((user_id, module_id))
            .or_insert_with(|| UserModule::new(user_id, module_id))
    }

    pub fn user_module(&self, user_id: UserId, module_id: ModuleId) -> Option<&UserModule> {
        self.user_modules.get(&(user_id, module_id))
    }

    /// Unit record for (user, unit), created lazily.
    pub fn ensure_user_unit(&mut self, user_id: UserId, unit_id: UnitId) -> &mut UserUnit {
        self.user_units
            .entry((user_id, unit_id))
            .or_insert_with(|| UserUnit::new(user_id, unit_id))
    }

    /// Mark a question practiced, creating the record on first practice.
    pub fn practice_question(&mut self, user_id: UserId, question_id: QuestionId, date: NaiveDate) {
        self.user_questions
            .entry((user_id, question_id))
            .and_modify(|uq| uq.last_practiced = date)
            .or_insert(UserQuizQuestion {
                user_id,
                question_id,
                last_practiced: date,
            });
    }

    /// Insert a badge award if absent. Returns false when already awarded.
    pub fn award_badge(&mut self, user_id: UserId, badge_id: BadgeId, date: NaiveDate) -> bool {
        use std::collections::btree_map::Entry;
        match self.user_badges.entry((user_id, badge_id)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(UserBadge {
                    user_id,
                    badge_id,
                    date_earned: date,
                });
                true
            }
        }
    }

    /// Insert a goal assignment if absent. Returns false when already assigned.
    pub fn assign_goal(&mut self, user_id: UserId, goal_id: GoalId, date: NaiveDate) -> bool {
        use std::collections::btree_map::Entry;
        match self.user_goals.entry((user_id, goal_id, date)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(UserGoal {
                    user_id,
                    goal_id,
                    date_assigned: date,
                    date_completed: None,
                });
                true
            }
        }
    }

    // =========================================================================
    // Inserts with write-time validation
    // =========================================================================

    pub fn add_user(&mut self, username: impl Into<String>, today: NaiveDate) -> Result<UserId> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(TrailheadError::validation("username must not be empty"));
        }
        if self.users.values().any(|u| u.username == username) {
            return Err(TrailheadError::validation(format!(
                "username already taken: {username}"
            )));
        }
        let id = next_id(&self.users);
        self.users.insert(id, User::new(id, username, today));
        Ok(id)
    }

    pub fn add_course(&mut self, title: impl Into<String>) -> CourseId {
        let id = next_id(&self.courses);
        self.courses.insert(
            id,
            Course {
                id,
                title: title.into(),
            },
        );
        id
    }

    pub fn add_unit(
        &mut self,
        course_id: CourseId,
        title: impl Into<String>,
        order: u32,
    ) -> Result<UnitId> {
        if !self.courses.contains_key(&course_id) {
            return Err(TrailheadError::not_found("course", course_id));
        }
        let id = next_id(&self.units);
        self.units.insert(
            id,
            Unit {
                id,
                course_id,
                title: title.into(),
                order,
            },
        );
        Ok(id)
    }

    pub fn add_module(
        &mut self,
        unit_id: UnitId,
        title: impl Into<String>,
        order: u32,
        kind: ModuleKind,
        target_runtime: Option<Runtime>,
    ) -> Result<ModuleId> {
        self.unit(unit_id)?;
        if order == 0 {
            return Err(TrailheadError::validation("module order starts at 1"));
        }
        if target_runtime.is_some() && !kind.accepts_runtime() {
            return Err(TrailheadError::validation(
                "target runtime is only valid on challenge modules",
            ));
        }
        let id = next_id(&self.modules);
        self.modules.insert(
            id,
            Module {
                id,
                unit_id,
                title: title.into(),
                order,
                kind,
                target_runtime,
            },
        );
        Ok(id)
    }

    pub fn add_goal(
        &mut self,
        title: impl Into<String>,
        metric: GoalMetric,
        requirement: u32,
        period: TimePeriod,
        custom: bool,
    ) -> Result<GoalId> {
        if requirement == 0 {
            return Err(TrailheadError::validation(
                "goal requirement must be positive",
            ));
        }
        let id = next_id(&self.goals);
        self.goals.insert(
            id,
            Goal {
                id,
                title: title.into(),
                metric,
                requirement,
                period,
                custom,
            },
        );
        Ok(id)
    }

    pub fn add_badge(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        kind: BadgeKind,
        event: BadgeEvent,
        criteria: impl Into<String>,
    ) -> Result<BadgeId> {
        let criteria = criteria.into();
        // Reject malformed expressions at write time so evaluation failures
        // can only mean a missing variable, not a typo in stored data.
        crate::engine::criteria::parse(&criteria)?;
        let id = next_id(&self.badges);
        self.badges.insert(
            id,
            Badge {
                id,
                title: title.into(),
                description: description.into(),
                kind,
                event,
                criteria,
            },
        );
        Ok(id)
    }

    pub fn add_quiz_question(
        &mut self,
        module_id: ModuleId,
        title: impl Into<String>,
        options: Vec<QuizOption>,
    ) -> Result<QuestionId> {
        let module = self.module(module_id)?;
        if module.kind != ModuleKind::Quiz {
            return Err(TrailheadError::validation(
                "quiz questions attach to quiz modules only",
            ));
        }
        let id = next_id(&self.quiz_questions);
        self.quiz_questions.insert(
            id,
            QuizQuestion {
                id,
                module_id,
                title: title.into(),
                options,
            },
        );
        Ok(id)
    }

    pub fn add_hint(&mut self, module_id: ModuleId, text: impl Into<String>) -> Result<HintId> {
        let module = self.module(module_id)?;
        if !module.kind.is_challenge_content() {
            return Err(TrailheadError::validation(
                "hints attach to challenge modules only",
            ));
        }
        let id = next_id(&self.hints);
        self.hints.insert(
            id,
            Hint {
                id,
                module_id,
                text: text.into(),
            },
        );
        Ok(id)
    }

    pub fn add_test_case(
        &mut self,
        module_id: ModuleId,
        input: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Result<TestCaseId> {
        let module = self.module(module_id)?;
        if !module.kind.is_challenge_content() {
            return Err(TrailheadError::validation(
                "test cases attach to challenge modules only",
            ));
        }
        let id = next_id(&self.test_cases);
        self.test_cases.insert(
            id,
            TestCase {
                id,
                module_id,
                input: input.into(),
                expected_output: expected_output.into(),
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn db_with_unit() -> (Database, UnitId) {
        let mut db = Database::new();
        let course = db.add_course("Interview Prep");
        let unit = db.add_unit(course, "Hash Maps", 1).unwrap();
        (db, unit)
    }

    #[test]
    fn test_add_user_assigns_sequential_ids() {
        let mut db = Database::new();
        let a = db.add_user("ada", date(2024, 1, 1)).unwrap();
        let b = db.add_user("brian", date(2024, 1, 1)).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_add_user_rejects_duplicate_username() {
        let mut db = Database::new();
        db.add_user("ada", date(2024, 1, 1)).unwrap();
        let err = db.add_user("ada", date(2024, 1, 2)).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_add_module_rejects_runtime_on_guide() {
        let (mut db, unit) = db_with_unit();
        let result = db.add_module(
            unit,
            "Hash Maps",
            1,
            ModuleKind::ConceptGuide,
            Some(Runtime::Linear),
        );
        assert!(matches!(result, Err(TrailheadError::Validation { .. })));
    }

    #[test]
    fn test_add_module_accepts_runtime_on_challenge() {
        let (mut db, unit) = db_with_unit();
        let id = db
            .add_module(
                unit,
                "Two Sum",
                3,
                ModuleKind::Challenge,
                Some(Runtime::Linear),
            )
            .unwrap();
        assert_eq!(db.module(id).unwrap().target_runtime, Some(Runtime::Linear));
    }

    #[test]
    fn test_add_module_rejects_order_zero() {
        let (mut db, unit) = db_with_unit();
        let result = db.add_module(unit, "Bad", 0, ModuleKind::Quiz, None);
        assert!(matches!(result, Err(TrailheadError::Validation { .. })));
    }

    #[test]
    fn test_hints_only_on_challenge_content() {
        let (mut db, unit) = db_with_unit();
        let guide = db
            .add_module(unit, "Guide", 1, ModuleKind::ConceptGuide, None)
            .unwrap();
        let challenge = db
            .add_module(unit, "Two Sum", 2, ModuleKind::Challenge, None)
            .unwrap();

        assert!(db.add_hint(guide, "think about it").is_err());
        assert!(db.add_hint(challenge, "use a map").is_ok());
        assert!(db.add_test_case(guide, "1", "1").is_err());
        assert!(db.add_test_case(challenge, "[1,2]", "3").is_ok());
    }

    #[test]
    fn test_quiz_questions_only_on_quiz_modules() {
        let (mut db, unit) = db_with_unit();
        let guide = db
            .add_module(unit, "Guide", 1, ModuleKind::ConceptGuide, None)
            .unwrap();
        assert!(db.add_quiz_question(guide, "What?", vec![]).is_err());
    }

    #[test]
    fn test_first_module_implicitly_open() {
        let (mut db, unit) = db_with_unit();
        let first = db
            .add_module(unit, "Guide", 1, ModuleKind::ConceptGuide, None)
            .unwrap();
        let second = db.add_module(unit, "Quiz", 2, ModuleKind::Quiz, None).unwrap();
        let first = db.module(first).unwrap().clone();
        let second = db.module(second).unwrap().clone();

        assert!(db.is_module_open(1, &first));
        assert!(!db.is_module_open(1, &second));
    }

    #[test]
    fn test_award_badge_at_most_once() {
        let mut db = Database::new();
        assert!(db.award_badge(1, 1, date(2024, 1, 1)));
        assert!(!db.award_badge(1, 1, date(2024, 1, 2)));
        assert_eq!(db.user_badges.len(), 1);
        // The original award date survives the second attempt
        assert_eq!(
            db.user_badges.get(&(1, 1)).unwrap().date_earned,
            date(2024, 1, 1)
        );
    }

    #[test]
    fn test_activities_since_is_per_user() {
        let mut db = Database::new();
        db.activity_mut(1, date(2024, 3, 1)).xp_earned = 5;
        db.activity_mut(1, date(2024, 3, 3)).xp_earned = 7;
        db.activity_mut(2, date(2024, 3, 2)).xp_earned = 100;

        let xp: u32 = db
            .activities_since(1, date(2024, 3, 1))
            .map(|a| a.xp_earned)
            .sum();
        assert_eq!(xp, 12);

        let rows: Vec<_> = db.activities_since(1, date(2024, 3, 2)).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date(2024, 3, 3));
    }

    #[test]
    fn test_practice_question_upserts() {
        let mut db = Database::new();
        db.practice_question(1, 9, date(2024, 5, 1));
        db.practice_question(1, 9, date(2024, 5, 8));
        assert_eq!(db.user_questions.len(), 1);
        assert_eq!(
            db.user_questions.get(&(1, 9)).unwrap().last_practiced,
            date(2024, 5, 8)
        );
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (mut db, unit) = db_with_unit();
        db.add_module(unit, "Guide", 1, ModuleKind::ConceptGuide, None)
            .unwrap();
        db.add_user("ada", date(2024, 1, 1)).unwrap();

        let json = serde_json::to_string(&db).unwrap();
        let back: Database = serde_json::from_str(&json).unwrap();
        assert_eq!(back, db);
    }
}
