//! Demo content for a fresh install.
//!
//! Seeds one course with two units, a small quiz bank, the starter badge set,
//! and the rotation goal pools. Safe to run twice: an already-seeded
//! database is left untouched.

use crate::error::Result;
use crate::model::{BadgeEvent, BadgeKind, GoalMetric, ModuleKind, QuizOption, Runtime, TimePeriod};
use crate::storage::Database;

/// Seed demo content. Returns whether anything was inserted.
pub fn seed_demo(db: &mut Database) -> Result<bool> {
    if !db.courses.is_empty() {
        tracing::debug!("database already seeded");
        return Ok(false);
    }

    let course = db.add_course("Technical Interview Prep");

    let hash_maps = db.add_unit(course, "Hash Maps", 1)?;
    db.add_module(hash_maps, "Hash Maps", 1, ModuleKind::ConceptGuide, None)?;
    let quiz = db.add_module(hash_maps, "Hash Maps Quiz", 2, ModuleKind::Quiz, None)?;
    let challenge = db.add_module(
        hash_maps,
        "Hash Maps Code Challenge",
        3,
        ModuleKind::Challenge,
        Some(Runtime::Linear),
    )?;
    db.add_module(
        hash_maps,
        "Hash Maps Code Challenge Solution",
        4,
        ModuleKind::ChallengeSolution,
        None,
    )?;
    db.add_module(
        hash_maps,
        "Bonus: LRU Cache",
        5,
        ModuleKind::BonusChallenge,
        None,
    )?;
    db.add_module(
        hash_maps,
        "Bonus: LRU Cache Solution",
        6,
        ModuleKind::BonusSolution,
        None,
    )?;

    db.add_quiz_question(
        quiz,
        "What is a Hash Map?",
        vec![
            QuizOption {
                text: "A data structure that maps keys to values".into(),
                correct: true,
            },
            QuizOption {
                text: "A type of array".into(),
                correct: false,
            },
            QuizOption {
                text: "A sorting algorithm".into(),
                correct: false,
            },
        ],
    )?;
    db.add_quiz_question(
        quiz,
        "What is the time complexity of searching in a Hash Map?",
        vec![
            QuizOption {
                text: "O(1)".into(),
                correct: true,
            },
            QuizOption {
                text: "O(n)".into(),
                correct: false,
            },
            QuizOption {
                text: "O(log n)".into(),
                correct: false,
            },
        ],
    )?;

    db.add_hint(challenge, "Count occurrences in one pass with a map.")?;
    db.add_test_case(challenge, "[1, 2, 2, 3]", "2")?;

    let arrays = db.add_unit(course, "Arrays", 2)?;
    db.add_module(arrays, "Arrays", 1, ModuleKind::RecognitionGuide, None)?;
    let arrays_quiz = db.add_module(arrays, "Arrays Quiz", 2, ModuleKind::Quiz, None)?;
    db.add_quiz_question(
        arrays_quiz,
        "What is the time complexity of indexing into an array?",
        vec![
            QuizOption {
                text: "O(1)".into(),
                correct: true,
            },
            QuizOption {
                text: "O(n)".into(),
                correct: false,
            },
        ],
    )?;

    db.add_badge(
        "Hash Maps",
        "Awarded for completing the hash maps unit.",
        BadgeKind::Content,
        BadgeEvent::UnitCompletion,
        "unit.completed == true and unit.id == 1",
    )?;
    db.add_badge(
        "Week One",
        "Awarded for reaching a 7 day streak.",
        BadgeKind::Award,
        BadgeEvent::StreakAchievement,
        "user.streak >= 7",
    )?;
    db.add_badge(
        "Quiz Master",
        "Awarded for scoring 100% on a quiz.",
        BadgeKind::Award,
        BadgeEvent::QuizPerfectScore,
        "quiz_score == 100",
    )?;
    db.add_badge(
        "Getting Started",
        "Awarded for completing 10 modules.",
        BadgeKind::Award,
        BadgeEvent::CompleteModule,
        "completed_modules >= 10",
    )?;

    for (title, metric, requirement) in [
        ("Complete 3 modules", GoalMetric::CompleteModules, 3),
        ("Earn 10 gems", GoalMetric::EarnGems, 10),
        ("Extend your streak", GoalMetric::ExtendStreak, 1),
    ] {
        db.add_goal(title, metric, requirement, TimePeriod::Daily, false)?;
    }
    for (title, metric, requirement) in [
        ("Complete 30 modules", GoalMetric::CompleteModules, 30),
        ("Earn 60 gems", GoalMetric::EarnGems, 60),
        ("Extend your streak 20 days", GoalMetric::ExtendStreak, 20),
    ] {
        db.add_goal(title, metric, requirement, TimePeriod::Monthly, false)?;
    }

    tracing::info!("demo content seeded");
    Ok(true)
}
