//! Spaced-review question selection.
//!
//! Builds a fixed-size review set mixing newly learned material with overdue
//! older material: most of the set is sampled from the unit of the user's
//! most recently completed quiz module, the rest comes from other units
//! ordered by how long ago they were last practiced. When other units cannot
//! fill their share, the recent unit tops the set up; a user with no quiz
//! history gets an empty set, which is a terminal state rather than an error.

use chrono::{Days, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::Config;
use crate::error::Result;
use crate::model::{ModuleKind, QuestionId, UnitId, UserId};
use crate::storage::Database;

/// Pick the user's review question set.
pub fn pick_review_questions(
    db: &Database,
    config: &Config,
    user_id: UserId,
    today: NaiveDate,
    rng: &mut impl Rng,
) -> Result<Vec<QuestionId>> {
    db.user(user_id)?;

    let Some(recent_unit) = most_recent_quiz_unit(db, user_id) else {
        return Ok(Vec::new());
    };

    let cutoff = today - Days::new(config.review.lookback_days as u64);
    let practiced = practiced_questions(db, user_id, cutoff);

    let mut recent: Vec<(QuestionId, NaiveDate)> = Vec::new();
    let mut others: Vec<(QuestionId, NaiveDate)> = Vec::new();
    for (question_id, unit_id, last_practiced) in practiced {
        if unit_id == recent_unit {
            recent.push((question_id, last_practiced));
        } else {
            others.push((question_id, last_practiced));
        }
    }

    let set_size = config.review.set_size;
    let recent_slots = config.review.recent_slots();

    // Newly learned material first: a random sample from the recent unit.
    let mut selected: Vec<QuestionId> = recent
        .choose_multiple(rng, recent_slots.min(recent.len()))
        .map(|&(id, _)| id)
        .collect();

    // Fill the remainder with the longest-overdue questions from other units.
    others.sort_by_key(|&(id, last_practiced)| (last_practiced, id));
    for &(id, _) in others.iter().take(set_size.saturating_sub(selected.len())) {
        selected.push(id);
    }

    // Other units ran dry: draw more from the recent unit instead.
    if selected.len() < set_size {
        let mut leftovers: Vec<QuestionId> = recent
            .iter()
            .map(|&(id, _)| id)
            .filter(|id| !selected.contains(id))
            .collect();
        leftovers.shuffle(rng);
        for id in leftovers.into_iter().take(set_size - selected.len()) {
            selected.push(id);
        }
    }

    selected.shuffle(rng);
    tracing::debug!(user = user_id, count = selected.len(), "review set selected");
    Ok(selected)
}

/// The unit of the user's most recently completed quiz module.
fn most_recent_quiz_unit(db: &Database, user_id: UserId) -> Option<UnitId> {
    db.user_modules
        .values()
        .filter(|um| um.user_id == user_id && um.completed)
        .filter_map(|um| {
            let module = db.modules.get(&um.module_id)?;
            (module.kind == ModuleKind::Quiz)
                .then_some((um.completed_date, um.module_id, module.unit_id))
        })
        .max_by_key(|&(completed_date, module_id, _)| (completed_date, module_id))
        .map(|(_, _, unit_id)| unit_id)
}

/// Questions the user practiced on or after the cutoff, with their unit.
fn practiced_questions(
    db: &Database,
    user_id: UserId,
    cutoff: NaiveDate,
) -> Vec<(QuestionId, UnitId, NaiveDate)> {
    db.user_questions
        .values()
        .filter(|uq| uq.user_id == user_id && uq.last_practiced >= cutoff)
        .filter_map(|uq| {
            let question = db.quiz_questions.get(&uq.question_id)?;
            let module = db.modules.get(&question.module_id)?;
            Some((uq.question_id, module.unit_id, uq.last_practiced))
        })
        .collect()
}
