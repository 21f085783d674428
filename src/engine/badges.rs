//! Badge evaluation and awarding.
//!
//! `check_and_award` is called by the other engines at trigger points with a
//! payload of event variables. Every badge registered for the event has its
//! criteria evaluated against `user.*` bindings plus the payload; awards are
//! recorded at most once per (user, badge), with the storage key as the final
//! arbiter. A criteria evaluation failure skips that badge and is logged;
//! a broken badge row must never fail the module completion that fired it.

use chrono::NaiveDate;

use crate::engine::criteria::{self, Env, Value};
use crate::error::Result;
use crate::model::{BadgeEvent, BadgeId, UserId};
use crate::storage::Database;

/// Evaluate all badges registered for `event` and award those whose criteria
/// hold. Returns the ids of newly awarded badges.
pub fn check_and_award(
    db: &mut Database,
    user_id: UserId,
    event: BadgeEvent,
    payload: &[(&str, Value)],
    today: NaiveDate,
) -> Result<Vec<BadgeId>> {
    let user = db.user(user_id)?;

    let mut env = Env::new();
    env.insert("user.streak".into(), Value::Int(user.streak as i64));
    env.insert("user.gems".into(), Value::Int(user.gems as i64));
    env.insert("user.xp".into(), Value::Int(user.xp as i64));
    for (name, value) in payload {
        env.insert((*name).to_string(), *value);
    }

    let candidates: Vec<(BadgeId, String, String)> = db
        .badges_for_event(event)
        .into_iter()
        .map(|b| (b.id, b.title.clone(), b.criteria.clone()))
        .collect();

    let mut awarded = Vec::new();
    for (badge_id, title, expression) in candidates {
        tracing::debug!(badge = %title, "evaluating badge criteria");
        match criteria::evaluate(&expression, &env) {
            Ok(true) => {
                if db.award_badge(user_id, badge_id, today) {
                    tracing::info!(user = user_id, badge = %title, "badge awarded");
                    awarded.push(badge_id);
                } else {
                    tracing::debug!(user = user_id, badge = %title, "badge already held");
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(badge = %title, error = %err, "skipping badge with failing criteria");
            }
        }
    }

    Ok(awarded)
}
