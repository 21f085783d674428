//! Weekly XP leaderboard and its gem reward.
//!
//! Rankings are computed over ledger XP earned since the most recent Monday.
//! The previous week's top finishers earn a gem reward, applied lazily at
//! their next login and latched by `user.last_leaderboard_reward` so it pays
//! at most once per week. There is no scheduled job handing out rewards; the
//! login path asks for them.

use chrono::{Days, NaiveDate};

use crate::clock;
use crate::config::Config;
use crate::engine::ledger;
use crate::error::Result;
use crate::model::UserId;
use crate::storage::Database;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingEntry {
    pub user_id: UserId,
    pub username: String,
    pub xp: u32,
}

/// Users ranked by XP earned since the most recent Monday.
///
/// Users with no XP this week are omitted. Ties break by username so the
/// ordering is stable.
pub fn weekly_rankings(db: &Database, today: NaiveDate) -> Vec<RankingEntry> {
    let monday = clock::most_recent_monday(today);
    let mut entries: Vec<RankingEntry> = db
        .users
        .values()
        .filter_map(|user| {
            let xp: u32 = db.activities_since(user.id, monday).map(|a| a.xp_earned).sum();
            (xp > 0).then(|| RankingEntry {
                user_id: user.id,
                username: user.username.clone(),
                xp,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.xp.cmp(&a.xp).then_with(|| a.username.cmp(&b.username)));
    entries
}

/// Award the weekly gem reward if the user finished in last week's top
/// places and has not been rewarded this week yet.
///
/// Returns the gems credited, if any.
pub fn maybe_award_weekly_gems(
    db: &mut Database,
    config: &Config,
    user_id: UserId,
    today: NaiveDate,
) -> Result<Option<u32>> {
    let this_monday = clock::most_recent_monday(today);
    let user = db.user(user_id)?;
    if user
        .last_leaderboard_reward
        .is_some_and(|rewarded| rewarded >= this_monday)
    {
        return Ok(None);
    }

    let prev_monday = this_monday - Days::new(7);
    let mut standings: Vec<(UserId, u32)> = db
        .users
        .keys()
        .map(|&id| (id, xp_in_range(db, id, prev_monday, this_monday)))
        .filter(|&(_, xp)| xp > 0)
        .collect();
    standings.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let in_top = standings
        .iter()
        .take(config.rewards.leaderboard_top_n)
        .any(|&(id, _)| id == user_id);
    if !in_top {
        return Ok(None);
    }

    let amount = config.rewards.leaderboard_gems;
    ledger::credit_gems(db, user_id, amount, today)?;
    db.user_mut(user_id)?.last_leaderboard_reward = Some(today);
    tracing::info!(user = user_id, gems = amount, "weekly leaderboard reward");
    Ok(Some(amount))
}

/// Ledger XP earned in `[start, end)`.
fn xp_in_range(db: &Database, user_id: UserId, start: NaiveDate, end: NaiveDate) -> u32 {
    db.activities
        .range((user_id, start)..(user_id, end))
        .map(|(_, a)| a.xp_earned)
        .sum()
}
