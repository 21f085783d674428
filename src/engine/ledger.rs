//! The daily activity ledger and streak maintenance.
//!
//! Every XP- or gem-earning action lands in the per-user per-day ledger row,
//! which is the sole source for goal windows and streak checks. The streak
//! extends at most once per day: the first XP credit of the day sets the
//! row's `streak_extended` flag and bumps the counter, later credits see the
//! flag and leave the streak alone. Streak correction for inactive users
//! happens at login via `reset_streak_if_inactive`; there is no background
//! scheduler.

use chrono::NaiveDate;

use crate::clock;
use crate::engine::badges;
use crate::error::Result;
use crate::model::{BadgeEvent, UserId};
use crate::storage::Database;

/// Credit XP to the user and today's ledger row.
///
/// Returns whether this credit extended the streak.
pub fn credit_xp(db: &mut Database, user_id: UserId, amount: u32, today: NaiveDate) -> Result<bool> {
    db.user(user_id)?;

    let first_today = {
        let activity = db.activity_mut(user_id, today);
        activity.xp_earned += amount;
        !activity.streak_extended
    };
    db.user_mut(user_id)?.xp += amount;

    if !first_today {
        return Ok(false);
    }

    db.activity_mut(user_id, today).streak_extended = true;
    let streak = {
        let user = db.user_mut(user_id)?;
        user.streak += 1;
        user.streak
    };
    tracing::info!(user = user_id, streak, "streak extended");

    // The streak badge variable is only fresh at the extension point.
    badges::check_and_award(db, user_id, BadgeEvent::StreakAchievement, &[], today)?;
    Ok(true)
}

/// Credit gems to the user and today's ledger row.
///
/// Earning gems does not extend the streak; only XP-earning actions do.
pub fn credit_gems(db: &mut Database, user_id: UserId, amount: u32, today: NaiveDate) -> Result<()> {
    db.user(user_id)?;
    db.activity_mut(user_id, today).gems_earned += amount;
    db.user_mut(user_id)?.gems += amount;
    Ok(())
}

/// Deduct gems for a purchase.
///
/// Spending leaves the ledger untouched; its columns track earnings only.
pub fn spend_gems(db: &mut Database, user_id: UserId, cost: u32) -> Result<()> {
    let user = db.user_mut(user_id)?;
    if user.gems < cost {
        return Err(crate::error::TrailheadError::InsufficientGems {
            needed: cost,
            balance: user.gems,
        });
    }
    user.gems -= cost;
    Ok(())
}

/// Count a module completion on today's ledger row.
pub fn record_module_completion(db: &mut Database, user_id: UserId, today: NaiveDate) -> Result<()> {
    db.user(user_id)?;
    db.activity_mut(user_id, today).modules_completed += 1;
    Ok(())
}

/// Zero the streak when the user was inactive both yesterday and today.
///
/// Called at login to correct streak state between days. Returns whether a
/// reset happened.
pub fn reset_streak_if_inactive(
    db: &mut Database,
    user_id: UserId,
    today: NaiveDate,
) -> Result<bool> {
    db.user(user_id)?;

    let active_today = db.activity(user_id, today).is_some();
    let active_yesterday = db.activity(user_id, clock::yesterday(today)).is_some();
    if active_today || active_yesterday {
        return Ok(false);
    }

    let user = db.user_mut(user_id)?;
    if user.streak == 0 {
        return Ok(false);
    }
    tracing::info!(user = user_id, old_streak = user.streak, "streak reset after inactivity");
    user.streak = 0;
    Ok(true)
}
