//! Goal progress, rotation, and personal goals.
//!
//! Progress is always computed from the activity ledger over the goal's
//! window, never from counters of its own. A goal completes when its percent
//! reaches 100; the completion date is stamped inside the same transaction
//! that observed it, so exactly one evaluation reports a goal as newly
//! completed.
//!
//! Rotation assigns a small set of pool goals per period window, drawn with
//! distinct metrics where the pool allows it. The rejection-sampling loop is
//! bounded; when the pool cannot supply enough distinct metrics, duplicates
//! are accepted rather than spinning.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::clock;
use crate::config::Config;
use crate::error::{Result, TrailheadError};
use crate::model::{GoalId, GoalMetric, TimePeriod, UserId};
use crate::storage::Database;

/// Progress of one assigned goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgress {
    pub goal_id: GoalId,
    pub title: String,
    pub metric: GoalMetric,
    pub period: TimePeriod,
    pub current: u32,
    pub target: u32,
    /// Bounded to [0, 100].
    pub percent: f64,
    pub completed: bool,
    /// True on exactly the evaluation that observed completion first.
    pub newly_completed: bool,
}

/// Evaluate all goals assigned to the user for the current window of a
/// period, stamping completions as they are observed.
pub fn evaluate_goals(
    db: &mut Database,
    user_id: UserId,
    period: TimePeriod,
    today: NaiveDate,
) -> Result<Vec<GoalProgress>> {
    db.user(user_id)?;
    let current_anchor = clock::period_anchor(today, period);

    // Collect the assignments first; stamping mutates the table.
    let assigned: Vec<(GoalId, NaiveDate, Option<NaiveDate>)> = db
        .user_goals
        .values()
        .filter(|ug| ug.user_id == user_id)
        .filter_map(|ug| {
            let goal = db.goals.get(&ug.goal_id)?;
            (goal.period == period
                && clock::period_anchor(ug.date_assigned, period) == current_anchor)
                .then_some((ug.goal_id, ug.date_assigned, ug.date_completed))
        })
        .collect();

    let mut results = Vec::with_capacity(assigned.len());
    for (goal_id, date_assigned, date_completed) in assigned {
        let goal = db.goal(goal_id)?.clone();
        let window_start = clock::window_start(date_assigned, period);
        let current = metric_total(db, user_id, goal.metric, window_start);

        let percent = if goal.requirement == 0 {
            0.0
        } else {
            (current as f64 / goal.requirement as f64 * 100.0).min(100.0)
        };

        let newly_completed = percent >= 100.0 && date_completed.is_none();
        if newly_completed {
            tracing::info!(user = user_id, goal = goal_id, "goal completed");
            if let Some(ug) = db.user_goals.get_mut(&(user_id, goal_id, date_assigned)) {
                ug.date_completed = Some(today);
            }
        }

        results.push(GoalProgress {
            goal_id,
            title: goal.title,
            metric: goal.metric,
            period,
            current,
            target: goal.requirement,
            percent,
            completed: date_completed.is_some() || newly_completed,
            newly_completed,
        });
    }

    Ok(results)
}

/// Aggregate the ledger for a metric from the window start onward.
fn metric_total(
    db: &Database,
    user_id: UserId,
    metric: GoalMetric,
    window_start: NaiveDate,
) -> u32 {
    let activities = db.activities_since(user_id, window_start);
    match metric {
        GoalMetric::CompleteModules => activities.map(|a| a.modules_completed).sum(),
        GoalMetric::EarnGems => activities.map(|a| a.gems_earned).sum(),
        GoalMetric::ExtendStreak => activities.filter(|a| a.streak_extended).count() as u32,
    }
}

/// Ensure the user has goals assigned for the current window of a period.
///
/// No-op when any assignment already exists in the window. Returns the newly
/// assigned goal ids.
pub fn ensure_period_goals(
    db: &mut Database,
    config: &Config,
    user_id: UserId,
    period: TimePeriod,
    today: NaiveDate,
    rng: &mut impl Rng,
) -> Result<Vec<GoalId>> {
    db.user(user_id)?;
    let anchor = clock::period_anchor(today, period);

    if !assignments_in_window(db, user_id, period, today).is_empty() {
        return Ok(Vec::new());
    }

    let pool: Vec<(GoalId, GoalMetric)> = db
        .goals
        .values()
        .filter(|g| g.period == period && !g.custom)
        .map(|g| (g.id, g.metric))
        .collect();
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let cap = config.goals.per_period;
    let mut chosen: Vec<(GoalId, GoalMetric)> = Vec::new();

    // Draw-and-reject until the metrics are distinct, with a hard bound on
    // draws so a lopsided pool cannot loop forever.
    let mut draws = 0;
    while chosen.len() < cap && draws < config.goals.max_distinct_draws {
        draws += 1;
        let Some(&(id, metric)) = pool.choose(rng) else {
            break;
        };
        if chosen.iter().any(|&(chosen_id, _)| chosen_id == id) {
            continue;
        }
        if chosen.iter().any(|&(_, chosen_metric)| chosen_metric == metric) {
            continue;
        }
        chosen.push((id, metric));
    }

    // Pool exhausted of distinct metrics: accept duplicate metrics, still
    // never the same goal twice.
    if chosen.len() < cap {
        let mut rest: Vec<(GoalId, GoalMetric)> = pool
            .iter()
            .copied()
            .filter(|&(id, _)| !chosen.iter().any(|&(chosen_id, _)| chosen_id == id))
            .collect();
        rest.shuffle(rng);
        for entry in rest {
            if chosen.len() >= cap {
                break;
            }
            chosen.push(entry);
        }
    }

    let mut assigned = Vec::with_capacity(chosen.len());
    for (goal_id, _) in chosen {
        if db.assign_goal(user_id, goal_id, anchor) {
            assigned.push(goal_id);
        }
    }
    tracing::info!(
        user = user_id,
        period = %period,
        count = assigned.len(),
        "goals assigned"
    );
    Ok(assigned)
}

/// Add a user-defined goal for a period, enforcing the per-window cap.
///
/// When the window is full, an assigned goal of the same metric is evicted
/// if present, otherwise the oldest assignment (ties broken by goal id).
pub fn add_personal_goal(
    db: &mut Database,
    config: &Config,
    user_id: UserId,
    period: TimePeriod,
    metric: GoalMetric,
    target: u32,
    today: NaiveDate,
) -> Result<GoalId> {
    db.user(user_id)?;

    let bounds = config.goals.personal_bounds(metric, period);
    if !bounds.contains(target) {
        return Err(TrailheadError::validation(format!(
            "a {period} {metric} goal must be between {} and {}",
            bounds.min, bounds.max
        )));
    }

    let assigned = assignments_in_window(db, user_id, period, today);
    if assigned.len() >= config.goals.per_period {
        let victim = assigned
            .iter()
            .find(|(_, m)| *m == metric)
            .or_else(|| assigned.first())
            .copied();
        if let Some((key, _)) = victim {
            tracing::debug!(user = user_id, goal = key.1, "evicting goal for personal goal");
            db.user_goals.remove(&key);
        }
    }

    let title = personal_goal_title(metric, target);
    let goal_id = db.add_goal(title, metric, target, period, true)?;
    db.assign_goal(user_id, goal_id, clock::period_anchor(today, period));
    Ok(goal_id)
}

fn personal_goal_title(metric: GoalMetric, target: u32) -> String {
    match metric {
        GoalMetric::CompleteModules => format!("Complete {target} modules"),
        GoalMetric::EarnGems => format!("Earn {target} gems"),
        GoalMetric::ExtendStreak => format!("Extend your streak {target} days"),
    }
}

/// Current-window assignments for a period, oldest first (ties by goal id).
fn assignments_in_window(
    db: &Database,
    user_id: UserId,
    period: TimePeriod,
    today: NaiveDate,
) -> Vec<((UserId, GoalId, NaiveDate), GoalMetric)> {
    let current_anchor = clock::period_anchor(today, period);
    let mut assigned: Vec<_> = db
        .user_goals
        .values()
        .filter(|ug| ug.user_id == user_id)
        .filter_map(|ug| {
            let goal = db.goals.get(&ug.goal_id)?;
            (goal.period == period
                && clock::period_anchor(ug.date_assigned, period) == current_anchor)
                .then_some(((ug.user_id, ug.goal_id, ug.date_assigned), goal.metric))
        })
        .collect();
    assigned.sort_by_key(|((_, goal_id, date_assigned), _)| (*date_assigned, *goal_id));
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Database, Config, UserId) {
        let mut db = Database::new();
        let config = Config::default();
        let user = db.add_user("ada", date(2024, 1, 1)).unwrap();
        (db, config, user)
    }

    #[test]
    fn test_daily_gems_goal_completes_once() {
        let (mut db, _config, user) = setup();
        let today = date(2024, 3, 14);
        let goal = db
            .add_goal("Earn 5 gems", GoalMetric::EarnGems, 5, TimePeriod::Daily, false)
            .unwrap();
        db.assign_goal(user, goal, today);
        ledger::credit_gems(&mut db, user, 5, today).unwrap();

        let first = evaluate_goals(&mut db, user, TimePeriod::Daily, today).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].percent, 100.0);
        assert!(first[0].newly_completed);
        assert!(first[0].completed);

        let second = evaluate_goals(&mut db, user, TimePeriod::Daily, today).unwrap();
        assert!(!second[0].newly_completed);
        assert!(second[0].completed);
        assert_eq!(
            db.user_goals.get(&(user, goal, today)).unwrap().date_completed,
            Some(today)
        );
    }

    #[test]
    fn test_progress_is_bounded_at_100() {
        let (mut db, _config, user) = setup();
        let today = date(2024, 3, 14);
        let goal = db
            .add_goal("Earn 5 gems", GoalMetric::EarnGems, 5, TimePeriod::Daily, false)
            .unwrap();
        db.assign_goal(user, goal, today);
        ledger::credit_gems(&mut db, user, 50, today).unwrap();

        let progress = evaluate_goals(&mut db, user, TimePeriod::Daily, today).unwrap();
        assert_eq!(progress[0].percent, 100.0);
        assert_eq!(progress[0].current, 50);
    }

    #[test]
    fn test_partial_progress() {
        let (mut db, _config, user) = setup();
        let today = date(2024, 3, 14);
        let goal = db
            .add_goal(
                "Complete 4 modules",
                GoalMetric::CompleteModules,
                4,
                TimePeriod::Daily,
                false,
            )
            .unwrap();
        db.assign_goal(user, goal, today);
        ledger::record_module_completion(&mut db, user, today).unwrap();

        let progress = evaluate_goals(&mut db, user, TimePeriod::Daily, today).unwrap();
        assert_eq!(progress[0].current, 1);
        assert_eq!(progress[0].percent, 25.0);
        assert!(!progress[0].completed);
    }

    #[test]
    fn test_weekly_window_starts_monday() {
        let (mut db, _config, user) = setup();
        // 2024-03-14 is a Thursday; the window opened Monday 03-11
        let thursday = date(2024, 3, 14);
        let goal = db
            .add_goal(
                "Extend your streak 3 days",
                GoalMetric::ExtendStreak,
                3,
                TimePeriod::Weekly,
                false,
            )
            .unwrap();
        db.assign_goal(user, goal, clock::most_recent_monday(thursday));

        // Sunday before the window: must not count
        ledger::credit_xp(&mut db, user, 10, date(2024, 3, 10)).unwrap();
        // Inside the window
        ledger::credit_xp(&mut db, user, 10, date(2024, 3, 11)).unwrap();
        ledger::credit_xp(&mut db, user, 10, date(2024, 3, 12)).unwrap();

        let progress = evaluate_goals(&mut db, user, TimePeriod::Weekly, thursday).unwrap();
        assert_eq!(progress[0].current, 2);
        assert!(!progress[0].completed);
    }

    #[test]
    fn test_monthly_window_starts_month() {
        let (mut db, _config, user) = setup();
        let goal = db
            .add_goal("Earn 30 gems", GoalMetric::EarnGems, 30, TimePeriod::Monthly, false)
            .unwrap();
        db.assign_goal(user, goal, date(2024, 3, 1));

        ledger::credit_gems(&mut db, user, 25, date(2024, 2, 28)).unwrap();
        ledger::credit_gems(&mut db, user, 10, date(2024, 3, 5)).unwrap();

        let progress = evaluate_goals(&mut db, user, TimePeriod::Monthly, date(2024, 3, 20)).unwrap();
        assert_eq!(progress[0].current, 10);
    }

    #[test]
    fn test_stale_assignments_not_evaluated() {
        let (mut db, _config, user) = setup();
        let goal = db
            .add_goal("Earn 5 gems", GoalMetric::EarnGems, 5, TimePeriod::Daily, false)
            .unwrap();
        db.assign_goal(user, goal, date(2024, 3, 13));

        // Yesterday's daily assignment is not part of today's window
        let progress = evaluate_goals(&mut db, user, TimePeriod::Daily, date(2024, 3, 14)).unwrap();
        assert!(progress.is_empty());
    }

    fn seed_pool(db: &mut Database, period: TimePeriod) {
        db.add_goal("Complete 3 modules", GoalMetric::CompleteModules, 3, period, false)
            .unwrap();
        db.add_goal("Earn 10 gems", GoalMetric::EarnGems, 10, period, false)
            .unwrap();
        db.add_goal("Extend your streak", GoalMetric::ExtendStreak, 1, period, false)
            .unwrap();
        db.add_goal("Complete 5 modules", GoalMetric::CompleteModules, 5, period, false)
            .unwrap();
    }

    #[test]
    fn test_rotation_assigns_distinct_metrics() {
        let (mut db, config, user) = setup();
        seed_pool(&mut db, TimePeriod::Daily);
        let mut rng = StdRng::seed_from_u64(7);
        let today = date(2024, 3, 14);

        let assigned =
            ensure_period_goals(&mut db, &config, user, TimePeriod::Daily, today, &mut rng)
                .unwrap();
        assert_eq!(assigned.len(), 3);

        let metrics: Vec<GoalMetric> = assigned
            .iter()
            .map(|id| db.goal(*id).unwrap().metric)
            .collect();
        let mut deduped = metrics.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 3, "metrics must be distinct: {metrics:?}");

        // All anchored on today
        for id in &assigned {
            assert!(db.user_goals.contains_key(&(user, *id, today)));
        }
    }

    #[test]
    fn test_rotation_is_idempotent_within_window() {
        let (mut db, config, user) = setup();
        seed_pool(&mut db, TimePeriod::Daily);
        let mut rng = StdRng::seed_from_u64(7);
        let today = date(2024, 3, 14);

        ensure_period_goals(&mut db, &config, user, TimePeriod::Daily, today, &mut rng).unwrap();
        let again =
            ensure_period_goals(&mut db, &config, user, TimePeriod::Daily, today, &mut rng)
                .unwrap();
        assert!(again.is_empty());
        assert_eq!(db.user_goals.len(), 3);

        // A new day is a new window
        let tomorrow = date(2024, 3, 15);
        let fresh =
            ensure_period_goals(&mut db, &config, user, TimePeriod::Daily, tomorrow, &mut rng)
                .unwrap();
        assert_eq!(fresh.len(), 3);
    }

    #[test]
    fn test_rotation_falls_back_to_duplicate_metrics() {
        let (mut db, config, user) = setup();
        // Pool of one metric only; distinctness is unsatisfiable
        for target in [2, 4, 6] {
            db.add_goal(
                format!("Complete {target} modules"),
                GoalMetric::CompleteModules,
                target,
                TimePeriod::Daily,
                false,
            )
            .unwrap();
        }
        let mut rng = StdRng::seed_from_u64(7);

        let assigned = ensure_period_goals(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            date(2024, 3, 14),
            &mut rng,
        )
        .unwrap();
        assert_eq!(assigned.len(), 3, "duplicates accepted once the pool is dry");
    }

    #[test]
    fn test_rotation_with_undersized_pool() {
        let (mut db, config, user) = setup();
        db.add_goal("Earn 10 gems", GoalMetric::EarnGems, 10, TimePeriod::Daily, false)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let assigned = ensure_period_goals(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            date(2024, 3, 14),
            &mut rng,
        )
        .unwrap();
        assert_eq!(assigned.len(), 1);
    }

    #[test]
    fn test_rotation_skips_custom_goals() {
        let (mut db, config, user) = setup();
        db.add_goal("Earn 10 gems", GoalMetric::EarnGems, 10, TimePeriod::Daily, true)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let assigned = ensure_period_goals(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            date(2024, 3, 14),
            &mut rng,
        )
        .unwrap();
        assert!(assigned.is_empty());
    }

    #[test]
    fn test_personal_goal_bounds_enforced() {
        let (mut db, config, user) = setup();
        let today = date(2024, 3, 14);

        let err = add_personal_goal(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            GoalMetric::CompleteModules,
            21,
            today,
        )
        .unwrap_err();
        assert!(matches!(err, TrailheadError::Validation { .. }));

        let err = add_personal_goal(
            &mut db,
            &config,
            user,
            TimePeriod::Monthly,
            GoalMetric::EarnGems,
            29,
            today,
        )
        .unwrap_err();
        assert!(matches!(err, TrailheadError::Validation { .. }));

        let goal_id = add_personal_goal(
            &mut db,
            &config,
            user,
            TimePeriod::Monthly,
            GoalMetric::EarnGems,
            30,
            today,
        )
        .unwrap();
        let goal = db.goal(goal_id).unwrap();
        assert!(goal.custom);
        assert_eq!(goal.requirement, 30);
        // Anchored at the month start
        assert!(db
            .user_goals
            .contains_key(&(user, goal_id, date(2024, 3, 1))));
    }

    #[test]
    fn test_personal_goal_evicts_same_metric_first() {
        let (mut db, config, user) = setup();
        seed_pool(&mut db, TimePeriod::Daily);
        let mut rng = StdRng::seed_from_u64(7);
        let today = date(2024, 3, 14);
        ensure_period_goals(&mut db, &config, user, TimePeriod::Daily, today, &mut rng).unwrap();

        let gems_before: Vec<GoalId> = assignments_in_window(&db, user, TimePeriod::Daily, today)
            .iter()
            .filter(|(_, m)| *m == GoalMetric::EarnGems)
            .map(|((_, id, _), _)| *id)
            .collect();
        assert_eq!(gems_before.len(), 1);

        let new_goal = add_personal_goal(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            GoalMetric::EarnGems,
            7,
            today,
        )
        .unwrap();

        let assigned = assignments_in_window(&db, user, TimePeriod::Daily, today);
        assert_eq!(assigned.len(), config.goals.per_period);
        let ids: Vec<GoalId> = assigned.iter().map(|((_, id, _), _)| *id).collect();
        assert!(ids.contains(&new_goal));
        assert!(!ids.contains(&gems_before[0]), "same-metric goal evicted");
    }

    #[test]
    fn test_personal_goal_under_cap_evicts_nothing() {
        let (mut db, config, user) = setup();
        let today = date(2024, 3, 14);
        add_personal_goal(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            GoalMetric::EarnGems,
            7,
            today,
        )
        .unwrap();
        add_personal_goal(
            &mut db,
            &config,
            user,
            TimePeriod::Daily,
            GoalMetric::CompleteModules,
            3,
            today,
        )
        .unwrap();
        assert_eq!(
            assignments_in_window(&db, user, TimePeriod::Daily, today).len(),
            2
        );
    }

    proptest! {
        /// Goal progress stays within [0, 100] for any ledger contents.
        #[test]
        fn prop_progress_bounded(
            gems in prop::collection::vec(0u32..500, 0..10),
            requirement in 1u32..300,
        ) {
            let (mut db, _config, user) = setup();
            let today = date(2024, 6, 15);
            let goal = db
                .add_goal("Earn gems", GoalMetric::EarnGems, requirement, TimePeriod::Monthly, false)
                .unwrap();
            db.assign_goal(user, goal, date(2024, 6, 1));

            for (i, amount) in gems.iter().enumerate() {
                let day = date(2024, 6, 1 + i as u32);
                ledger::credit_gems(&mut db, user, *amount, day).unwrap();
            }

            let progress = evaluate_goals(&mut db, user, TimePeriod::Monthly, today).unwrap();
            prop_assert!(progress[0].percent >= 0.0);
            prop_assert!(progress[0].percent <= 100.0);

            // At most one evaluation reports newly_completed
            let again = evaluate_goals(&mut db, user, TimePeriod::Monthly, today).unwrap();
            prop_assert!(!(progress[0].newly_completed && again[0].newly_completed));
        }
    }
}
