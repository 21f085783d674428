//! The module progression state machine.
//!
//! Per (user, module) the states are unseen → open → completed. Completion
//! credits the ledger, fires badge events, and cascades: ordinary modules
//! open their successors or complete their unit, bonus challenges open their
//! paired solution and stay out of unit accounting entirely. Re-completing
//! is an idempotent no-op: callers can safely retry and nothing is credited
//! twice.
//!
//! Everything here runs inside one `with_tx` closure at the service layer,
//! so a failure mid-cascade rolls back the whole completion.

use chrono::NaiveDate;

use crate::config::Config;
use crate::engine::badges;
use crate::engine::criteria::Value;
use crate::engine::ledger;
use crate::error::{Result, TrailheadError};
use crate::model::{BadgeEvent, ModuleId, ModuleKind, Runtime, UnitId, UserId};
use crate::storage::Database;

/// Result of a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// First completion; `unit_completed` reports a newly completed unit.
    Completed { unit_completed: bool },
    /// The module was already completed; nothing changed.
    AlreadyCompleted,
}

/// Mark a module complete for a user and run the full cascade.
pub fn complete_module(
    db: &mut Database,
    config: &Config,
    user_id: UserId,
    module_id: ModuleId,
    today: NaiveDate,
) -> Result<CompletionOutcome> {
    let module = db.module(module_id)?.clone();
    db.user(user_id)?;

    // Lazy record creation covers the first module of a unit, which is
    // reachable with no prior unlock event.
    {
        let record = db.ensure_user_module(user_id, module_id);
        if record.completed {
            tracing::debug!(user = user_id, module = module_id, "module already completed");
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        record.open = true;
        record.completed = true;
        record.completed_date = Some(today);
    }
    tracing::info!(user = user_id, module = module_id, "module completed");

    let xp = match module.kind {
        ModuleKind::Challenge | ModuleKind::BonusChallenge => config.xp.challenge_xp,
        _ => config.xp.guide_xp,
    };
    ledger::credit_xp(db, user_id, xp, today)?;
    ledger::record_module_completion(db, user_id, today)?;

    match module.kind {
        ModuleKind::BonusChallenge => {
            open_paired_bonus_solution(db, user_id, module.unit_id, module.order);
            Ok(CompletionOutcome::Completed {
                unit_completed: false,
            })
        }
        ModuleKind::BonusSolution => Ok(CompletionOutcome::Completed {
            unit_completed: false,
        }),
        _ => {
            let total_completed = db.completed_module_count(user_id);
            badges::check_and_award(
                db,
                user_id,
                BadgeEvent::CompleteModule,
                &[("completed_modules", Value::Int(total_completed as i64))],
                today,
            )?;

            let (done, total) = unit_counts(db, user_id, module.unit_id);
            if total > 0 && done == total {
                complete_unit(db, user_id, module.unit_id, today)?;
                Ok(CompletionOutcome::Completed {
                    unit_completed: true,
                })
            } else {
                open_successors(db, user_id, module.unit_id, module.order);
                Ok(CompletionOutcome::Completed {
                    unit_completed: false,
                })
            }
        }
    }
}

/// Accept a quiz submission, completing the module when accuracy passes.
pub fn submit_quiz_score(
    db: &mut Database,
    config: &Config,
    user_id: UserId,
    module_id: ModuleId,
    accuracy: u32,
    today: NaiveDate,
) -> Result<CompletionOutcome> {
    let module = db.module(module_id)?;
    if module.kind != ModuleKind::Quiz {
        return Err(TrailheadError::validation(
            "quiz scores can only be submitted for quiz modules",
        ));
    }
    if accuracy > 100 {
        return Err(TrailheadError::validation(
            "accuracy must be between 0 and 100",
        ));
    }
    if accuracy < config.quiz.pass_threshold {
        return Err(TrailheadError::validation(
            "accuracy below the passing threshold",
        ));
    }

    let outcome = complete_module(db, config, user_id, module_id, today)?;

    // Passing counts as practicing every question in the module.
    let question_ids: Vec<_> = db
        .questions_in_module(module_id)
        .iter()
        .map(|q| q.id)
        .collect();
    for question_id in question_ids {
        db.practice_question(user_id, question_id, today);
    }

    badges::check_and_award(
        db,
        user_id,
        BadgeEvent::QuizPerfectScore,
        &[("quiz_score", Value::Int(accuracy as i64))],
        today,
    )?;

    Ok(outcome)
}

/// Record the runtime a user claims for their challenge solution.
///
/// Returns whether the submission matches the module's target runtime.
pub fn submit_runtime(
    db: &mut Database,
    user_id: UserId,
    module_id: ModuleId,
    runtime: Runtime,
) -> Result<bool> {
    let module = db.module(module_id)?.clone();
    if !module.kind.accepts_runtime() {
        return Err(TrailheadError::validation(
            "runtime submissions are only valid for challenge modules",
        ));
    }
    db.user(user_id)?;

    db.ensure_user_module(user_id, module_id).submitted_runtime = Some(runtime);
    Ok(module.target_runtime == Some(runtime))
}

/// Completed and total counts of a unit's non-bonus modules for a user.
fn unit_counts(db: &Database, user_id: UserId, unit_id: UnitId) -> (u32, u32) {
    let mut done = 0;
    let mut total = 0;
    for module in db.modules_in_unit(unit_id) {
        if !module.kind.counts_toward_unit() {
            continue;
        }
        total += 1;
        if db
            .user_module(user_id, module.id)
            .is_some_and(|um| um.completed)
        {
            done += 1;
        }
    }
    (done, total)
}

/// Mark the unit completed, fire its badge event once, and open the unit's
/// bonus challenges.
fn complete_unit(db: &mut Database, user_id: UserId, unit_id: UnitId, today: NaiveDate) -> Result<()> {
    let newly = {
        let record = db.ensure_user_unit(user_id, unit_id);
        if record.completed {
            false
        } else {
            record.completed = true;
            record.completed_date = Some(today);
            true
        }
    };
    if !newly {
        return Ok(());
    }
    tracing::info!(user = user_id, unit = unit_id, "unit completed");

    badges::check_and_award(
        db,
        user_id,
        BadgeEvent::UnitCompletion,
        &[
            ("unit.completed", Value::Bool(true)),
            ("unit.id", Value::Int(unit_id as i64)),
        ],
        today,
    )?;

    let bonus_ids: Vec<ModuleId> = db
        .modules_in_unit(unit_id)
        .iter()
        .filter(|m| m.kind == ModuleKind::BonusChallenge)
        .map(|m| m.id)
        .collect();
    for id in bonus_ids {
        db.ensure_user_module(user_id, id).open = true;
    }
    Ok(())
}

/// Open every non-bonus module at the next position. Parallel modules at the
/// same position all open, supporting fan-out.
fn open_successors(db: &mut Database, user_id: UserId, unit_id: UnitId, order: u32) {
    let successor_ids: Vec<ModuleId> = db
        .modules_in_unit(unit_id)
        .iter()
        .filter(|m| m.order == order + 1 && !m.kind.is_bonus())
        .map(|m| m.id)
        .collect();
    for id in successor_ids {
        db.ensure_user_module(user_id, id).open = true;
        tracing::debug!(user = user_id, module = id, "successor module opened");
    }
}

/// Bonus solutions sit at the position immediately after their challenge.
fn open_paired_bonus_solution(db: &mut Database, user_id: UserId, unit_id: UnitId, order: u32) {
    let solution = db
        .modules_in_unit(unit_id)
        .iter()
        .find(|m| m.kind == ModuleKind::BonusSolution && m.order == order + 1)
        .map(|m| m.id);
    match solution {
        Some(id) => {
            db.ensure_user_module(user_id, id).open = true;
        }
        None => {
            tracing::warn!(unit = unit_id, order, "bonus challenge has no paired solution");
        }
    }
}
