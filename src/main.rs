//! trailhead - progression and reward engine for a learning platform
//!
//! CLI entry point for running a local, file-backed instance: seed demo
//! content, register users, complete modules, and inspect goals, stats, and
//! the weekly leaderboard.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use trailhead::config::{snapshot_path, trailhead_home, Config};
use trailhead::model::{GoalMetric, ModuleId, TimePeriod, UserId};
use trailhead::service::{PersonalGoalRequest, Platform, QuizScoreRequest};
use trailhead::storage::{FileStore, Store};
use trailhead::{seed, TrailheadError};

/// trailhead - progression and reward engine for a learning platform
#[derive(Parser)]
#[command(name = "trailhead")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory (defaults to ~/.trailhead)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed demo content into the data directory
    Init,

    /// Create a user account
    Register {
        /// Username for the new account
        username: String,
    },

    /// Run login bookkeeping (streak check, goal rotation, rewards)
    Login {
        /// User id
        user: UserId,
    },

    /// Mark a module complete
    Complete {
        /// User id
        user: UserId,
        /// Module id
        module: ModuleId,
    },

    /// Submit a quiz score for a module
    Quiz {
        /// User id
        user: UserId,
        /// Module id
        module: ModuleId,
        /// Accuracy (0-100)
        accuracy: u32,
    },

    /// Show goal progress for a period
    Goals {
        /// User id
        user: UserId,
        /// Time period: daily, weekly, or monthly
        period: String,
    },

    /// Add a personal goal
    AddGoal {
        /// User id
        user: UserId,
        /// Time period: daily, weekly, or monthly
        period: String,
        /// Metric: complete_modules, earn_gems, or extend_streak
        metric: String,
        /// Target value
        target: u32,
    },

    /// Show the weekly review question set
    Review {
        /// User id
        user: UserId,
    },

    /// Show user stats and earned badges
    Stats {
        /// User id
        user: UserId,
    },

    /// Show the weekly leaderboard
    Rankings,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> trailhead::Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => trailhead_home()
            .ok_or_else(|| TrailheadError::config("could not determine data directory"))?,
    };

    let store = FileStore::open(snapshot_path(&data_dir))?;
    let platform = Platform::new(store, Config::load());

    match cli.command {
        Commands::Init => {
            let seeded = platform.store().with_tx(seed::seed_demo)?;
            if seeded {
                println!("Seeded demo content into {}", data_dir.display());
            } else {
                println!("Data directory already seeded");
            }
        }
        Commands::Register { username } => {
            let reply = platform.register(&username)?;
            println!("Registered {} with user id {}", reply.username, reply.user_id);
        }
        Commands::Login { user } => {
            let reply = platform.login(user)?;
            println!("Streak: {}", reply.streak);
            if reply.streak_reset {
                println!("Streak was reset after inactivity");
            }
            if reply.daily_goals_assigned > 0 || reply.monthly_goals_assigned > 0 {
                println!(
                    "Assigned {} daily and {} monthly goals",
                    reply.daily_goals_assigned, reply.monthly_goals_assigned
                );
            }
            if let Some(gems) = reply.leaderboard_reward {
                println!("Weekly leaderboard reward: {gems} gems");
            }
        }
        Commands::Complete { user, module } => {
            let reply = platform.complete_module(user, module)?;
            println!("{}", reply.message);
        }
        Commands::Quiz {
            user,
            module,
            accuracy,
        } => {
            let reply = platform.submit_quiz_score(user, module, QuizScoreRequest { accuracy })?;
            println!("{}", reply.message);
        }
        Commands::Goals { user, period } => {
            let period = parse_period(&period)?;
            let reply = platform.goal_progress(user, period)?;
            if reply.goals.is_empty() {
                println!("No {period} goals assigned");
            }
            for goal in &reply.goals {
                let mark = if goal.completed { "x" } else { " " };
                println!(
                    "[{mark}] {} ({}/{}, {:.0}%)",
                    goal.title, goal.current_value, goal.target_value, goal.progress_percentage
                );
            }
            for goal in &reply.newly_completed_goals {
                println!("Completed just now: {}", goal.title);
            }
        }
        Commands::AddGoal {
            user,
            period,
            metric,
            target,
        } => {
            let request = PersonalGoalRequest {
                time_period: parse_period(&period)?,
                metric: parse_metric(&metric)?,
                target,
            };
            let reply = platform.add_personal_goal(user, request)?;
            println!("{}", reply.message);
        }
        Commands::Review { user } => {
            let questions = platform.review_questions(user)?;
            if questions.is_empty() {
                println!("No quiz history yet; nothing to review");
            }
            for question in questions {
                println!("{}", question.title);
                for option in question.options {
                    println!("  - {}", option.text);
                }
            }
        }
        Commands::Stats { user } => {
            let stats = platform.user_stats(user)?;
            println!(
                "Streak: {}  Gems: {}  XP: {}",
                stats.streak, stats.gems, stats.xp
            );
            let badges = platform.badges(user)?;
            for badge in badges {
                println!("Badge: {} ({})", badge.title, badge.date_earned);
            }
        }
        Commands::Rankings => {
            let rankings = platform.weekly_rankings()?;
            if rankings.is_empty() {
                println!("No activity this week");
            }
            for (place, entry) in rankings.iter().enumerate() {
                println!("{}. {} - {} XP", place + 1, entry.username, entry.xp);
            }
            println!("Days left in the week: {}", platform.days_left_in_week());
        }
    }

    Ok(())
}

fn parse_period(value: &str) -> trailhead::Result<TimePeriod> {
    value.parse().map_err(TrailheadError::validation)
}

fn parse_metric(value: &str) -> trailhead::Result<GoalMetric> {
    value.parse().map_err(TrailheadError::validation)
}
