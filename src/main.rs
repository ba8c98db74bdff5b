mod tui;

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pathwise::catalog::TopicCatalog;
use pathwise::config::{self, EngineConfig};
use pathwise::engine::Engine;
use pathwise::models::{
    InteractionType, JsonOutput, MetaValue, Metadata, PlanStatus, PlanTopic, Priority,
    SessionType, StudyPlan,
};
use pathwise::scheduler::{
    PlanOptions, PlanUpdate, ScheduleOptions, TopicEdit, TopicRequest, TopicTransition,
};
use pathwise::selector::Preferences;
use pathwise::session::SessionData;
use pathwise::store::SqliteStore;

#[derive(Parser)]
#[command(name = "pathwise")]
#[command(about = "Adaptive knowledge tracing and study planning from the terminal")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Student to act on
    #[arg(long, short, global = true, default_value = "default")]
    student: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and write a default config
    Init,

    /// List catalog topics with current mastery
    Topics,

    /// Record an answer to a question on a topic
    Answer {
        /// Topic id
        topic: String,

        /// Outcome: correct/incorrect
        outcome: String,

        /// Interaction type: quiz/practice/review/chat/study
        #[arg(long, short = 't', default_value = "quiz")]
        kind: String,

        /// Extra metadata as key=value (repeatable)
        #[arg(long, short, value_parser = parse_metadata)]
        meta: Vec<(String, MetaValue)>,
    },

    /// Show mastery per topic, or reset it
    Mastery {
        /// Forget the estimate for one topic
        #[arg(long, conflicts_with = "reset_all")]
        reset: Option<String>,

        /// Forget every estimate
        #[arg(long)]
        reset_all: bool,
    },

    /// Pick the topic to study next
    Next,

    /// Recommend unlocked topics, or rank the whole catalog
    Recommend {
        /// Rank every topic by priority and readiness
        #[arg(long)]
        ranked: bool,

        /// Topics to focus on (repeatable)
        #[arg(long, short)]
        focus: Vec<String>,

        /// Preferred difficulty tier (1-3)
        #[arg(long, short, value_parser = clap::value_parser!(u8).range(1..=3))]
        difficulty: Option<u8>,
    },

    /// Show adaptive difficulty and study advice for a topic
    Difficulty {
        /// Topic id
        topic: String,

        /// Minutes available for the next activity
        #[arg(long, short, default_value_t = 60)]
        minutes: u32,
    },

    /// Manage the study plan
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Record a study session against a plan topic
    Session {
        /// Topic id
        topic: String,

        /// Duration in minutes
        #[arg(long, short)]
        minutes: u32,

        /// Session type: study/quiz/chat/review
        #[arg(long, short = 't', default_value = "study")]
        kind: String,

        /// Quiz score (0-100)
        #[arg(long)]
        score: Option<f64>,

        /// The session was abandoned before finishing
        #[arg(long)]
        incomplete: bool,

        /// Optional notes
        #[arg(long, short)]
        notes: Option<String>,
    },

    /// Lay unmastered topics out over study days
    Schedule {
        /// First day of the schedule (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Study days per week (1-7)
        #[arg(long)]
        days_per_week: Option<u32>,

        /// Study hours per day
        #[arg(long)]
        hours_per_day: Option<f64>,

        /// Skip Saturdays and Sundays
        #[arg(long)]
        no_weekends: bool,

        /// Topics to focus on (repeatable)
        #[arg(long, short)]
        focus: Vec<String>,

        /// Preferred difficulty tier (1-3)
        #[arg(long, short, value_parser = clap::value_parser!(u8).range(1..=3))]
        difficulty: Option<u8>,

        /// Store the schedule as the student's plan
        #[arg(long)]
        save: bool,
    },

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Create a plan, replacing any existing one
    Create {
        /// Topics as `id`, `id@YYYY-MM-DD` or `id+DAYS`
        #[arg(required = true, value_parser = parse_topic_spec)]
        topics: Vec<TopicRequest>,

        /// Daily reminder time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        reminder: Option<NaiveTime>,

        /// Keep the plan active after every topic is closed
        #[arg(long)]
        no_auto_advance: bool,

        /// Skip Saturdays and Sundays
        #[arg(long)]
        no_weekends: bool,
    },

    /// Show the plan
    Show,

    /// Topics due today
    Today,

    /// Open topics past their target date
    Overdue,

    /// Change a topic's date, estimate, priority or notes
    Edit {
        /// Topic id
        topic: String,

        /// New target date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// New estimate in minutes
        #[arg(long, short)]
        minutes: Option<u32>,

        /// Priority: low/medium/high
        #[arg(long, short)]
        priority: Option<String>,

        /// Notes
        #[arg(long, short)]
        notes: Option<String>,
    },

    /// Skip a topic
    Skip {
        /// Topic id
        topic: String,
    },

    /// Reopen a topic as pending
    Reset {
        /// Topic id
        topic: String,
    },

    /// Change the plan status: active/paused/completed/cancelled
    Status {
        status: String,
    },

    /// Delete the plan
    Delete,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("PATHWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn open_engine(config: EngineConfig) -> Result<Engine<SqliteStore>, Box<dyn std::error::Error>> {
    let catalog = TopicCatalog::from_config(&config)?;
    let store = SqliteStore::open(config::db_path())?;
    store.init()?;
    Ok(Engine::new(catalog, config, store))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::config_path();
    let engine_config = EngineConfig::load_from(&config_path)?;

    if let Commands::Init = cli.command {
        if !config_path.exists() {
            engine_config.save_to(&config_path)?;
        }
        open_engine(engine_config)?;
        if cli.json {
            println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
        } else {
            println!("Config: {}", config_path.display());
            println!("Database initialized at: {}", config::db_path().display());
        }
        return Ok(());
    }

    let engine = open_engine(engine_config)?;
    let student = cli.student.as_str();

    match cli.command {
        Commands::Init => {}

        Commands::Topics => {
            let mastery = engine.mastery_map(student)?;
            let prior = engine.config().bkt.prior;
            if cli.json {
                let rows: Vec<_> = engine
                    .catalog()
                    .topics()
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "topic": t,
                            "mastery": mastery.get(&t.id).copied().unwrap_or(prior),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string(&JsonOutput::ok(rows))?);
            } else {
                println!("{:<16} {:<24} {:<5} {:<8} PREREQUISITES", "ID", "NAME", "TIER", "MASTERY");
                println!("{}", "-".repeat(75));
                for t in engine.catalog().topics() {
                    let m = mastery.get(&t.id).copied().unwrap_or(prior);
                    let prereqs = if t.prerequisites.is_empty() {
                        "-".to_string()
                    } else {
                        t.prerequisites.join(", ")
                    };
                    println!(
                        "{:<16} {:<24} {:<5} {:<8} {}",
                        truncate(&t.id, 16),
                        truncate(&t.name, 24),
                        t.difficulty,
                        format!("{:.0}%", m * 100.0),
                        prereqs
                    );
                }
            }
        }

        Commands::Answer {
            topic,
            outcome,
            kind,
            meta,
        } => {
            let is_correct = parse_outcome(&outcome)?;
            let interaction_type = InteractionType::from_str(&kind).ok_or_else(|| {
                format!(
                    "Invalid type '{}'. Use: quiz, practice, review, chat, or study",
                    kind
                )
            })?;
            let metadata: Metadata = meta.into_iter().collect();

            let state = engine.submit_interaction(student, &topic, is_correct, interaction_type, metadata)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&state))?);
            } else {
                println!("Recorded {} answer for '{}'.", outcome.to_lowercase(), topic);
                println!(
                    "Mastery: {:.1}% ({}), {}/{} correct",
                    state.mastery * 100.0,
                    state.difficulty.label(),
                    state.correct,
                    state.attempts
                );
            }
        }

        Commands::Mastery { reset, reset_all } => {
            if reset.is_some() || reset_all {
                let removed = engine.reset_mastery(student, reset.as_deref())?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({ "removed": removed })))?
                    );
                } else {
                    println!("Reset {} mastery estimate(s) for '{}'.", removed, student);
                }
            } else {
                let mastery = engine.get_mastery(student)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&mastery))?);
                } else if mastery.is_empty() {
                    println!("No answers recorded yet.");
                } else {
                    println!("{:<16} {:<8} {:<13} {:<9} LAST UPDATE", "TOPIC", "MASTERY", "LEVEL", "CORRECT");
                    println!("{}", "-".repeat(70));
                    for state in mastery.values() {
                        println!(
                            "{:<16} {:<8} {:<13} {:<9} {}",
                            truncate(&state.topic_id, 16),
                            format!("{:.1}%", state.mastery * 100.0),
                            state.difficulty.label(),
                            format!("{}/{}", state.correct, state.attempts),
                            state
                                .last_update
                                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                }
            }
        }

        Commands::Next => {
            let topic_id = engine.select_optimal_topic(student)?;
            let advice = engine.advice(student, &topic_id, engine.config().allocation.weak_units)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&advice))?);
            } else {
                let name = engine
                    .catalog()
                    .get(&topic_id)
                    .map_or(topic_id.as_str(), |t| t.name.as_str());
                println!("=== Next Topic ===");
                println!();
                println!("Topic: {} ({})", name, topic_id);
                println!(
                    "Mastery: {:.1}% ({})",
                    advice.difficulty.mastery * 100.0,
                    advice.difficulty.level.label()
                );
                println!("Activity: {} for {} min", advice.activity.as_str(), advice.minutes);
                println!("{}", advice.difficulty.recommendation.description());
            }
        }

        Commands::Recommend {
            ranked,
            focus,
            difficulty,
        } => {
            if ranked || !focus.is_empty() || difficulty.is_some() {
                let preferences = Preferences {
                    focus_areas: focus,
                    preferred_difficulty: difficulty,
                };
                let ranking = engine.rank_topics(student, &preferences)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&ranking))?);
                } else {
                    println!("{:<24} {:<5} {:<8} {:<10} {:<9} UNLOCKED", "TOPIC", "TIER", "MASTERY", "READINESS", "PRIORITY");
                    println!("{}", "-".repeat(70));
                    for r in ranking {
                        println!(
                            "{:<24} {:<5} {:<8} {:<10.2} {:<9.2} {}",
                            truncate(&r.name, 24),
                            r.difficulty,
                            format!("{:.0}%", r.mastery * 100.0),
                            r.readiness,
                            r.priority,
                            if r.prerequisites_met { "yes" } else { "no" }
                        );
                    }
                }
            } else {
                let topics = engine.recommend(student)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&topics))?);
                } else if topics.is_empty() {
                    println!("Nothing to recommend. Every unlocked topic is mastered.");
                } else {
                    for (i, t) in topics.iter().enumerate() {
                        println!("{}. {} ({}, tier {})", i + 1, t.name, t.id, t.difficulty);
                    }
                }
            }
        }

        Commands::Difficulty { topic, minutes } => {
            let advice = engine.advice(student, &topic, minutes)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&advice))?);
            } else {
                let d = &advice.difficulty;
                println!("Topic: {}", d.topic_id);
                println!("Mastery: {:.1}% ({})", d.mastery * 100.0, d.level.label());
                println!("Recommendation: {} - {}", d.recommendation.as_str(), d.recommendation.description());
                println!("Activity: {}", advice.activity.as_str());
                if let Some(acc) = advice.recent_accuracy {
                    println!("Recent accuracy: {:.0}%", acc * 100.0);
                }
                println!("Time: {} min", advice.minutes);
            }
        }

        Commands::Plan(plan_cmd) => match plan_cmd {
            PlanCommands::Create {
                topics,
                reminder,
                no_auto_advance,
                no_weekends,
            } => {
                let options = PlanOptions {
                    reminder_time: reminder,
                    auto_advance: Some(!no_auto_advance),
                    include_weekends: no_weekends.then_some(false),
                };
                let plan = engine.create_plan(student, &topics, &options)?;
                print_plan(&plan, cli.json)?;
            }

            PlanCommands::Show => {
                let plan = engine.get_plan(student)?;
                print_plan(&plan, cli.json)?;
            }

            PlanCommands::Today => {
                let topics = engine.get_todays_topics(student)?;
                print_plan_topics(&topics, "Nothing due today.", cli.json)?;
            }

            PlanCommands::Overdue => {
                let topics = engine.get_overdue_topics(student)?;
                print_plan_topics(&topics, "Nothing overdue.", cli.json)?;
            }

            PlanCommands::Edit {
                topic,
                date,
                minutes,
                priority,
                notes,
            } => {
                let priority = priority
                    .map(|p| {
                        Priority::from_str(&p)
                            .ok_or_else(|| format!("Invalid priority '{}'. Use: low, medium, or high", p))
                    })
                    .transpose()?;
                let update = PlanUpdate {
                    edits: vec![TopicEdit {
                        topic_id: topic,
                        target_date: date,
                        estimated_minutes: minutes,
                        priority,
                        notes,
                        transition: None,
                    }],
                    ..Default::default()
                };
                let plan = engine.update_plan(student, &update)?;
                print_plan(&plan, cli.json)?;
            }

            PlanCommands::Skip { topic } => {
                let update = PlanUpdate {
                    edits: vec![TopicEdit::transition(&topic, TopicTransition::Skip)],
                    ..Default::default()
                };
                let plan = engine.update_plan(student, &update)?;
                print_plan(&plan, cli.json)?;
            }

            PlanCommands::Reset { topic } => {
                let update = PlanUpdate {
                    edits: vec![TopicEdit::transition(&topic, TopicTransition::Reset)],
                    ..Default::default()
                };
                let plan = engine.update_plan(student, &update)?;
                print_plan(&plan, cli.json)?;
            }

            PlanCommands::Status { status } => {
                let status = PlanStatus::from_str(&status).ok_or_else(|| {
                    format!(
                        "Invalid status '{}'. Use: active, paused, completed, or cancelled",
                        status
                    )
                })?;
                let update = PlanUpdate {
                    status: Some(status),
                    ..Default::default()
                };
                let plan = engine.update_plan(student, &update)?;
                print_plan(&plan, cli.json)?;
            }

            PlanCommands::Delete => {
                let plan = engine.delete_plan(student)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                } else {
                    println!("Plan {} deleted.", plan.id);
                }
            }
        },

        Commands::Session {
            topic,
            minutes,
            kind,
            score,
            incomplete,
            notes,
        } => {
            let session_type = SessionType::from_str(&kind).ok_or_else(|| {
                format!("Invalid type '{}'. Use: study, quiz, chat, or review", kind)
            })?;
            if let Some(s) = score {
                if !(0.0..=100.0).contains(&s) {
                    return Err(format!("Score must be between 0 and 100, got {}", s).into());
                }
            }
            let data = SessionData {
                session_type,
                duration_minutes: minutes,
                score,
                completed: !incomplete,
                notes,
                ..Default::default()
            };

            let plan = engine.record_session(student, &topic, &data)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&plan))?);
            } else {
                println!("Session recorded for '{}'.", topic);
                if let Some(t) = plan.topic(&topic) {
                    println!("Status: {} ({} sessions, {} min)", t.status.label(), t.sessions.len(), t.minutes_studied());
                }
                println!(
                    "Streak: {} days (best {})",
                    plan.stats.streak_days, plan.stats.longest_streak
                );
                if plan.status == PlanStatus::Completed {
                    println!("Plan complete!");
                }
            }
        }

        Commands::Schedule {
            start,
            days_per_week,
            hours_per_day,
            no_weekends,
            focus,
            difficulty,
            save,
        } => {
            let defaults = &engine.config().schedule;
            let options = ScheduleOptions {
                start_date: start.unwrap_or_else(|| engine.today()),
                days_per_week: days_per_week.unwrap_or(defaults.days_per_week),
                hours_per_day: hours_per_day.unwrap_or(defaults.hours_per_day),
                include_weekends: !no_weekends && defaults.include_weekends,
            };
            let preferences = Preferences {
                focus_areas: focus,
                preferred_difficulty: difficulty,
            };

            if save {
                let plan = engine.schedule_plan(student, &preferences, &options, &PlanOptions::default())?;
                print_plan(&plan, cli.json)?;
            } else {
                let days = engine.build_schedule(student, &preferences, &options)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&days))?);
                } else if days.is_empty() {
                    println!("Nothing to schedule. Every topic is mastered.");
                } else {
                    for day in days {
                        println!(
                            "Day {} - {} ({} min, {})",
                            day.day_number,
                            day.date.format("%a %Y-%m-%d"),
                            day.total_minutes,
                            day.strategy.label()
                        );
                        for t in &day.topics {
                            println!(
                                "    {:<18} {:>3} min  mastery {:.0}%",
                                t.topic_id,
                                t.estimated_minutes,
                                t.mastery * 100.0
                            );
                        }
                    }
                }
            }
        }

        Commands::Tui => {
            tui::run(&engine, student)?;
        }
    }

    Ok(())
}

fn print_plan(plan: &StudyPlan, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(&JsonOutput::ok(plan))?);
        return Ok(());
    }

    let stats = &plan.stats;
    println!("Plan: {} ({})", plan.id, plan.status.label());
    println!(
        "Progress: {}/{} completed, {} in progress, {} skipped ({:.0}%)",
        stats.completed_topics,
        stats.total_topics,
        stats.in_progress_topics,
        stats.skipped_topics,
        stats.completion_rate()
    );
    println!(
        "Sessions: {} ({} min), streak {} days (best {})",
        stats.total_sessions, stats.total_minutes, stats.streak_days, stats.longest_streak
    );
    println!();
    print_topic_table(&plan.topics);
    Ok(())
}

fn print_plan_topics(topics: &[PlanTopic], empty: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(&JsonOutput::ok(topics))?);
    } else if topics.is_empty() {
        println!("{}", empty);
    } else {
        print_topic_table(topics);
    }
    Ok(())
}

fn print_topic_table(topics: &[PlanTopic]) {
    println!("{:<12} {:<24} {:<12} {:<8} MINUTES", "DATE", "TOPIC", "STATUS", "PRIORITY");
    println!("{}", "-".repeat(70));
    for t in topics {
        println!(
            "{:<12} {:<24} {:<12} {:<8} {}/{}",
            t.target_date,
            truncate(&t.name, 24),
            t.status.label(),
            t.priority.as_str(),
            t.minutes_studied(),
            t.estimated_minutes
        );
    }
}

fn parse_outcome(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "correct" | "right" | "yes" | "y" | "1" => Ok(true),
        "incorrect" | "wrong" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("Invalid outcome '{}'. Use: correct or incorrect", s)),
    }
}

/// `id`, `id@YYYY-MM-DD` or `id+DAYS`.
fn parse_topic_spec(s: &str) -> Result<TopicRequest, String> {
    if let Some((id, date)) = s.split_once('@') {
        let date = date
            .parse::<NaiveDate>()
            .map_err(|e| format!("Invalid date in '{}': {}", s, e))?;
        return Ok(TopicRequest::new(id).on(date));
    }
    if let Some((id, days)) = s.split_once('+') {
        let days = days
            .parse::<u32>()
            .map_err(|e| format!("Invalid day offset in '{}': {}", s, e))?;
        return Ok(TopicRequest::new(id).in_days(days));
    }
    if s.is_empty() {
        return Err("Topic id cannot be empty".to_string());
    }
    Ok(TopicRequest::new(s))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("Invalid time '{}': {}", s, e))
}

fn parse_metadata(s: &str) -> Result<(String, MetaValue), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid metadata '{}'. Use key=value", s))?;

    let value = if let Ok(b) = raw.parse::<bool>() {
        MetaValue::Bool(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        MetaValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        if !f.is_finite() {
            return Err(format!("Invalid metadata '{}'. Numbers must be finite", s));
        }
        MetaValue::Float(f)
    } else {
        MetaValue::Text(raw.to_string())
    };
    Ok((key.to_string(), value))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
