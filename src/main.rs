mod app;
mod domain;
mod infra;
mod util;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::{
    app::App,
    domain::{
        entities::{Item, Requirement},
        localization::{is_supported_language, DEFAULT_LANGUAGE},
        recommendation::format_credits,
        Recommendation, UserProgress,
    },
    infra::{
        builder::build_and_publish,
        content::GithubContent,
        publish::AnyPublisher,
        server::{serve, ServerState},
    },
    util::{config::Config, version::about},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sell, recycle or keep advice for Arc Raiders loot", long_about = None)]
struct Cli {
    /// Language for item names, e.g. `de` or `pt-BR`.
    #[arg(long, global = true, default_value = DEFAULT_LANGUAGE)]
    lang: String,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the snapshot from the data repository and publish it.
    Build,
    /// Download the latest published snapshot.
    Refresh,
    /// Show local data and progress state.
    Status,
    /// Find items by name in any language.
    Search { query: String },
    /// Show one item with its usage and recommendation.
    Item { id: String },
    /// List workshop upgrades that consume items.
    Upgrades,
    /// List quests with item requirements.
    Quests,
    /// List expedition levels and their requirements.
    Expeditions,
    /// Mark a workshop upgrade level as built.
    CompleteUpgrade {
        station: String,
        level: u32,
        #[arg(long)]
        undo: bool,
    },
    /// Mark a quest or expedition as finished.
    CompleteQuest {
        name: String,
        #[arg(long)]
        undo: bool,
    },
    /// Pin a quest to the tracked list.
    TrackQuest {
        name: String,
        #[arg(long)]
        undo: bool,
    },
    /// Show tracked quests with their steps and what they still need.
    Tracked,
    /// Run the update trigger and health endpoints.
    Serve {
        /// Overrides `SALVAGE_BIND`.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Server-side commands log their progress; client commands stay quiet.
    let default_level = match cli.command {
        Command::Build | Command::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let lang = if is_supported_language(&cli.lang) {
        cli.lang.clone()
    } else {
        tracing::warn!(lang = %cli.lang, "unsupported language, using {}", DEFAULT_LANGUAGE);
        DEFAULT_LANGUAGE.to_string()
    };
    let config = Config::from_env()?;

    match cli.command {
        Command::Build => run_build(config, cli.json).await,
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(config.bind);
            let state = ServerState {
                pricing: Arc::new(config.pricing()?),
                config: Arc::new(config),
            };
            serve(addr, state).await
        }
        command => {
            let mut app = App::open(config)?;
            run_client(&mut app, command, &lang, cli.json).await
        }
    }
}

async fn run_build(config: Config, as_json: bool) -> anyhow::Result<()> {
    let pricing = config.pricing()?;
    tracing::info!(components = pricing.len(), "pricing table ready");
    let source = GithubContent::from_config(&config)?;
    let publisher = AnyPublisher::from_config(&config)?;
    let receipt = build_and_publish(&source, &pricing, config.fetch_concurrency, &publisher)
        .await
        .context("snapshot build failed")?;
    if as_json {
        println!(
            "{}",
            json!({ "success": true, "url": receipt.url, "timestamp": receipt.timestamp })
        );
    } else {
        println!("Published {} at {}", receipt.url, receipt.timestamp);
    }
    Ok(())
}

async fn run_client(
    app: &mut App,
    command: Command,
    lang: &str,
    as_json: bool,
) -> anyhow::Result<()> {
    let progress_line = |msg: &str| {
        if !as_json {
            eprintln!("{msg}");
        }
    };

    match command {
        Command::Refresh => {
            app.refresh(progress_line).await?;
            let catalog = app.catalog()?;
            let summary = json!({
                "items": catalog.items().len(),
                "lastUpdated": catalog.last_updated(),
            });
            print_out(as_json, summary, || {
                format!(
                    "{} items, published {}",
                    catalog.items().len(),
                    catalog.last_updated()
                )
            });
        }
        Command::Status => {
            let status = app.status();
            print_out(as_json, serde_json::to_value(&status)?, || {
                let mut out = format!(
                    "{}\nSource: {}\nData dir: {}\n",
                    about(),
                    status.snapshot_url,
                    status.data_dir
                );
                match (&status.last_updated, &status.age) {
                    (Some(updated), Some(age)) => out.push_str(&format!(
                        "Snapshot: published {updated} ({} ago), downloaded {age} ago{}\n",
                        status.published_age.as_deref().unwrap_or("?"),
                        if status.stale { " (stale)" } else { "" }
                    )),
                    _ => out.push_str("Snapshot: not downloaded\n"),
                }
                out.push_str(&format!(
                    "Progress: {} upgrades, {} quests completed, {} tracked",
                    status.completed_upgrades, status.completed_quests, status.tracked_quests
                ));
                out
            });
        }
        Command::Search { query } => {
            app.prepare(progress_line).await?;
            let progress = app.user_progress();
            let hits = app.catalog()?.search(&query);
            let rows: Vec<_> = hits
                .iter()
                .map(|item| (*item, app.recommend(item, &progress)))
                .collect();
            print_out(as_json, items_json(&rows), || {
                if rows.is_empty() {
                    return format!("No items match {query:?}");
                }
                rows.iter()
                    .map(|(item, rec)| summary_line(item, rec, lang))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Item { id } => {
            app.prepare(progress_line).await?;
            let progress = app.user_progress();
            let catalog = app.catalog()?;
            let item = catalog
                .find_item(&id)
                .or_else(|| catalog.search(&id).into_iter().next())
                .with_context(|| format!("no item matches {id:?}"))?;
            let rec = app.recommend(item, &progress);
            print_out(as_json, items_json(&[(item, rec.clone())]), || {
                item_detail(item, &rec, &progress, lang)
            });
        }
        Command::Upgrades => {
            app.prepare(progress_line).await?;
            let progress = app.user_progress();
            let upgrades = app.catalog()?.all_upgrades();
            let rows: Vec<_> = upgrades
                .iter()
                .map(|u| {
                    json!({
                        "station": u.station,
                        "level": u.level,
                        "completed": progress.is_upgrade_complete(&u.station, u.level),
                    })
                })
                .collect();
            print_out(as_json, json!(rows), || {
                upgrades
                    .iter()
                    .map(|u| {
                        let mark = checkbox(progress.is_upgrade_complete(&u.station, u.level));
                        format!("{mark} {} Lvl {}", u.station, u.level)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Quests => {
            app.prepare(progress_line).await?;
            print_quests(app, as_json)?;
        }
        Command::Tracked => {
            app.prepare(progress_line).await?;
            print_tracked(app, as_json)?;
        }
        Command::Expeditions => {
            app.prepare(progress_line).await?;
            let progress = app.user_progress();
            let expeditions = app.catalog()?.all_expeditions();
            let rows: Vec<_> = expeditions
                .iter()
                .map(|e| {
                    json!({
                        "level": e.level,
                        "name": e.name,
                        "completed": progress.is_quest_complete(&e.name),
                        "requirements": e.requirements,
                    })
                })
                .collect();
            print_out(as_json, json!(rows), || {
                expeditions
                    .iter()
                    .map(|e| {
                        let mark = checkbox(progress.is_quest_complete(&e.name));
                        format!("{mark} {}: {}", e.name, requirement_list(e.requirements))
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::CompleteUpgrade { station, level, undo } => {
            app.prepare(progress_line).await?;
            let completed = app.set_upgrade_complete(&station, level, !undo)?;
            print_set(as_json, "completedUpgrades", &completed);
        }
        Command::CompleteQuest { name, undo } => {
            app.prepare(progress_line).await?;
            let completed = app.set_quest_complete(&name, !undo)?;
            print_set(as_json, "completedQuests", &completed);
        }
        Command::TrackQuest { name, undo } => {
            app.prepare(progress_line).await?;
            let tracked = app.set_quest_tracked(&name, !undo)?;
            print_set(as_json, "trackedQuests", &tracked);
        }
        Command::Build | Command::Serve { .. } => {
            bail!("build and serve do not use the local stores")
        }
    }
    Ok(())
}

fn print_quests(app: &App, as_json: bool) -> anyhow::Result<()> {
    let progress = app.user_progress();
    let quests = app.catalog()?.all_quests();
    let rows: Vec<_> = quests
        .iter()
        .map(|q| {
            json!({
                "name": q.quest_name,
                "trader": q.trader,
                "completed": progress.is_quest_complete(&q.quest_name),
                "tracked": progress.tracked_quests.contains(&q.quest_name),
                "requirements": q.requirements(),
            })
        })
        .collect();
    print_out(as_json, json!(rows), || {
        if quests.is_empty() {
            return "No quests".to_string();
        }
        quests
            .iter()
            .map(|q| {
                let mark = checkbox(progress.is_quest_complete(&q.quest_name));
                let pin = if progress.tracked_quests.contains(&q.quest_name) {
                    " *"
                } else {
                    ""
                };
                format!("{mark} {}{pin}: {}", q.quest_name, requirement_list(q.requirements()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

fn print_tracked(app: &App, as_json: bool) -> anyhow::Result<()> {
    let progress = app.user_progress();
    let quests = app.tracked_quests()?;
    let rows: Vec<_> = quests
        .iter()
        .map(|q| {
            json!({
                "name": q.quest_name,
                "trader": q.trader,
                "completed": progress.is_quest_complete(&q.quest_name),
                "steps": q.steps,
                "requirements": q.requirements(),
            })
        })
        .collect();
    print_out(as_json, json!(rows), || {
        if quests.is_empty() {
            return "No tracked quests".to_string();
        }
        quests
            .iter()
            .map(|q| {
                let mark = checkbox(progress.is_quest_complete(&q.quest_name));
                let mut block = format!("{mark} {}", q.quest_name);
                if let Some(trader) = &q.trader {
                    block.push_str(&format!(" ({trader})"));
                }
                for step in &q.steps {
                    block.push_str(&format!("\n    - {step}"));
                }
                if !q.requirements().is_empty() {
                    block.push_str(&format!("\n    needs: {}", requirement_list(q.requirements())));
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

fn requirement_list(requirements: &[Requirement]) -> String {
    requirements
        .iter()
        .map(|r| format!("{} x{}", r.name, r.amount))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_out(as_json: bool, value: serde_json::Value, text: impl FnOnce() -> String) {
    if as_json {
        println!("{value}");
    } else {
        println!("{}", text());
    }
}

fn print_set(as_json: bool, key: &str, set: &std::collections::HashSet<String>) {
    let mut sorted: Vec<&String> = set.iter().collect();
    sorted.sort();
    print_out(as_json, json!({ key: sorted }), || {
        if sorted.is_empty() {
            "(none)".to_string()
        } else {
            sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("\n")
        }
    });
}

fn items_json(rows: &[(&Item, Recommendation)]) -> serde_json::Value {
    json!(rows
        .iter()
        .map(|(item, rec)| json!({ "item": item, "recommendation": rec }))
        .collect::<Vec<_>>())
}

fn checkbox(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

fn summary_line(item: &Item, rec: &Recommendation, lang: &str) -> String {
    format!(
        "{} {:<28} {:<18} {}",
        rec.icon,
        item.display_name(lang),
        rec.label,
        rec.reason
    )
}

fn item_detail(item: &Item, rec: &Recommendation, progress: &UserProgress, lang: &str) -> String {
    let mut out = format!("{} [{}]\n", item.display_name(lang), item.id);
    if let Some(rarity) = &item.rarity {
        out.push_str(&format!("Rarity: {rarity}\n"));
    }
    if !item.category.is_empty() {
        out.push_str(&format!("Category: {}\n", item.category));
    }
    if let Some(description) = &item.description {
        out.push_str(&format!("{}\n", description.resolve(lang)));
    }
    out.push_str(&format!(
        "Sell: {}  Recycle: {}  ROI: {}%\n",
        format_credits(item.sell_price.unwrap_or(0)),
        format_credits(item.recycle_value.unwrap_or(0)),
        item.roi_pct.unwrap_or(0)
    ));
    if !item.yields.is_empty() {
        out.push_str(&format!("Yields: {}\n", item.yields));
    }
    if let Some(verdict) = item.recommendation {
        out.push_str(&format!("Database verdict: {}\n", verdict.as_str()));
    }
    for usage in &item.usage.quest {
        let mark = checkbox(progress.is_quest_complete(&usage.key));
        out.push_str(&format!("{mark} {} x{}\n", usage.details, usage.amount));
    }
    for usage in &item.usage.upgrade {
        let mark = checkbox(progress.is_upgrade_complete(&usage.station, usage.level));
        out.push_str(&format!(
            "{mark} {} Lvl {} x{}\n",
            usage.station, usage.level, usage.amount
        ));
    }
    out.push_str(&format!(
        "{} {} [{}]: {}\n  {}",
        rec.icon,
        rec.label,
        rec.kind.as_str(),
        rec.reason,
        rec.subtext
    ));
    out
}
