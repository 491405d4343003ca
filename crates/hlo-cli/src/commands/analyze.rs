//! Analyze command: markdown reports over many games.
//!
//! Without filters this writes, under the output directory:
//! - `per_game/game-<id>.md` for every game
//! - `per_scenario/scenario-details-<scenario>.md`
//! - `per_architect/architect-details-<architect>.md`
//! - `<scenario>-<architect>.md` for every combination
//!
//! With filters it writes a single `<scenario>-<architect>-<successful>.md`,
//! using `all` for an unset filter.

use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hlo_core::{Aggregate, AnalysisError, HloReport, MistakePolicy, Session, analyze_sessions};
use hlo_db::Database;

use super::game::format_game;
use super::util::{LoadedGame, load_games};
use crate::{AnalyzeArgs, Config};

/// Formats the aggregate markdown report.
pub fn format_aggregate(aggregate: &Aggregate) -> String {
    let mut output = String::new();

    writeln!(output, "# Overview").unwrap();
    writeln!(output, " - Number of games: {}", aggregate.num_games).unwrap();
    writeln!(
        output,
        " - Average game duration: {:.2} seconds",
        aggregate.average_time_to_success_secs
    )
    .unwrap();
    writeln!(output, " - Fraction of successful games: {:.2}", aggregate.fraction_successful).unwrap();
    writeln!(
        output,
        " - Fraction of players making a mistake: {:.2}",
        aggregate.fraction_with_mistakes
    )
    .unwrap();
    writeln!(output, " - Average number of mistakes: {:.2}", aggregate.average_mistakes).unwrap();
    writeln!(
        output,
        " - Average number of blocks placed: {:.2}",
        aggregate.average_blocks_placed
    )
    .unwrap();
    writeln!(
        output,
        " - Average number of blocks destroyed: {:.2}",
        aggregate.average_blocks_destroyed
    )
    .unwrap();

    writeln!(output).unwrap();
    writeln!(output, "## Mistake distribution").unwrap();
    writeln!(output, "| Mistakes | Games |").unwrap();
    writeln!(output, "| --------:| -----:|").unwrap();
    for (mistakes, games) in &aggregate.mistake_distribution {
        writeln!(output, "| {mistakes} | {games} |").unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "# Likert Questions").unwrap();
    writeln!(
        output,
        "| Question | Mean | Standard Deviation | Median | Minimum | Maximum |"
    )
    .unwrap();
    writeln!(
        output,
        "| -------- | ----:| ------------------:| ------:| -------:| -------:|"
    )
    .unwrap();
    for stats in &aggregate.answer_stats {
        writeln!(
            output,
            "| {} | {:.2} | {:.2} | {} | {} | {} |",
            stats.question, stats.mean, stats.std_dev, stats.median, stats.min, stats.max
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "# Free-form Questions").unwrap();
    for (question, answers) in &aggregate.free_text {
        writeln!(output, "### {question}").unwrap();
        for answer in answers {
            writeln!(output, " - {answer}").unwrap();
        }
    }

    output
}

/// Runs HLO analysis for every successful game in parallel.
///
/// Scenarios that fail to load only fail their own games.
pub fn hlo_reports(
    games: &[LoadedGame],
    config: &Config,
) -> HashMap<i64, Result<HloReport, AnalysisError>> {
    let mut scenarios: Vec<String> = games.iter().map(|g| g.record.scenario.clone()).collect();
    scenarios.sort();
    scenarios.dedup();
    let catalog = config.load_catalog(&scenarios);
    tracing::debug!(loaded = ?catalog.names().collect::<Vec<_>>(), "scenario catalog ready");

    let sessions: Vec<Session> = games
        .iter()
        .filter(|g| g.log.was_successful())
        .map(|g| Session {
            game_id: g.record.id,
            scenario: g.record.scenario.clone(),
            log: g.log.clone(),
        })
        .collect();
    let outcomes = analyze_sessions(&sessions, &catalog);
    outcomes.into_iter().map(|o| (o.game_id, o.report)).collect()
}

fn aggregate_of<'a>(
    games: impl IntoIterator<Item = &'a LoadedGame>,
    policy: MistakePolicy,
) -> Aggregate {
    let overviews: Vec<_> = games.into_iter().map(|g| g.overview(policy)).collect();
    Aggregate::from_games(&overviews)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
}

/// Writes the full set of reports. Returns the written paths.
pub fn write_all(
    games: &[LoadedGame],
    reports: &HashMap<i64, Result<HloReport, AnalysisError>>,
    scenarios: &[String],
    architects: &[String],
    output_dir: &Path,
    policy: MistakePolicy,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let per_game = output_dir.join("per_game");
    create_dir(&per_game)?;
    for game in games {
        let path = per_game.join(format!("game-{}.md", game.record.id));
        write_file(&path, &format_game(game, policy, reports.get(&game.record.id)))?;
        written.push(path);
    }

    let per_scenario = output_dir.join("per_scenario");
    create_dir(&per_scenario)?;
    for scenario in scenarios {
        let aggregate = aggregate_of(games.iter().filter(|g| &g.record.scenario == scenario), policy);
        let path = per_scenario.join(format!("scenario-details-{scenario}.md"));
        write_file(&path, &format_aggregate(&aggregate))?;
        written.push(path);
    }

    let per_architect = output_dir.join("per_architect");
    create_dir(&per_architect)?;
    for architect in architects {
        let aggregate = aggregate_of(
            games.iter().filter(|g| g.architect() == Some(architect.as_str())),
            policy,
        );
        let path = per_architect.join(format!("architect-details-{architect}.md"));
        write_file(&path, &format_aggregate(&aggregate))?;
        written.push(path);
    }

    for scenario in scenarios {
        for architect in architects {
            let aggregate = aggregate_of(
                games.iter().filter(|g| {
                    &g.record.scenario == scenario && g.architect() == Some(architect.as_str())
                }),
                policy,
            );
            let path = output_dir.join(format!("{scenario}-{architect}.md"));
            write_file(&path, &format_aggregate(&aggregate))?;
            written.push(path);
        }
    }

    Ok(written)
}

/// Writes a single report over the games matching the filters.
pub fn write_filtered(
    games: &[LoadedGame],
    args: &AnalyzeArgs,
    output_dir: &Path,
    policy: MistakePolicy,
) -> Result<PathBuf> {
    let selected: Vec<&LoadedGame> = games
        .iter()
        .filter(|g| args.scenario.as_ref().is_none_or(|s| &g.record.scenario == s))
        .filter(|g| {
            args.architect
                .as_deref()
                .is_none_or(|a| g.architect() == Some(a))
        })
        .filter(|g| !args.successful || g.log.was_successful())
        .collect();
    tracing::debug!(selected = selected.len(), total = games.len(), "filtered games");

    create_dir(output_dir)?;
    let path = output_dir.join(format!(
        "{}-{}-{}.md",
        args.scenario.as_deref().unwrap_or("all"),
        args.architect.as_deref().unwrap_or("all"),
        args.successful
    ));
    write_file(&path, &format_aggregate(&aggregate_of(selected, policy)))?;
    Ok(path)
}

pub fn run(db: &Database, config: &Config, args: &AnalyzeArgs) -> Result<Vec<PathBuf>> {
    let games = load_games(db)?;
    let policy = config.mistake_policy();

    if args.is_filtered() {
        return Ok(vec![write_filtered(&games, args, &config.output_dir, policy)?]);
    }

    let reports = hlo_reports(&games, config);
    let scenarios = db.distinct_scenarios().context("failed to list scenarios")?;
    let architects = db.distinct_architects().context("failed to list architects")?;
    write_all(&games, &reports, &scenarios, &architects, &config.output_dir, policy)
}
