//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_blueprint_adapter::FileBlueprintAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::blueprint::Blueprint;
use crate::domain::blueprint_validation::validate_blueprint;
use crate::domain::combination::{Combination, Field, validate_combination};
use crate::domain::error::ReentryError;
use crate::domain::id_codec::IdCodec;
use crate::domain::presentation;
use crate::domain::rule::RuleCollection;
use crate::domain::rule_engine::RuleEngine;
use crate::ports::blueprint_port::BlueprintPort;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "reentry", about = "Reentry decision engine driven by a blueprint document")]
pub struct Cli {
    /// INI file with runtime settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Blueprint document (JSON or YAML)
    #[arg(short, long, env = "BLUEPRINT_PATH")]
    pub blueprint: Option<PathBuf>,
    /// Schema document the blueprint is validated against
    #[arg(short, long, env = "SCHEMA_PATH")]
    pub schema: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CombinationArgs {
    /// Readable or compact combination identifier
    #[arg(long, conflicts_with_all = ["symbol", "signal_type", "time_category", "outcome", "context", "generation"])]
    pub id: Option<String>,
    #[arg(long)]
    pub symbol: Option<String>,
    #[arg(long)]
    pub signal_type: Option<String>,
    #[arg(long)]
    pub time_category: Option<String>,
    #[arg(long)]
    pub outcome: Option<i64>,
    #[arg(long)]
    pub context: Option<String>,
    #[arg(long)]
    pub generation: Option<i64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a blueprint, validate it and compile its rules
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Evaluate the reentry decision for a combination
    Decide {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        combination: CombinationArgs,
    },
    /// Evaluate the cell action for a combination
    Cell {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        combination: CombinationArgs,
    },
    /// Build the identifier of a combination
    BuildId {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        combination: CombinationArgs,
        /// Use the compact identifier format
        #[arg(long)]
        compact: bool,
    },
    /// Parse a combination identifier into its fields
    ParseId {
        #[command(flatten)]
        source: SourceArgs,
        identifier: String,
    },
    /// Print the UI requirements, or the columns of one grid
    UiConfig {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        grid: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli, &FileBlueprintAdapter::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli, port: &dyn BlueprintPort) -> Result<(), ReentryError> {
    let config = cli.config.as_deref().map(load_config).transpose()?;
    let config = config.as_ref().map(|c| c as &dyn ConfigPort);

    match cli.command {
        Command::Validate { source } => {
            let bp = load_blueprint(port, &source, config)?;
            println!("{}", validation_summary(&bp)?);
        }
        Command::Decide {
            source,
            combination,
        } => {
            let bp = load_blueprint(port, &source, config)?;
            print_json(&decide_output(&bp, &combination)?)?;
        }
        Command::Cell {
            source,
            combination,
        } => {
            let bp = load_blueprint(port, &source, config)?;
            print_json(&cell_output(&bp, &combination)?)?;
        }
        Command::BuildId {
            source,
            combination,
            compact,
        } => {
            let bp = load_blueprint(port, &source, config)?;
            let compact = compact || config.is_some_and(|c| c.get_bool("output", "compact_ids", false));
            let codec = IdCodec::from_blueprint(&bp)?;
            let combo = combination_from_args(&combination, &codec)?;
            validate_combination(&bp, &combo)?;
            println!("{}", codec.build(&combo, compact)?);
        }
        Command::ParseId { source, identifier } => {
            let bp = load_blueprint(port, &source, config)?;
            let fields = IdCodec::from_blueprint(&bp)?.parse(&identifier)?;
            print_json(&Value::Object(fields))?;
        }
        Command::UiConfig { source, grid } => {
            let bp = load_blueprint(port, &source, config)?;
            match grid {
                Some(name) => print_json(&Value::from(presentation::grid_columns(&bp, &name)))?,
                None => print_json(presentation::ui_config(&bp))?,
            }
        }
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ReentryError> {
    tracing::debug!(path = %path.display(), "loading runtime config");
    FileConfigAdapter::from_file(path)
}

/// Resolve blueprint and schema paths: flags (or their env vars) first, then
/// the `[blueprint]` section of the runtime config.
pub fn resolve_sources(
    source: &SourceArgs,
    config: Option<&dyn ConfigPort>,
) -> Result<(PathBuf, Option<PathBuf>), ReentryError> {
    let blueprint = match (&source.blueprint, config) {
        (Some(path), _) => path.clone(),
        (None, Some(config)) => PathBuf::from(config.require_string("blueprint", "path")?),
        (None, None) => {
            return Err(ReentryError::ConfigMissing {
                section: "blueprint".to_string(),
                key: "path".to_string(),
            });
        }
    };
    let schema = source.schema.clone().or_else(|| {
        config
            .and_then(|c| c.get_string("blueprint", "schema_path"))
            .map(PathBuf::from)
    });
    Ok((blueprint, schema))
}

fn load_blueprint(
    port: &dyn BlueprintPort,
    source: &SourceArgs,
    config: Option<&dyn ConfigPort>,
) -> Result<Blueprint, ReentryError> {
    let (blueprint, schema) = resolve_sources(source, config)?;
    port.load(&blueprint, schema.as_deref())
}

pub fn validation_summary(bp: &Blueprint) -> Result<String, ReentryError> {
    validate_blueprint(bp, None)?;
    IdCodec::from_blueprint(bp)?;
    let engine = RuleEngine::new(bp)?;
    Ok(format!(
        "blueprint is valid (schema_version {}): {} invariants, {} cell rules, {} combination rules",
        bp.schema_version().as_deref().unwrap_or("unknown"),
        engine.rules(RuleCollection::Invariants).len(),
        engine.rules(RuleCollection::DefaultCellRules).len(),
        engine.rules(RuleCollection::DefaultCombinationRules).len(),
    ))
}

/// Build the combination from `--id` or the six field flags.
pub fn combination_from_args(
    args: &CombinationArgs,
    codec: &IdCodec,
) -> Result<Combination, ReentryError> {
    if let Some(id) = &args.id {
        return codec.parse_combination(id);
    }
    Ok(Combination {
        symbol: required(args.symbol.clone(), Field::Symbol)?,
        signal_type: required(args.signal_type.clone(), Field::SignalType)?,
        time_category: required(args.time_category.clone(), Field::TimeCategory)?,
        outcome: required(args.outcome, Field::Outcome)?,
        context: required(args.context.clone(), Field::Context)?,
        generation: required(args.generation, Field::Generation)?,
    })
}

fn required<T>(value: Option<T>, field: Field) -> Result<T, ReentryError> {
    value.ok_or_else(|| ReentryError::InvalidCombination {
        field: field.to_string(),
        reason: format!(
            "--{} is required when --id is not given",
            field.as_str().replace('_', "-")
        ),
    })
}

pub fn decide_output(bp: &Blueprint, args: &CombinationArgs) -> Result<Value, ReentryError> {
    let codec = IdCodec::from_blueprint(bp)?;
    let combo = combination_from_args(args, &codec)?;
    validate_combination(bp, &combo)?;

    let engine = RuleEngine::new(bp)?;
    let sourced = engine.evaluate_decision_with_source(&combo)?;
    tracing::info!(
        decision = %sourced.result.decision,
        source = ?sourced.source,
        "evaluated decision"
    );

    let color = presentation::color_for_decision(bp, &sourced.result.decision);
    let mut output = to_json(&sourced)?;
    if let Value::Object(map) = &mut output {
        map.insert("combination_id".into(), json!(codec.build(&combo, false)?));
        map.insert("color".into(), json!(color));
    }
    Ok(output)
}

pub fn cell_output(bp: &Blueprint, args: &CombinationArgs) -> Result<Value, ReentryError> {
    let codec = IdCodec::from_blueprint(bp)?;
    let combo = combination_from_args(args, &codec)?;
    validate_combination(bp, &combo)?;

    let engine = RuleEngine::new(bp)?;
    let cell = engine.evaluate_cell(&combo)?;
    tracing::info!(action = %cell.action, "evaluated cell");

    let color = presentation::color_for_action(bp, &cell.action);
    let mut output = to_json(&cell)?;
    if let Value::Object(map) = &mut output {
        map.insert("combination_id".into(), json!(codec.build(&combo, false)?));
        map.insert("color".into(), json!(color));
    }
    Ok(output)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ReentryError> {
    serde_json::to_value(value).map_err(|e| ReentryError::Io(e.into()))
}

fn print_json(value: &Value) -> Result<(), ReentryError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| ReentryError::Io(e.into()))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_decide_with_fields() {
        let cli = Cli::try_parse_from([
            "reentry",
            "decide",
            "--blueprint",
            "bp.json",
            "--symbol",
            "EURUSD",
            "--signal-type",
            "ECO_HIGH",
            "--time-category",
            "FLASH",
            "--outcome",
            "2",
            "--context",
            "PRE_1H",
            "--generation",
            "1",
        ])
        .unwrap();
        match cli.command {
            Command::Decide {
                source,
                combination,
            } => {
                assert_eq!(source.blueprint, Some(PathBuf::from("bp.json")));
                assert_eq!(combination.outcome, Some(2));
                assert_eq!(combination.signal_type.as_deref(), Some("ECO_HIGH"));
            }
            other => panic!("expected decide, got {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_id_with_field_flags() {
        let result = Cli::try_parse_from([
            "reentry",
            "cell",
            "--id",
            "EURUSD-ECO_HIGH-FLASH-O2-PRE_1H-G1",
            "--symbol",
            "EURUSD",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["reentry", "ui-config", "--config", "reentry.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("reentry.ini")));
    }

    #[test]
    fn missing_field_flag_is_invalid_combination() {
        let codec = IdCodec::new("{symbol}", "^(?P<symbol>.+)$", "{symbol}", "^(?P<symbol>.+)$").unwrap();
        let args = CombinationArgs {
            symbol: Some("EURUSD".into()),
            ..Default::default()
        };
        let err = combination_from_args(&args, &codec).unwrap_err();
        assert!(
            matches!(err, ReentryError::InvalidCombination { field, .. } if field == "signal_type")
        );
    }
}
