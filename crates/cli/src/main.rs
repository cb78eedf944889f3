use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use gambit_core::ParseError;
use gambit_eval::world::GridWorld;
use gambit_eval::{
    GameView, RegistryError, Scenario, StepRecord, TurnController, TurnOutcome, TurnReport,
};
use tracing::info;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Scripted-AI scenario runner.
#[derive(Parser)]
#[command(name = "gambit", version, about = "Scripted AI scenario runner")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scenario and compile every formula in it
    Check {
        /// Path to the scenario JSON file
        scenario: PathBuf,
    },

    /// Evaluate a formula against a scenario's opening position
    Eval {
        /// Path to the scenario JSON file
        scenario: PathBuf,
        /// Formula text to evaluate
        #[arg(long)]
        formula: String,
    },

    /// Play AI turns and print the decision log
    Turn {
        /// Path to the scenario JSON file
        scenario: PathBuf,
        /// Number of consecutive turns to play
        #[arg(long, default_value_t = 1)]
        turns: u32,
        /// Cap on controller steps per turn (overrides the scenario)
        #[arg(long)]
        max_steps: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { scenario } => {
            cmd_check(&scenario, cli.output, cli.quiet);
        }
        Commands::Eval { scenario, formula } => {
            cmd_eval(&scenario, &formula, cli.output);
        }
        Commands::Turn {
            scenario,
            turns,
            max_steps,
        } => {
            cmd_turn(&scenario, turns, max_steps, cli.output, cli.quiet);
        }
    }
}

fn cmd_check(path: &Path, output: OutputFormat, quiet: bool) {
    let scenario = load_scenario(path, output);
    if let Err(e) = GridWorld::from_scenario(&scenario) {
        fail(output, &e.to_string());
    }
    match TurnController::new(&scenario.ai) {
        Ok(_) => match output {
            OutputFormat::Json => {
                let summary = serde_json::json!({
                    "width": scenario.width,
                    "height": scenario.height,
                    "units": scenario.units.len(),
                    "side": scenario.ai.side,
                    "recruit": scenario.ai.recruit.is_some(),
                    "moves": scenario
                        .ai
                        .moves
                        .iter()
                        .map(|m| m.name.as_str())
                        .collect::<Vec<_>>(),
                });
                println!("{}", pretty(&summary));
            }
            OutputFormat::Text => {
                if !quiet {
                    println!(
                        "scenario: {}x{} board, {} units, ai side {}",
                        scenario.width,
                        scenario.height,
                        scenario.units.len(),
                        scenario.ai.side
                    );
                    for decl in &scenario.ai.moves {
                        println!("  move {}", decl.name);
                    }
                }
                println!("ok");
            }
        },
        Err(e) => {
            if output == OutputFormat::Json {
                let mut err = serde_json::json!({ "error": e.to_string() });
                if let Some(pos) = parse_position(&e) {
                    err["line"] = pos.line.into();
                    err["column"] = pos.column.into();
                }
                eprintln!("{}", err);
                process::exit(1);
            }
            fail(output, &e.to_string());
        }
    }
}

fn cmd_eval(path: &Path, formula: &str, output: OutputFormat) {
    let scenario = load_scenario(path, output);
    let world = match GridWorld::from_scenario(&scenario) {
        Ok(w) => w,
        Err(e) => fail(output, &e.to_string()),
    };
    let mut controller = match TurnController::new(&scenario.ai) {
        Ok(c) => c,
        Err(e) => fail(output, &e.to_string()),
    };
    match controller.evaluate_formula(&world, formula) {
        Ok(value) => match output {
            OutputFormat::Json => println!("{}", pretty(&value.to_json())),
            OutputFormat::Text => println!("{}", value),
        },
        Err(e) => fail(output, &e.to_string()),
    }
}

fn cmd_turn(
    path: &Path,
    turns: u32,
    max_steps: Option<usize>,
    output: OutputFormat,
    quiet: bool,
) {
    let mut scenario = load_scenario(path, output);
    if let Some(cap) = max_steps {
        scenario.ai.max_steps = cap;
    }
    let mut world = match GridWorld::from_scenario(&scenario) {
        Ok(w) => w,
        Err(e) => fail(output, &e.to_string()),
    };
    let mut controller = match TurnController::new(&scenario.ai) {
        Ok(c) => c,
        Err(e) => fail(output, &e.to_string()),
    };

    let mut reports = Vec::new();
    for round in 0..turns {
        if round > 0 {
            world.advance_turn();
            controller.new_turn();
        }
        let report = controller.play_turn(&mut world);
        if output == OutputFormat::Text {
            render_turn(world.turn(), &report, quiet);
        }
        reports.push(report);
    }

    if output == OutputFormat::Json {
        let doc = if reports.len() == 1 {
            serde_json::to_value(&reports[0])
        } else {
            serde_json::to_value(&reports)
        };
        match doc {
            Ok(v) => println!("{}", pretty(&v)),
            Err(e) => fail(output, &format!("serialization error: {}", e)),
        }
    }
}

fn render_turn(turn: i64, report: &TurnReport, quiet: bool) {
    if !quiet {
        for step in &report.steps {
            println!("  {}", render_step(step));
        }
    }
    let outcome = match report.outcome {
        TurnOutcome::Completed => "completed",
        TurnOutcome::StepLimit => "step limit reached",
    };
    println!(
        "turn {}: {}, {} actions",
        turn, outcome, report.actions_executed
    );
}

fn render_step(step: &StepRecord) -> String {
    let mut line = format!("[{}]", step.phase);
    if let Some(name) = &step.move_name {
        line.push(' ');
        line.push_str(name);
    }
    if let Some(unit) = step.unit {
        line.push_str(&format!(" unit {}", unit));
    }
    if let Some(score) = step.score {
        line.push_str(&format!(" score {}", score));
    }
    line.push_str(" -- ");
    line.push_str(&step.result);
    line
}

fn load_scenario(path: &Path, output: OutputFormat) -> Scenario {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => fail(output, &format!("cannot read {}: {}", path.display(), e)),
    };
    match Scenario::from_json(&text) {
        Ok(scenario) => {
            info!(path = %path.display(), "scenario loaded");
            scenario
        }
        Err(e) => fail(output, &format!("{}: {}", path.display(), e)),
    }
}

/// Pull the source position out of a compile failure, when it carries one.
fn parse_position(err: &RegistryError) -> Option<&ParseError> {
    match err {
        RegistryError::Parse { source, .. }
        | RegistryError::RecruitParse { source }
        | RegistryError::MoveParse { source } => Some(source),
        _ => None,
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {}", e))
}

fn fail(output: OutputFormat, message: &str) -> ! {
    match output {
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": message }));
        }
        OutputFormat::Text => eprintln!("error: {}", message),
    }
    process::exit(1);
}
