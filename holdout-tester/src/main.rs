mod config_file;
mod logic;
mod scenarios;
mod util;

use anyhow::{Context, Result, ensure};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use holdout_game::{ConfigSource, EmbeddedConfig, GameConfig};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use config_file::FileConfig;
use logic::{DEFAULT_DT, LogicTester, ScenarioResult};
use scenarios::{expand_scenarios, get_scenario, list_scenarios};
use util::{parse_seeds, split_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "holdout-tester", version)]
#[command(about = "Headless QA runner for the Holdout engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Fixed simulation step in seconds
    #[arg(long, default_value_t = DEFAULT_DT)]
    dt: f32,

    /// Session configuration JSON to test instead of the embedded data
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }
    ensure!(
        args.dt.is_finite() && args.dt > 0.0,
        "--dt must be a positive number of seconds"
    );

    announce_banner(&args);

    let start_time = Instant::now();
    let config = load_config(args.config.as_ref())?;
    let scenarios = expand_scenarios(&split_csv(&args.scenarios));
    let seeds = parse_seeds(&args.seeds)?;
    ensure!(!seeds.is_empty(), "no seeds given");

    let results = run_logic_scenarios(&args, config, &scenarios, &seeds);
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner(args: &Args) {
    // keep machine-readable reports clean when they go to stdout
    if args.report != ReportFormat::Console && args.output.is_none() {
        return;
    }
    println!("{}", "🪧 Holdout Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig> {
    match path {
        Some(path) => {
            let config = FileConfig::new(path.clone()).load_config()?;
            log::info!("loaded session config from {}", path.display());
            Ok(config)
        }
        None => Ok(EmbeddedConfig.load_config()?),
    }
}

fn run_logic_scenarios(
    args: &Args,
    config: GameConfig,
    scenarios: &[String],
    seeds: &[u64],
) -> Vec<ScenarioResult> {
    let logic_tester = LogicTester::new(config, args.dt, args.verbose);
    let mut results = Vec::new();

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(logic_tester.run_scenario(&scenario, seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => {
            logic::reports::generate_json_report(&mut output_target, results)?;
        }
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Holdout Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(
                &mut output_target,
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: ReportFormat::Json,
            verbose: false,
            output: None,
            dt: DEFAULT_DT,
            config: None,
        }
    }

    #[test]
    fn args_parse_defaults() {
        let args = Args::try_parse_from(["holdout-tester"]).unwrap();
        assert_eq!(args.scenarios, "smoke");
        assert_eq!(args.report, ReportFormat::Console);
        assert_eq!(args.iterations, 10);
        assert!((args.dt - DEFAULT_DT).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_scenarios_are_skipped() {
        let args = base_args();
        let results = run_logic_scenarios(
            &args,
            GameConfig::default_config(),
            &["nope".to_string(), "smoke".to_string()],
            &[1],
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].scenario_name, "Smoke");
    }

    #[test]
    fn reports_write_to_a_file() {
        let path = std::env::temp_dir().join(format!("holdout-report-{}.json", std::process::id()));
        let mut args = base_args();
        args.output = Some(path.clone());
        let results = run_logic_scenarios(&args, GameConfig::default_config(), &[], &[1]);
        write_reports(&args, &results, Instant::now()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.trim(), "[]");
    }

    #[test]
    fn embedded_config_is_the_default_source() {
        let config = load_config(None).unwrap();
        assert_eq!(config, GameConfig::default_config());
    }
}
