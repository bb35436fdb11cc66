use anyhow::{Context, Result};
use clap::Parser;
use std::env;

mod cli;
mod config;
mod convert;
mod counter;
mod lm;
mod logging;
mod paths;
mod pipeline;
mod prompts;
mod refine;
mod run_log;
mod validate;

use cli::RootArgs;
use config::{load_config, API_KEY_ENV};
use convert::ConversionClient;
use counter::{FileCounterStore, RunCounter};
use lm::OpenAiBackend;
use paths::ProjectPaths;
use pipeline::{FileOutcome, Orchestrator, RunSummary};
use prompts::{PromptRole, PromptStore};
use refine::PromptRefiner;
use run_log::RunLog;
use validate::ValidationClient;

fn main() {
    let _ = dotenvy::dotenv();
    let args = RootArgs::parse();

    // Failures are reported, never signalled through the exit code.
    if let Err(err) = run(&args) {
        logging::init_fallback_logging();
        tracing::error!(error = %format!("{err:#}"), "run aborted");
        eprintln!("Error: {err:#}");
    }
}

fn run(args: &RootArgs) -> Result<()> {
    let root = env::current_dir().context("resolve project root")?;
    let paths = ProjectPaths::new(root);
    let config = load_config(&paths.config_path())
        .context("failed to load configuration; check config.yaml and .env")?;
    logging::init_logging(&config.logging, paths.root())?;
    let api_key = config.resolve_api_key(env::var(API_KEY_ENV).ok())?;

    let run_number = RunCounter::new(FileCounterStore::new(paths.counter_path())).next();
    let input_dir = paths.resolve(&config.conversion.input_directory);
    let output_dir = paths.resolve(&config.conversion.output_directory);
    let run_log = RunLog::new(paths.run_log_path());

    println!("Starting Jenkins to Tekton conversion (run {run_number})...");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_dir.display());
    println!("Validation Log: {}", run_log.path().display());

    let backend = OpenAiBackend::new(api_key, &config.openai.base_url);
    let prompts = PromptStore::new(paths.prompts_dir());
    let orchestrator = Orchestrator {
        conversion: ConversionClient::new(&backend, &config.openai.model),
        validation: ValidationClient::new(&backend, &config.openai.model),
        prompts: &prompts,
        run_log: &run_log,
        input_dir,
        output_dir,
    };
    let started = match orchestrator.run(run_number) {
        Ok(summary) => {
            print_summary(&summary);
            true
        }
        Err(err) => {
            tracing::error!(run = run_number, error = %format!("{err:#}"), "run could not start");
            eprintln!("Error: {err:#}");
            false
        }
    };
    println!("\nConversion and validation process finished.");

    if args.refine_prompt && !started {
        println!("\nSkipping prompt refinement: run {run_number} did not start.");
    } else if args.refine_prompt {
        println!("\n--refine-prompt flag detected.");
        println!("Refining the json2tekton prompt from the latest validation feedback...");
        let refiner = PromptRefiner::new(&backend, &prompts, &config.openai.refine_model);
        if refiner.refine(run_log.path()) {
            println!(
                "Prompt refinement successful. The updated prompt is in {}.",
                prompts.active_path(PromptRole::IntermediateToTarget).display()
            );
        } else {
            println!("Prompt refinement failed. Check logs for details.");
        }
    } else {
        println!("\nSkipping prompt refinement step (--refine-prompt flag not provided).");
    }

    match run_log.has_entries() {
        Ok(true) => {
            println!("\nValidation reports and potentially errors/warnings were logged.");
            println!("Please review the log file for details: {}", run_log.path().display());
        }
        Ok(false) => println!("\nNo significant validation issues logged."),
        Err(err) => println!("\nCould not read validation log: {err:#}"),
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Run {}: {} file(s) found, {} completed, {} artifact(s) written.",
        summary.run_number,
        summary.discovered(),
        summary.completed(),
        summary.artifacts_written()
    );
    for file in &summary.files {
        match &file.outcome {
            FileOutcome::Completed { last_stage, .. } => {
                println!("  {}: ok (latest stage: {last_stage})", file.source.display());
            }
            FileOutcome::Failed { stage, error, .. } => {
                println!("  {}: failed at {stage}: {error}", file.source.display());
            }
        }
    }
}
