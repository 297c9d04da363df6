use anyhow::{Context, Result};
use pipeliner::cli::output::*;
use pipeliner::cli::selector::{SelectorError, StepSelector};
use pipeliner::cli::Cli;
use pipeliner::data::default_connector;
use pipeliner::execution::PipelineRuntime;
use pipeliner::host::PipelineHost;
use std::io::{self, BufRead, Write};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let path = cli
        .pipeline_path()
        .context("Failed to determine the pipeline directory")?;
    println!(
        "{} Running pipeline from: {}",
        ROCKET,
        style(path.display()).bold()
    );

    let mut host = match PipelineHost::new(&path, cli.host_config()) {
        Ok(host) => host,
        Err(e) => {
            println!("{}", format_build_failure());
            println!("{}", format_build_error(&e));
            std::process::exit(1);
        }
    };

    let spinner = create_spinner(format!("Building {}", host.directory().name()));
    let built = host.build().map(|_| ());
    spinner.finish_and_clear();

    if let Err(e) = built {
        println!("{}", format_build_failure());
        println!("{}", format_build_error(&e));
        std::process::exit(1);
    }
    println!("{}", format_build_success());

    let pipeline = host.pipeline().context("Pipeline was not loaded")?;
    println!();
    println!("{}", format_loaded_banner(pipeline.name()));
    for (index, step) in pipeline.steps().iter().enumerate() {
        println!("{}", format_step_line(index, step));
    }
    println!();

    if cli.list {
        return Ok(());
    }

    let selector = match cli.step {
        Some(selector) => selector,
        None => match prompt_selector()? {
            Ok(selector) => selector,
            Err(e) => {
                println!("{} {}", WARN, e);
                return Ok(());
            }
        },
    };

    let connector = default_connector().context("Failed to initialize data access")?;
    let mut runtime = PipelineRuntime::new(pipeline, connector);

    if runtime.run_range(selector.index, selector.to_end) {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(pipeline.name()).bold(),
            style("successfully").green()
        );
        return Ok(());
    }

    match runtime.state().failed_step() {
        Some(index) => {
            let name = pipeline.steps().get(index).map(|s| s.name()).unwrap_or("?");
            println!("{}", format_step_failure(name, index));
        }
        None => println!(
            "{} Step {} does not exist in {}",
            CROSS,
            selector.index,
            style(pipeline.name()).bold()
        ),
    }
    std::process::exit(1);
}

/// Read a step selector from standard input
fn prompt_selector() -> Result<Result<StepSelector, SelectorError>> {
    print!(
        "{} Enter a step number (append * to run every later step): ",
        INFO
    );
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read step selection")?;

    Ok(line.parse())
}
