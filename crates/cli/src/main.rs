mod cli;
mod logging;
mod run;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let pipeline = run::build_pipeline()?;
    match cli.command {
        Command::Ingest { project, input } => run::ingest(&pipeline, &project, &input),
        Command::Run { project, filename } => run::run_all(&pipeline, &project, &filename),
        Command::Stage {
            project,
            filename,
            stage,
        } => run::run_stage(&pipeline, &project, &filename, &stage),
        Command::Projects => run::list_projects(&pipeline),
        Command::Show {
            project,
            filename,
            stage,
        } => run::show(&pipeline, &project, &filename, &stage),
        Command::Delete { project } => {
            pipeline.delete_project(&project)?;
            logging::info(format!("deleted {project}"));
            Ok(())
        }
    }
}
