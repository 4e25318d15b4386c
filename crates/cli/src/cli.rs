use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "synth", about = "research-synthesis pipeline CLI")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a PDF transcript under a project's uploads.
    Ingest { project: String, input: String },
    /// Run the full chain for one file: normalize, atomize, annotate, graph,
    /// themes, quality guard.
    Run { project: String, filename: String },
    /// Run a single stage for one file.
    Stage {
        project: String,
        filename: String,
        #[arg(long)]
        stage: String,
    },
    /// List projects and per-file stage completion.
    Projects,
    /// Print a cached artifact.
    Show {
        project: String,
        filename: String,
        #[arg(long)]
        stage: String,
    },
    /// Delete a project and all of its artifacts.
    Delete { project: String },
}
