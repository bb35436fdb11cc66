//! CLI argument parsing.
//!
//! Everything else comes from `config.yaml`; the only switch is whether to
//! refine the JSON→Tekton prompt after the run.
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "jenkins2tekton",
    version,
    about = "Convert Jenkinsfiles to Tekton pipelines and optionally refine prompts",
    after_help = "Reads config.yaml from the current directory.\n\nExamples:\n  jenkins2tekton\n  jenkins2tekton --refine-prompt"
)]
pub struct RootArgs {
    /// Refine the json2tekton prompt from this run's validation feedback
    #[arg(long)]
    pub refine_prompt: bool,
}
