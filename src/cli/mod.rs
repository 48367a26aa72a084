use clap::{Args, Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "roam-depot-publisher")]
#[command(about = "Publish a Roam Research extension to the Roam Depot registry")]
#[command(long_about = "Creates the extension's GitHub repository, adds its metadata to your fork of \
                       the Roam Depot registry and opens the pull request. Progress is saved after \
                       every step, so re-running a failed command resumes where it stopped.")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a new extension and open the registry pull request
    Submit(SubmitArgs),
    /// Push new extension code and point the registry metadata at it
    Update(UpdateArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SubmitArgs {
    /// Name of the GitHub repository holding the extension
    #[arg(long, help = "Repository name for the extension (prompted when omitted)")]
    pub extension_repo_name: Option<String>,

    /// Display name of the extension
    #[arg(long, help = "Extension name shown in Roam Depot (prompted when omitted)")]
    pub extension_name: Option<String>,

    #[arg(long, help = "One-line description of the extension (prompted when omitted)")]
    pub extension_short_description: Option<String>,

    #[arg(long, help = "Author name recorded in the registry metadata (prompted when omitted)")]
    pub extension_author: Option<String>,

    #[arg(long, help = "Comma-separated tags, e.g. \"productivity, todo\"")]
    pub extension_tags: Option<String>,

    #[arg(long, help = "Stripe account id for paid extensions")]
    pub stripe_account: Option<String>,

    /// Existing extension.js to publish
    #[arg(long, conflicts_with = "extension_js_code", help = "Path of an extension.js to copy into the repository")]
    pub extension_file_path: Option<String>,

    #[arg(long, help = "Inline JavaScript written to extension.js")]
    pub extension_js_code: Option<String>,

    #[arg(long, help = "Folder for the local clone of your registry fork")]
    pub depot_folder: Option<String>,

    /// Discard saved progress and start over
    #[arg(long, help = "Clear saved submit and update progress before running")]
    pub reset: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    #[arg(long, help = "Repository name used when the extension was submitted (prompted when omitted)")]
    pub extension_repo_name: Option<String>,

    #[arg(long, help = "Folder for the local clone of your registry fork")]
    pub depot_folder: Option<String>,

    /// Discard saved update progress and start over
    #[arg(long, help = "Clear saved update progress before running")]
    pub reset: bool,
}
