use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    #[command(about = "List known profiles")]
    List,
    #[command(about = "Make a profile the active one")]
    Use(ProfileNameArgs),
    #[command(about = "Delete an inactive profile and its secrets")]
    Delete(ProfileNameArgs),
    #[command(about = "Write a profile's credentials and tokens as JSON")]
    Export(ExportArgs),
    #[command(about = "Load a profile from an exported bundle")]
    Import(ImportArgs),
}

#[derive(Args)]
pub struct ProfileNameArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(long, short, help = "Destination file, or '-' for stdout")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    #[arg(long, short, help = "Bundle file, or '-' for stdin")]
    pub input: Option<PathBuf>,
    #[arg(long, help = "Import under this profile name")]
    pub name: Option<String>,
    #[arg(long, help = "Overwrite an existing profile")]
    pub force: bool,
}
