use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use postbox_keystore::SecretBackend;

pub use crate::modules::auth::args::*;
pub use crate::modules::profiles::args::*;

#[derive(Parser)]
#[command(name = "postbox")]
#[command(about = "Postbox CLI")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, env = "POSTBOX_PROFILE", help = "Profile to act on (defaults to the active one)")]
    pub profile: Option<String>,
    #[arg(long, global = true, env = "POSTBOX_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "POSTBOX_SECRET_BACKEND",
        default_value = "keyring",
        help = "Where secrets are kept: keyring or file"
    )]
    pub secret_backend: SecretBackend,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(about = "Authorize a profile in the browser")]
    Login(LoginArgs),
    #[command(about = "Forget the tokens of a profile")]
    Logout,
    #[command(about = "Show the state of a profile")]
    Status,
    #[command(about = "Show the account behind a profile")]
    Whoami,
    #[command(about = "Manage profiles")]
    Profile(ProfileArgs),
}
