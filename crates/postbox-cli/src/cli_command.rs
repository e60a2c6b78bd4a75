use crate::cli_args::*;
use crate::modules::auth::{handle_login, handle_logout, handle_status, handle_whoami};
use crate::modules::profiles::handle_profile_command;
use crate::modules::system::CommandContext;

pub(crate) async fn handle_command(command: Command, ctx: &CommandContext) -> anyhow::Result<()> {
    match command {
        Command::Login(args) => handle_login(args, ctx).await?,
        Command::Logout => handle_logout(ctx)?,
        Command::Status => handle_status(ctx)?,
        Command::Whoami => handle_whoami(ctx).await?,
        Command::Profile(args) => handle_profile_command(args, ctx)?,
    }

    Ok(())
}
