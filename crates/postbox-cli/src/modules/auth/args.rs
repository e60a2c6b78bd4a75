use clap::Args;

#[derive(Args)]
#[command(
    long_about = "Authorize a profile through the provider's consent page.\n\n\
                  A local listener waits for the browser redirect. There is no timeout; \
                  press Ctrl-C to give up."
)]
pub struct LoginArgs {
    #[arg(long)]
    pub client_id: Option<String>,
    #[arg(long)]
    pub client_secret: Option<String>,
    #[arg(long, help = "Print the consent URL instead of opening a browser")]
    pub no_browser: bool,
}
