use clap::Parser;
use fixtures::{github, run_server, FixtureArgs};

/// GitHub OAuth provider fixture server
#[derive(Parser, Debug)]
#[clap(name = "github-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    run_server(args.common, github::router()).await
}
