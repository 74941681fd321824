use clap::Parser;
use fixtures::{gatekeeper, run_server, FixtureArgs};

/// GateKeeper identity-service fixture server
#[derive(Parser, Debug)]
#[clap(name = "gatekeeper-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    run_server(args.common, gatekeeper::router()).await
}
