use clap::Parser;
use docqa_cli::cli::Cli;
use docqa_cli::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    docqa_cli::run(cli).await
}
