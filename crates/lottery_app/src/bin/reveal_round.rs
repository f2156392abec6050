use anyhow::Result;
use clap::Parser;
use lottery_app::{actions::reveal_round, config, logging, App};

#[derive(Parser, Debug)]
#[command(about = "Reveal the round secret and pay out the winner (contract owner only)")]
struct Args {
    /// The secret the round was started with.
    #[arg(long)]
    secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load()?;
    logging::init_tracing(&cfg);

    let app = App::init_from(cfg)?;
    let session = app.connect_session().await?;

    let outcome = reveal_round::run_one(app.ledger().as_ref(), &session, &args.secret, None).await?;
    println!("winner paid out: {}", outcome.tx);
    Ok(())
}
