use anyhow::Result;
use clap::Parser;
use lottery_app::{
    actions::start_round::{self, generate_secret, RoundParams},
    config, logging, App,
};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(about = "Open a new lottery round (contract owner only)")]
struct Args {
    /// Ticket price in whole coins, e.g. 0.01
    #[arg(long)]
    price: String,

    /// Round length in blocks.
    #[arg(long, default_value_t = 1200)]
    duration: u64,

    /// Commit secret; a random one is generated when omitted.
    #[arg(long)]
    secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load()?;
    logging::init_tracing(&cfg);

    let secret = match args.secret {
        Some(secret) => secret,
        None => {
            let secret = generate_secret();
            warn!("generated secret; it is needed to reveal the winner");
            secret
        }
    };
    let params = RoundParams::parse(&args.price, args.duration, secret)?;

    let app = App::init_from(cfg)?;
    let session = app.connect_session().await?;

    let outcome = start_round::run_one(app.ledger().as_ref(), &session, &params, None).await?;
    println!("round started: {}", outcome.tx);
    println!("secret: {}", params.secret);
    Ok(())
}
