use anyhow::Result;
use clap::Parser;
use lottery_app::{
    config,
    history::{fetch_past_rounds, AggregateStats, DEFAULT_BATCH_SIZE},
    logging, view, App,
};

#[derive(Parser, Debug)]
#[command(about = "List completed lottery rounds")]
struct Args {
    /// Rounds fetched concurrently per batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load()?;
    logging::init_tracing(&cfg);

    let app = App::init_from(cfg)?;
    let rounds = fetch_past_rounds(app.ledger().as_ref(), args.batch_size).await?;
    let stats = AggregateStats::from_rounds(&rounds);
    println!(
        "{}",
        view::render_history(&rounds, &stats, app.currency_symbol())
    );
    Ok(())
}
