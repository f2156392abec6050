use anyhow::Result;
use lottery_app::{actions::buy_ticket, config, logging, App};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load()?;
    logging::init_tracing(&cfg);

    let app = App::init_from(cfg)?;
    let session = app.connect_session().await?;

    let outcome = buy_ticket::run_one(app.ledger().as_ref(), &session, None).await?;
    println!("ticket purchased by {}: {}", session.short_account(), outcome.tx);
    Ok(())
}
