use alloy_primitives::{utils::format_ether, U256};
use lottery_lib::wallet::short_address;
use std::fmt::Write;

use crate::history::{AggregateStats, PastRound};
use crate::sync::{Countdown, RoundView};

/// Whole-coin amount with trailing zeros removed, `0.07` rather than
/// `0.070000000000000000`.
pub fn format_coin(amount: U256) -> String {
    let full = format_ether(amount);
    match full.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => full,
    }
}

pub fn render_dashboard(
    view: &RoundView,
    countdown: Countdown,
    symbol: &str,
    fee_bps: Option<u16>,
) -> String {
    let (snapshot, stale_error) = match view {
        RoundView::Loading => return "Connecting to the lottery contract...".to_string(),
        RoundView::NoActiveRound => {
            return "No active lottery round. The admin needs to start a new one.".to_string()
        }
        RoundView::Unavailable { error } => {
            return format!("Unable to load round data ({})", error)
        }
        RoundView::Live(snapshot) => (snapshot, None),
        RoundView::Stale { snapshot, error } => (snapshot, Some(error)),
    };

    let mut out = String::new();
    let badge = if snapshot.is_active { "Live" } else { "Ended" };
    let _ = writeln!(out, "Current Lottery Round #{}  [{}]", snapshot.round_id, badge);
    let _ = writeln!(out, "{}", countdown);
    if let Some(error) = stale_error {
        let _ = writeln!(
            out,
            "! Unable to load round data, showing values from {} ({})",
            snapshot.fetched_at.format("%H:%M:%S UTC"),
            error
        );
    }
    let _ = writeln!(out, "Prize Pool:   {} {}", format_coin(snapshot.pot), symbol);
    let _ = writeln!(
        out,
        "Ticket Price: {} {}",
        format_coin(snapshot.ticket_price),
        symbol
    );
    let _ = writeln!(out, "Players:      {}", snapshot.ticket_count());
    if let Some(fee_bps) = fee_bps {
        let _ = writeln!(out, "Fee:          {} bps", fee_bps);
    }
    if let Some(winner) = &snapshot.winner {
        let _ = writeln!(out, "Winner:       {}", short_address(winner));
    }

    let _ = writeln!(out, "Participants ({}):", snapshot.ticket_count());
    if snapshot.players.is_empty() {
        let _ = writeln!(out, "  Be the first to join!");
    }
    // Newest ticket first.
    for (idx, player) in snapshot.players.iter().enumerate().rev() {
        let _ = writeln!(out, "  {}  Ticket #{}", short_address(player), idx + 1);
    }

    out.trim_end().to_string()
}

pub fn render_history(rounds: &[PastRound], stats: &AggregateStats, symbol: &str) -> String {
    if rounds.is_empty() {
        return "No Past Rounds. The history of completed lottery rounds will appear here."
            .to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Lottery Round History");
    for round in rounds {
        let winner = round
            .winner
            .as_ref()
            .map(short_address)
            .unwrap_or_else(|| "none".to_string());
        let _ = writeln!(
            out,
            "Round #{}  Winner: {}  Prize Pool: {} {}  Players: {}",
            round.round_id,
            winner,
            format_coin(round.pot),
            symbol,
            round.player_count
        );
    }
    let _ = writeln!(
        out,
        "Totals: {} rounds, {} {} paid, {} players",
        stats.total_rounds,
        format_coin(stats.total_prizes),
        symbol,
        stats.total_players
    );

    out.trim_end().to_string()
}
