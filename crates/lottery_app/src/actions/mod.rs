pub mod buy_ticket;
pub mod reveal_round;
pub mod start_round;
