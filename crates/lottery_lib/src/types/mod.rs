pub mod round;
pub mod tx;

pub use round::*;
pub use tx::*;
