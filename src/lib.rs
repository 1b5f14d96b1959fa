pub mod config;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod hand;
pub mod meld;
pub mod script;
pub mod state;
pub mod strategy;
pub mod tile;

pub use error::*;
pub use evaluator::*;
pub use hand::*;
pub use meld::*;
pub use state::*;
pub use strategy::*;
pub use tile::*;
