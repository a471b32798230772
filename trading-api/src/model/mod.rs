pub mod account;
pub mod ids;
pub mod keys;
pub mod leaderboard;
pub mod money;
pub mod position;
pub mod quote;

pub use account::*;
pub use ids::*;
pub use leaderboard::*;
pub use position::*;
pub use quote::*;
