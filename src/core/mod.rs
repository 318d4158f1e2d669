pub mod flyovers;
pub mod retry;

pub use crate::domain::model::{Flyover, PaginatedTiles, Tile};
pub use crate::domain::ports::{Layer, TpdProvider};
pub use crate::utils::error::Result;
