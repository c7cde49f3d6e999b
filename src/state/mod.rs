//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemState`: lifecycle of one unit of work (a region, a store, a catalog)
//! - `OriginState`: per-origin pacing kept by each fetch session

mod item_state;
mod origin_state;

pub use item_state::ItemState;
pub use origin_state::OriginState;
