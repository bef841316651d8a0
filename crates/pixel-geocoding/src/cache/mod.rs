//! Cache for decoded coordinate tiles.

mod tile_cache;

pub use tile_cache::{LatLonTile, TileCache, TileKey};
