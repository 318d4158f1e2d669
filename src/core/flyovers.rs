use crate::core::{Flyover, Result, Tile};
use crate::utils::error::ShError;

/// Groups consecutive tiles into flyovers (one satellite pass each).
///
/// Tiles are expected newest first. A tile joins the current flyover while
/// the gap to the previous tile's sensing time is shorter than one orbit.
pub fn group_tiles_by_flyovers(tiles: &[Tile], orbit_time_ms: Option<i64>) -> Result<Vec<Flyover>> {
    let orbit_time_ms = orbit_time_ms.filter(|ms| *ms > 0).ok_or_else(|| {
        ShError::validation("Orbit time is needed for grouping tiles into flyovers.")
    })?;

    let mut flyovers: Vec<Flyover> = Vec::new();
    let mut previous: Option<&Tile> = None;

    for tile in tiles {
        let joins_current = match previous {
            Some(prev) => {
                let diff_ms = (prev.sensing_time - tile.sensing_time).num_milliseconds();
                diff_ms < orbit_time_ms
            }
            None => false,
        };

        match flyovers.last_mut() {
            Some(current) if joins_current => {
                current.tiles.push(tile.clone());
                current.end_time = tile.sensing_time;
            }
            _ => flyovers.push(Flyover {
                tiles: vec![tile.clone()],
                start_time: tile.sensing_time,
                end_time: tile.sensing_time,
            }),
        }
        previous = Some(tile);
    }

    tracing::debug!("Grouped {} tiles into {} flyovers", tiles.len(), flyovers.len());
    Ok(flyovers)
}
