use bevy::log::Level;
use bevy::prelude::*;
use std::str::FromStr;
use vantage::{ShapeId, VantageError, VantageResult};

/// Splits "A,B,..." into exactly `N` finite numbers
fn parse_coordinates<const N: usize>(input: &str, what: &str) -> VantageResult<[f32; N]> {
    let invalid = |detail: String| VantageError::InvalidArgument {
        reason: format!("Invalid {what} '{input}': {detail}"),
    };

    let values = input
        .split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<f32>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(invalid(format!("'{part}' is not a finite number"))),
            }
        })
        .collect::<VantageResult<Vec<f32>>>()?;
    let count = values.len();
    values
        .try_into()
        .map_err(|_| invalid(format!("expected {N} comma-separated values, got {count}")))
}

/// Parse point string "X,Y"
pub fn parse_point(point_str: &str) -> VantageResult<Vec2> {
    let [x, y] = parse_coordinates::<2>(point_str, "point")?;
    Ok(Vec2::new(x, y))
}

/// Parse shape ids from comma-separated string
pub fn parse_shape_ids(ids_str: &str) -> VantageResult<Vec<ShapeId>> {
    ids_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(ShapeId)
                .map_err(|_| VantageError::InvalidArgument {
                    reason: format!("Invalid shape id: '{s}'"),
                })
        })
        .collect()
}

pub fn parse_log_level(level_str: &str) -> VantageResult<Level> {
    Level::from_str(level_str).map_err(|_| VantageError::InvalidArgument {
        reason: format!("Unknown log level '{level_str}'. Expected trace, debug, info, warn or error"),
    })
}
