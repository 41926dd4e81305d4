//! Node positions on the canvas

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::grid;
use crate::types::NodeId;

/// Position of a node on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
    pub x: f64,
    pub y: f64,
}

impl Layout {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates to `>= 0` and round them to 2 decimal places
    pub fn normalized(self) -> Self {
        Self {
            x: normalize_coordinate(self.x),
            y: normalize_coordinate(self.y),
        }
    }

    /// Merge a partial update onto this layout
    pub fn merge(self, patch: LayoutPatch) -> Self {
        Self {
            x: patch.x.unwrap_or(self.x),
            y: patch.y.unwrap_or(self.y),
        }
    }
}

/// Partial coordinates from a drag or a form
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl LayoutPatch {
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }
}

/// Layouts keyed by node id
pub type LayoutMap = BTreeMap<NodeId, Layout>;

/// Default position for the node at `index` in insertion order
///
/// Row-major, three columns, fixed pitch.
pub fn grid_position(index: usize) -> Layout {
    let col = (index % grid::COLUMNS) as f64;
    let row = (index / grid::COLUMNS) as f64;
    Layout {
        x: col * grid::PITCH_X + grid::ORIGIN,
        y: row * grid::PITCH_Y + grid::ORIGIN,
    }
}

fn normalize_coordinate(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_positions() {
        assert_eq!(grid_position(0), Layout::new(40.0, 40.0));
        assert_eq!(grid_position(2), Layout::new(560.0, 40.0));
        assert_eq!(grid_position(3), Layout::new(40.0, 200.0));
        assert_eq!(grid_position(7), Layout::new(300.0, 360.0));
    }

    #[test]
    fn test_normalized_clamps_and_rounds() {
        let layout = Layout::new(-12.5, 10.126).normalized();
        assert_eq!(layout, Layout::new(0.0, 10.13));

        let layout = Layout::new(f64::NAN, 3.004).normalized();
        assert_eq!(layout, Layout::new(0.0, 3.0));
    }

    #[test]
    fn test_merge_keeps_missing_axis() {
        let merged = Layout::new(5.0, 6.0).merge(LayoutPatch {
            x: None,
            y: Some(9.0),
        });
        assert_eq!(merged, Layout::new(5.0, 9.0));
    }
}
