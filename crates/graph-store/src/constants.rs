//! Crate-wide constants
//!
//! Single source of truth for grid geometry, debounce windows, storage keys
//! and other values shared between modules.

/// Fallback grid used when a node has no explicit layout
pub mod grid {
    /// Nodes per row
    pub const COLUMNS: usize = 3;
    /// Horizontal distance between columns (px)
    pub const PITCH_X: f64 = 260.0;
    /// Vertical distance between rows (px)
    pub const PITCH_Y: f64 = 160.0;
    /// Offset of the first cell from the canvas origin (px)
    pub const ORIGIN: f64 = 40.0;
}

/// Debounce windows (milliseconds)
pub mod debounce {
    /// Per-node layout write after a drag settles
    pub const LAYOUT_MS: u64 = 600;
    /// Bulk layout and bulk edge writes
    pub const BULK_MS: u64 = 800;
}

/// Mock simulation pacing
pub mod simulation {
    /// Interval between progress ticks
    pub const TICK_MS: u64 = 300;
    /// Progress added on every tick
    pub const STEP: u8 = 10;
}

/// Scheduler keys for debounced writes
pub mod keys {
    /// Bulk layout persist
    pub const LAYOUTS: &str = "layouts";
    /// Bulk edge persist
    pub const EDGES: &str = "edges";
    /// Prefix for per-node layout persists
    pub const LAYOUT_PREFIX: &str = "layout:";
}

/// Local storage keys
pub mod storage_keys {
    /// Cached layouts of the current flow
    pub const LAYOUTS: &str = "graph.layouts";
    /// Normal / remix / developer toggle
    pub const APP_MODE: &str = "portal.appMode";
}

/// Flow interchange format
pub mod flow {
    /// Version written into exported metadata
    pub const FORMAT_VERSION: &str = "1.0";
}

/// HTTP defaults
pub mod api {
    /// Default backend base URL
    pub const BASE_URL: &str = "http://127.0.0.1:8000/api";
    /// Default request timeout (seconds)
    pub const TIMEOUT_SECS: u64 = 30;
}

/// Directory under the platform data dir used for file storage
pub const DATA_DIR_NAME: &str = "developer-portal";
