/// Lower and upper bound for the horizontal zoom factor.
pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.1;

/// Resolution of the drag/resize snapping grid, in seconds.
pub const SNAP_GRID_SECS: f64 = 1.0;

/// Mapping between virtual timeline seconds and pixels on the editing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeContext {
    pub pixels_per_second: f64,
    zoom: f64,
    pub snap_to_grid: bool,
}

impl TimeContext {
    pub fn new(pixels_per_second: f64, snap_to_grid: bool) -> Self {
        Self {
            pixels_per_second,
            zoom: 1.0,
            snap_to_grid,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.zoom = round_to_step(zoom).clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom - ZOOM_STEP)
    }

    fn scale(&self) -> f64 {
        self.pixels_per_second * self.zoom
    }

    pub fn seconds_to_pixels(&self, seconds: f64) -> f64 {
        seconds * self.scale()
    }

    pub fn pixels_to_seconds(&self, pixels: f64) -> f64 {
        pixels / self.scale()
    }

    /// Round to the snapping grid when snapping is enabled.
    pub fn snap(&self, seconds: f64) -> f64 {
        if self.snap_to_grid {
            (seconds / SNAP_GRID_SECS).round() * SNAP_GRID_SECS
        } else {
            seconds
        }
    }
}

impl Default for TimeContext {
    fn default() -> Self {
        Self::new(800.0 / 180.0, true)
    }
}

// Zoom moves in tenths; keep repeated steps from drifting off the grid.
fn round_to_step(zoom: f64) -> f64 {
    (zoom / ZOOM_STEP).round() * ZOOM_STEP
}

/// `mm:ss`, truncating fractional seconds. Negative input renders as `00:00`.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}
