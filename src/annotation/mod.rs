//! Annotation surface: pointer gestures over the frozen frame.
//!
//! Translates raw pointer/touch coordinates from on-screen element space
//! into pixel coordinates of the frozen raster (the on-screen size may
//! differ from the raster size under CSS scaling) and accumulates up to
//! the required number of completed incision lines. Drawing stays locked
//! until the capture controller commits a frozen frame.

use crate::geometry::{Line, Point};

/// Stroke width floor so thin rasters still get a visible line.
pub const MIN_STROKE_WIDTH: f64 = 4.0;

/// Stroke width as a fraction of raster width.
pub const STROKE_WIDTH_RATIO: f64 = 0.004;

// ============================================================================
// Gesture outcomes
// ============================================================================

/// Why a pointer gesture was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureRejection {
    /// The frozen frame is not captured yet; drawing is locked.
    CaptureNotReady,
    /// All required lines are already drawn; clear to redraw.
    LineLimitReached,
}

impl GestureRejection {
    /// User-facing notice for the rejected gesture.
    pub fn notice(&self) -> &'static str {
        match self {
            Self::CaptureNotReady => "Wait for the final frame before drawing.",
            Self::LineLimitReached => {
                "All incision lines are drawn. Clear them to start over."
            }
        }
    }
}

/// What a pointer event did to the annotation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// A new in-progress line started.
    Started,
    /// The in-progress line's endpoint moved; redraw.
    Updated,
    /// The in-progress line was finalized and appended.
    Completed { completed_count: usize },
    /// The in-progress line was dropped (pointer left the surface).
    Cancelled,
    /// Nothing happened (no active gesture, or rejected).
    Ignored(Option<GestureRejection>),
}

// ============================================================================
// Surface
// ============================================================================

/// Accumulates incision lines over the captured frame.
#[derive(Debug)]
pub struct AnnotationSurface {
    completed: Vec<Line>,
    active: Option<Line>,
    required_line_count: usize,
    /// Frozen raster dimensions; pointer input maps into this space.
    raster: Option<(u32, u32)>,
    /// On-screen element dimensions (CSS pixels).
    display: (f64, f64),
}

impl AnnotationSurface {
    pub fn new(required_line_count: usize) -> Self {
        Self {
            completed: Vec::new(),
            active: None,
            required_line_count,
            raster: None,
            display: (0.0, 0.0),
        }
    }

    /// Unlock drawing once the frozen frame exists. The raster size
    /// drives pointer mapping and stroke styling.
    pub fn unlock(&mut self, raster_width: u32, raster_height: u32) {
        self.raster = Some((raster_width, raster_height));
        log::debug!(
            "[ANNOTATE] Surface unlocked at {}x{}",
            raster_width,
            raster_height
        );
    }

    /// Relock and discard all lines (clip change or recapture).
    pub fn reset(&mut self) {
        self.completed.clear();
        self.active = None;
        self.raster = None;
    }

    /// Update the on-screen element size used for pointer mapping.
    pub fn set_display_size(&mut self, width: f64, height: f64) {
        self.display = (width, height);
    }

    pub fn required_line_count(&self) -> usize {
        self.required_line_count
    }

    pub fn completed_lines(&self) -> &[Line] {
        &self.completed
    }

    pub fn active_line(&self) -> Option<&Line> {
        self.active.as_ref()
    }

    pub fn is_unlocked(&self) -> bool {
        self.raster.is_some()
    }

    /// True once exactly the required number of lines is drawn.
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.required_line_count
    }

    /// Map an on-screen element coordinate into raster pixel space.
    pub fn map_pointer(&self, element_x: f64, element_y: f64) -> Point {
        let Some((rw, rh)) = self.raster else {
            return Point::new(element_x, element_y);
        };
        let (dw, dh) = self.display;
        if dw <= 0.0 || dh <= 0.0 {
            return Point::new(element_x, element_y);
        }
        Point::new(element_x / dw * rw as f64, element_y / dh * rh as f64)
    }

    // ------------------------------------------------------------------------
    // Gestures (raster-space points)
    // ------------------------------------------------------------------------

    /// Start a new line at the given raster-space point.
    pub fn begin(&mut self, point: Point) -> GestureOutcome {
        if self.raster.is_none() {
            return GestureOutcome::Ignored(Some(GestureRejection::CaptureNotReady));
        }
        if self.completed.len() >= self.required_line_count {
            return GestureOutcome::Ignored(Some(GestureRejection::LineLimitReached));
        }
        self.active = Some(Line::new(point, point));
        GestureOutcome::Started
    }

    /// Move the in-progress endpoint.
    pub fn update(&mut self, point: Point) -> GestureOutcome {
        match self.active.as_mut() {
            Some(line) => {
                line.end = point;
                GestureOutcome::Updated
            }
            None => GestureOutcome::Ignored(None),
        }
    }

    /// Finalize the in-progress line at the given endpoint.
    pub fn end(&mut self, point: Point) -> GestureOutcome {
        match self.active.take() {
            Some(mut line) => {
                line.end = point;
                self.completed.push(line);
                log::debug!(
                    "[ANNOTATE] Line {}/{} completed",
                    self.completed.len(),
                    self.required_line_count
                );
                GestureOutcome::Completed {
                    completed_count: self.completed.len(),
                }
            }
            None => GestureOutcome::Ignored(None),
        }
    }

    /// Pointer left the drawable area mid-drag: cancel, don't finalize.
    /// Leaving the surface does not represent a deliberate endpoint.
    pub fn leave(&mut self) -> GestureOutcome {
        match self.active.take() {
            Some(_) => GestureOutcome::Cancelled,
            None => GestureOutcome::Ignored(None),
        }
    }

    /// Discard all completed lines and any in-progress line.
    pub fn clear(&mut self) {
        self.completed.clear();
        self.active = None;
        log::debug!("[ANNOTATE] Lines cleared");
    }

    // ------------------------------------------------------------------------
    // Render plan
    // ------------------------------------------------------------------------

    /// Stroke width scaled from the raster width with a fixed floor.
    pub fn stroke_width(&self) -> f64 {
        let raster_width = self.raster.map(|(w, _)| w).unwrap_or(0) as f64;
        (raster_width * STROKE_WIDTH_RATIO).max(MIN_STROKE_WIDTH)
    }

    /// Ordered draw list: completed lines first, then the live preview.
    /// Each entry carries endpoint markers at `start` and `end` so the
    /// rendering communicates line direction.
    pub fn render_plan(&self) -> Vec<RenderedLine> {
        let stroke_width = self.stroke_width();
        let mut plan: Vec<RenderedLine> = self
            .completed
            .iter()
            .map(|line| RenderedLine {
                line: *line,
                stroke_width,
                marker_radius: stroke_width,
                is_preview: false,
            })
            .collect();
        if let Some(line) = self.active {
            plan.push(RenderedLine {
                line,
                stroke_width,
                marker_radius: stroke_width,
                is_preview: true,
            });
        }
        plan
    }
}

/// One stroked segment plus its endpoint markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedLine {
    pub line: Line,
    pub stroke_width: f64,
    pub marker_radius: f64,
    /// True for the in-progress line.
    pub is_preview: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked_surface() -> AnnotationSurface {
        let mut surface = AnnotationSurface::new(2);
        surface.unlock(640, 360);
        surface.set_display_size(640.0, 360.0);
        surface
    }

    #[test]
    fn test_begin_rejected_before_capture() {
        let mut surface = AnnotationSurface::new(2);
        let outcome = surface.begin(Point::new(10.0, 10.0));
        assert_eq!(
            outcome,
            GestureOutcome::Ignored(Some(GestureRejection::CaptureNotReady))
        );
        assert!(GestureRejection::CaptureNotReady.notice().contains("final frame"));
    }

    #[test]
    fn test_full_gesture_appends_line() {
        let mut surface = unlocked_surface();
        assert_eq!(surface.begin(Point::new(100.0, 100.0)), GestureOutcome::Started);
        assert_eq!(surface.update(Point::new(150.0, 100.0)), GestureOutcome::Updated);
        assert_eq!(
            surface.end(Point::new(200.0, 100.0)),
            GestureOutcome::Completed { completed_count: 1 }
        );
        assert!(surface.active_line().is_none());
        let line = surface.completed_lines()[0];
        assert_eq!(line.start, Point::new(100.0, 100.0));
        assert_eq!(line.end, Point::new(200.0, 100.0));
    }

    #[test]
    fn test_line_limit_enforced() {
        let mut surface = unlocked_surface();
        for i in 0..2 {
            surface.begin(Point::new(0.0, i as f64 * 50.0));
            surface.end(Point::new(100.0, i as f64 * 50.0));
        }
        assert!(surface.is_complete());
        assert_eq!(
            surface.begin(Point::new(0.0, 200.0)),
            GestureOutcome::Ignored(Some(GestureRejection::LineLimitReached))
        );
        assert_eq!(surface.completed_lines().len(), 2);
    }

    #[test]
    fn test_required_count_is_configurable() {
        let mut surface = AnnotationSurface::new(1);
        surface.unlock(640, 360);
        surface.begin(Point::new(0.0, 0.0));
        surface.end(Point::new(10.0, 10.0));
        assert!(surface.is_complete());
        assert_eq!(
            surface.begin(Point::new(0.0, 0.0)),
            GestureOutcome::Ignored(Some(GestureRejection::LineLimitReached))
        );
    }

    #[test]
    fn test_update_without_gesture_is_noop() {
        let mut surface = unlocked_surface();
        assert_eq!(
            surface.update(Point::new(5.0, 5.0)),
            GestureOutcome::Ignored(None)
        );
        assert_eq!(surface.end(Point::new(5.0, 5.0)), GestureOutcome::Ignored(None));
    }

    #[test]
    fn test_leave_cancels_instead_of_finalizing() {
        let mut surface = unlocked_surface();
        surface.begin(Point::new(100.0, 100.0));
        surface.update(Point::new(120.0, 100.0));
        assert_eq!(surface.leave(), GestureOutcome::Cancelled);
        assert!(surface.completed_lines().is_empty());
        assert!(surface.active_line().is_none());
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut surface = unlocked_surface();
        surface.begin(Point::new(0.0, 0.0));
        surface.end(Point::new(10.0, 0.0));
        surface.begin(Point::new(0.0, 20.0));
        surface.clear();
        assert!(surface.completed_lines().is_empty());
        assert!(surface.active_line().is_none());
        // Drawing stays unlocked after clear.
        assert_eq!(surface.begin(Point::new(0.0, 0.0)), GestureOutcome::Started);
    }

    #[test]
    fn test_pointer_mapping_under_css_scaling() {
        let mut surface = AnnotationSurface::new(2);
        surface.unlock(640, 360);
        // Element displayed at half the raster size.
        surface.set_display_size(320.0, 180.0);
        let point = surface.map_pointer(160.0, 45.0);
        assert_eq!(point, Point::new(320.0, 90.0));
    }

    #[test]
    fn test_stroke_width_floor() {
        let mut small = AnnotationSurface::new(2);
        small.unlock(320, 180);
        assert_eq!(small.stroke_width(), MIN_STROKE_WIDTH);

        let mut large = AnnotationSurface::new(2);
        large.unlock(4000, 2250);
        assert_eq!(large.stroke_width(), 16.0);
    }

    #[test]
    fn test_render_plan_orders_preview_last() {
        let mut surface = unlocked_surface();
        surface.begin(Point::new(0.0, 0.0));
        surface.end(Point::new(10.0, 0.0));
        surface.begin(Point::new(0.0, 50.0));
        surface.update(Point::new(30.0, 50.0));

        let plan = surface.render_plan();
        assert_eq!(plan.len(), 2);
        assert!(!plan[0].is_preview);
        assert!(plan[1].is_preview);
        assert_eq!(plan[1].line.end, Point::new(30.0, 50.0));
        assert_eq!(plan[0].marker_radius, plan[0].stroke_width);
    }
}
