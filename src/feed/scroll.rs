use tracing::debug;

/// Visible window of the feed, in card rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub first_row: usize,
    pub rows: usize,
}

impl Viewport {
    /// Whether `row` lies within the viewport extended by `margin` rows below it
    pub fn reaches(&self, row: usize, margin: usize) -> bool {
        row < self.first_row + self.rows + margin
    }
}

/// Fires "load the next page" when the sentinel row after the last card
/// comes into (extended) view.
///
/// Fires at most once per transition into view; a sentinel that stays
/// visible does not fire again until it leaves, or until `rearm` is called
/// after a page lands.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    enabled: bool,
    attached: bool,
    margin: usize,
    visible: bool,
}

impl ScrollTrigger {
    pub fn new(enabled: bool, margin: usize) -> Self {
        Self {
            enabled,
            attached: false,
            margin,
            visible: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.disconnect();
        }
    }

    pub fn attach(&mut self) {
        if self.enabled {
            self.attached = true;
            self.visible = false;
        }
    }

    pub fn disconnect(&mut self) {
        self.attached = false;
        self.visible = false;
    }

    /// Forget the last visibility so a sentinel still in view fires again
    pub fn rearm(&mut self) {
        self.visible = false;
    }

    /// Report the current geometry. Returns true when the next page should
    /// be requested.
    pub fn observe(
        &mut self,
        viewport: Viewport,
        sentinel_row: usize,
        has_more: bool,
        is_loading_more: bool,
    ) -> bool {
        if !self.enabled || !self.attached {
            return false;
        }

        let intersecting = viewport.reaches(sentinel_row, self.margin);
        let entered = intersecting && !self.visible;
        if !intersecting {
            self.visible = false;
            return false;
        }
        if !entered || !has_more || is_loading_more {
            return false;
        }

        self.visible = true;
        debug!(sentinel_row, ?viewport, "sentinel entered view");
        true
    }
}
