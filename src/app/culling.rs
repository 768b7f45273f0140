use terra_geom::Frustum;

use crate::camera::Viewer;

/// Optional frustum culling. While frozen, the frustum captured at freeze time is
/// kept so the culled set can be inspected from elsewhere.
#[derive(Clone, Debug, Default)]
pub struct Culling {
    pub enabled: bool,
    frozen: Option<Frustum>,
    freeze_requested: bool,
}

impl Culling {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.freeze_requested
    }

    pub fn toggle_freeze(&mut self, viewer: &impl Viewer) {
        self.freeze_requested = !self.freeze_requested;
        self.frozen = if self.freeze_requested {
            viewer.frustum()
        } else {
            None
        };
        log::info!(
            target: "culling",
            "frustum {}",
            if self.freeze_requested { "frozen" } else { "live" }
        );
    }

    /// Frustum to test against this frame, or `None` to draw everything.
    pub fn active(&self, viewer: &impl Viewer) -> Option<Frustum> {
        if !self.enabled {
            return None;
        }
        if self.freeze_requested {
            self.frozen
        } else {
            viewer.frustum()
        }
    }
}
