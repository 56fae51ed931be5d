use crate::models::{NaturalSize, ScaledDimensions, ViewportSize};

/// Viewport reports smaller than this in either dimension are transient
/// (soft keyboard, window chrome animating) and are skipped.
pub const MIN_VIEWPORT_EXTENT: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleChange {
    Unchanged,
    Updated(ScaledDimensions),
}

/// Fit `natural` inside `viewport` without ever enlarging it.
pub fn fit(natural: NaturalSize, viewport: ViewportSize) -> Option<ScaledDimensions> {
    if natural.width == 0 || natural.height == 0 {
        return None;
    }
    if viewport.width < MIN_VIEWPORT_EXTENT || viewport.height < MIN_VIEWPORT_EXTENT {
        return None;
    }

    let natural_width = f64::from(natural.width);
    let natural_height = f64::from(natural.height);
    let scale = (viewport.width / natural_width)
        .min(viewport.height / natural_height)
        .min(1.0);

    let width = (natural_width * scale).round() as u32;
    let height = (natural_height * scale).round() as u32;
    if width == 0 || height == 0 {
        return None;
    }
    Some(ScaledDimensions { width, height })
}

/// Sole writer of the natural size and the scaled dimensions.
#[derive(Debug, Clone, Default)]
pub struct ViewportScaler {
    natural: Option<NaturalSize>,
    viewport: Option<ViewportSize>,
    scaled: Option<ScaledDimensions>,
}

impl ViewportScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn natural(&self) -> Option<NaturalSize> {
        self.natural
    }

    pub fn viewport(&self) -> Option<ViewportSize> {
        self.viewport
    }

    pub fn scaled(&self) -> Option<ScaledDimensions> {
        self.scaled
    }

    pub fn set_natural_size(&mut self, size: NaturalSize) -> ScaleChange {
        if size.width == 0 || size.height == 0 {
            return ScaleChange::Unchanged;
        }
        self.natural = Some(size);
        self.recompute()
    }

    pub fn resize(&mut self, viewport: ViewportSize) -> ScaleChange {
        if viewport.width < MIN_VIEWPORT_EXTENT || viewport.height < MIN_VIEWPORT_EXTENT {
            log::debug!(
                "ignoring degenerate viewport {}x{}",
                viewport.width,
                viewport.height
            );
            return ScaleChange::Unchanged;
        }
        self.viewport = Some(viewport);
        self.recompute()
    }

    pub fn recompute(&mut self) -> ScaleChange {
        let (Some(natural), Some(viewport)) = (self.natural, self.viewport) else {
            return ScaleChange::Unchanged;
        };
        match fit(natural, viewport) {
            Some(scaled) if self.scaled != Some(scaled) => {
                self.scaled = Some(scaled);
                ScaleChange::Updated(scaled)
            }
            _ => ScaleChange::Unchanged,
        }
    }

    /// Forget the episode-bound measurements. The viewport is kept.
    pub fn reset(&mut self) {
        self.natural = None;
        self.scaled = None;
    }
}
