use std::fmt;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

/// Error returned by [`Font::from_bytes`].
#[derive(Debug, Clone)]
pub struct FontLoadError(pub String);

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font load error: {}", self.0)
    }
}

impl std::error::Error for FontLoadError {}

/// A parsed TrueType/OpenType font used to paint text onto a [`Canvas`](super::Canvas).
pub struct Font {
    inner: fontdue::Font,
}

impl Font {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FontLoadError> {
        let inner = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError(e.to_string()))?;
        Ok(Self { inner })
    }

    pub(crate) fn inner(&self) -> &fontdue::Font {
        &self.inner
    }

    /// Lays out `text` at pixel size `px` with its top-left corner at `(x, y)`.
    pub(crate) fn layout(&self, text: &str, x: f32, y: f32, px: f32) -> Layout<()> {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x,
            y,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.inner], &TextStyle::new(text, px, 0));
        layout
    }

    /// Returns the `(width, height)` of `text` at pixel size `px`.
    pub fn measure(&self, text: &str, px: f32) -> (f32, f32) {
        let layout = self.layout(text, 0.0, 0.0, px);
        let width = layout
            .glyphs()
            .iter()
            .map(|g| {
                let m = self.inner.metrics_indexed(g.key.glyph_index, px);
                g.x - m.xmin as f32 + m.advance_width
            })
            .fold(0.0f32, f32::max);
        (width, layout.height())
    }
}
