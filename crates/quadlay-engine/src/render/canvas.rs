use super::font::Font;

/// 8-bit straight-alpha color.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// A GDI-style color: alpha is left at zero.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0)
    }
}

/// CPU-side BGRA8 pixel surface, uploaded to the GPU by [`QuadRenderer`](super::QuadRenderer).
///
/// Painting follows GDI semantics: colors built with [`Rgba8::rgb`] carry alpha 0
/// and the fragment shader lifts alpha afterwards. Colors with explicit alpha
/// write that alpha.
///
/// Rows are tightly packed, top row first.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    dirty: bool,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            dirty: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGRA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// True when the canvas changed since the last [`take_dirty`](Self::take_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns the dirty flag and clears it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        let p = &self.pixels[i..i + 4];
        Some(Rgba8::new(p[2], p[1], p[0], p[3]))
    }

    pub fn clear(&mut self, color: Rgba8) {
        for p in self.pixels.chunks_exact_mut(4) {
            p.copy_from_slice(&[color.b, color.g, color.r, color.a]);
        }
        self.dirty = true;
    }

    /// Fills a rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgba8) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else { return };
        for py in y0..y1 {
            for px in x0..x1 {
                let i = self.index(px, py);
                self.pixels[i..i + 4].copy_from_slice(&[color.b, color.g, color.r, color.a]);
            }
        }
        self.dirty = true;
    }

    /// Paints `text` with its top-left corner at `(x, y)`.
    ///
    /// Glyph coverage blends the color channels toward `color`; alpha rises to
    /// `coverage * color.a` where that exceeds the current alpha.
    pub fn draw_text(&mut self, font: &Font, text: &str, x: i32, y: i32, px: f32, color: Rgba8) {
        let layout = font.layout(text, x as f32, y as f32, px);
        for g in layout.glyphs() {
            if g.width == 0 || g.height == 0 {
                continue;
            }
            let (metrics, coverage) = font.inner().rasterize_config(g.key);
            self.blend_mask(
                g.x.round() as i32,
                g.y.round() as i32,
                metrics.width as u32,
                metrics.height as u32,
                &coverage,
                color,
            );
        }
    }

    /// Blends an 8-bit coverage mask (`w * h`, row-major) at `(x, y)`.
    fn blend_mask(&mut self, x: i32, y: i32, w: u32, h: u32, mask: &[u8], color: Rgba8) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else { return };
        for py in y0..y1 {
            for px in x0..x1 {
                let mx = (px as i64 - x as i64) as usize;
                let my = (py as i64 - y as i64) as usize;
                let Some(&cov) = mask.get(my * w as usize + mx) else { continue };
                if cov == 0 {
                    continue;
                }

                let i = self.index(px, py);
                let p = &mut self.pixels[i..i + 4];
                p[0] = lerp_u8(p[0], color.b, cov);
                p[1] = lerp_u8(p[1], color.g, cov);
                p[2] = lerp_u8(p[2], color.r, cov);
                p[3] = p[3].max(mul_u8(cov, color.a));
            }
        }
        self.dirty = true;
    }

    fn clip(&self, x: i32, y: i32, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = (x as i64).clamp(0, self.width as i64) as u32;
        let y0 = (y as i64).clamp(0, self.height as i64) as u32;
        let x1 = (x as i64 + w as i64).clamp(0, self.width as i64) as u32;
        let y1 = (y as i64 + h as i64).clamp(0, self.height as i64) as u32;
        if x0 >= x1 || y0 >= y1 { None } else { Some((x0, y0, x1, y1)) }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

#[inline]
fn mul_u8(a: u8, b: u8) -> u8 {
    ((a as u32 * b as u32 + 127) / 255) as u8
}

#[inline]
fn lerp_u8(from: u8, to: u8, t: u8) -> u8 {
    let t = t as i32;
    (from as i32 + ((to as i32 - from as i32) * t + if to >= from { 127 } else { -127 }) / 255) as u8
}
