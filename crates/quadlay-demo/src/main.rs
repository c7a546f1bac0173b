use anyhow::Result;

use quadlay_engine::wgpu;
use quadlay_engine::core::{App, AppControl, FrameCtx};
use quadlay_engine::device::GpuInit;
use quadlay_engine::logging::{init_logging, LoggingConfig};
use quadlay_engine::render::{Canvas, Font, QuadRenderer, Rgba8};
use quadlay_engine::time::{FpsMeter, FrameTime};
use quadlay_engine::window::{Runtime, RuntimeConfig};

const BACKGROUND: Rgba8 = Rgba8::rgb(16, 24, 32);
const ACCENT: Rgba8 = Rgba8::rgb(64, 160, 255);
const TEXT: Rgba8 = Rgba8::new(235, 240, 245, 255);

struct Overlay {
    canvas: Canvas,
    font: Option<Font>,
    fps: FpsMeter,
    quad: QuadRenderer,
}

impl Overlay {
    fn new(font: Option<Font>) -> Self {
        Self {
            canvas: Canvas::new(1, 1),
            font,
            fps: FpsMeter::default(),
            quad: QuadRenderer::new(),
        }
    }

    fn paint(&mut self, time: FrameTime) {
        let (w, h) = (self.canvas.width(), self.canvas.height());
        self.canvas.clear(BACKGROUND);
        self.canvas.fill_rect(0, 0, 4, h, ACCENT);

        let Some(font) = self.font.as_ref() else { return };
        self.canvas.draw_text(font, "quadlay", 14, 10, 28.0, TEXT);

        let status = format!(
            "frame {}  {:.0} fps  {:.1} ms",
            time.frame_index,
            self.fps.fps(),
            time.dt * 1000.0
        );
        let (sw, _) = font.measure(&status, 16.0);
        let x = (w as f32 - sw - 12.0).max(14.0) as i32;
        self.canvas.draw_text(font, &status, x, h as i32 - 28, 16.0, TEXT);
    }
}

impl App for Overlay {
    fn on_start(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let info = ctx.gpu.adapter_info();
        log::info!(
            "overlay ready on '{}' ({:?}), alpha mode {:?}",
            info.name,
            info.backend,
            ctx.gpu.alpha_mode()
        );
        let (w, h) = ctx.window.physical_size();
        self.on_resize(w, h);
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        self.fps.record(ctx.time.now);
        self.paint(ctx.time);

        let (quad, canvas) = (&mut self.quad, &mut self.canvas);
        ctx.render(wgpu::Color::TRANSPARENT, |rctx, target| {
            match quad.render(rctx, target, canvas) {
                Ok(()) => AppControl::Continue,
                Err(e) => {
                    log::error!("{e}");
                    AppControl::Exit
                }
            }
        })
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.canvas.width(), self.canvas.height()) {
            self.canvas = Canvas::new(width.max(1), height.max(1));
        }
    }
}

fn load_font() -> Option<Font> {
    let bytes = [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "C:\\Windows\\Fonts\\segoeui.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok());

    let Some(bytes) = bytes else {
        log::warn!("no system font found; text will not be drawn");
        return None;
    };

    match Font::from_bytes(&bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("{e}; text will not be drawn");
            None
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    Runtime::run(
        RuntimeConfig::default(),
        GpuInit::default(),
        Overlay::new(load_font()),
    )
}
