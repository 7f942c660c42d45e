use crate::board::Board;
use crate::config::Config;
use crate::input::PointerEvent;
use crate::service::{HttpRecognitionService, ServiceError};
use crate::state::{AppState, PaletteColor, SWATCHES};
use crate::surface::Background;
use eframe::Frame;
use egui::{Color32, Pos2, Rect, RichText, TextureHandle, TextureOptions};
use std::sync::Arc;
use std::time::Instant;

const COLOR_KEY: &str = "ink_calc.color";

pub struct App {
    board: Board,
    texture: Option<TextureHandle>,
    uploaded_revision: u64,
    layout: LayoutSettle,
}

/// Waits for the window geometry to settle before the surface is sized.
///
/// The fullscreen request may land a few frames after startup, and the
/// surface can only be sized once.
#[derive(Debug, Default)]
struct LayoutSettle {
    last: Option<Rect>,
    frames: u32,
    stable_frames: u32,
}

impl LayoutSettle {
    const STABLE_FRAMES: u32 = 2;
    // Give up waiting for fullscreen after about a second at 60 fps
    const MAX_FRAMES: u32 = 60;

    fn observe(&mut self, viewport: Rect, fullscreen: Option<bool>) -> bool {
        self.frames += 1;
        if self.last == Some(viewport) {
            self.stable_frames += 1;
        } else {
            self.last = Some(viewport);
            self.stable_frames = 0;
        }

        match fullscreen {
            Some(true) => self.stable_frames >= 1,
            Some(false) => self.frames >= Self::MAX_FRAMES,
            None => self.stable_frames >= Self::STABLE_FRAMES || self.frames >= Self::MAX_FRAMES,
        }
    }
}

// While drawing, the pointer ends the stroke as soon as it is off the canvas
// or over another layer such as the toolbar.
fn drag_event(local: Option<Pos2>, over_canvas: bool) -> PointerEvent {
    match local {
        Some(pos) if over_canvas => PointerEvent::Move(pos),
        _ => PointerEvent::Leave,
    }
}

impl App {
    /// # Errors
    /// Fails when the HTTP client for the recognition service cannot be built.
    pub fn new(cc: &eframe::CreationContext<'_>, config: &Config) -> Result<Self, ServiceError> {
        let service = HttpRecognitionService::new(config)?;

        // Restore the last selected color (drawings themselves are not kept)
        let color = cc
            .storage
            .and_then(|storage| eframe::get_value::<PaletteColor>(storage, COLOR_KEY))
            .filter(|color| SWATCHES.contains(color))
            .unwrap_or_default();

        let mut board = Board::new(Arc::new(service), config.jpeg_quality)
            .with_state(AppState::with_color(color));
        board.set_repaint_context(cc.egui_ctx.clone());

        Ok(Self {
            board,
            texture: None,
            uploaded_revision: 0,
            layout: LayoutSettle::default(),
        })
    }
}

impl eframe::App for App {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, COLOR_KEY, &self.board.state().color);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let now = Instant::now();
        self.board.step(now);

        // Toolbar window
        let content_rect = ctx.available_rect();
        let margin = 20.0;

        egui::Window::new("toolbar")
            .title_bar(false)
            .resizable(false)
            .pivot(egui::Align2::CENTER_TOP)
            .default_pos([content_rect.center().x, content_rect.min.y + margin])
            .show(ctx, |ui| {
                self.render_toolbar(ui);
            });

        // Main canvas area
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.render_canvas(ui);
            });

        self.render_overlay(ctx);

        if let Some(remaining) = self.board.next_expiry(now) {
            ctx.request_repaint_after(remaining);
        }
    }
}

impl App {
    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Reset").clicked() {
                self.board.request_reset();
            }

            ui.separator();

            let selected = self.board.state().color;
            for swatch in SWATCHES {
                let button = egui::Button::new("")
                    .fill(swatch.color32())
                    .min_size(egui::vec2(24.0, 24.0))
                    .selected(swatch == selected);
                if ui.add(button).on_hover_text(swatch.hex()).clicked() {
                    self.board.select_color(swatch);
                }
            }

            ui.separator();

            if ui.button("Calculate").clicked() {
                self.board.submit();
            }

            if self.board.last_failure().is_some() {
                ui.label(RichText::new("Recognition failed").color(Color32::LIGHT_RED));
            }
        });
    }

    fn render_canvas(&mut self, ui: &mut egui::Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());

        // Size the surface once, after the window geometry has settled
        if !self.board.surface().is_initialized() {
            let viewport = ui.ctx().available_rect();
            let fullscreen = ui.ctx().input(|i| i.viewport().fullscreen);
            if self.layout.observe(viewport, fullscreen) {
                let top_offset = (rect.min.y - viewport.min.y).max(0.0);
                self.board.mount(
                    viewport.width().round() as u32,
                    viewport.height().round() as u32,
                    top_offset.round() as u32,
                );
            } else {
                ui.ctx().request_repaint();
            }
        }

        self.handle_pointer(ui, rect, response.hovered());
        self.upload_texture(ui.ctx());

        let painter = ui.painter_at(rect);

        // Draw background
        if self.board.surface().background() == Background::Black {
            painter.rect_filled(rect, 0.0, Color32::BLACK);
        }

        if let (Some(texture), Some((width, height))) =
            (&self.texture, self.board.surface().size())
        {
            let image_rect = Rect::from_min_size(rect.min, egui::vec2(width as f32, height as f32));
            painter.image(
                texture.id(),
                image_rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
    }

    fn handle_pointer(&mut self, ui: &egui::Ui, rect: Rect, hovered: bool) {
        let (pressed, released, moved, latest) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.is_moving(),
                i.pointer.latest_pos(),
            )
        });
        let to_local = |pos: Pos2| Pos2::new(pos.x - rect.min.x, pos.y - rect.min.y);

        if pressed
            && hovered
            && let Some(pos) = latest
        {
            self.board.pointer(PointerEvent::Down(to_local(pos)));
        }

        if self.board.is_drawing() && moved {
            let over_canvas = latest.is_some_and(|pos| {
                rect.contains(pos) && ui.ctx().layer_id_at(pos) == Some(ui.layer_id())
            });
            self.board.pointer(drag_event(latest.map(to_local), over_canvas));
        }

        if released {
            self.board.pointer(PointerEvent::Up);
        }
    }

    fn upload_texture(&mut self, ctx: &egui::Context) {
        let revision = self.board.surface().revision();
        if self.texture.is_some() && self.uploaded_revision == revision {
            return;
        }
        let Some(buffer) = self.board.surface().pixels() else {
            return;
        };

        let (width, height) = buffer.dimensions();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [width as usize, height as usize],
            buffer.as_raw(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("ink_surface", image, TextureOptions::LINEAR));
            }
        }
        self.uploaded_revision = revision;
    }

    fn render_overlay(&self, ctx: &egui::Context) {
        if let Some(result) = self.board.overlay() {
            egui::Area::new(egui::Id::new("result_overlay"))
                .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -40.0])
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.set_max_width(420.0);
                        ui.heading("Result");
                        ui.label(format!("Expression: {}", result.expression));
                        ui.label(format!("Answer: {}", result.answer));
                    });
                });
        }

        if self.board.is_loading() {
            egui::Area::new(egui::Id::new("loading_badge"))
                .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -40.0])
                .show(ctx, |ui| {
                    ui.label(
                        RichText::new("Calculating...")
                            .color(Color32::BLACK)
                            .background_color(Color32::from_rgb(250, 204, 21)),
                    );
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(width: f32, height: f32) -> Rect {
        Rect::from_min_size(Pos2::ZERO, egui::vec2(width, height))
    }

    #[test]
    fn waits_for_fullscreen_before_sizing() {
        let mut layout = LayoutSettle::default();
        assert!(!layout.observe(rect(800.0, 600.0), Some(false)));
        assert!(!layout.observe(rect(800.0, 600.0), Some(false)));
        assert!(!layout.observe(rect(800.0, 600.0), Some(false)));

        assert!(!layout.observe(rect(1920.0, 1080.0), Some(true)));
        assert!(layout.observe(rect(1920.0, 1080.0), Some(true)));
    }

    #[test]
    fn unknown_fullscreen_state_waits_for_a_stable_size() {
        let mut layout = LayoutSettle::default();
        assert!(!layout.observe(rect(800.0, 600.0), None));
        assert!(!layout.observe(rect(1920.0, 1080.0), None));
        assert!(!layout.observe(rect(1920.0, 1080.0), None));
        assert!(layout.observe(rect(1920.0, 1080.0), None));
    }

    #[test]
    fn stops_waiting_when_fullscreen_never_arrives() {
        let mut layout = LayoutSettle::default();
        let settled = (0..LayoutSettle::MAX_FRAMES)
            .map(|_| layout.observe(rect(800.0, 600.0), Some(false)))
            .collect::<Vec<_>>();
        assert_eq!(settled.iter().filter(|&&done| done).count(), 1);
        assert_eq!(settled.last(), Some(&true));
    }

    #[test]
    fn dragging_over_another_layer_ends_the_stroke() {
        let pos = Pos2::new(40.0, 12.0);
        assert_eq!(drag_event(Some(pos), true), PointerEvent::Move(pos));
        assert_eq!(drag_event(Some(pos), false), PointerEvent::Leave);
        assert_eq!(drag_event(None, true), PointerEvent::Leave);
    }
}
