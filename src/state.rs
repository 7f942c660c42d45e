use egui::Color32;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How long a recognized result stays on screen after the latest success.
pub const RESULT_WINDOW: Duration = Duration::from_millis(5000);

// 调色板颜色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteColor([u8; 3]);

impl PaletteColor {
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    pub fn color32(self) -> Color32 {
        let [r, g, b] = self.0;
        Color32::from_rgb(r, g, b)
    }

    pub fn hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl Default for PaletteColor {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Swatches offered in the toolbar, in display order.
pub const SWATCHES: [PaletteColor; 12] = [
    PaletteColor::rgb(0x00, 0x00, 0x00),
    PaletteColor::rgb(0xff, 0xff, 0xff),
    PaletteColor::rgb(0xee, 0x33, 0x33),
    PaletteColor::rgb(0xe6, 0x49, 0x80),
    PaletteColor::rgb(0xbe, 0x4b, 0xdb),
    PaletteColor::rgb(0x89, 0x32, 0x00),
    PaletteColor::rgb(0x22, 0x8b, 0xe6),
    PaletteColor::rgb(0x33, 0x33, 0xee),
    PaletteColor::rgb(0x40, 0xc0, 0x57),
    PaletteColor::rgb(0x00, 0xaa, 0x00),
    PaletteColor::rgb(0xfa, 0xb0, 0x05),
    PaletteColor::rgb(0xfd, 0x7e, 0x14),
];

// 识别结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionResult {
    pub expression: String,
    pub answer: String,
}

/// Visibility of the result overlay with at most one pending expiry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultVisibility {
    visible: bool,
    expires_at: Option<Instant>,
}

impl ResultVisibility {
    /// Shows the overlay until `now + duration`, replacing any pending expiry.
    pub fn show(&mut self, now: Instant, duration: Duration) {
        self.visible = true;
        self.expires_at = Some(now + duration);
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.expires_at = None;
    }

    /// Applies the pending expiry if its deadline has been reached.
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.expires_at
            && now >= deadline
        {
            log::debug!("result window expired");
            self.hide();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_armed(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Time left before the overlay hides itself, if an expiry is pending.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

/// Edge-triggered "clear the surface" request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResetRequest(bool);

impl ResetRequest {
    pub fn request(&mut self) {
        self.0 = true;
    }

    /// Consumes the request. Returns `true` at most once per raised flag.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }

    pub fn is_pending(&self) -> bool {
        self.0
    }
}

// 应用程序状态
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub color: PaletteColor,                                  // 当前画笔颜色
    pub reset: ResetRequest,                                  // 清空画布请求
    pub result: Option<RecognitionResult>,                    // 最近一次识别结果
    pub visibility: ResultVisibility,                         // 结果浮层可见性
    pub dict_of_vars: serde_json::Map<String, serde_json::Value>, // 透传给识别服务的变量表
}

impl AppState {
    pub fn with_color(color: PaletteColor) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_expires_after_window() {
        let start = Instant::now();
        let mut visibility = ResultVisibility::default();
        visibility.show(start, RESULT_WINDOW);

        visibility.tick(start + Duration::from_millis(4999));
        assert!(visibility.is_visible());

        visibility.tick(start + RESULT_WINDOW);
        assert!(!visibility.is_visible());
        assert!(!visibility.is_armed());
    }

    #[test]
    fn rearming_replaces_the_pending_expiry() {
        let start = Instant::now();
        let mut visibility = ResultVisibility::default();
        visibility.show(start, RESULT_WINDOW);
        visibility.show(start + Duration::from_millis(3000), RESULT_WINDOW);

        visibility.tick(start + Duration::from_millis(5000));
        assert!(visibility.is_visible());
        assert_eq!(
            visibility.remaining(start + Duration::from_millis(5000)),
            Some(Duration::from_millis(3000))
        );

        visibility.tick(start + Duration::from_millis(8000));
        assert!(!visibility.is_visible());
    }

    #[test]
    fn hide_cancels_the_pending_expiry() {
        let start = Instant::now();
        let mut visibility = ResultVisibility::default();
        visibility.show(start, RESULT_WINDOW);
        visibility.hide();

        assert!(!visibility.is_visible());
        assert_eq!(visibility.remaining(start), None);
    }

    #[test]
    fn reset_request_is_consumed_once() {
        let mut reset = ResetRequest::default();
        reset.request();
        reset.request();

        assert!(reset.take());
        assert!(!reset.take());
        assert!(!reset.is_pending());
    }

    #[test]
    fn swatches_include_the_default_color() {
        assert!(SWATCHES.contains(&PaletteColor::default()));
        assert_eq!(PaletteColor::rgb(0xee, 0x33, 0x33).hex(), "#ee3333");
    }
}
