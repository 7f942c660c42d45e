use egui::{Pos2, Rect};

pub struct AppUtils;

impl AppUtils {
    // 将线段裁剪到 bounds 内（Liang-Barsky），完全在外或含非有限坐标时返回 None
    pub fn clip_segment(from: Pos2, to: Pos2, bounds: Rect) -> Option<(Pos2, Pos2)> {
        if !(from.is_finite() && to.is_finite()) {
            return None;
        }

        let delta = to - from;
        let (mut enter, mut exit) = (0.0_f32, 1.0_f32);
        let edges = [
            (-delta.x, from.x - bounds.min.x),
            (delta.x, bounds.max.x - from.x),
            (-delta.y, from.y - bounds.min.y),
            (delta.y, bounds.max.y - from.y),
        ];
        for (p, q) in edges {
            if p.abs() < f32::EPSILON {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                enter = enter.max(t);
            } else {
                exit = exit.min(t);
            }
            if enter > exit {
                return None;
            }
        }

        Some((from + delta * enter, from + delta * exit))
    }

    // 沿线段等距采样，保证相邻采样点间距不超过 max_step；非有限长度不产生采样点
    pub fn segment_samples(from: Pos2, to: Pos2, max_step: f32) -> impl Iterator<Item = Pos2> {
        let distance = from.distance(to);
        let finite = distance.is_finite();
        let steps = if finite && distance >= f32::EPSILON && max_step > 0.0 {
            (distance / max_step).ceil().max(1.0) as usize
        } else {
            0
        };
        let count = if finite { steps + 1 } else { 0 };

        (0..count).map(move |i| {
            if steps == 0 {
                to
            } else {
                from.lerp(to, i as f32 / steps as f32)
            }
        })
    }

    // 圆形笔刷覆盖的像素（以像素中心判定），已裁剪到画布范围内
    pub fn disc_pixels(center: Pos2, radius: f32, width: u32, height: u32) -> Vec<(u32, u32)> {
        let min_x = (center.x - radius).floor().max(0.0) as i64;
        let min_y = (center.y - radius).floor().max(0.0) as i64;
        let max_x = ((center.x + radius).ceil() as i64).min(i64::from(width) - 1);
        let max_y = ((center.y + radius).ceil() as i64).min(i64::from(height) - 1);

        let radius_sq = radius * radius;
        let mut pixels = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= radius_sq {
                    // min_* are clamped to zero and max_* to the canvas, so both fit in u32.
                    pixels.push((x as u32, y as u32));
                }
            }
        }
        pixels
    }

    // 透明像素按黑色背景合成（JPEG 不支持透明通道）
    pub fn flatten_on_black(rgba: [u8; 4]) -> [u8; 3] {
        let [r, g, b, a] = rgba;
        let scale = |channel: u8| ((u16::from(channel) * u16::from(a) + 127) / 255) as u8;
        [scale(r), scale(g), scale(b)]
    }
}
