use egui::{Color32, Pos2};

/// Something strokes can be drawn into.
pub trait StrokeSink {
    fn contains(&self, point: Pos2) -> bool;
    fn begin_stroke(&mut self, point: Pos2);
    fn extend_stroke(&mut self, point: Pos2, color: Color32);
    fn end_stroke(&mut self);
}

// 指针事件（坐标相对于画布左上角）
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down(Pos2),
    Move(Pos2),
    Up,
    Leave,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    StrokeStarted,
    StrokeExtended,
    StrokeEnded,
}

// 单个正在绘制的笔画状态
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StrokeState {
    pub drawing: bool,
    pub last_point: Pos2,
}

/// Idle/Drawing state machine between raw pointer events and a [`StrokeSink`].
#[derive(Debug, Default)]
pub struct InputController {
    stroke: StrokeState,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.drawing
    }

    pub fn stroke(&self) -> StrokeState {
        self.stroke
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        color: Color32,
        sink: &mut impl StrokeSink,
    ) -> Transition {
        match event {
            PointerEvent::Down(point) => {
                if !sink.contains(point) {
                    return Transition::Ignored;
                }
                self.stroke = StrokeState {
                    drawing: true,
                    last_point: point,
                };
                sink.begin_stroke(point);
                log::debug!("stroke started at ({:.1}, {:.1})", point.x, point.y);
                Transition::StrokeStarted
            }
            PointerEvent::Move(point) => {
                if !self.stroke.drawing {
                    return Transition::Ignored;
                }
                sink.extend_stroke(point, color);
                self.stroke.last_point = point;
                Transition::StrokeExtended
            }
            PointerEvent::Up | PointerEvent::Leave => {
                if !self.stroke.drawing {
                    return Transition::Ignored;
                }
                self.stroke.drawing = false;
                sink.end_stroke();
                Transition::StrokeEnded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        colors: Vec<Color32>,
    }

    impl StrokeSink for Recorder {
        fn contains(&self, point: Pos2) -> bool {
            point.x >= 0.0 && point.y >= 0.0 && point.x < 100.0 && point.y < 100.0
        }

        fn begin_stroke(&mut self, _point: Pos2) {
            self.calls.push("begin");
        }

        fn extend_stroke(&mut self, _point: Pos2, color: Color32) {
            self.calls.push("extend");
            self.colors.push(color);
        }

        fn end_stroke(&mut self) {
            self.calls.push("end");
        }
    }

    #[test]
    fn moves_while_idle_are_ignored() {
        let mut controller = InputController::new();
        let mut sink = Recorder::default();

        let transition =
            controller.handle(PointerEvent::Move(Pos2::new(5.0, 5.0)), Color32::WHITE, &mut sink);

        assert_eq!(transition, Transition::Ignored);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn down_move_up_cycle() {
        let mut controller = InputController::new();
        let mut sink = Recorder::default();

        controller.handle(PointerEvent::Down(Pos2::new(1.0, 1.0)), Color32::WHITE, &mut sink);
        assert!(controller.is_drawing());
        controller.handle(PointerEvent::Move(Pos2::new(2.0, 2.0)), Color32::RED, &mut sink);
        assert_eq!(controller.stroke().last_point, Pos2::new(2.0, 2.0));
        controller.handle(PointerEvent::Up, Color32::RED, &mut sink);
        controller.handle(PointerEvent::Move(Pos2::new(3.0, 3.0)), Color32::RED, &mut sink);

        assert!(!controller.is_drawing());
        assert_eq!(sink.calls, vec!["begin", "extend", "end"]);
        assert_eq!(sink.colors, vec![Color32::RED]);
    }

    #[test]
    fn leave_ends_the_stroke_like_up() {
        let mut controller = InputController::new();
        let mut sink = Recorder::default();

        controller.handle(PointerEvent::Down(Pos2::new(1.0, 1.0)), Color32::WHITE, &mut sink);
        let transition = controller.handle(PointerEvent::Leave, Color32::WHITE, &mut sink);

        assert_eq!(transition, Transition::StrokeEnded);
        assert!(!controller.is_drawing());
    }

    #[test]
    fn down_outside_surface_does_not_start() {
        let mut controller = InputController::new();
        let mut sink = Recorder::default();

        let transition = controller.handle(
            PointerEvent::Down(Pos2::new(150.0, 5.0)),
            Color32::WHITE,
            &mut sink,
        );

        assert_eq!(transition, Transition::Ignored);
        assert!(!controller.is_drawing());
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn up_while_idle_is_ignored() {
        let mut controller = InputController::new();
        let mut sink = Recorder::default();

        assert_eq!(
            controller.handle(PointerEvent::Up, Color32::WHITE, &mut sink),
            Transition::Ignored
        );
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn extend_is_never_called_while_idle() {
        let events = [
            PointerEvent::Move(Pos2::new(1.0, 1.0)),
            PointerEvent::Down(Pos2::new(2.0, 2.0)),
            PointerEvent::Move(Pos2::new(3.0, 3.0)),
            PointerEvent::Up,
            PointerEvent::Move(Pos2::new(4.0, 4.0)),
            PointerEvent::Leave,
            PointerEvent::Move(Pos2::new(5.0, 5.0)),
            PointerEvent::Down(Pos2::new(6.0, 6.0)),
            PointerEvent::Leave,
            PointerEvent::Move(Pos2::new(7.0, 7.0)),
        ];
        let mut controller = InputController::new();
        let mut sink = Recorder::default();

        for event in events {
            let was_drawing = controller.is_drawing();
            let extends_before = sink.colors.len();
            controller.handle(event, Color32::WHITE, &mut sink);
            if !was_drawing {
                assert_eq!(sink.colors.len(), extends_before, "extend while idle on {event:?}");
            }
        }
        assert_eq!(sink.colors.len(), 1);
    }
}
