use crate::paint::{ClipOutline, ColorLine, ColorStop, CompositeMode, Extend, PaintSink};
use crate::path::DrawSink;
use crate::types::{Color, Transform};

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    QuadTo(f32, f32, f32, f32),
    CubicTo(f32, f32, f32, f32, f32, f32),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PushTransform(Transform),
    PopTransform,
    PushClipGlyph(u32),
    PushClipRectangle {
        xmin: f32,
        ymin: f32,
        xmax: f32,
        ymax: f32,
    },
    // Outline as replayed by the renderer, in the user space current at the push.
    PushClipPath(Vec<PathSegment>),
    PopClip,
    SolidColor(Color),
    LinearGradient {
        extend: Extend,
        stops: Vec<ColorStop>,
        p0: (f32, f32),
        p1: (f32, f32),
        p2: (f32, f32),
    },
    RadialGradient {
        extend: Extend,
        stops: Vec<ColorStop>,
        c0: (f32, f32, f32),
        c1: (f32, f32, f32),
    },
    PushGroup,
    PopGroup {
        mode: CompositeMode,
        opacity: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Transform,
    Clip,
    Group,
}

/// Records paint operations as a command list. Gradients are recorded with their stops
/// materialized.
#[derive(Debug, Default)]
pub struct Canvas {
    commands: Vec<Command>,
    open: Vec<Frame>,
    mismatched_pops: usize,
}

#[derive(Default)]
struct PathRecorder {
    segments: Vec<PathSegment>,
}

impl DrawSink for PathRecorder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.segments.push(PathSegment::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.segments.push(PathSegment::LineTo(x, y));
    }

    fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.segments.push(PathSegment::QuadTo(cx, cy, x, y));
    }

    fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.segments
            .push(PathSegment::CubicTo(c1x, c1y, c2x, c2y, x, y));
    }

    fn close_path(&mut self) {
        self.segments.push(PathSegment::Close);
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn current_command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every push so far has been popped, in order, by a pop of the same kind.
    pub fn is_balanced(&self) -> bool {
        self.open.is_empty() && self.mismatched_pops == 0
    }

    pub fn finish(self) -> Vec<Command> {
        self.commands
    }

    fn push(&mut self, frame: Frame, command: Command) {
        self.open.push(frame);
        self.commands.push(command);
    }

    fn pop(&mut self, frame: Frame, command: Command) {
        if self.open.pop() != Some(frame) {
            self.mismatched_pops += 1;
        }
        self.commands.push(command);
    }
}

impl PaintSink for Canvas {
    fn push_transform(&mut self, transform: Transform) {
        self.push(Frame::Transform, Command::PushTransform(transform));
    }

    fn pop_transform(&mut self) {
        self.pop(Frame::Transform, Command::PopTransform);
    }

    fn push_clip_glyph(&mut self, glyph: u32) {
        self.push(Frame::Clip, Command::PushClipGlyph(glyph));
    }

    fn push_clip_rectangle(&mut self, xmin: f32, ymin: f32, xmax: f32, ymax: f32) {
        self.push(
            Frame::Clip,
            Command::PushClipRectangle {
                xmin,
                ymin,
                xmax,
                ymax,
            },
        );
    }

    fn push_clip_path(&mut self, outline: &dyn ClipOutline) {
        let mut recorder = PathRecorder::default();
        outline.emit(&mut recorder);
        self.push(Frame::Clip, Command::PushClipPath(recorder.segments));
    }

    fn pop_clip(&mut self) {
        self.pop(Frame::Clip, Command::PopClip);
    }

    fn solid_color(&mut self, color: Color) {
        self.commands.push(Command::SolidColor(color));
    }

    fn linear_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    ) {
        self.commands.push(Command::LinearGradient {
            extend: line.extend(),
            stops: line.collect_stops(),
            p0: (x0, y0),
            p1: (x1, y1),
            p2: (x2, y2),
        });
    }

    fn radial_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    ) {
        self.commands.push(Command::RadialGradient {
            extend: line.extend(),
            stops: line.collect_stops(),
            c0: (x0, y0, r0),
            c1: (x1, y1, r1),
        });
    }

    fn push_group(&mut self) {
        self.push(Frame::Group, Command::PushGroup);
    }

    fn pop_group(&mut self, mode: CompositeMode, opacity: f32) {
        self.pop(Frame::Group, Command::PopGroup { mode, opacity });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Square;

    impl ClipOutline for Square {
        fn emit(&self, sink: &mut dyn DrawSink) {
            sink.move_to(0.0, 0.0);
            sink.line_to(1.0, 0.0);
            sink.line_to(1.0, 1.0);
            sink.close_path();
        }
    }

    #[test]
    fn records_clip_outlines_and_tracks_balance() {
        let mut canvas = Canvas::new();
        canvas.push_transform(Transform::scale(2.0, 2.0));
        canvas.push_clip_path(&Square);
        assert!(!canvas.is_balanced());
        canvas.solid_color(Color::BLACK);
        canvas.pop_clip();
        canvas.pop_transform();
        assert!(canvas.is_balanced());
        assert_eq!(canvas.current_command_count(), 5);
        match &canvas.commands()[1] {
            Command::PushClipPath(segments) => {
                assert_eq!(segments.len(), 4);
                assert_eq!(segments[3], PathSegment::Close);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn pops_of_the_wrong_kind_are_unbalanced() {
        let mut canvas = Canvas::new();
        canvas.push_group();
        canvas.pop_clip();
        assert!(!canvas.is_balanced());
        assert_eq!(canvas.finish().len(), 2);
    }
}
