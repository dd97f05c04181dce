use crate::path::DrawSink;
use crate::types::{Color, Transform};

/// How a gradient continues past its first and last stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extend {
    #[default]
    Pad,
    Repeat,
    Reflect,
}

/// Blend used when a group is composited back onto its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMode {
    Clear,
    Src,
    Dest,
    #[default]
    SrcOver,
    DestOver,
    SrcIn,
    DestIn,
    SrcOut,
    DestOut,
    Multiply,
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Lazy stop provider handed to gradient paints. Stops are produced on demand so a backend
/// that only needs a window of them never materializes the rest.
pub trait ColorLine {
    fn extend(&self) -> Extend;

    fn stop_count(&self) -> usize;

    /// Fills `out` with stops starting at `start`; returns how many were written.
    fn color_stops(&self, start: usize, out: &mut [ColorStop]) -> usize;

    fn collect_stops(&self) -> Vec<ColorStop> {
        let mut stops = vec![
            ColorStop {
                offset: 0.0,
                color: Color::TRANSPARENT,
            };
            self.stop_count()
        ];
        let written = self.color_stops(0, &mut stops);
        stops.truncate(written);
        stops
    }
}

/// Outline for [`PaintSink::push_clip_path`], replayed in the sink's current user space.
pub trait ClipOutline {
    fn emit(&self, sink: &mut dyn DrawSink);
}

/// Backend receiving the paint operations of one glyph. Every push is matched by exactly one
/// pop of the same kind, in reverse order.
pub trait PaintSink {
    fn push_transform(&mut self, transform: Transform);
    fn pop_transform(&mut self);

    fn push_clip_glyph(&mut self, glyph: u32);
    fn push_clip_rectangle(&mut self, xmin: f32, ymin: f32, xmax: f32, ymax: f32);
    fn push_clip_path(&mut self, outline: &dyn ClipOutline);
    fn pop_clip(&mut self);

    fn solid_color(&mut self, color: Color);

    /// Gradient along `p0 → p1`; `p2` fixes the direction of the color lines through `p0`.
    #[allow(clippy::too_many_arguments)]
    fn linear_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    );

    /// Two-circle gradient from `(x0, y0, r0)` to `(x1, y1, r1)`.
    #[allow(clippy::too_many_arguments)]
    fn radial_gradient(
        &mut self,
        line: &dyn ColorLine,
        x0: f32,
        y0: f32,
        r0: f32,
        x1: f32,
        y1: f32,
        r1: f32,
    );

    fn push_group(&mut self);
    fn pop_group(&mut self, mode: CompositeMode, opacity: f32);
}

/// Plain stop list, mostly for backends and tests that build paints by hand.
#[derive(Debug, Clone, Default)]
pub struct StopList {
    pub extend: Extend,
    pub stops: Vec<ColorStop>,
}

impl ColorLine for StopList {
    fn extend(&self) -> Extend {
        self.extend
    }

    fn stop_count(&self) -> usize {
        self.stops.len()
    }

    fn color_stops(&self, start: usize, out: &mut [ColorStop]) -> usize {
        let available = self.stops.get(start..).unwrap_or(&[]);
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_windows_are_clamped_to_the_list() {
        let line = StopList {
            extend: Extend::Reflect,
            stops: vec![
                ColorStop {
                    offset: 0.0,
                    color: Color::BLACK,
                },
                ColorStop {
                    offset: 1.0,
                    color: Color::rgb(1.0, 0.0, 0.0),
                },
            ],
        };
        let mut out = [ColorStop {
            offset: -1.0,
            color: Color::TRANSPARENT,
        }; 4];
        assert_eq!(line.color_stops(1, &mut out), 1);
        assert_eq!(out[0].offset, 1.0);
        assert_eq!(line.color_stops(5, &mut out), 0);
        assert_eq!(line.collect_stops().len(), 2);
        assert_eq!(line.extend(), Extend::Reflect);
    }
}
