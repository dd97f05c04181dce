use std::f32::consts::PI;

use crate::number::NumberCursor;
use crate::span::Span;
use crate::types::{Extents, Transform};

/// Receives flattened path geometry. Quadratics are passed through; arcs arrive as cubics.
pub trait DrawSink {
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32);
    fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32);
    fn close_path(&mut self);
}

/// Maps every point through a transform before forwarding it.
pub(crate) struct TransformedSink<'s> {
    pub inner: &'s mut dyn DrawSink,
    pub transform: Transform,
}

impl DrawSink for TransformedSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.transform.apply(x, y);
        self.inner.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.transform.apply(x, y);
        self.inner.line_to(x, y);
    }

    fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let (cx, cy) = self.transform.apply(cx, cy);
        let (x, y) = self.transform.apply(x, y);
        self.inner.quadratic_to(cx, cy, x, y);
    }

    fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        let (c1x, c1y) = self.transform.apply(c1x, c1y);
        let (c2x, c2y) = self.transform.apply(c2x, c2y);
        let (x, y) = self.transform.apply(x, y);
        self.inner.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    fn close_path(&mut self) {
        self.inner.close_path();
    }
}

/// Control-point extents; a cheap over-approximation of the true bounds.
#[derive(Debug, Default)]
pub(crate) struct BoundsSink {
    pub extents: Extents,
}

impl DrawSink for BoundsSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.extents.add_point(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.extents.add_point(x, y);
    }

    fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.extents.add_point(cx, cy);
        self.extents.add_point(x, y);
    }

    fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.extents.add_point(c1x, c1y);
        self.extents.add_point(c2x, c2y);
        self.extents.add_point(x, y);
    }

    fn close_path(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LastSegment {
    Other,
    Cubic,
    Quadratic,
}

/// Interprets SVG path data, stopping at the first malformed segment.
pub(crate) fn emit_path_data(d: Span<'_>, sink: &mut dyn DrawSink) {
    let mut p = NumberCursor::new(d);
    let mut cmd: Option<u8> = None;
    let mut cur = (0.0f32, 0.0f32);
    let mut start = (0.0f32, 0.0f32);
    let mut last_ctrl = (0.0f32, 0.0f32);
    let mut last = LastSegment::Other;

    loop {
        p.skip_ws();
        let Some(b) = p.peek() else { break };
        if b.is_ascii_alphabetic() {
            cmd = Some(b);
            p.bump();
        }
        let Some(c) = cmd else { break };
        let rel = c.is_ascii_lowercase();
        let offset = |v: (f32, f32), cur: (f32, f32)| {
            if rel { (cur.0 + v.0, cur.1 + v.1) } else { v }
        };

        match c.to_ascii_uppercase() {
            b'M' => {
                let Some(pt) = p.next_pair() else { break };
                let pt = offset(pt, cur);
                sink.move_to(pt.0, pt.1);
                cur = pt;
                start = pt;
                // Bare pairs after a moveto are linetos.
                cmd = Some(if rel { b'l' } else { b'L' });
                last = LastSegment::Other;
            }
            b'L' => {
                let Some(pt) = p.next_pair() else { break };
                let pt = offset(pt, cur);
                sink.line_to(pt.0, pt.1);
                cur = pt;
                last = LastSegment::Other;
            }
            b'H' => {
                let Some(x) = p.next_number() else { break };
                let x = if rel { cur.0 + x } else { x };
                sink.line_to(x, cur.1);
                cur.0 = x;
                last = LastSegment::Other;
            }
            b'V' => {
                let Some(y) = p.next_number() else { break };
                let y = if rel { cur.1 + y } else { y };
                sink.line_to(cur.0, y);
                cur.1 = y;
                last = LastSegment::Other;
            }
            b'C' => {
                let (Some(c1), Some(c2), Some(pt)) = (p.next_pair(), p.next_pair(), p.next_pair())
                else {
                    break;
                };
                let (c1, c2, pt) = (offset(c1, cur), offset(c2, cur), offset(pt, cur));
                sink.cubic_to(c1.0, c1.1, c2.0, c2.1, pt.0, pt.1);
                last_ctrl = c2;
                cur = pt;
                last = LastSegment::Cubic;
            }
            b'S' => {
                let (Some(c2), Some(pt)) = (p.next_pair(), p.next_pair()) else {
                    break;
                };
                let c1 = if last == LastSegment::Cubic {
                    (2.0 * cur.0 - last_ctrl.0, 2.0 * cur.1 - last_ctrl.1)
                } else {
                    cur
                };
                let (c2, pt) = (offset(c2, cur), offset(pt, cur));
                sink.cubic_to(c1.0, c1.1, c2.0, c2.1, pt.0, pt.1);
                last_ctrl = c2;
                cur = pt;
                last = LastSegment::Cubic;
            }
            b'Q' => {
                let (Some(c1), Some(pt)) = (p.next_pair(), p.next_pair()) else {
                    break;
                };
                let (c1, pt) = (offset(c1, cur), offset(pt, cur));
                sink.quadratic_to(c1.0, c1.1, pt.0, pt.1);
                last_ctrl = c1;
                cur = pt;
                last = LastSegment::Quadratic;
            }
            b'T' => {
                let Some(pt) = p.next_pair() else { break };
                let c1 = if last == LastSegment::Quadratic {
                    (2.0 * cur.0 - last_ctrl.0, 2.0 * cur.1 - last_ctrl.1)
                } else {
                    cur
                };
                let pt = offset(pt, cur);
                sink.quadratic_to(c1.0, c1.1, pt.0, pt.1);
                last_ctrl = c1;
                cur = pt;
                last = LastSegment::Quadratic;
            }
            b'A' => {
                let (Some(rx), Some(ry), Some(rot)) =
                    (p.next_number(), p.next_number(), p.next_number())
                else {
                    break;
                };
                let (Some(large_arc), Some(sweep)) = (p.next_flag(), p.next_flag()) else {
                    break;
                };
                let Some(pt) = p.next_pair() else { break };
                let pt = offset(pt, cur);
                arc_to(sink, cur, rx, ry, rot, large_arc, sweep, pt);
                cur = pt;
                last = LastSegment::Other;
            }
            b'Z' => {
                sink.close_path();
                cur = start;
                last = LastSegment::Other;
                // Z takes no arguments; a following number has no command to repeat.
                cmd = None;
            }
            _ => {
                // Unknown command letter: skip it along with its arguments.
                cmd = None;
                while p.next_number().is_some() {}
            }
        }
    }
}

/// Center parameterization of an SVG elliptical arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ArcCenter {
    pub cx: f32,
    pub cy: f32,
    pub rx: f32,
    pub ry: f32,
    pub theta1: f32,
    pub dtheta: f32,
}

/// Converts endpoint parameterization to center parameterization (SVG implementation notes
/// F.6.5), scaling radii up when they cannot span the chord. `None` for a zero radius.
pub(crate) fn arc_endpoint_to_center(
    from: (f32, f32),
    to: (f32, f32),
    rx: f32,
    ry: f32,
    x_axis_rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
) -> Option<ArcCenter> {
    let mut rx = rx.abs();
    let mut ry = ry.abs();
    if rx < 1e-10 || ry < 1e-10 {
        return None;
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sinf(phi);
    let cos_phi = libm::cosf(phi);

    let dx2 = (from.0 - to.0) / 2.0;
    let dy2 = (from.1 - to.1) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = libm::sqrtf(lambda);
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let mut coef = 0.0;
    if den > 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        coef = sign * libm::sqrtf((num / den).max(0.0));
    }
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (from.0 + to.0) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (from.1 + to.1) / 2.0;

    fn angle(ux: f32, uy: f32, vx: f32, vy: f32) -> f32 {
        let dot = ux * vx + uy * vy;
        let det = ux * vy - uy * vx;
        libm::atan2f(det, dot)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let theta1 = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    Some(ArcCenter {
        cx,
        cy,
        rx,
        ry,
        theta1,
        dtheta,
    })
}

#[allow(clippy::too_many_arguments)]
fn arc_to(
    sink: &mut dyn DrawSink,
    from: (f32, f32),
    rx: f32,
    ry: f32,
    x_axis_rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
    to: (f32, f32),
) {
    if (to.0 - from.0).abs() < 1e-6 && (to.1 - from.1).abs() < 1e-6 {
        return;
    }
    let Some(arc) = arc_endpoint_to_center(from, to, rx, ry, x_axis_rotation_deg, large_arc, sweep)
    else {
        sink.line_to(to.0, to.1);
        return;
    };

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sinf(phi);
    let cos_phi = libm::cosf(phi);

    // Split into <= 90deg segments.
    let count = libm::ceilf(arc.dtheta.abs() / (PI / 2.0)).max(1.0) as usize;
    let delta = arc.dtheta / count as f32;
    let map = |x: f32, y: f32| {
        let x = arc.rx * x;
        let y = arc.ry * y;
        (
            arc.cx + cos_phi * x - sin_phi * y,
            arc.cy + sin_phi * x + cos_phi * y,
        )
    };

    let mut t1 = arc.theta1;
    for i in 0..count {
        let t2 = t1 + delta;
        let k = (4.0 / 3.0) * libm::tanf(delta / 4.0);
        let (s1, c1) = (libm::sinf(t1), libm::cosf(t1));
        let (s2, c2) = (libm::sinf(t2), libm::cosf(t2));
        let p1 = map(c1 - k * s1, s1 + k * c1);
        let p2 = map(c2 + k * s2, s2 - k * c2);
        // Land exactly on the requested endpoint.
        let end = if i + 1 == count { to } else { map(c2, s2) };
        sink.cubic_to(p1.0, p1.1, p2.0, p2.1, end.0, end.1);
        t1 = t2;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Seg {
        Move(f32, f32),
        Line(f32, f32),
        Quad(f32, f32, f32, f32),
        Cubic(f32, f32, f32, f32, f32, f32),
        Close,
    }

    #[derive(Default)]
    pub(crate) struct Recorder {
        pub segs: Vec<Seg>,
    }

    impl DrawSink for Recorder {
        fn move_to(&mut self, x: f32, y: f32) {
            self.segs.push(Seg::Move(x, y));
        }
        fn line_to(&mut self, x: f32, y: f32) {
            self.segs.push(Seg::Line(x, y));
        }
        fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
            self.segs.push(Seg::Quad(cx, cy, x, y));
        }
        fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
            self.segs.push(Seg::Cubic(c1x, c1y, c2x, c2y, x, y));
        }
        fn close_path(&mut self) {
            self.segs.push(Seg::Close);
        }
    }

    fn record(d: &str) -> Vec<Seg> {
        let mut rec = Recorder::default();
        emit_path_data(Span::from(d), &mut rec);
        rec.segs
    }

    #[test]
    fn parses_simple_path() {
        assert_eq!(
            record("M 0 0 L 10 0 L 10 10 Z"),
            vec![
                Seg::Move(0.0, 0.0),
                Seg::Line(10.0, 0.0),
                Seg::Line(10.0, 10.0),
                Seg::Close
            ]
        );
    }

    #[test]
    fn implicit_pairs_after_moveto_are_relative_lines() {
        assert_eq!(
            record("m1 1 2 0 0 2h-2v-1z"),
            vec![
                Seg::Move(1.0, 1.0),
                Seg::Line(3.0, 1.0),
                Seg::Line(3.0, 3.0),
                Seg::Line(1.0, 3.0),
                Seg::Line(1.0, 2.0),
                Seg::Close
            ]
        );
    }

    #[test]
    fn smooth_cubic_reflects_only_after_cubic() {
        let segs = record("M0 0 C 0 10 10 10 10 0 S 20 -10 20 0");
        assert_eq!(segs[2], Seg::Cubic(10.0, -10.0, 20.0, -10.0, 20.0, 0.0));
        let segs = record("M0 0 L 10 0 S 20 10 30 0");
        assert_eq!(segs[2], Seg::Cubic(10.0, 0.0, 20.0, 10.0, 30.0, 0.0));
    }

    #[test]
    fn quadratics_pass_through_and_t_reflects() {
        let segs = record("M0 0 Q 5 10 10 0 T 20 0");
        assert_eq!(segs[1], Seg::Quad(5.0, 10.0, 10.0, 0.0));
        assert_eq!(segs[2], Seg::Quad(15.0, -10.0, 20.0, 0.0));
        let segs = record("M0 0 T 20 0");
        assert_eq!(segs[1], Seg::Quad(0.0, 0.0, 20.0, 0.0));
    }

    #[test]
    fn parses_compact_arc_flags_without_separator() {
        let segs = record("M10 10 A5 5 0 01 20 10");
        assert!(segs.len() > 1);
        assert!(segs[1..].iter().all(|s| matches!(s, Seg::Cubic(..))));
        match segs.last() {
            Some(Seg::Cubic(.., x, y)) => {
                assert_eq!((*x, *y), (20.0, 10.0));
            }
            other => panic!("expected cubic, got {other:?}"),
        }
    }

    #[test]
    fn arc_with_coincident_endpoints_is_a_no_op() {
        assert_eq!(record("M5 5 A3 3 0 0 1 5 5"), vec![Seg::Move(5.0, 5.0)]);
    }

    #[test]
    fn zero_radius_arc_degrades_to_line() {
        assert_eq!(
            record("M0 0 A0 4 0 0 1 8 0"),
            vec![Seg::Move(0.0, 0.0), Seg::Line(8.0, 0.0)]
        );
    }

    #[test]
    fn arc_center_is_equidistant_from_endpoints() {
        let r = 10.0;
        for (large, sweep) in [(false, false), (false, true), (true, false), (true, true)] {
            let arc = arc_endpoint_to_center((0.0, 0.0), (12.0, 4.0), r, r, 0.0, large, sweep)
                .expect("expected arc center");
            let d0 = ((arc.cx - 0.0).powi(2) + (arc.cy - 0.0).powi(2)).sqrt();
            let d1 = ((arc.cx - 12.0).powi(2) + (arc.cy - 4.0).powi(2)).sqrt();
            assert!((d0 - r).abs() < 1e-3, "d0={d0}");
            assert!((d1 - r).abs() < 1e-3, "d1={d1}");
        }
    }

    #[test]
    fn undersized_radii_are_scaled_to_the_chord() {
        let arc = arc_endpoint_to_center((0.0, 0.0), (10.0, 0.0), 1.0, 1.0, 0.0, false, true)
            .expect("expected arc center");
        assert!((arc.rx - 5.0).abs() < 1e-4);
        assert!((arc.cx - 5.0).abs() < 1e-4 && arc.cy.abs() < 1e-4);
        assert!((arc.dtheta.abs() - PI).abs() < 1e-4);
    }

    #[test]
    fn full_half_circle_splits_into_quarter_segments() {
        let segs = record("M0 0 A5 5 0 0 1 10 0");
        let cubics = segs.iter().filter(|s| matches!(s, Seg::Cubic(..))).count();
        assert_eq!(cubics, 2);
        // Quarter-circle control distance is 4/3*tan(pi/8)*r.
        if let Seg::Cubic(c1x, c1y, ..) = segs[1] {
            let k = 4.0 / 3.0 * (PI / 8.0).tan() * 5.0;
            assert!((c1x - 0.0).abs() < 1e-3);
            assert!((c1y.abs() - k).abs() < 1e-3);
        } else {
            panic!("expected cubic");
        }
    }

    #[test]
    fn stops_at_malformed_segment() {
        assert_eq!(
            record("M0 0 L 5 5 L 7 x 9 9"),
            vec![Seg::Move(0.0, 0.0), Seg::Line(5.0, 5.0)]
        );
    }

    #[test]
    fn bounds_and_transform_sinks() {
        let mut bounds = BoundsSink::default();
        {
            let mut sink = TransformedSink {
                inner: &mut bounds,
                transform: Transform::scale(2.0, 3.0),
            };
            emit_path_data(Span::from("M1 1 L 4 1 L 4 2 Z"), &mut sink);
        }
        assert_eq!(bounds.extents.xmin, 2.0);
        assert_eq!(bounds.extents.xmax, 8.0);
        assert_eq!(bounds.extents.ymin, 3.0);
        assert_eq!(bounds.extents.ymax, 6.0);
    }
}
