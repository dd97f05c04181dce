use crate::number::NumberCursor;
use crate::span::Span;
use crate::types::Transform;

/// Parses an SVG `transform` list. Functions compose left to right (`new = old · applied`);
/// unknown functions are skipped without touching the running transform.
pub(crate) fn parse_transform(input: Span<'_>) -> Transform {
    let mut out = Transform::identity();
    let mut cursor = NumberCursor::new(input);

    loop {
        cursor.skip_ws();
        if !cursor.has_more() {
            break;
        }
        let rest = cursor.rest().as_bytes();
        let Some(open) = rest.iter().position(|&b| b == b'(') else {
            break;
        };
        let name = Span::new(&rest[..open]).trim();
        for _ in 0..=open {
            cursor.bump();
        }

        let applied = match name.as_bytes() {
            n if n.eq_ignore_ascii_case(b"matrix") => Some(Transform::new(
                arg(&mut cursor),
                arg(&mut cursor),
                arg(&mut cursor),
                arg(&mut cursor),
                arg(&mut cursor),
                arg(&mut cursor),
            )),
            n if n.eq_ignore_ascii_case(b"translate") => {
                let tx = arg(&mut cursor);
                let ty = arg(&mut cursor);
                Some(Transform::translate(tx, ty))
            }
            n if n.eq_ignore_ascii_case(b"scale") => {
                let sx = arg(&mut cursor);
                let sy = if cursor.has_argument() {
                    cursor.next_float()
                } else {
                    sx
                };
                Some(Transform::scale(sx, sy))
            }
            n if n.eq_ignore_ascii_case(b"rotate") => {
                let angle = arg(&mut cursor);
                if cursor.has_argument() {
                    let cx = arg(&mut cursor);
                    let cy = arg(&mut cursor);
                    Some(rotate_about(angle, cx, cy))
                } else {
                    Some(Transform::rotate(angle))
                }
            }
            n if n.eq_ignore_ascii_case(b"skewX") => Some(Transform::skew_x(arg(&mut cursor))),
            n if n.eq_ignore_ascii_case(b"skewY") => Some(Transform::skew_y(arg(&mut cursor))),
            _ => None,
        };

        skip_past_close_paren(&mut cursor);
        if let Some(t) = applied {
            out = out.mul(t);
        }
    }

    out
}

/// Next argument, or `0` once the argument list is exhausted.
fn arg(cursor: &mut NumberCursor<'_>) -> f32 {
    if cursor.has_argument() {
        cursor.next_float()
    } else {
        0.0
    }
}

fn rotate_about(deg: f32, cx: f32, cy: f32) -> Transform {
    let r = Transform::rotate(deg);
    Transform {
        dx: cx - r.xx * cx - r.xy * cy,
        dy: cy - r.yx * cx - r.yy * cy,
        ..r
    }
}

/// Consumes through the `)` closing the current argument list, honouring nested parens and
/// quoted text.
fn skip_past_close_paren(cursor: &mut NumberCursor<'_>) {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    while let Some(b) = cursor.peek() {
        cursor.bump();
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
}
