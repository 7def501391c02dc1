use crate::shared::rect::Rect;

/// Decides whether two rectangles from consecutive frames are the same face.
///
/// Both rectangles must keep at least `similarity` of their own area inside
/// the overlap. This is stricter than IoU: a small box nested inside a large
/// one fails because the large box is mostly outside the overlap.
pub fn is_same_face(similarity: f64, a: &Rect, b: &Rect) -> bool {
    let Some(inter) = a.intersection(b) else {
        return false;
    };
    let inner_area = inter.area() as f64;
    a.area() as f64 * similarity <= inner_area && b.area() as f64 * similarity <= inner_area
}
