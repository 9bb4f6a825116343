use super::Point;

/// Interior angle at `vertex` between the rays to `p1` and `p3`, in degrees.
///
/// Uses the arctangent difference of both rays and folds anything above 180°
/// back to `360 - angle`, so the result is always the smaller included angle
/// in `[0, 180]`.
///
/// The result is meaningless when `p1` or `p3` coincides with `vertex`; NaN
/// coordinates propagate to a NaN angle.
pub fn joint_angle(p1: Point, vertex: Point, p3: Point) -> f64 {
    let to_first = (p1.y - vertex.y).atan2(p1.x - vertex.x);
    let to_third = (p3.y - vertex.y).atan2(p3.x - vertex.x);

    let mut degrees = (to_third - to_first).to_degrees().abs();
    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }
    degrees
}
