//! Computational geometry used for all spatial reasoning on the pitch.
//!
//! Angles are in degrees, measured anti-clockwise from the +x axis. Every
//! function returning an angle yields a value in `[0, 360)` unless its
//! documentation says it is signed. Nothing here fails: degenerate input
//! (zero-length segments, coincident points, points inside a circle) yields
//! a sentinel such as `None` or [`CircleCrossing::Miss`].

use nalgebra::{Point2, Vector2};

/// A point on the pitch, in centimetres.
pub type Point = Point2<f64>;

/// Tolerance used when comparing quadratic roots and near-zero denominators.
pub const EPSILON: f64 = 1e-9;

/// Wraps an angle into `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Direction of the vector from `origin` to `target`, in `[0, 360)`.
///
/// Coincident points give 0.
pub fn direction_to(origin: Point, target: Point) -> f64 {
    let delta = target - origin;
    normalize_angle(delta.y.atan2(delta.x).to_degrees())
}

/// Signed bearing in `[-180, 180]` from `origin`, currently facing `facing`,
/// to `target`. Positive means the target is to the left (anti-clockwise).
pub fn angle_to(target: Point, origin: Point, facing: f64) -> f64 {
    let result = direction_to(origin, target) - normalize_angle(facing);
    if result < -180.0 {
        result + 360.0
    } else if result > 180.0 {
        result - 360.0
    } else {
        result
    }
}

/// How far one has to turn anti-clockwise to get from angle `a` to angle `b`.
/// The result is in `[0, 360)`.
pub fn anti_clockwise_distance(a: f64, b: f64) -> f64 {
    normalize_angle(b - a)
}

/// Checks whether `theta` lies on the arc that runs anti-clockwise from
/// `start` to `end`. Copes with the 360 to 0 jump.
pub fn angle_within_bounds(theta: f64, start: f64, end: f64) -> bool {
    anti_clockwise_distance(start, theta) <= anti_clockwise_distance(start, end)
}

/// Projects a point `distance` centimetres from `origin` along `direction`.
pub fn point_on_line(origin: Point, direction: f64, distance: f64) -> Point {
    let radians = direction.to_radians();
    origin + Vector2::new(radians.cos(), radians.sin()) * distance
}

/// Where a segment crosses a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircleCrossing {
    /// The segment never touches the circle.
    Miss,
    /// A tangent point, or the only crossing that lies on the segment.
    One(Point),
    /// Two crossings, ordered from the segment start towards its end.
    Two(Point, Point),
}

impl CircleCrossing {
    /// Number of crossing points.
    pub fn count(&self) -> usize {
        match self {
            CircleCrossing::Miss => 0,
            CircleCrossing::One(_) => 1,
            CircleCrossing::Two(_, _) => 2,
        }
    }

    /// Crossing points in segment order.
    pub fn points(&self) -> Vec<Point> {
        match *self {
            CircleCrossing::Miss => Vec::new(),
            CircleCrossing::One(p) => vec![p],
            CircleCrossing::Two(p, q) => vec![p, q],
        }
    }
}

/// Real roots of `a·t² + b·t + c = 0`, smaller first. `None` when the
/// discriminant is negative or the equation is not quadratic.
fn quadratic_roots(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a.abs() < EPSILON {
        return None;
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let first = (-b - root) / (2.0 * a);
    let second = (-b + root) / (2.0 * a);
    Some((first.min(second), first.max(second)))
}

/// Segment parameters `t` in `[0, 1]` at which `p0 + t·(p1 - p0)` lies on the
/// circle. Equal roots collapse into one.
fn segment_circle_parameters(p0: Point, p1: Point, center: Point, radius: f64) -> Vec<f64> {
    let along = p1 - p0;
    let offset = p0 - center;
    let a = along.norm_squared();
    let b = 2.0 * along.dot(&offset);
    let c = offset.norm_squared() - radius * radius;

    let Some((first, second)) = quadratic_roots(a, b, c) else {
        return Vec::new();
    };

    let mut roots = vec![first];
    if (second - first).abs() > EPSILON {
        roots.push(second);
    }
    roots.retain(|t| (0.0..=1.0).contains(t));
    roots
}

/// Intersections between the segment `p0`–`p1` and a circle.
pub fn line_circle_intersections(p0: Point, p1: Point, center: Point, radius: f64) -> CircleCrossing {
    let at = |t: f64| p0 + (p1 - p0) * t;
    match segment_circle_parameters(p0, p1, center, radius).as_slice() {
        [t] => CircleCrossing::One(at(*t)),
        [t, u] => CircleCrossing::Two(at(*t), at(*u)),
        _ => CircleCrossing::Miss,
    }
}

/// Number of times the segment `p0`–`p1` crosses the arc of the given circle
/// running anti-clockwise from `arc_start` to `arc_end`.
pub fn segment_arc_intersection_count(
    p0: Point,
    p1: Point,
    center: Point,
    radius: f64,
    arc_start: f64,
    arc_end: f64,
) -> usize {
    segment_circle_parameters(p0, p1, center, radius)
        .into_iter()
        .map(|t| p0 + (p1 - p0) * t)
        .filter(|crossing| angle_within_bounds(direction_to(center, *crossing), arc_start, arc_end))
        .count()
}

/// Whether the segment `p0`–`p1` touches the axis-aligned rectangle spanned
/// by `min` and `max` (Liang–Barsky clipping).
pub fn segment_intersects_rect(p0: Point, p1: Point, min: Point, max: Point) -> bool {
    let delta = p1 - p0;
    let mut enter = 0.0_f64;
    let mut exit = 1.0_f64;
    let edges = [
        (-delta.x, p0.x - min.x),
        (delta.x, max.x - p0.x),
        (-delta.y, p0.y - min.y),
        (delta.y, max.y - p0.y),
    ];

    for (p, q) in edges {
        if p.abs() < EPSILON {
            // parallel to this edge and outside of it
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > exit {
                return false;
            }
            enter = enter.max(r);
        } else {
            if r < enter {
                return false;
            }
            exit = exit.min(r);
        }
    }
    true
}

/// Intersection of the infinite lines through `a`–`b` and `c`–`d`.
/// `None` for parallel or degenerate lines.
pub fn lines_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    let denominator = (a.x - b.x) * (c.y - d.y) - (a.y - b.y) * (c.x - d.x);
    if denominator.abs() < EPSILON {
        return None;
    }
    let first = a.x * b.y - a.y * b.x;
    let second = c.x * d.y - c.y * d.x;
    let x = (first * (c.x - d.x) - (a.x - b.x) * second) / denominator;
    let y = (first * (c.y - d.y) - (a.y - b.y) * second) / denominator;
    Some(Point::new(x, y))
}

/// The point where a line from `from` touches the circle, found by
/// intersecting the circle with the circle centred on `from` whose radius is
/// the tangent length.
///
/// Of the two tangent points, the one with the lower `y` is returned when the
/// circle centre is above the x-axis and the one with the higher `y`
/// otherwise. Returns `None` when `from` is on or inside the circle.
pub fn circle_tangent_point(from: Point, center: Point, radius: f64) -> Option<Point> {
    let d = nalgebra::distance(&from, &center);
    if radius <= 0.0 || d <= radius {
        return None;
    }

    let tangent_length = (d * d - radius * radius).sqrt();
    let a = (tangent_length * tangent_length - radius * radius + d * d) / (2.0 * d);
    let h = (tangent_length * tangent_length - a * a).max(0.0).sqrt();

    let towards = center - from;
    let chord_middle = from + towards * (a / d);
    let normal = Vector2::new(towards.y, -towards.x) * (h / d);

    let first = chord_middle + normal;
    let second = chord_middle - normal;

    let chosen = if center.y > 0.0 {
        if first.y > second.y { second } else { first }
    } else if first.y > second.y {
        first
    } else {
        second
    };
    Some(chosen)
}

/// Meeting point of the tangent from `start` and the tangent from `end` to
/// the circle around `center`. Used as a detour waypoint that skirts the
/// circle on one side.
pub fn tangent_intersection(start: Point, end: Point, center: Point, radius: f64) -> Option<Point> {
    let start_tangent = circle_tangent_point(start, center, radius)?;
    let end_tangent = circle_tangent_point(end, center, radius)?;
    lines_intersection(start_tangent, start, end, end_tangent)
}

/// End point of an arc given its start, the heading at the start, the radius
/// and the signed central angle (positive is anti-clockwise).
pub fn arc_endpoint(start: Point, start_direction: f64, radius: f64, central_angle: f64) -> Point {
    // cosine rule: chord length of the arc
    let chord = radius * (2.0 * (1.0 - central_angle.to_radians().cos())).sqrt();
    let heading = start_direction + central_angle / 2.0;
    point_on_line(start, heading, chord)
}
