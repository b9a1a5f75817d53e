//! Planar helpers for contour analysis and sheet corner handling

use imageproc::contours::{BorderType, Contour};
use imageproc::point::Point;

/// A point in image coordinates
pub type Point2 = (f64, f64);

/// Convert traced contour pixels into floating point coordinates
pub fn to_points(contour: &[Point<i32>]) -> Vec<Point2> {
    contour.iter().map(|p| (p.x as f64, p.y as f64)).collect()
}

/// Whether the contour at `index` is an outer border with no outer border
/// among its ancestors. Hole borders in the chain, such as a strip of
/// background cut off at the image edge, do not enclose it.
pub fn is_external<T>(contours: &[Contour<T>], index: usize) -> bool {
    let Some(contour) = contours.get(index) else {
        return false;
    };
    if contour.border_type != BorderType::Outer {
        return false;
    }
    let mut parent = contour.parent;
    while let Some(ancestor) = parent.and_then(|i| contours.get(i)) {
        if ancestor.border_type == BorderType::Outer {
            return false;
        }
        parent = ancestor.parent;
    }
    true
}

/// Area of a simple polygon using the shoelace formula.
/// Vertices may be in either winding order.
pub fn polygon_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 * points[j].1;
        area -= points[j].0 * points[i].1;
    }
    area.abs() / 2.0
}

/// Length of the closed polyline through `points`
pub fn perimeter(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| distance(points[i], points[(i + 1) % n])).sum()
}

pub fn distance(a: Point2, b: Point2) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at the vertex farthest from its first point and each
/// half is simplified as an open curve. A final pass drops vertices that lie
/// within `epsilon` of the line joining their neighbours, which removes the
/// split points when they fall in the middle of a straight edge.
pub fn approx_closed_polygon(points: &[Point2], epsilon: f64) -> Vec<Point2> {
    if points.len() <= 3 {
        return points.to_vec();
    }

    let far = (1..points.len())
        .max_by(|&a, &b| {
            distance(points[0], points[a])
                .partial_cmp(&distance(points[0], points[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(points.len() / 2);

    let mut second_half: Vec<Point2> = points[far..].to_vec();
    second_half.push(points[0]);

    let mut polygon = douglas_peucker(&points[..=far], epsilon);
    let tail = douglas_peucker(&second_half, epsilon);
    // Both halves share their end points
    polygon.extend_from_slice(&tail[1..tail.len() - 1]);

    drop_flat_vertices(polygon, epsilon)
}

/// Iterative open-curve Douglas-Peucker keeping both end points
fn douglas_peucker(points: &[Point2], epsilon: f64) -> Vec<Point2> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = point_to_segment_distance(points[i], points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn drop_flat_vertices(mut polygon: Vec<Point2>, epsilon: f64) -> Vec<Point2> {
    let mut changed = true;
    while changed && polygon.len() > 3 {
        changed = false;
        for i in 0..polygon.len() {
            let n = polygon.len();
            let prev = polygon[(i + n - 1) % n];
            let next = polygon[(i + 1) % n];
            if point_to_segment_distance(polygon[i], prev, next) <= epsilon {
                polygon.remove(i);
                changed = true;
                break;
            }
        }
    }
    polygon
}

fn point_to_segment_distance(p: Point2, a: Point2, b: Point2) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, (a.0 + t * dx, a.1 + t * dy))
}

/// Order four corners as `[top_left, top_right, bottom_right, bottom_left]`.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest.
pub fn order_corners(corners: [Point2; 4]) -> [Point2; 4] {
    let pick = |key: fn(&Point2) -> f64, largest: bool| -> Point2 {
        let cmp = |a: &&Point2, b: &&Point2| {
            key(*a)
                .partial_cmp(&key(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
        };
        let found = if largest {
            corners.iter().max_by(cmp)
        } else {
            corners.iter().min_by(cmp)
        };
        found.copied().unwrap_or(corners[0])
    };

    [
        pick(|p| p.0 + p.1, false),
        pick(|p| p.1 - p.0, false),
        pick(|p| p.0 + p.1, true),
        pick(|p| p.1 - p.0, true),
    ]
}
