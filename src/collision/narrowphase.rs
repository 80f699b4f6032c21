//! Circle and convex polygon manifold generation.
//!
//! Points are produced for gaps up to the speculative margin so the solver can
//! stop approaching bodies before they overlap.

use glam::Vec2;

use super::{
    clipping::{clip_segment_to_line, ClipVertex, ContactFeature, FeatureKind},
    contact::{Manifold, ManifoldPoint},
    shapes::{ColliderShape, MAX_POLYGON_VERTICES},
};
use crate::{config::LINEAR_SLOP, core::types::Transform, utils::math::cross_vs};

/// Manifold generator for the built-in shape set.
#[derive(Debug, Clone, Copy)]
pub struct NarrowPhase {
    /// Largest positive separation still reported as a contact point.
    pub margin: f32,
}

impl Default for NarrowPhase {
    fn default() -> Self {
        Self {
            margin: 4.0 * LINEAR_SLOP,
        }
    }
}

impl NarrowPhase {
    pub fn new(margin: f32) -> Self {
        Self { margin }
    }

    /// Contact points between two placed shapes, normals pointing from A to B.
    pub fn collide(
        &self,
        shape_a: &ColliderShape,
        xf_a: &Transform,
        shape_b: &ColliderShape,
        xf_b: &Transform,
    ) -> Manifold {
        let mut manifold = Manifold::new();
        match (shape_a, shape_b) {
            (
                ColliderShape::Circle {
                    center: ca,
                    radius: ra,
                },
                ColliderShape::Circle {
                    center: cb,
                    radius: rb,
                },
            ) => {
                let pa = xf_a.apply(*ca);
                let pb = xf_b.apply(*cb);
                if let Some(point) = collide_circles(pa, *ra, pb, *rb, self.margin) {
                    manifold.push(point);
                }
            }
            (
                ColliderShape::Polygon {
                    vertices, normals, ..
                },
                ColliderShape::Circle { center, radius },
            ) => {
                let world_center = xf_b.apply(*center);
                if let Some(point) =
                    collide_polygon_circle(vertices, normals, xf_a, world_center, *radius, self.margin)
                {
                    manifold.push(point);
                }
            }
            (
                ColliderShape::Circle { center, radius },
                ColliderShape::Polygon {
                    vertices, normals, ..
                },
            ) => {
                let world_center = xf_a.apply(*center);
                if let Some(mut point) =
                    collide_polygon_circle(vertices, normals, xf_b, world_center, *radius, self.margin)
                {
                    point.normal = -point.normal;
                    manifold.push(point);
                }
            }
            (
                ColliderShape::Polygon {
                    vertices: va,
                    normals: na,
                    ..
                },
                ColliderShape::Polygon {
                    vertices: vb,
                    normals: nb,
                    ..
                },
            ) => {
                let a = PlacedPolygon::new(va, na, xf_a);
                let b = PlacedPolygon::new(vb, nb, xf_b);
                collide_polygons(&a, &b, self.margin, &mut manifold);
            }
        }
        manifold
    }
}

/// Lower bound on the distance between two placed shapes; negative when overlapping.
///
/// Exact for circles, the separating-axis gap for polygon pairs.
pub fn separation(
    shape_a: &ColliderShape,
    xf_a: &Transform,
    shape_b: &ColliderShape,
    xf_b: &Transform,
) -> f32 {
    match (shape_a, shape_b) {
        (
            ColliderShape::Circle {
                center: ca,
                radius: ra,
            },
            ColliderShape::Circle {
                center: cb,
                radius: rb,
            },
        ) => xf_a.apply(*ca).distance(xf_b.apply(*cb)) - ra - rb,
        (
            ColliderShape::Polygon {
                vertices, normals, ..
            },
            ColliderShape::Circle { center, radius },
        ) => {
            let local = xf_a.apply_inverse(xf_b.apply(*center));
            polygon_point_distance(vertices, normals, local).0 - radius
        }
        (
            ColliderShape::Circle { center, radius },
            ColliderShape::Polygon {
                vertices, normals, ..
            },
        ) => {
            let local = xf_b.apply_inverse(xf_a.apply(*center));
            polygon_point_distance(vertices, normals, local).0 - radius
        }
        (
            ColliderShape::Polygon {
                vertices: va,
                normals: na,
                ..
            },
            ColliderShape::Polygon {
                vertices: vb,
                normals: nb,
                ..
            },
        ) => {
            let a = PlacedPolygon::new(va, na, xf_a);
            let b = PlacedPolygon::new(vb, nb, xf_b);
            find_max_separation(&a, &b).1.max(find_max_separation(&b, &a).1)
        }
    }
}

fn collide_circles(pa: Vec2, ra: f32, pb: Vec2, rb: f32, margin: f32) -> Option<ManifoldPoint> {
    let delta = pb - pa;
    let distance = delta.length();
    let separation = distance - ra - rb;
    if separation > margin {
        return None;
    }
    let normal = if distance > f32::EPSILON {
        delta / distance
    } else {
        Vec2::Y
    };
    let position = pa + normal * (ra + 0.5 * separation);
    Some(ManifoldPoint::new(position, normal, separation, 0))
}

/// Signed distance from a local point to a convex polygon and the outward direction of it.
fn polygon_point_distance(vertices: &[Vec2], normals: &[Vec2], point: Vec2) -> (f32, Vec2) {
    let count = vertices.len();
    let mut best = 0;
    let mut best_separation = f32::MIN;
    for i in 0..count {
        let separation = normals[i].dot(point - vertices[i]);
        if separation > best_separation {
            best_separation = separation;
            best = i;
        }
    }

    if best_separation <= 0.0 {
        return (best_separation, normals[best]);
    }

    let v1 = vertices[best];
    let v2 = vertices[(best + 1) % count];
    let u1 = (point - v1).dot(v2 - v1);
    let u2 = (point - v2).dot(v1 - v2);

    let corner = if u1 <= 0.0 {
        Some(v1)
    } else if u2 <= 0.0 {
        Some(v2)
    } else {
        None
    };

    match corner {
        Some(vertex) => {
            let delta = point - vertex;
            let distance = delta.length();
            let normal = if distance > f32::EPSILON {
                delta / distance
            } else {
                normals[best]
            };
            (distance, normal)
        }
        None => (best_separation, normals[best]),
    }
}

fn collide_polygon_circle(
    vertices: &[Vec2],
    normals: &[Vec2],
    xf_polygon: &Transform,
    world_center: Vec2,
    radius: f32,
    margin: f32,
) -> Option<ManifoldPoint> {
    let local_center = xf_polygon.apply_inverse(world_center);
    let (distance, local_normal) = polygon_point_distance(vertices, normals, local_center);
    let separation = distance - radius;
    if separation > margin {
        return None;
    }

    let local_point = local_center - local_normal * (radius + 0.5 * separation);
    Some(ManifoldPoint::new(
        xf_polygon.apply(local_point),
        xf_polygon.rotation.rotate(local_normal),
        separation,
        0,
    ))
}

/// Polygon with its vertices and normals already in world space.
struct PlacedPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

impl PlacedPolygon {
    fn new(vertices: &[Vec2], normals: &[Vec2], xf: &Transform) -> Self {
        let mut placed = Self {
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            count: vertices.len().min(MAX_POLYGON_VERTICES),
        };
        for i in 0..placed.count {
            placed.vertices[i] = xf.apply(vertices[i]);
            placed.normals[i] = xf.rotation.rotate(normals[i]);
        }
        placed
    }

    fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }
}

/// Edge of `poly1` with the largest separation from `poly2`.
fn find_max_separation(poly1: &PlacedPolygon, poly2: &PlacedPolygon) -> (usize, f32) {
    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..poly1.count {
        let normal = poly1.normals[i];
        let origin = poly1.vertices[i];
        let separation = poly2
            .vertices()
            .iter()
            .map(|v| normal.dot(*v - origin))
            .fold(f32::MAX, f32::min);
        if separation > max_separation {
            max_separation = separation;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Edge of `incident` most anti-parallel to the reference normal.
fn find_incident_edge(reference: &PlacedPolygon, edge: usize, incident: &PlacedPolygon) -> [ClipVertex; 2] {
    let normal = reference.normals[edge];
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..incident.count {
        let dot = normal.dot(incident.normals[i]);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let next = (index + 1) % incident.count;
    let feature = |vertex: usize| ContactFeature {
        index_a: edge as u8,
        index_b: vertex as u8,
        kind_a: FeatureKind::Face,
        kind_b: FeatureKind::Vertex,
    };
    [
        ClipVertex {
            point: incident.vertices[index],
            feature: feature(index),
        },
        ClipVertex {
            point: incident.vertices[next],
            feature: feature(next),
        },
    ]
}

fn collide_polygons(a: &PlacedPolygon, b: &PlacedPolygon, margin: f32, manifold: &mut Manifold) {
    let (edge_a, separation_a) = find_max_separation(a, b);
    if separation_a > margin {
        return;
    }
    let (edge_b, separation_b) = find_max_separation(b, a);
    if separation_b > margin {
        return;
    }

    // Prefer A as reference unless B is clearly better, to avoid flip-flopping.
    let tolerance = 0.1 * LINEAR_SLOP;
    let (reference, incident, edge, flip) = if separation_b > separation_a + tolerance {
        (b, a, edge_b, true)
    } else {
        (a, b, edge_a, false)
    };

    let incident_edge = find_incident_edge(reference, edge, incident);

    let iv1 = edge;
    let iv2 = (edge + 1) % reference.count;
    let v11 = reference.vertices[iv1];
    let v12 = reference.vertices[iv2];

    let tangent = (v12 - v11).normalize_or_zero();
    let normal = cross_vs(tangent, 1.0);

    let front_offset = normal.dot(v11);
    let side_offset1 = -tangent.dot(v11);
    let side_offset2 = tangent.dot(v12);

    let (clip1, count1) = clip_segment_to_line(incident_edge, -tangent, side_offset1, iv1 as u8);
    if count1 < 2 {
        return;
    }
    let (clip2, count2) = clip_segment_to_line(clip1, tangent, side_offset2, iv2 as u8);
    if count2 < 2 {
        return;
    }

    let world_normal = if flip { -normal } else { normal };
    for vertex in clip2.iter().take(count2) {
        let separation = normal.dot(vertex.point) - front_offset;
        if separation > margin {
            continue;
        }
        let feature = if flip {
            vertex.feature.swapped()
        } else {
            vertex.feature
        };
        let position = vertex.point - 0.5 * separation * normal;
        manifold.push(ManifoldPoint::new(position, world_normal, separation, feature.key()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn narrowphase() -> NarrowPhase {
        NarrowPhase::default()
    }

    #[test]
    fn overlapping_circles_report_depth() {
        let circle = ColliderShape::circle(0.5).expect("circle");
        let manifold = narrowphase().collide(
            &circle,
            &Transform::IDENTITY,
            &circle,
            &Transform::from_position(Vec2::new(0.0, 0.9)),
        );
        assert_eq!(manifold.len(), 1);
        let point = manifold.points()[0];
        assert_abs_diff_eq!(point.separation, -0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(point.normal.y, 1.0);
        assert_abs_diff_eq!(point.position.y, 0.45, epsilon = 1e-6);
    }

    #[test]
    fn distant_circles_do_not_touch() {
        let circle = ColliderShape::circle(0.5).expect("circle");
        let manifold = narrowphase().collide(
            &circle,
            &Transform::IDENTITY,
            &circle,
            &Transform::from_position(Vec2::new(2.0, 0.0)),
        );
        assert!(manifold.is_empty());
    }

    #[test]
    fn box_resting_on_box_gives_two_points() {
        let ground = ColliderShape::cuboid(5.0, 0.5).expect("ground");
        let crate_box = ColliderShape::cuboid(0.5, 0.5).expect("box");
        let manifold = narrowphase().collide(
            &ground,
            &Transform::IDENTITY,
            &crate_box,
            &Transform::from_position(Vec2::new(0.0, 0.99)),
        );
        assert_eq!(manifold.len(), 2);
        for point in manifold.points() {
            assert_abs_diff_eq!(point.normal.y, 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(point.separation, -0.01, epsilon = 1e-5);
        }
        let ids: Vec<u32> = manifold.points().iter().map(|p| p.id).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn normal_points_from_a_to_b_when_reference_is_b() {
        let small = ColliderShape::cuboid(0.5, 0.5).expect("box");
        let wide = ColliderShape::cuboid(5.0, 0.5).expect("ground");
        let manifold = narrowphase().collide(
            &small,
            &Transform::from_position(Vec2::new(0.0, 0.99)),
            &wide,
            &Transform::IDENTITY,
        );
        assert!(!manifold.is_empty());
        for point in manifold.points() {
            assert_abs_diff_eq!(point.normal.y, -1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn circle_against_box_face_and_corner() {
        let square = ColliderShape::cuboid(1.0, 1.0).expect("box");
        let circle = ColliderShape::circle(0.5).expect("circle");

        let face = narrowphase().collide(
            &square,
            &Transform::IDENTITY,
            &circle,
            &Transform::from_position(Vec2::new(0.0, 1.4)),
        );
        assert_eq!(face.len(), 1);
        assert_abs_diff_eq!(face.points()[0].separation, -0.1, epsilon = 1e-5);
        assert_abs_diff_eq!(face.points()[0].normal.y, 1.0, epsilon = 1e-6);

        let corner = narrowphase().collide(
            &circle,
            &Transform::from_position(Vec2::new(1.3, 1.3)),
            &square,
            &Transform::IDENTITY,
        );
        assert_eq!(corner.len(), 1);
        let expected = 0.3 * 2.0_f32.sqrt() - 0.5;
        assert_abs_diff_eq!(corner.points()[0].separation, expected, epsilon = 1e-5);
        assert!(corner.points()[0].normal.x < 0.0 && corner.points()[0].normal.y < 0.0);
    }

    #[test]
    fn separation_matches_manifold_depth() {
        let square = ColliderShape::cuboid(0.5, 0.5).expect("box");
        let gap = separation(
            &square,
            &Transform::IDENTITY,
            &square,
            &Transform::from_position(Vec2::new(1.25, 0.0)),
        );
        assert_abs_diff_eq!(gap, 0.25, epsilon = 1e-6);
    }
}
