//! Segment clipping used to build polygon contact manifolds.

use glam::Vec2;

/// Kind of polygon feature a contact point originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FeatureKind {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// Pair of features that produced a contact point; stable across frames while the
/// same vertex and edge stay in contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFeature {
    pub index_a: u8,
    pub index_b: u8,
    pub kind_a: FeatureKind,
    pub kind_b: FeatureKind,
}

impl ContactFeature {
    /// Packs the feature into the identifier carried by manifold points.
    pub fn key(&self) -> u32 {
        u32::from(self.index_a)
            | u32::from(self.index_b) << 8
            | (self.kind_a as u32) << 16
            | (self.kind_b as u32) << 24
    }

    /// Same feature seen from the other shape.
    pub fn swapped(&self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            kind_a: self.kind_b,
            kind_b: self.kind_a,
        }
    }
}

/// Segment endpoint tagged with the feature it came from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub point: Vec2,
    pub feature: ContactFeature,
}

/// Clips a segment against the half-plane `normal · p <= offset`.
///
/// Returns the surviving endpoints; a point created on the clip line takes
/// `vertex_index` as its reference-face vertex.
pub fn clip_segment_to_line(
    segment: [ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index: u8,
) -> ([ClipVertex; 2], usize) {
    let mut output = [ClipVertex::default(); 2];
    let mut count = 0;

    let distance0 = normal.dot(segment[0].point) - offset;
    let distance1 = normal.dot(segment[1].point) - offset;

    if distance0 <= 0.0 {
        output[count] = segment[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        output[count] = segment[1];
        count += 1;
    }

    if distance0 * distance1 < 0.0 && count < 2 {
        let t = distance0 / (distance0 - distance1);
        output[count] = ClipVertex {
            point: segment[0].point + t * (segment[1].point - segment[0].point),
            feature: ContactFeature {
                index_a: vertex_index,
                index_b: segment[0].feature.index_b,
                kind_a: FeatureKind::Vertex,
                kind_b: FeatureKind::Face,
            },
        };
        count += 1;
    }

    (output, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn vertex(x: f32, y: f32) -> ClipVertex {
        ClipVertex {
            point: Vec2::new(x, y),
            feature: ContactFeature::default(),
        }
    }

    #[test]
    fn segment_inside_is_kept() {
        let (out, count) = clip_segment_to_line([vertex(0.0, 0.0), vertex(1.0, 0.0)], Vec2::X, 2.0, 0);
        assert_eq!(count, 2);
        assert_eq!(out[1].point, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn crossing_segment_is_cut_at_the_line() {
        let (out, count) = clip_segment_to_line([vertex(-1.0, 0.0), vertex(3.0, 0.0)], Vec2::X, 1.0, 5);
        assert_eq!(count, 2);
        assert_abs_diff_eq!(out[1].point.x, 1.0);
        assert_eq!(out[1].feature.index_a, 5);
        assert_eq!(out[1].feature.kind_a, FeatureKind::Vertex);
    }

    #[test]
    fn segment_outside_is_dropped() {
        let (_, count) = clip_segment_to_line([vertex(2.0, 0.0), vertex(3.0, 0.0)], Vec2::X, 1.0, 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn feature_keys_differ_per_feature() {
        let a = ContactFeature {
            index_a: 1,
            index_b: 2,
            kind_a: FeatureKind::Face,
            kind_b: FeatureKind::Vertex,
        };
        assert_ne!(a.key(), a.swapped().key());
        assert_eq!(a.swapped().swapped(), a);
    }
}
