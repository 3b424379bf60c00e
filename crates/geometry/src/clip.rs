/// A vertex produced by interpolating between two other vertices.
///
/// The position is `first + (second - first) * t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterpolatedVertex {
    pub first: i32,
    pub second: i32,
    pub t: f64,
}

/// An output vertex of [`clip_triangle_at_axis_aligned_threshold`].
///
/// Indices are the ones passed in. Callers that clip an already clipped
/// polygon pass bitwise complements (`!i`) to refer into the earlier result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriangleClipVertex {
    Index(i32),
    Interpolated(InterpolatedVertex),
}

impl From<i32> for TriangleClipVertex {
    fn from(index: i32) -> Self {
        Self::Index(index)
    }
}

impl From<InterpolatedVertex> for TriangleClipVertex {
    fn from(vertex: InterpolatedVertex) -> Self {
        Self::Interpolated(vertex)
    }
}

fn interpolated(first: i32, second: i32, t: f64) -> TriangleClipVertex {
    TriangleClipVertex::Interpolated(InterpolatedVertex { first, second, t })
}

/// Splits a triangle by an axis-aligned threshold and keeps the part above or
/// below it.
///
/// `u0`, `u1` and `u2` are the coordinates of the three vertices along the
/// clipping axis. The kept polygon is appended to `result` as zero (fully
/// clipped), three or four vertices.
#[allow(clippy::too_many_arguments)]
pub fn clip_triangle_at_axis_aligned_threshold(
    threshold: f64,
    keep_above: bool,
    i0: i32,
    i1: i32,
    i2: i32,
    u0: f64,
    u1: f64,
    u2: f64,
    result: &mut Vec<TriangleClipVertex>,
) {
    let (u0_behind, u1_behind, u2_behind) = if keep_above {
        (u0 < threshold, u1 < threshold, u2 < threshold)
    } else {
        (u0 > threshold, u1 > threshold, u2 > threshold)
    };

    let behind_count = u0_behind as u32 + u1_behind as u32 + u2_behind as u32;

    match behind_count {
        1 => {
            if u0_behind {
                let u01_ratio = (threshold - u0) / (u1 - u0);
                let u02_ratio = (threshold - u0) / (u2 - u0);

                result.push(i1.into());
                result.push(i2.into());
                if u02_ratio != 1.0 {
                    result.push(interpolated(i0, i2, u02_ratio));
                }
                if u01_ratio != 1.0 {
                    result.push(interpolated(i0, i1, u01_ratio));
                }
            } else if u1_behind {
                let u12_ratio = (threshold - u1) / (u2 - u1);
                let u10_ratio = (threshold - u1) / (u0 - u1);

                result.push(i2.into());
                result.push(i0.into());
                if u10_ratio != 1.0 {
                    result.push(interpolated(i1, i0, u10_ratio));
                }
                if u12_ratio != 1.0 {
                    result.push(interpolated(i1, i2, u12_ratio));
                }
            } else {
                let u20_ratio = (threshold - u2) / (u0 - u2);
                let u21_ratio = (threshold - u2) / (u1 - u2);

                result.push(i0.into());
                result.push(i1.into());
                if u21_ratio != 1.0 {
                    result.push(interpolated(i2, i1, u21_ratio));
                }
                if u20_ratio != 1.0 {
                    result.push(interpolated(i2, i0, u20_ratio));
                }
            }
        }
        2 => {
            if !u0_behind && u0 != threshold {
                let u10_ratio = (threshold - u1) / (u0 - u1);
                let u20_ratio = (threshold - u2) / (u0 - u2);

                result.push(i0.into());
                result.push(interpolated(i1, i0, u10_ratio));
                result.push(interpolated(i2, i0, u20_ratio));
            } else if !u1_behind && u1 != threshold {
                let u21_ratio = (threshold - u2) / (u1 - u2);
                let u01_ratio = (threshold - u0) / (u1 - u0);

                result.push(i1.into());
                result.push(interpolated(i2, i1, u21_ratio));
                result.push(interpolated(i0, i1, u01_ratio));
            } else if !u2_behind && u2 != threshold {
                let u02_ratio = (threshold - u0) / (u2 - u0);
                let u12_ratio = (threshold - u1) / (u2 - u1);

                result.push(i2.into());
                result.push(interpolated(i0, i2, u02_ratio));
                result.push(interpolated(i1, i2, u12_ratio));
            }
        }
        3 => {}
        _ => {
            result.push(i0.into());
            result.push(i1.into());
            result.push(i2.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(threshold: f64, keep_above: bool, u: [f64; 3]) -> Vec<TriangleClipVertex> {
        let mut result = Vec::new();
        clip_triangle_at_axis_aligned_threshold(
            threshold, keep_above, 0, 1, 2, u[0], u[1], u[2], &mut result,
        );
        result
    }

    #[test]
    fn removes_triangle_on_wrong_side() {
        assert!(clip(0.1, false, [0.2, 0.3, 0.4]).is_empty());
    }

    #[test]
    fn keeps_triangle_on_right_side() {
        assert_eq!(
            clip(0.1, true, [0.2, 0.3, 0.4]),
            vec![0.into(), 1.into(), 2.into()]
        );
    }

    #[test]
    fn one_vertex_behind_adds_two_vertices() {
        assert_eq!(
            clip(0.5, false, [0.75, 0.25, -0.25]),
            vec![1.into(), 2.into(), interpolated(0, 2, 0.25), interpolated(0, 1, 0.5)]
        );
        assert_eq!(
            clip(0.5, true, [0.25, 0.75, 1.25]),
            vec![1.into(), 2.into(), interpolated(0, 2, 0.25), interpolated(0, 1, 0.5)]
        );
        assert_eq!(
            clip(0.5, false, [-0.25, 0.75, 0.25]),
            vec![2.into(), 0.into(), interpolated(1, 0, 0.25), interpolated(1, 2, 0.5)]
        );
        assert_eq!(
            clip(0.5, false, [-0.25, 0.25, 0.75]),
            vec![0.into(), 1.into(), interpolated(2, 1, 0.5), interpolated(2, 0, 0.25)]
        );
    }

    #[test]
    fn two_vertices_behind_keep_a_corner() {
        assert_eq!(
            clip(0.5, false, [0.25, 0.75, 1.25]),
            vec![0.into(), interpolated(1, 0, 0.5), interpolated(2, 0, 0.75)]
        );
        assert_eq!(
            clip(0.5, true, [0.25, 0.75, -0.25]),
            vec![1.into(), interpolated(2, 1, 0.75), interpolated(0, 1, 0.5)]
        );
    }
}
