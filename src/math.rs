//! Matrix helpers for the left-handed world the renderer works in.
//!
//! cgmath is column-vector based, so a transform built here reads right to
//! left: `T * Ry * Rx * Rz * S` scales first and translates last. Clip space
//! depth runs from 0 at the near plane to 1 at the far plane.

use cgmath::{InnerSpace, Matrix3, Matrix4, Rad, SquareMatrix, Vector3};

/// Left-handed perspective projection with depth in `[0, 1]`.
pub fn perspective_lh(fov_y: Rad<f32>, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let y_scale = 1.0 / (fov_y.0 * 0.5).tan();
    let x_scale = y_scale / aspect;
    let depth = far / (far - near);
    #[rustfmt::skip]
    let projection = Matrix4::new(
        x_scale, 0.0,     0.0,            0.0,
        0.0,     y_scale, 0.0,            0.0,
        0.0,     0.0,     depth,          1.0,
        0.0,     0.0,     -near * depth,  0.0,
    );
    projection
}

/// Rotation applied in Z, then X, then Y order.
pub fn euler_rotation(rotation: Vector3<f32>) -> Matrix3<f32> {
    Matrix3::from_angle_y(Rad(rotation.y))
        * Matrix3::from_angle_x(Rad(rotation.x))
        * Matrix3::from_angle_z(Rad(rotation.z))
}

/// Inverse of [`euler_rotation`]. Expects a pure rotation matrix.
pub fn euler_angles(rotation: Matrix3<f32>) -> Vector3<f32> {
    let x = (-rotation.z.y).clamp(-1.0, 1.0).asin();
    let y = rotation.z.x.atan2(rotation.z.z);
    let z = rotation.x.y.atan2(rotation.y.y);
    Vector3::new(x, y, z)
}

pub fn compose(position: Vector3<f32>, rotation: Vector3<f32>, scale: Vector3<f32>) -> Matrix4<f32> {
    let rotation = euler_rotation(rotation);
    let linear = Matrix3::from_cols(
        rotation.x * scale.x,
        rotation.y * scale.y,
        rotation.z * scale.z,
    );
    let mut matrix = Matrix4::from(linear);
    matrix.w = position.extend(1.0);
    matrix
}

/// Splits an affine matrix into translation, Euler rotation and scale.
pub fn decompose(matrix: &Matrix4<f32>) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
    let position = matrix.w.truncate();
    let scale = axis_lengths(matrix);
    let safe = |axis: Vector3<f32>, len: f32| if len > f32::EPSILON { axis / len } else { axis };
    let rotation = Matrix3::from_cols(
        safe(matrix.x.truncate(), scale.x),
        safe(matrix.y.truncate(), scale.y),
        safe(matrix.z.truncate(), scale.z),
    );
    (position, euler_angles(rotation), scale)
}

pub fn axis_lengths(matrix: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(
        matrix.x.truncate().magnitude(),
        matrix.y.truncate().magnitude(),
        matrix.z.truncate().magnitude(),
    )
}

/// Inverse of a matrix made of rotation, scale and translation only.
///
/// Falls back to the identity for degenerate (zero scale) input.
pub fn inverse_affine(matrix: &Matrix4<f32>) -> Matrix4<f32> {
    let linear = Matrix3::from_cols(
        matrix.x.truncate(),
        matrix.y.truncate(),
        matrix.z.truncate(),
    );
    let Some(inverse) = linear.invert() else {
        log::warn!("tried to invert a degenerate transform");
        return Matrix4::identity();
    };
    let translation = -(inverse * matrix.w.truncate());
    let mut result = Matrix4::from(inverse);
    result.w = translation.extend(1.0);
    result
}

/// Builds a rotation whose Z axis points from `from` to `to`, keeping Y as close to world up as possible.
pub fn look_rotation(from: Vector3<f32>, to: Vector3<f32>) -> Option<Matrix3<f32>> {
    let forward = to - from;
    if forward.magnitude2() < 1e-8 {
        return None;
    }
    let z = forward.normalize();
    let up = if z.y.abs() > 0.999 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    };
    // Left-handed: x = up × z
    let x = up.cross(z).normalize();
    let y = z.cross(x);
    Some(Matrix3::from_cols(x, y, z))
}

#[cfg(test)]
fn is_orthonormal(rotation: &Matrix3<f32>) -> bool {
    use cgmath::Matrix;

    let product = *rotation * rotation.transpose();
    let identity = Matrix3::<f32>::identity();
    (0..3).all(|c| (0..3).all(|r| (product[c][r] - identity[c][r]).abs() < 1e-4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Vector4};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn projection_maps_near_and_far_to_unit_depth() {
        let projection = perspective_lh(Deg(60.0).into(), 1.5, 1.0, 10000.0);
        let near = projection * Vector4::new(0.0, 0.0, 1.0, 1.0);
        let far = projection * Vector4::new(0.0, 0.0, 10000.0, 1.0);
        assert_close(near.z / near.w, 0.0);
        assert_close(far.z / far.w, 1.0);
    }

    #[test]
    fn projection_keeps_positive_z_in_front() {
        let projection = perspective_lh(Deg(90.0).into(), 1.0, 1.0, 100.0);
        let point = projection * Vector4::new(1.0, 1.0, 10.0, 1.0);
        assert!(point.w > 0.0);
        assert_close(point.x / point.w, 0.1);
    }

    #[test]
    fn euler_angles_round_trip() {
        let angles = Vector3::new(0.3, -1.2, 0.8);
        let back = euler_angles(euler_rotation(angles));
        assert_close(back.x, angles.x);
        assert_close(back.y, angles.y);
        assert_close(back.z, angles.z);
    }

    #[test]
    fn decompose_recovers_components() {
        let position = Vector3::new(45.0, 16.0, 45.0);
        let rotation = Vector3::new(0.1, 0.5, -0.4);
        let scale = Vector3::new(0.06, 0.06, 0.06);
        let (p, r, s) = decompose(&compose(position, rotation, scale));
        assert_close(p.x, position.x);
        assert_close(p.z, position.z);
        assert_close(r.y, rotation.y);
        assert_close(r.z, rotation.z);
        assert_close(s.x, scale.x);
    }

    #[test]
    fn inverse_affine_undoes_transform() {
        let matrix = compose(
            Vector3::new(3.0, -2.0, 7.0),
            Vector3::new(0.4, 1.1, 0.2),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let product = inverse_affine(&matrix) * matrix;
        let identity = Matrix4::<f32>::identity();
        for c in 0..4 {
            for r in 0..4 {
                assert_close(product[c][r], identity[c][r]);
            }
        }
    }

    #[test]
    fn look_rotation_faces_target() {
        let rotation = look_rotation(Vector3::new(0.0, 0.0, 0.0), Vector3::new(10.0, 0.0, 0.0))
            .expect("distinct points");
        assert_close(rotation.z.x, 1.0);
        assert!(is_orthonormal(&rotation));
        assert!(look_rotation(Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0, 1.0, 1.0)).is_none());
    }
}
