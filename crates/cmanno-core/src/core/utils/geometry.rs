use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

/// Projects a point from `from` along the direction towards `towards`.
///
/// # Return
///
/// Returns `from + normalize(towards - from) * length`, or `None` when the two points
/// coincide and no direction exists.
pub fn project_along(
    from: &Point3<f64>,
    towards: &Point3<f64>,
    length: f64,
) -> Option<Point3<f64>> {
    let direction = towards - from;
    let norm = direction.norm();
    if norm <= f64::EPSILON {
        return None;
    }
    Some(from + direction / norm * length)
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Least-squares rigid superposition (Kabsch) of `from` onto `to`.
///
/// # Return
///
/// Returns the rotation and translation such that `rotation * p + translation` maps
/// each point of `from` onto its partner in `to`, or `None` when fewer than three
/// pairs are given or the sets have different lengths.
pub fn superposition(
    from: &[Point3<f64>],
    to: &[Point3<f64>],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    if from.len() != to.len() || from.len() < 3 {
        return None;
    }
    let from_center = centroid(from)?;
    let to_center = centroid(to)?;

    let mut covariance = Matrix3::zeros();
    for (p, q) in from.iter().zip(to) {
        covariance += (p - from_center) * (q - to_center).transpose();
    }

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    let mut correction = Matrix3::identity();
    if (v_t.transpose() * u.transpose()).determinant() < 0.0 {
        correction[(2, 2)] = -1.0;
    }
    let rotation_matrix = v_t.transpose() * correction * u.transpose();
    let rotation = Rotation3::from_matrix_unchecked(rotation_matrix);
    let translation = to_center.coords - rotation * from_center.coords;
    Some((rotation, translation))
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}
