use nalgebra::{Point3, Rotation3, Unit, Vector3};

/// Rotation that maps the direction of `from` onto the direction of `to`.
///
/// Antiparallel inputs are handled with a half turn about an axis
/// perpendicular to `from`. Zero-length inputs yield the identity.
pub fn rotation_to_align(from: &Vector3<f64>, to: &Vector3<f64>) -> Rotation3<f64> {
    if from.norm_squared() < f64::EPSILON || to.norm_squared() < f64::EPSILON {
        return Rotation3::identity();
    }
    Rotation3::rotation_between(from, to).unwrap_or_else(|| {
        let helper = if from.x.abs() < 0.9 * from.norm() {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let axis = Unit::new_normalize(from.cross(&helper));
        Rotation3::from_axis_angle(&axis, std::f64::consts::PI)
    })
}

/// Rotation about `axis` that turns the part of `from` perpendicular to the
/// axis onto the perpendicular part of `to`.
///
/// Yields the identity when either perpendicular part vanishes.
pub fn rotation_about_axis(
    axis: &Vector3<f64>,
    from: &Vector3<f64>,
    to: &Vector3<f64>,
) -> Rotation3<f64> {
    let Some(axis) = Unit::try_new(*axis, f64::EPSILON) else {
        return Rotation3::identity();
    };
    let a = axis.into_inner();
    let f = from - a * from.dot(&a);
    let t = to - a * to.dot(&a);
    if f.norm_squared() < f64::EPSILON || t.norm_squared() < f64::EPSILON {
        return Rotation3::identity();
    }
    let angle = a.dot(&f.cross(&t)).atan2(f.dot(&t));
    Rotation3::from_axis_angle(&axis, angle)
}

/// Unweighted mean of `points`, or `None` if there are none.
pub fn centroid<I>(points: I) -> Option<Point3<f64>>
where
    I: IntoIterator<Item = Point3<f64>>,
{
    let (sum, count) = points
        .into_iter()
        .fold((Vector3::zeros(), 0usize), |(sum, n), p| (sum + p.coords, n + 1));
    (count > 0).then(|| Point3::from(sum / count as f64))
}

/// Largest distance from `center` to any of `points` (0 for no points).
pub fn max_distance_from<I>(points: I, center: &Point3<f64>) -> f64
where
    I: IntoIterator<Item = Point3<f64>>,
{
    points
        .into_iter()
        .map(|p| (p - center).norm())
        .fold(0.0, f64::max)
}
