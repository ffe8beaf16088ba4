use nalgebra::Vector3;

/// Axis-aligned bounding box defined by its minimum and maximum extent.
///
/// Used to write the `min`/`max` bounds of position accessors and to frame the
/// camera when rendering thumbnails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl AABB {
    /// Creates a new [`AABB`] that contains nothing (min: `f32::MAX`, max: `f32::MIN`).
    ///
    /// # Examples
    ///
    /// ```
    /// # use objglb_shared::aabb::AABB;
    /// let bounding_box = AABB::empty();
    /// assert!(bounding_box.is_empty());
    /// ```
    pub fn empty() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    /// Creates a new [`AABB`] that contains the `points` from the iterator.
    ///
    /// # Examples
    ///
    /// ```
    /// # use objglb_shared::nalgebra::Vector3;
    /// # use objglb_shared::aabb::AABB;
    /// # use objglb_shared::float_cmp::assert_approx_eq;
    /// let points = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 2.0, 3.0), Vector3::new(-4.0, -5.0, -6.0)];
    /// let bounding_box = AABB::from_points(points.iter());
    /// assert_approx_eq!(f32, bounding_box.min.x, -4.0, ulps = 1);
    /// assert_approx_eq!(f32, bounding_box.max.z, 3.0, ulps = 1);
    /// ```
    pub fn from_points<'v>(points: impl IntoIterator<Item = &'v Vector3<f32>>) -> Self {
        let mut bounding_box = Self::empty();
        bounding_box.extend(points);
        bounding_box
    }

    /// Expands the [`AABB`] so that it contains the given `point`.
    pub fn include_point(&mut self, point: &Vector3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Expands the [`AABB`] so that it contains the `other` [`AABB`]. Empty boxes are ignored.
    pub fn include_aabb(&mut self, other: &AABB) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Returns the center of the `AABB`
    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) / 2.0
    }

    /// Returns `true` if the `AABB` is empty.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'s> Extend<&'s Vector3<f32>> for AABB {
    fn extend<T: IntoIterator<Item = &'s Vector3<f32>>>(&mut self, iter: T) {
        for point in iter {
            self.include_point(point);
        }
    }
}
