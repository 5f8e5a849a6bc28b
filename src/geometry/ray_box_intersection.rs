use crate::geometry::{FloatType, Ray, WorldBox};

pub trait RayIntersectionExt {
    /// Calculate first and last ray intersection with the box
    fn intersect(&self, ray: &Ray) -> (FloatType, FloatType);

    /// True if the ray enters the box at a non-negative distance or starts inside it.
    fn hits(&self, ray: &Ray) -> bool {
        let (t1, t2) = self.intersect(ray);
        t1 <= t2 && t2 >= 0.0
    }
}

impl RayIntersectionExt for WorldBox {
    /// Slab test. Returns minimum and maximum distance along the ray, ray intersects if min <= max.
    /// The near and far planes of each slab are picked by the ray direction sign,
    /// so no per-axis swapping is needed.
    fn intersect(&self, ray: &Ray) -> (FloatType, FloatType) {
        let near = self.corner(ray.dir_is_neg);
        let far = self.corner(ray.dir_is_neg.map(|neg| !neg));

        let mut min_t = FloatType::NEG_INFINITY;
        let mut max_t = FloatType::INFINITY;

        for axis in 0..3 {
            // The multiplication is NAN if the ray is starting inside the slab bounding plane
            // and is parallel to it. In this case we blend to +-infinity, so that the range becomes infinite
            let t_near = (near[axis] - ray.origin[axis]) * ray.inv_direction[axis];
            let t_far = (far[axis] - ray.origin[axis]) * ray.inv_direction[axis];
            let t_near = if t_near.is_nan() { FloatType::NEG_INFINITY } else { t_near };
            let t_far = if t_far.is_nan() { FloatType::INFINITY } else { t_far };

            min_t = min_t.max(t_near);
            max_t = max_t.min(t_far);
        }

        (min_t, max_t)
    }
}
