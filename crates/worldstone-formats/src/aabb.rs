//! Axis-aligned bounding boxes
//!
//! Bounds are half-open: `lower` is included and `upper` is excluded, so
//! `width = x_upper - x_lower` counts pixels for integer boxes.

use std::ops::Sub;

/// Scalar types usable as box coordinates
pub trait Coordinate: Copy + PartialOrd + Sub<Output = Self> {
    /// Smallest representable value
    const LOWEST: Self;
    /// Largest representable value
    const HIGHEST: Self;
}

macro_rules! impl_coordinate {
    ($($ty:ty),*) => {
        $(impl Coordinate for $ty {
            const LOWEST: Self = <$ty>::MIN;
            const HIGHEST: Self = <$ty>::MAX;
        })*
    };
}

impl_coordinate!(i16, i32, i64, u16, u32, u64, usize, f32, f64);

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aabb<T> {
    /// Left bound, included
    pub x_lower: T,
    /// Top bound, included
    pub y_lower: T,
    /// Right bound, excluded
    pub x_upper: T,
    /// Bottom bound, excluded
    pub y_upper: T,
}

impl<T: Coordinate> Aabb<T> {
    /// Box from its bounds
    pub const fn new(x_lower: T, y_lower: T, x_upper: T, y_upper: T) -> Self {
        Self {
            x_lower,
            y_lower,
            x_upper,
            y_upper,
        }
    }

    /// Inverted box that becomes the first box passed to [`extend`](Self::extend).
    ///
    /// ```
    /// use worldstone_formats::Aabb;
    ///
    /// let mut bounds = Aabb::for_extension();
    /// bounds.extend(&Aabb::new(0, 0, 4, 4));
    /// bounds.extend(&Aabb::new(-2, 1, 3, 6));
    /// assert_eq!(bounds, Aabb::new(-2, 0, 4, 6));
    /// ```
    pub const fn for_extension() -> Self {
        Self {
            x_lower: T::HIGHEST,
            y_lower: T::HIGHEST,
            x_upper: T::LOWEST,
            y_upper: T::LOWEST,
        }
    }

    /// Box covering every representable point
    pub const fn maximized() -> Self {
        Self {
            x_lower: T::LOWEST,
            y_lower: T::LOWEST,
            x_upper: T::HIGHEST,
            y_upper: T::HIGHEST,
        }
    }

    /// `x_upper - x_lower`
    pub fn width(&self) -> T {
        self.x_upper - self.x_lower
    }

    /// `y_upper - y_lower`
    pub fn height(&self) -> T {
        self.y_upper - self.y_lower
    }

    /// True while no box has been merged into a [`for_extension`](Self::for_extension) box
    pub fn is_empty(&self) -> bool {
        self.x_lower >= self.x_upper || self.y_lower >= self.y_upper
    }

    /// Grow this box to also cover `other`
    pub fn extend(&mut self, other: &Self) {
        if other.x_lower < self.x_lower {
            self.x_lower = other.x_lower;
        }
        if other.y_lower < self.y_lower {
            self.y_lower = other.y_lower;
        }
        if other.x_upper > self.x_upper {
            self.x_upper = other.x_upper;
        }
        if other.y_upper > self.y_upper {
            self.y_upper = other.y_upper;
        }
    }
}

impl<T: Coordinate> FromIterator<Aabb<T>> for Aabb<T> {
    fn from_iter<I: IntoIterator<Item = Aabb<T>>>(iter: I) -> Self {
        iter.into_iter().fold(Self::for_extension(), |mut acc, item| {
            acc.extend(&item);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_height() {
        let bounds = Aabb::new(-3, 2, 5, 10);
        assert_eq!(bounds.width(), 8);
        assert_eq!(bounds.height(), 8);
    }

    #[test]
    fn test_extension_starts_empty() {
        let bounds = Aabb::<i32>::for_extension();
        assert!(bounds.is_empty());
        let merged: Aabb<i32> = [Aabb::new(1, 1, 2, 2)].into_iter().collect();
        assert_eq!(merged, Aabb::new(1, 1, 2, 2));
    }

    #[test]
    fn test_union_of_many() {
        let boxes = [
            Aabb::new(0.0, 0.0, 1.0, 1.0),
            Aabb::new(-1.5, 0.5, 0.5, 3.0),
        ];
        let merged: Aabb<f64> = boxes.into_iter().collect();
        assert_eq!(merged, Aabb::new(-1.5, 0.0, 1.0, 3.0));
        assert!((merged.width() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_maximized() {
        let bounds = Aabb::<i16>::maximized();
        assert_eq!(bounds.x_lower, i16::MIN);
        assert_eq!(bounds.y_upper, i16::MAX);
    }
}
