//! Descriptors: the bounding regions summarising nodes and data items.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// A bounding spatial region of a node or a data item.
///
/// The engine only needs `union`, `contains` and `overlaps`; the remaining
/// methods feed the subtree choice, the piggyback epsilon expansion and the
/// shipped two-way splitter.
pub trait Descriptor: Clone + PartialEq + Debug {
    /// Smallest descriptor covering both `self` and `other`.
    fn union(&self, other: &Self) -> Self;

    fn contains(&self, other: &Self) -> bool;

    fn overlaps(&self, other: &Self) -> bool;

    fn area(&self) -> f64;

    /// Growth of `self`'s area if it had to cover `other` too.
    fn enlargement(&self, other: &Self) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Copy of `self` grown by `epsilon` on every side.
    fn expanded(&self, epsilon: f64) -> Self;

    fn dimensions(&self) -> usize;

    fn center(&self, axis: usize) -> f64;

    /// Extent along `axis`.
    fn extent(&self, axis: usize) -> f64;
}

/// Unions a sequence of descriptors, `None` for an empty sequence.
pub fn union_all<'a, D, I>(descriptors: I) -> Option<D>
where
    D: Descriptor + 'a,
    I: IntoIterator<Item = &'a D>,
{
    let mut iter = descriptors.into_iter();
    let mut result = iter.next()?.clone();
    for descriptor in iter {
        result = result.union(descriptor);
    }
    Some(result)
}

// ============================================================================
// Rectangle
// ============================================================================

/// An axis-aligned, closed, n-dimensional rectangle.
///
/// Two rectangles that only touch on a border overlap.
///
/// # Examples
///
/// ```rust
/// use rrtree::{Descriptor, Rectangle};
///
/// let a = Rectangle::interval(0.0, 1.0);
/// let b = Rectangle::interval(1.0, 3.0);
/// assert!(a.overlaps(&b));
/// assert_eq!(a.union(&b), Rectangle::interval(0.0, 3.0));
/// ```
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Rectangle {
    low: Vec<f64>,
    high: Vec<f64>,
}

impl Eq for Rectangle {}

impl Hash for Rectangle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for value in self.low.iter().chain(self.high.iter()) {
            value.to_bits().hash(state);
        }
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rectangle(")?;
        for (axis, (low, high)) in self.low.iter().zip(self.high.iter()).enumerate() {
            if axis > 0 {
                write!(f, " x ")?;
            }
            write!(f, "[{}, {}]", low, high)?;
        }
        write!(f, ")")
    }
}

impl Rectangle {
    /// Creates a rectangle from its low and high corners.
    ///
    /// Corners are normalised per axis, so swapped bounds are accepted.
    ///
    /// # Panics
    ///
    /// Panics if the corners have different dimensionality.
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Self {
        assert_eq!(
            low.len(),
            high.len(),
            "rectangle corners must have the same dimensionality"
        );
        let (low, high) = low
            .into_iter()
            .zip(high)
            .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
            .unzip();
        Self { low, high }
    }

    /// One-dimensional rectangle `[a, b]`.
    pub fn interval(a: f64, b: f64) -> Self {
        Self::new(vec![a], vec![b])
    }

    /// Two-dimensional rectangle.
    pub fn rect2d(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(vec![min_x, min_y], vec![max_x, max_y])
    }

    /// Degenerate rectangle covering a single point.
    pub fn point(coordinates: Vec<f64>) -> Self {
        Self {
            high: coordinates.clone(),
            low: coordinates,
        }
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }
}

impl Descriptor for Rectangle {
    fn union(&self, other: &Self) -> Self {
        Self {
            low: self
                .low
                .iter()
                .zip(&other.low)
                .map(|(a, b)| a.min(*b))
                .collect(),
            high: self
                .high
                .iter()
                .zip(&other.high)
                .map(|(a, b)| a.max(*b))
                .collect(),
        }
    }

    fn contains(&self, other: &Self) -> bool {
        self.low.iter().zip(&other.low).all(|(a, b)| a <= b)
            && self.high.iter().zip(&other.high).all(|(a, b)| a >= b)
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.low
            .iter()
            .zip(&self.high)
            .zip(other.low.iter().zip(&other.high))
            .all(|((low, high), (other_low, other_high))| {
                low <= other_high && other_low <= high
            })
    }

    fn area(&self) -> f64 {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(low, high)| high - low)
            .product()
    }

    fn expanded(&self, epsilon: f64) -> Self {
        Self {
            low: self.low.iter().map(|v| v - epsilon).collect(),
            high: self.high.iter().map(|v| v + epsilon).collect(),
        }
    }

    fn dimensions(&self) -> usize {
        self.low.len()
    }

    fn center(&self, axis: usize) -> f64 {
        (self.low[axis] + self.high[axis]) / 2.0
    }

    fn extent(&self, axis: usize) -> f64 {
        self.high[axis] - self.low[axis]
    }
}
