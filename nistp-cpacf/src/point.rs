//! Curve points in affine form.

use num_bigint::BigUint;

/// A point on a NIST curve, or the point at infinity.
///
/// Coordinates are plain integers; whether they satisfy the curve equation is
/// checked where a point enters arithmetic (see
/// [`EcGroup::is_on_curve`](crate::EcGroup::is_on_curve)).
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Point {
    /// The point at infinity.
    #[default]
    Identity,

    /// Affine point `(x, y)`.
    Affine {
        /// x-coordinate.
        x: BigUint,
        /// y-coordinate.
        y: BigUint,
    },
}

impl Point {
    /// Affine point from its coordinates.
    pub fn new(x: BigUint, y: BigUint) -> Self {
        Self::Affine { x, y }
    }

    /// Is this the point at infinity?
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Affine coordinates, or `None` for the point at infinity.
    pub fn coordinates(&self) -> Option<(&BigUint, &BigUint)> {
        match self {
            Self::Identity => None,
            Self::Affine { x, y } => Some((x, y)),
        }
    }

    /// The x-coordinate, or `None` for the point at infinity.
    pub fn x(&self) -> Option<&BigUint> {
        self.coordinates().map(|(x, _)| x)
    }

    /// The y-coordinate, or `None` for the point at infinity.
    pub fn y(&self) -> Option<&BigUint> {
        self.coordinates().map(|(_, y)| y)
    }
}
