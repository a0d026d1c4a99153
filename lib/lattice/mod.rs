//! Lattices and abstract domains.
//!
//! A `Lattice` is an object describing one family of abstract values: it
//! knows the order between them and how to combine them. Elements are plain
//! values, lattices are the operations over them. An `AbstractDomain` adds
//! the connection to concrete values and widening.
//!
//! Every lattice must satisfy the usual laws: `join` is commutative,
//! associative and idempotent, and is the least upper bound under
//! `is_included`; `bottom` is the identity of `join` and `top` absorbs.
//!
//! Operations a lattice cannot sensibly provide return `Error::Unsupported`
//! instead of guessing a result.

use std::fmt;

use crate::Error;

mod flat;
mod formula;
mod predicate_abstraction;
mod value_map;
mod version_map;

pub use self::flat::*;
pub use self::formula::*;
pub use self::predicate_abstraction::*;
pub use self::value_map::*;
pub use self::version_map::*;

#[cfg(test)]
pub(crate) mod laws;

pub trait Lattice {
    type Element: Clone + fmt::Debug + Eq;

    fn top(&self) -> Result<Self::Element, Error>;

    fn bottom(&self) -> Result<Self::Element, Error>;

    /// The least upper bound of two elements.
    fn join(&self, a: &Self::Element, b: &Self::Element) -> Result<Self::Element, Error>;

    /// The greatest lower bound of two elements.
    fn meet(&self, a: &Self::Element, b: &Self::Element) -> Result<Self::Element, Error>;

    /// Returns true if `a ⊑ b`.
    fn is_included(&self, a: &Self::Element, b: &Self::Element) -> Result<bool, Error>;

    /// Joins all given elements, starting from bottom.
    fn join_all<'e, I>(&self, elements: I) -> Result<Self::Element, Error>
    where
        I: IntoIterator<Item = &'e Self::Element>,
        Self::Element: 'e,
    {
        elements
            .into_iter()
            .try_fold(self.bottom()?, |joined, element| self.join(&joined, element))
    }
}

/// A lattice connected to a set of concrete values of type `C`.
pub trait AbstractDomain<C>: Lattice {
    /// What widening is parameterized by.
    type Precision;

    /// The most precise element describing all given concrete values.
    fn abstract_of(&self, concrete: &[C]) -> Result<Self::Element, Error>;

    /// The concrete values an element describes. The result may be lazy and
    /// unbounded; domains whose concretization cannot be enumerated return
    /// `Error::Unsupported`.
    fn concretize<'a>(
        &'a self,
        element: &'a Self::Element,
    ) -> Result<Box<dyn Iterator<Item = C> + 'a>, Error>;

    /// Widen an element with respect to the given precision.
    fn widen(
        &self,
        element: &Self::Element,
        precision: &Self::Precision,
    ) -> Result<Self::Element, Error>;
}
