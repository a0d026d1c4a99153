use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, PartialOrd};
use std::fmt;
use std::iter;
use std::marker::PhantomData;

use crate::lattice::{AbstractDomain, Lattice};
use crate::Error;

/// An element of a flat lattice: nothing, exactly one value, or anything.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Flat<T> {
    Bottom,
    Value(T),
    Top,
}

impl<T> Flat<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Flat::Value(value) => Some(value),
            Flat::Top | Flat::Bottom => None,
        }
    }
}

impl<T: PartialEq> PartialOrd for Flat<T> {
    fn partial_cmp(&self, other: &Flat<T>) -> Option<Ordering> {
        match (self, other) {
            (Flat::Top, Flat::Top) | (Flat::Bottom, Flat::Bottom) => Some(Ordering::Equal),
            (Flat::Top, _) | (_, Flat::Bottom) => Some(Ordering::Greater),
            (_, Flat::Top) | (Flat::Bottom, _) => Some(Ordering::Less),
            (Flat::Value(l), Flat::Value(r)) => {
                if l == r {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
        }
    }
}

impl<T: fmt::Display> fmt::Display for Flat<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Flat::Bottom => write!(f, "⊥"),
            Flat::Value(value) => write!(f, "{}", value),
            Flat::Top => write!(f, "⊤"),
        }
    }
}

/// The flat lattice over values of type `T`.
#[derive(Clone, Debug)]
pub struct FlatLattice<T> {
    values: PhantomData<T>,
}

impl<T> FlatLattice<T> {
    pub fn new() -> FlatLattice<T> {
        FlatLattice {
            values: PhantomData,
        }
    }
}

impl<T> Default for FlatLattice<T> {
    fn default() -> FlatLattice<T> {
        FlatLattice::new()
    }
}

impl<T: Clone + fmt::Debug + Eq> Lattice for FlatLattice<T> {
    type Element = Flat<T>;

    fn top(&self) -> Result<Flat<T>, Error> {
        Ok(Flat::Top)
    }

    fn bottom(&self) -> Result<Flat<T>, Error> {
        Ok(Flat::Bottom)
    }

    fn join(&self, a: &Flat<T>, b: &Flat<T>) -> Result<Flat<T>, Error> {
        Ok(match a.partial_cmp(b) {
            Some(Ordering::Less) | Some(Ordering::Equal) => b.clone(),
            Some(Ordering::Greater) => a.clone(),
            None => Flat::Top,
        })
    }

    fn meet(&self, a: &Flat<T>, b: &Flat<T>) -> Result<Flat<T>, Error> {
        Ok(match a.partial_cmp(b) {
            Some(Ordering::Less) | Some(Ordering::Equal) => a.clone(),
            Some(Ordering::Greater) => b.clone(),
            None => Flat::Bottom,
        })
    }

    fn is_included(&self, a: &Flat<T>, b: &Flat<T>) -> Result<bool, Error> {
        Ok(a <= b)
    }
}

impl<T: Clone + fmt::Debug + Eq> AbstractDomain<T> for FlatLattice<T> {
    /// The lattice has finite height, widening needs no parameters.
    type Precision = ();

    fn abstract_of(&self, concrete: &[T]) -> Result<Flat<T>, Error> {
        concrete
            .iter()
            .map(|value| Flat::Value(value.clone()))
            .try_fold(Flat::Bottom, |joined, element| self.join(&joined, &element))
    }

    fn concretize<'a>(
        &'a self,
        element: &'a Flat<T>,
    ) -> Result<Box<dyn Iterator<Item = T> + 'a>, Error> {
        match element {
            Flat::Bottom => Ok(Box::new(iter::empty())),
            Flat::Value(value) => Ok(Box::new(iter::once(value.clone()))),
            Flat::Top => Err(Error::Unsupported(
                "concretization of top in a flat lattice".to_string(),
            )),
        }
    }

    fn widen(&self, element: &Flat<T>, _: &()) -> Result<Flat<T>, Error> {
        Ok(element.clone())
    }
}
