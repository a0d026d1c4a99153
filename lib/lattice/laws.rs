//! Checks of the lattice laws over sample elements, shared by the tests of
//! every concrete lattice.

use crate::lattice::Lattice;

/// Lattices without a representable top skip the laws involving it.
pub fn check_lattice_laws<L: Lattice>(lattice: &L, samples: &[L::Element]) {
    let top = lattice.top().ok();
    let bottom = lattice.bottom().unwrap();

    for a in samples {
        assert_eq!(&lattice.join(a, a).unwrap(), a, "join is not idempotent");
        assert_eq!(&lattice.join(&bottom, a).unwrap(), a, "bottom is not the identity");
        assert!(lattice.is_included(&bottom, a).unwrap(), "bottom is not least");
        if let Some(top) = &top {
            assert_eq!(&lattice.join(top, a).unwrap(), top, "top does not absorb");
            assert!(lattice.is_included(a, top).unwrap(), "top is not greatest");
        }
        assert!(lattice.is_included(a, a).unwrap(), "order is not reflexive");

        for b in samples {
            let ab = lattice.join(a, b).unwrap();
            assert_eq!(ab, lattice.join(b, a).unwrap(), "join is not commutative");
            assert!(lattice.is_included(a, &ab).unwrap(), "join is not an upper bound");
            assert!(lattice.is_included(b, &ab).unwrap(), "join is not an upper bound");

            let meet = lattice.meet(a, b).unwrap();
            assert!(lattice.is_included(&meet, a).unwrap(), "meet is not a lower bound");
            assert!(lattice.is_included(&meet, b).unwrap(), "meet is not a lower bound");

            for c in samples {
                if lattice.is_included(a, c).unwrap() && lattice.is_included(b, c).unwrap() {
                    assert!(lattice.is_included(&ab, c).unwrap(), "join is not least");
                }
                assert_eq!(
                    lattice.join(&ab, c).unwrap(),
                    lattice.join(a, &lattice.join(b, c).unwrap()).unwrap(),
                    "join is not associative"
                );
            }
        }
    }
}
