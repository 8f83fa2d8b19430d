//! Isotopic composition vectors.
//!
//! A `Composition` is a normalized fraction-per-isotope map tagged with the
//! basis the fractions are expressed in. It is immutable once built; basis
//! conversion returns a new value, so compositions can be handed between
//! materials without aliasing surprises.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::kahan_sum;
use crate::error::CoreError;
use crate::nuclide::{self, Iso};

/// Normalized fractions below this are dropped during normalization.
const RESIDUE: f64 = 1e-16;

/// Whether fractions are per unit mass or per atom count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Basis {
    Mass,
    Atom,
}

/// Immutable normalized fraction-per-isotope vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    basis: Basis,
    fractions: BTreeMap<Iso, f64>,
}

/// Accumulating builder; fractions for repeated isotopes add up.
#[derive(Debug, Clone)]
pub struct CompositionBuilder {
    basis: Basis,
    fractions: BTreeMap<Iso, f64>,
}

impl CompositionBuilder {
    pub fn new(basis: Basis) -> Self {
        CompositionBuilder { basis, fractions: BTreeMap::new() }
    }

    pub fn insert(mut self, iso: Iso, fraction: f64) -> Self {
        *self.fractions.entry(iso).or_insert(0.0) += fraction;
        self
    }

    /// Normalize and freeze. Fails if any fraction is negative or the total
    /// is not positive. Entries whose normalized fraction falls below the
    /// residue threshold are dropped.
    pub fn build(self) -> Result<Composition, CoreError> {
        Composition::normalized(self.basis, self.fractions)
    }
}

impl Composition {
    /// Normalize a raw map directly.
    pub fn from_map(basis: Basis, fractions: BTreeMap<Iso, f64>) -> Result<Self, CoreError> {
        Composition::normalized(basis, fractions)
    }

    fn normalized(basis: Basis, fractions: BTreeMap<Iso, f64>) -> Result<Self, CoreError> {
        if let Some((iso, f)) = fractions.iter().find(|(_, f)| **f < 0.0) {
            return Err(CoreError::value(format!(
                "negative fraction {f} for isotope {iso}"
            )));
        }
        let total = kahan_sum(fractions.values().copied());
        if total <= 0.0 {
            return Err(CoreError::value(format!(
                "composition fractions sum to {total}, expected > 0"
            )));
        }
        let fractions = fractions
            .into_iter()
            .map(|(iso, f)| (iso, f / total))
            .filter(|(_, f)| *f > RESIDUE)
            .collect();
        Ok(Composition { basis, fractions })
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Fraction of `iso` in the active basis; 0 when absent.
    pub fn fraction(&self, iso: Iso) -> f64 {
        self.fractions.get(&iso).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Iso, f64)> + '_ {
        self.fractions.iter().map(|(iso, f)| (*iso, *f))
    }

    pub fn isotopes(&self) -> impl Iterator<Item = Iso> + '_ {
        self.fractions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// The composition expressed in mass fractions. Converting to the
    /// already-active basis is the identity.
    pub fn massify(&self) -> Composition {
        match self.basis {
            Basis::Mass => self.clone(),
            Basis::Atom => self.converted(Basis::Mass, |iso, f| f * nuclide::molar_mass(iso)),
        }
    }

    /// The composition expressed in atom fractions.
    pub fn atomify(&self) -> Composition {
        match self.basis {
            Basis::Atom => self.clone(),
            Basis::Mass => self.converted(Basis::Atom, |iso, f| f / nuclide::molar_mass(iso)),
        }
    }

    fn converted(&self, basis: Basis, weight: impl Fn(Iso, f64) -> f64) -> Composition {
        let raw: BTreeMap<Iso, f64> =
            self.fractions.iter().map(|(&iso, &f)| (iso, weight(iso, f))).collect();
        let total = kahan_sum(raw.values().copied());
        // A built composition has a positive sum and positive molar masses,
        // so the converted weights do too.
        let fractions = raw.into_iter().map(|(iso, w)| (iso, w / total)).collect();
        Composition { basis, fractions }
    }

    /// Mass fraction of `iso`, converting if necessary.
    pub fn mass_fraction(&self, iso: Iso) -> f64 {
        match self.basis {
            Basis::Mass => self.fraction(iso),
            Basis::Atom => self.massify().fraction(iso),
        }
    }

    /// Atom fraction of `iso`, converting if necessary.
    pub fn atom_fraction(&self, iso: Iso) -> f64 {
        match self.basis {
            Basis::Atom => self.fraction(iso),
            Basis::Mass => self.atomify().fraction(iso),
        }
    }

    /// Grams per mole of the mixture.
    pub fn mass_to_atom_ratio(&self) -> f64 {
        match self.basis {
            Basis::Atom => kahan_sum(
                self.fractions.iter().map(|(&iso, &f)| f * nuclide::molar_mass(iso)),
            ),
            Basis::Mass => {
                let inverse = kahan_sum(
                    self.fractions.iter().map(|(&iso, &f)| f / nuclide::molar_mass(iso)),
                );
                1.0 / inverse
            }
        }
    }

    /// True when every isotope appearing on either side has fractions
    /// within `eps`, compared in this composition's basis.
    pub fn almost_equal(&self, other: &Composition, eps: f64) -> bool {
        let other = match self.basis {
            Basis::Mass => other.massify(),
            Basis::Atom => other.atomify(),
        };
        let result = self
            .isotopes()
            .chain(other.isotopes())
            .all(|iso| (self.fraction(iso) - other.fraction(iso)).abs() <= eps);
        result
    }

    /// Weighted combination: `self + ratio × other`, both taken in mass
    /// fractions, renormalized. Used by absorb with ratio = incoming mass
    /// over held mass.
    pub fn mix(&self, other: &Composition, ratio: f64) -> Result<Composition, CoreError> {
        if ratio < 0.0 {
            return Err(CoreError::value(format!("mix ratio {ratio} is negative")));
        }
        let mut combined: BTreeMap<Iso, f64> = self.massify().fractions;
        for (iso, f) in other.massify().iter() {
            *combined.entry(iso).or_insert(0.0) += ratio * f;
        }
        Composition::normalized(Basis::Mass, combined)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn u_fuel() -> Composition {
        CompositionBuilder::new(Basis::Mass)
            .insert(92235, 0.05)
            .insert(92238, 0.95)
            .build()
            .unwrap()
    }

    #[test]
    fn build_normalizes_to_unit_sum() {
        let comp = CompositionBuilder::new(Basis::Mass)
            .insert(92235, 5.0)
            .insert(92238, 95.0)
            .build()
            .unwrap();
        assert!((comp.fraction(92235) - 0.05).abs() < 1e-12);
        assert!((comp.fraction(92238) - 0.95).abs() < 1e-12);
        let total = kahan_sum(comp.iter().map(|(_, f)| f));
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_inserts_accumulate() {
        let comp = CompositionBuilder::new(Basis::Mass)
            .insert(92238, 0.5)
            .insert(92238, 0.5)
            .build()
            .unwrap();
        assert_eq!(comp.len(), 1);
        assert!((comp.fraction(92238) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_fraction_is_rejected() {
        let err = CompositionBuilder::new(Basis::Mass)
            .insert(92235, -0.1)
            .insert(92238, 1.1)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Value { .. }));
    }

    #[test]
    fn zero_sum_is_rejected() {
        let err = CompositionBuilder::new(Basis::Mass).insert(92235, 0.0).build().unwrap_err();
        assert!(matches!(err, CoreError::Value { .. }));
        let err = CompositionBuilder::new(Basis::Atom).build().unwrap_err();
        assert!(matches!(err, CoreError::Value { .. }));
    }

    #[test]
    fn zero_entries_are_optimized_away() {
        let comp = CompositionBuilder::new(Basis::Mass)
            .insert(92235, 0.0)
            .insert(92238, 1.0)
            .build()
            .unwrap();
        assert_eq!(comp.len(), 1);
        assert_eq!(comp.fraction(92235), 0.0);
    }

    #[test]
    fn massify_is_idempotent() {
        let atom = u_fuel().atomify();
        let once = atom.massify();
        let twice = once.massify();
        assert_eq!(once, twice);
        assert_eq!(once.basis(), Basis::Mass);
    }

    #[test]
    fn basis_round_trip_preserves_fractions() {
        let original = u_fuel();
        let round_tripped = original.atomify().massify();
        assert!(original.almost_equal(&round_tripped, 1e-12));
    }

    #[test]
    fn atomify_shifts_toward_lighter_isotope() {
        // Equal masses of U-235 and U-238: the lighter isotope has more atoms.
        let comp = CompositionBuilder::new(Basis::Mass)
            .insert(92235, 0.5)
            .insert(92238, 0.5)
            .build()
            .unwrap()
            .atomify();
        assert!(comp.fraction(92235) > 0.5);
        assert!(comp.fraction(92238) < 0.5);
    }

    #[test]
    fn fraction_of_absent_isotope_is_zero() {
        assert_eq!(u_fuel().mass_fraction(94239), 0.0);
        assert_eq!(u_fuel().atom_fraction(94239), 0.0);
    }

    #[test]
    fn mass_to_atom_ratio_between_constituent_masses() {
        let ratio = u_fuel().mass_to_atom_ratio();
        assert!(ratio > nuclide::molar_mass(92235));
        assert!(ratio < nuclide::molar_mass(92238));
    }

    #[test]
    fn almost_equal_within_threshold() {
        let a = u_fuel();
        let b = CompositionBuilder::new(Basis::Mass)
            .insert(92235, 0.050_000_1)
            .insert(92238, 0.949_999_9)
            .build()
            .unwrap();
        assert!(a.almost_equal(&b, 1e-3));
        assert!(!a.almost_equal(&b, 1e-9));
    }

    #[test]
    fn almost_equal_covers_one_sided_isotopes() {
        let a = u_fuel();
        let b = CompositionBuilder::new(Basis::Mass)
            .insert(92235, 0.05)
            .insert(92238, 0.90)
            .insert(94239, 0.05)
            .build()
            .unwrap();
        assert!(!a.almost_equal(&b, 1e-3));
    }

    #[test]
    fn mix_weights_by_ratio() {
        let a = CompositionBuilder::new(Basis::Mass).insert(92235, 1.0).build().unwrap();
        let b = CompositionBuilder::new(Basis::Mass).insert(92238, 1.0).build().unwrap();
        // 100 kg of a mixed with 300 kg of b.
        let mixed = a.mix(&b, 3.0).unwrap();
        assert!((mixed.fraction(92235) - 0.25).abs() < 1e-12);
        assert!((mixed.fraction(92238) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn mix_negative_ratio_is_rejected() {
        let a = u_fuel();
        let b = u_fuel();
        assert!(matches!(a.mix(&b, -1.0), Err(CoreError::Value { .. })));
    }

    #[test]
    fn serde_round_trip() {
        let comp = u_fuel();
        let json = serde_json::to_string(&comp).unwrap();
        let back: Composition = serde_json::from_str(&json).unwrap();
        assert_eq!(comp, back);
    }
}
