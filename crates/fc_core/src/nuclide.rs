//! Static nuclide data: molar masses and half-lives.
//!
//! Isotopes are identified by the ZZZAAA convention (`92235` is U-235).
//! The table covers the nuclides a fuel-cycle simulation routinely moves;
//! anything absent falls back to `A` g/mol and is treated as stable, so an
//! unknown isotope never aborts an accounting operation.

/// Isotope identifier, ZZZAAA encoded.
pub type Iso = i32;

/// Seconds per simulation timestep (one mean month).
pub const SECS_PER_TIMESTEP: f64 = 2_629_846.0;

const SECS_PER_YEAR: f64 = 31_557_600.0;

struct Nuclide {
    iso: Iso,
    /// g/mol
    molar_mass: f64,
    /// None for stable nuclides.
    half_life_years: Option<f64>,
}

// Sorted by iso for binary search.
const NUCLIDES: &[Nuclide] = &[
    Nuclide { iso: 1001, molar_mass: 1.007_825, half_life_years: None },
    Nuclide { iso: 1002, molar_mass: 2.014_102, half_life_years: None },
    Nuclide { iso: 1003, molar_mass: 3.016_049, half_life_years: Some(12.32) },
    Nuclide { iso: 2004, molar_mass: 4.002_602, half_life_years: None },
    Nuclide { iso: 6012, molar_mass: 12.0, half_life_years: None },
    Nuclide { iso: 6014, molar_mass: 14.003_242, half_life_years: Some(5_730.0) },
    Nuclide { iso: 8016, molar_mass: 15.994_915, half_life_years: None },
    Nuclide { iso: 38090, molar_mass: 89.907_73, half_life_years: Some(28.9) },
    Nuclide { iso: 43099, molar_mass: 98.906_25, half_life_years: Some(2.111e5) },
    Nuclide { iso: 53129, molar_mass: 128.904_984, half_life_years: Some(1.57e7) },
    Nuclide { iso: 55135, molar_mass: 134.905_977, half_life_years: Some(2.3e6) },
    Nuclide { iso: 55137, molar_mass: 136.907_089, half_life_years: Some(30.08) },
    Nuclide { iso: 90232, molar_mass: 232.038_06, half_life_years: Some(1.405e10) },
    Nuclide { iso: 91233, molar_mass: 233.040_25, half_life_years: Some(7.39e-2) },
    Nuclide { iso: 92233, molar_mass: 233.039_64, half_life_years: Some(1.592e5) },
    Nuclide { iso: 92234, molar_mass: 234.040_95, half_life_years: Some(2.455e5) },
    Nuclide { iso: 92235, molar_mass: 235.043_93, half_life_years: Some(7.04e8) },
    Nuclide { iso: 92236, molar_mass: 236.045_57, half_life_years: Some(2.342e7) },
    Nuclide { iso: 92238, molar_mass: 238.050_79, half_life_years: Some(4.468e9) },
    Nuclide { iso: 93237, molar_mass: 237.048_17, half_life_years: Some(2.144e6) },
    Nuclide { iso: 94238, molar_mass: 238.049_56, half_life_years: Some(87.7) },
    Nuclide { iso: 94239, molar_mass: 239.052_16, half_life_years: Some(2.411e4) },
    Nuclide { iso: 94240, molar_mass: 240.053_81, half_life_years: Some(6_561.0) },
    Nuclide { iso: 94241, molar_mass: 241.056_85, half_life_years: Some(14.329) },
    Nuclide { iso: 95241, molar_mass: 241.056_83, half_life_years: Some(432.6) },
    Nuclide { iso: 96244, molar_mass: 244.062_75, half_life_years: Some(18.1) },
];

fn lookup(iso: Iso) -> Option<&'static Nuclide> {
    NUCLIDES
        .binary_search_by_key(&iso, |n| n.iso)
        .ok()
        .map(|i| &NUCLIDES[i])
}

/// Molar mass in g/mol. Falls back to the mass number for isotopes the
/// table does not carry.
pub fn molar_mass(iso: Iso) -> f64 {
    match lookup(iso) {
        Some(n) => n.molar_mass,
        None => f64::from(iso.rem_euclid(1000)),
    }
}

/// Half-life in seconds; `None` means stable (or unknown, which decays
/// identically to stable).
pub fn half_life_secs(iso: Iso) -> Option<f64> {
    lookup(iso)?.half_life_years.map(|y| y * SECS_PER_YEAR)
}

/// First-order decay constant in 1/s.
pub fn decay_const(iso: Iso) -> Option<f64> {
    half_life_secs(iso).map(|t| std::f64::consts::LN_2 / t)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        for pair in NUCLIDES.windows(2) {
            assert!(pair[0].iso < pair[1].iso);
        }
    }

    #[test]
    fn known_isotopes_resolve() {
        assert!((molar_mass(92235) - 235.043_93).abs() < 1e-6);
        assert!((molar_mass(92238) - 238.050_79).abs() < 1e-6);
        assert!(half_life_secs(8016).is_none());
        assert!(half_life_secs(55137).is_some());
    }

    #[test]
    fn unknown_isotope_falls_back_to_mass_number() {
        assert!((molar_mass(98252) - 252.0).abs() < 1e-12);
        assert!(half_life_secs(98252).is_none());
    }

    #[test]
    fn decay_const_matches_half_life() {
        let lambda = decay_const(1003).unwrap();
        let t_half = half_life_secs(1003).unwrap();
        // exp(-lambda * t_half) == 1/2
        assert!(((-lambda * t_half).exp() - 0.5).abs() < 1e-12);
    }
}
