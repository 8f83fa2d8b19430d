//! The `Material` resource: a quantity of isotopically-resolved matter.
//!
//! Materials are handles over shared state so the owning
//! [`SimulationContext`] can keep a weak registry for `decay_all`. The core
//! is single-threaded; a handle is the sole owner of its material for every
//! accounting purpose, and `clone_material` is an explicit deep copy.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::arithmetic::kahan_sum;
use crate::composition::{Basis, Composition};
use crate::context::{SimulationContext, TimeStep};
use crate::error::CoreError;
use crate::nuclide::{self, Iso, SECS_PER_TIMESTEP};
use crate::EPS_RSRC;

/// Unique material identifier within a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub u64);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External mass units. Storage is always kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassUnit {
    G,
    Kg,
}

impl MassUnit {
    pub fn to_kg(self, amount: f64) -> f64 {
        match self {
            MassUnit::G => amount / 1000.0,
            MassUnit::Kg => amount,
        }
    }

    pub fn from_kg(self, kg: f64) -> f64 {
        match self {
            MassUnit::G => kg * 1000.0,
            MassUnit::Kg => kg,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MassUnit::G => "g",
            MassUnit::Kg => "kg",
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MassUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "g" | "G" => Ok(MassUnit::G),
            "kg" | "KG" | "Kg" => Ok(MassUnit::Kg),
            other => Err(CoreError::Unit { unit: other.to_owned() }),
        }
    }
}

pub(crate) struct MaterialState {
    pub id: MaterialId,
    pub original_id: MaterialId,
    pub quantity_kg: f64,
    pub comp: Composition,
    pub last_update_time: TimeStep,
}

pub struct Material {
    state: Rc<RefCell<MaterialState>>,
    ctx: Rc<SimulationContext>,
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Material")
            .field("id", &state.id)
            .field("original_id", &state.original_id)
            .field("quantity_kg", &state.quantity_kg)
            .finish_non_exhaustive()
    }
}

impl Material {
    /// Create a material and enroll it in the context registry.
    pub fn new(
        ctx: &Rc<SimulationContext>,
        comp: Composition,
        quantity_kg: f64,
    ) -> Result<Material, CoreError> {
        if quantity_kg < 0.0 {
            return Err(CoreError::value(format!(
                "material quantity {quantity_kg} kg is negative"
            )));
        }
        Ok(Material::with_parts(ctx, comp, quantity_kg, None))
    }

    fn with_parts(
        ctx: &Rc<SimulationContext>,
        comp: Composition,
        quantity_kg: f64,
        original_id: Option<MaterialId>,
    ) -> Material {
        let id = MaterialId(ctx.next_id());
        let state = Rc::new(RefCell::new(MaterialState {
            id,
            original_id: original_id.unwrap_or(id),
            quantity_kg,
            comp,
            last_update_time: ctx.now(),
        }));
        ctx.enroll(&state);
        tracing::debug!(id = %id, quantity_kg, "material created");
        Material { state, ctx: Rc::clone(ctx) }
    }

    pub fn id(&self) -> MaterialId {
        self.state.borrow().id
    }

    /// Provenance: the id of the material this one was first split from.
    pub fn original_id(&self) -> MaterialId {
        self.state.borrow().original_id
    }

    pub fn last_update_time(&self) -> TimeStep {
        self.state.borrow().last_update_time
    }

    /// Quantity in kilograms.
    pub fn quantity(&self) -> f64 {
        self.state.borrow().quantity_kg
    }

    pub fn mass(&self, unit: MassUnit) -> f64 {
        unit.from_kg(self.quantity())
    }

    /// Mass of a single isotope in the requested unit; 0 when absent.
    pub fn mass_of(&self, iso: Iso, unit: MassUnit) -> f64 {
        self.state.borrow().comp.mass_fraction(iso) * self.mass(unit)
    }

    /// Total moles of the material.
    pub fn moles(&self) -> f64 {
        let ratio = self.state.borrow().comp.mass_to_atom_ratio();
        self.mass(MassUnit::G) / ratio
    }

    /// Moles of a single isotope; 0 when absent.
    pub fn moles_of(&self, iso: Iso) -> f64 {
        self.moles() * self.state.borrow().comp.atom_fraction(iso)
    }

    pub fn composition(&self) -> Composition {
        self.state.borrow().comp.clone()
    }

    /// Absorb `other` into this material. The result's composition is the
    /// mass-weighted mix; absorbing into a near-empty material adopts the
    /// incoming composition outright.
    pub fn absorb(&mut self, other: Material) -> Result<(), CoreError> {
        let amt = other.quantity();
        let other_comp = other.composition();
        let q = self.quantity();
        let mixed = if q <= EPS_RSRC {
            other_comp
        } else {
            self.state.borrow().comp.mix(&other_comp, amt / q)?
        };
        let mut state = self.state.borrow_mut();
        state.comp = mixed;
        state.quantity_kg = q + amt;
        tracing::debug!(id = %state.id, absorbed = %other.id(), amount_kg = amt, "material absorbed");
        Ok(())
    }

    /// Split off `mass_kg` with the current composition. The new material
    /// keeps this one's `original_id`.
    pub fn extract(&mut self, mass_kg: f64) -> Result<Material, CoreError> {
        let (q, id) = {
            let state = self.state.borrow();
            (state.quantity_kg, state.id)
        };
        if mass_kg < 0.0 {
            return Err(CoreError::value(format!(
                "cannot extract negative mass {mass_kg} kg from material {id}"
            )));
        }
        if mass_kg > q + EPS_RSRC {
            return Err(CoreError::value(format!(
                "cannot extract {mass_kg} kg from material {id} holding {q} kg"
            )));
        }
        let (comp, original_id) = {
            let mut state = self.state.borrow_mut();
            state.quantity_kg = (q - mass_kg).max(0.0);
            (state.comp.clone(), state.original_id)
        };
        tracing::debug!(id = %id, extracted_kg = mass_kg, remaining_kg = self.quantity(), "mass extracted");
        Ok(Material::with_parts(&self.ctx, comp, mass_kg, Some(original_id)))
    }

    /// Compositional extract: remove `amount` of `comp` (in `unit`),
    /// leaving the thresholded elementwise difference behind.
    ///
    /// The extracted material carries the requested composition and amount;
    /// the residual installed on `self` is the normalized difference, its
    /// quantity the compensated sum of the surviving entries.
    pub fn extract_comp(
        &mut self,
        comp: &Composition,
        amount: f64,
        unit: MassUnit,
        threshold: f64,
    ) -> Result<Material, CoreError> {
        let id = self.id();
        if amount < 0.0 {
            return Err(CoreError::value(format!(
                "cannot extract negative amount {amount} {unit} from material {id}"
            )));
        }
        let remainder = apply_threshold(&self.diff(comp, amount, unit), threshold)?;
        for (iso, amt) in &remainder {
            if *amt < 0.0 {
                return Err(CoreError::value(format!(
                    "material {id} has insufficient isotope {iso}: short by {} {unit}",
                    -amt
                )));
            }
        }
        let residual_amount = kahan_sum(remainder.values().copied());

        let extracted =
            Material::with_parts(&self.ctx, comp.clone(), unit.to_kg(amount), Some(self.original_id()));

        let mut state = self.state.borrow_mut();
        if let Ok(residual_comp) = Composition::from_map(Basis::Mass, remainder) {
            state.comp = residual_comp;
            state.quantity_kg = unit.to_kg(residual_amount);
        } else {
            // Everything was taken: keep the composition, zero the quantity.
            state.quantity_kg = 0.0;
        }
        tracing::debug!(id = %id, amount, unit = %unit, "composition extracted");
        Ok(extracted)
    }

    /// Per-isotope absolute amounts: fraction × total, in the requested
    /// basis and unit (moles for the atom basis).
    pub fn unnormalized(&self, basis: Basis, unit: MassUnit) -> BTreeMap<Iso, f64> {
        let state = self.state.borrow();
        match basis {
            Basis::Mass => {
                let scale = unit.from_kg(state.quantity_kg);
                state.comp.massify().iter().map(|(iso, f)| (iso, f * scale)).collect()
            }
            Basis::Atom => {
                let scale = self.moles();
                state.comp.atomify().iter().map(|(iso, f)| (iso, f * scale)).collect()
            }
        }
    }

    /// Elementwise difference between this material's unnormalized mass
    /// vector and `amount × comp`, covering isotopes present on either side.
    pub fn diff(&self, comp: &Composition, amount: f64, unit: MassUnit) -> BTreeMap<Iso, f64> {
        let mut result = self.unnormalized(Basis::Mass, unit);
        for (iso, frac) in comp.massify().iter() {
            let held = result.get(&iso).copied().unwrap_or(0.0);
            result.insert(iso, held - frac * amount);
        }
        result
    }

    /// First-order decay over `dt` timesteps. `dt = 0` stamps the update
    /// time and leaves the composition untouched.
    pub fn decay(&mut self, dt: TimeStep) {
        let now = self.ctx.now();
        decay_in_place(&mut self.state.borrow_mut(), dt, now);
    }

    /// Deep copy with a fresh id; provenance and timestamps carry over.
    pub fn clone_material(&self) -> Material {
        let state = self.state.borrow();
        let id = MaterialId(self.ctx.next_id());
        let copy = Rc::new(RefCell::new(MaterialState {
            id,
            original_id: state.original_id,
            quantity_kg: state.quantity_kg,
            comp: state.comp.clone(),
            last_update_time: state.last_update_time,
        }));
        self.ctx.enroll(&copy);
        tracing::debug!(id = %state.id, clone = %id, "material cloned");
        Material { state: copy, ctx: Rc::clone(&self.ctx) }
    }

    /// Composition comparison within `eps`.
    pub fn almost_equal(&self, other: &Material, eps: f64) -> bool {
        self.state.borrow().comp.almost_equal(&other.state.borrow().comp, eps)
    }
}

/// Drop entries whose magnitude is at or below `threshold`. A negative
/// threshold is a precondition violation.
pub fn apply_threshold(
    map: &BTreeMap<Iso, f64>,
    threshold: f64,
) -> Result<BTreeMap<Iso, f64>, CoreError> {
    if threshold < 0.0 {
        return Err(CoreError::value(format!("threshold {threshold} is negative")));
    }
    Ok(map
        .iter()
        .filter(|(_, v)| v.abs() > threshold)
        .map(|(iso, v)| (*iso, *v))
        .collect())
}

pub(crate) fn decay_in_place(state: &mut MaterialState, dt: TimeStep, now: TimeStep) {
    state.last_update_time = now;
    if dt <= 0 || state.quantity_kg <= 0.0 {
        return;
    }
    let seconds = dt as f64 * SECS_PER_TIMESTEP;
    let mass_comp = state.comp.massify();
    let survived: BTreeMap<Iso, f64> = mass_comp
        .iter()
        .map(|(iso, frac)| {
            let mass = frac * state.quantity_kg;
            let factor = match nuclide::decay_const(iso) {
                Some(lambda) => (-lambda * seconds).exp(),
                None => 1.0,
            };
            (iso, mass * factor)
        })
        .collect();
    let new_quantity = kahan_sum(survived.values().copied());
    if new_quantity <= 0.0 {
        state.quantity_kg = 0.0;
        return;
    }
    if let Ok(comp) = Composition::from_map(Basis::Mass, survived) {
        state.comp = comp;
        state.quantity_kg = new_quantity;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
