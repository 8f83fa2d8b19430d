//! `fc_core` — conserved isotopic materials for fuel-cycle simulation.
//!
//! No IO, no network. Simulation time comes from the owning
//! [`SimulationContext`]; everything else is plain arithmetic on
//! isotope-resolved compositions.

mod arithmetic;
mod composition;
mod context;
mod error;
mod material;
pub mod nuclide;
mod store;

pub use arithmetic::kahan_sum;
pub use composition::{Basis, Composition, CompositionBuilder};
pub use context::{generate_sim_id, SimulationContext, TimeStep};
pub use error::CoreError;
pub use material::{apply_threshold, MassUnit, Material, MaterialId};
pub use store::{MaterialStore, RemovalPolicy};

/// Quantities at or below this many kilograms are treated as zero when
/// guarding divisions, splits, and capacity checks.
pub const EPS_RSRC: f64 = 1e-6;
