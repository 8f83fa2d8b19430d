//! Simulation context: time source and the live-material registry.
//!
//! The registry replaces process-global state. Every [`crate::Material`]
//! enrolls itself at construction; `decay_all` walks the survivors.
//! Independent contexts can run side by side in one process — materials
//! never cross contexts.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rand::Rng;
use uuid::Uuid;

use crate::material::{self, MaterialState};

/// Integer simulation timestep.
pub type TimeStep = i64;

pub struct SimulationContext {
    time: Cell<TimeStep>,
    next_material_id: Cell<u64>,
    registry: RefCell<Vec<Weak<RefCell<MaterialState>>>>,
}

impl SimulationContext {
    pub fn new() -> Rc<Self> {
        Rc::new(SimulationContext {
            time: Cell::new(0),
            next_material_id: Cell::new(1),
            registry: RefCell::new(Vec::new()),
        })
    }

    /// Current timestep.
    pub fn now(&self) -> TimeStep {
        self.time.get()
    }

    pub fn set_time(&self, t: TimeStep) {
        self.time.set(t);
    }

    /// Step the clock forward by one and return the new time.
    pub fn advance(&self) -> TimeStep {
        let t = self.time.get() + 1;
        self.time.set(t);
        t
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.next_material_id.get();
        self.next_material_id.set(id + 1);
        id
    }

    pub(crate) fn enroll(&self, state: &Rc<RefCell<MaterialState>>) {
        self.registry.borrow_mut().push(Rc::downgrade(state));
    }

    /// Number of live materials enrolled in this context.
    pub fn material_count(&self) -> usize {
        self.registry.borrow().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Decay every live material from its `last_update_time` up to `now`,
    /// pruning registry entries whose material has been dropped.
    pub fn decay_all(&self) {
        let now = self.now();
        let mut registry = self.registry.borrow_mut();
        registry.retain(|weak| weak.strong_count() > 0);
        tracing::debug!(count = registry.len(), time = now, "decaying all materials");
        for weak in registry.iter() {
            if let Some(state) = weak.upgrade() {
                let mut state = state.borrow_mut();
                let dt = now - state.last_update_time;
                material::decay_in_place(&mut state, dt, now);
            }
        }
    }
}

/// Deterministic v4-format UUID from a seeded RNG, for reproducible
/// simulation ids in tests and batch runs.
pub fn generate_sim_id(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
