//! FIFO material inventory with capacity and removal-discipline policy.
//!
//! Materials are stored as distinct objects and never merged; removal
//! always proceeds oldest-first. The policy only matters for `remove_qty`:
//! `Exact` splits the final item to hit the request, `Over`/`Under` round
//! up or down to whole items.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::arithmetic::kahan_sum;
use crate::error::CoreError;
use crate::material::Material;
use crate::EPS_RSRC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    /// Split the last item so the batch totals the request exactly.
    Exact,
    /// Never split; return the smallest prefix totalling ≥ the request.
    Over,
    /// Never split; return the largest prefix totalling ≤ the request.
    Under,
}

/// Ordered inventory of materials. Defaults to zero finite capacity and
/// the `Exact` removal policy.
pub struct MaterialStore {
    /// `None` means unlimited.
    capacity: Option<f64>,
    policy: RemovalPolicy,
    mats: VecDeque<Material>,
}

impl Default for MaterialStore {
    fn default() -> Self {
        MaterialStore { capacity: Some(0.0), policy: RemovalPolicy::Exact, mats: VecDeque::new() }
    }
}

impl MaterialStore {
    pub fn new() -> Self {
        MaterialStore::default()
    }

    /// Maximum quantity this store can hold; `None` when unlimited.
    pub fn capacity(&self) -> Option<f64> {
        self.capacity
    }

    /// Total quantity (kg) currently held.
    pub fn inventory(&self) -> f64 {
        kahan_sum(self.mats.iter().map(Material::quantity))
    }

    /// Number of material objects held.
    pub fn count(&self) -> usize {
        self.mats.len()
    }

    /// Remaining room; `None` when unlimited.
    pub fn space(&self) -> Option<f64> {
        self.capacity.map(|c| (c - self.inventory()).max(0.0))
    }

    pub fn unlimited(&self) -> bool {
        self.capacity.is_none()
    }

    pub fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    /// True when `remove_qty` may split items.
    pub fn splitable(&self) -> bool {
        self.policy == RemovalPolicy::Exact
    }

    /// True when unsplitable removal rounds up past the request.
    pub fn over_qty_on_remove(&self) -> bool {
        self.policy == RemovalPolicy::Over
    }

    /// Cap the store at `cap` kg. Fails when the current inventory already
    /// exceeds the new capacity.
    pub fn set_capacity(&mut self, cap: f64) -> Result<(), CoreError> {
        let inventory = self.inventory();
        if cap + EPS_RSRC < inventory {
            return Err(CoreError::OverCapacity { requested: inventory, capacity: cap });
        }
        self.capacity = Some(cap);
        Ok(())
    }

    pub fn make_unlimited(&mut self) {
        self.capacity = None;
    }

    pub fn make_limited(&mut self, cap: f64) -> Result<(), CoreError> {
        self.set_capacity(cap)
    }

    pub fn make_splitable(&mut self) {
        self.policy = RemovalPolicy::Exact;
    }

    pub fn make_not_splitable_over(&mut self) {
        self.policy = RemovalPolicy::Over;
    }

    pub fn make_not_splitable_under(&mut self) {
        self.policy = RemovalPolicy::Under;
    }

    fn check_fits(&self, added: f64) -> Result<(), CoreError> {
        if let Some(cap) = self.capacity {
            let requested = self.inventory() + added;
            if requested > cap + EPS_RSRC {
                return Err(CoreError::OverCapacity { requested, capacity: cap });
            }
        }
        Ok(())
    }

    /// Append one material. On failure the rejected material is handed
    /// back alongside the error so no quantity is silently dropped.
    pub fn add_one(&mut self, mat: Material) -> Result<(), (CoreError, Material)> {
        if let Err(err) = self.check_fits(mat.quantity()) {
            return Err((err, mat));
        }
        tracing::debug!(id = %mat.id(), quantity_kg = mat.quantity(), "material stored");
        self.mats.push_back(mat);
        Ok(())
    }

    /// Append a batch, all-or-nothing: if the batch would exceed capacity
    /// the store is unchanged and the batch is handed back.
    pub fn add_all(&mut self, mats: Vec<Material>) -> Result<(), (CoreError, Vec<Material>)> {
        let added = kahan_sum(mats.iter().map(Material::quantity));
        if let Err(err) = self.check_fits(added) {
            return Err((err, mats));
        }
        self.mats.extend(mats);
        Ok(())
    }

    /// Remove a batch totalling `qty` according to the active policy,
    /// oldest first. See [`RemovalPolicy`] for the rounding behavior.
    pub fn remove_qty(&mut self, qty: f64) -> Result<Vec<Material>, CoreError> {
        match self.policy {
            RemovalPolicy::Exact => self.remove_exact(qty),
            RemovalPolicy::Over => self.remove_over(qty),
            RemovalPolicy::Under => Ok(self.remove_under(qty)),
        }
    }

    fn check_available(&self, qty: f64) -> Result<(), CoreError> {
        let available = self.inventory();
        if qty > available + EPS_RSRC {
            return Err(CoreError::NegQty { requested: qty, available });
        }
        Ok(())
    }

    fn remove_exact(&mut self, qty: f64) -> Result<Vec<Material>, CoreError> {
        self.check_available(qty)?;
        let mut removed = Vec::new();
        let mut left = qty;
        while left > EPS_RSRC {
            let Some(front) = self.mats.front_mut() else { break };
            if front.quantity() <= left + EPS_RSRC {
                left -= front.quantity();
                // front_mut proved non-emptiness
                if let Some(mat) = self.mats.pop_front() {
                    removed.push(mat);
                }
            } else {
                removed.push(front.extract(left)?);
                left = 0.0;
            }
        }
        Ok(removed)
    }

    fn remove_over(&mut self, qty: f64) -> Result<Vec<Material>, CoreError> {
        self.check_available(qty)?;
        let mut removed = Vec::new();
        let mut total = 0.0;
        while total + EPS_RSRC < qty {
            let Some(mat) = self.mats.pop_front() else { break };
            total += mat.quantity();
            removed.push(mat);
        }
        Ok(removed)
    }

    fn remove_under(&mut self, qty: f64) -> Vec<Material> {
        let mut removed = Vec::new();
        let mut total = 0.0;
        while let Some(front) = self.mats.front() {
            if total + front.quantity() > qty + EPS_RSRC {
                break;
            }
            total += front.quantity();
            if let Some(mat) = self.mats.pop_front() {
                removed.push(mat);
            }
        }
        removed
    }

    /// Remove the `num` oldest materials, unsplit.
    pub fn remove_num(&mut self, num: usize) -> Result<Vec<Material>, CoreError> {
        if num > self.mats.len() {
            return Err(CoreError::NegQty {
                requested: num as f64,
                available: self.mats.len() as f64,
            });
        }
        Ok(self.mats.drain(..num).collect())
    }

    /// Remove the single oldest material.
    pub fn remove_one(&mut self) -> Result<Material, CoreError> {
        self.mats.pop_front().ok_or(CoreError::NegQty { requested: 1.0, available: 0.0 })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
