use crate::calendar::Time;
use crate::grid::{Coord, Grid, GridError};
use crate::model::{IndId, Individual};
use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

/// Number of fittest individuals an epidemic always spares.
pub const N_SPARED: usize = 5;

/// Every individual ever created, together with the set of current members.
///
/// Removing an individual only revokes its membership, so it can still be
/// inspected (and selected as best fit) afterwards.
#[derive(Debug, Default)]
pub struct Population {
    ind_vec: Vec<Individual>,
    is_member: Vec<bool>,
    n_members: usize,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ind: Individual) -> IndId {
        let id = IndId(self.ind_vec.len());
        self.ind_vec.push(ind);
        self.is_member.push(true);
        self.n_members += 1;
        id
    }

    /// Revoke the membership of `id`. Returns whether it was a member.
    pub fn remove(&mut self, id: IndId) -> bool {
        let was_member = std::mem::replace(&mut self.is_member[id.0], false);
        if was_member {
            self.n_members -= 1;
        }
        was_member
    }

    pub fn contains(&self, id: IndId) -> bool {
        self.is_member.get(id.0).copied().unwrap_or(false)
    }

    pub fn get(&self, id: IndId) -> &Individual {
        &self.ind_vec[id.0]
    }

    pub fn get_mut(&mut self, id: IndId) -> &mut Individual {
        &mut self.ind_vec[id.0]
    }

    pub fn n_members(&self) -> usize {
        self.n_members
    }

    pub fn n_created(&self) -> usize {
        self.ind_vec.len()
    }

    /// Every individual ever created, members or not, in creation order.
    pub fn iter_all(&self) -> impl Iterator<Item = (IndId, &Individual)> {
        self.ind_vec.iter().enumerate().map(|(i, ind)| (IndId(i), ind))
    }

    /// Members whose death time lies after `now`, in creation order.
    pub fn all_alive(&self, now: Time) -> Vec<IndId> {
        self.iter_all()
            .filter(|&(id, ind)| self.contains(id) && ind.death() > now)
            .map(|(id, _)| id)
            .collect()
    }

    /// The `n` alive individuals with the highest comfort, in descending order.
    ///
    /// Ties keep creation order.
    pub fn top_k(
        &self,
        n: usize,
        now: Time,
        grid: &Grid,
        dest: Coord,
        k: u32,
    ) -> Result<Vec<IndId>, GridError> {
        let mut ranked = Vec::new();
        for id in self.all_alive(now) {
            ranked.push((id, self.get(id).comfort(grid, dest, k)?));
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().take(n).map(|(id, _)| id).collect())
    }

    /// Cull the alive population.
    ///
    /// Does nothing with fewer than `N_SPARED + 1` alive individuals. Otherwise the
    /// `N_SPARED` most comfortable survive, and every other alive individual survives
    /// with probability equal to its comfort, so comfortable individuals are more
    /// likely to survive. Returns the number of removed individuals.
    pub fn apply_epidemic<R: Rng>(
        &mut self,
        now: Time,
        grid: &Grid,
        dest: Coord,
        k: u32,
        rng: &mut R,
    ) -> Result<usize> {
        let alive = self.all_alive(now);
        if alive.len() <= N_SPARED {
            return Ok(0);
        }

        let spared = self
            .top_k(N_SPARED, now, grid, dest, k)
            .context("failed to rank individuals")?;

        let mut n_removed = 0;
        for id in alive {
            if spared.contains(&id) {
                continue;
            }
            let phi = self.get(id).comfort(grid, dest, k)?;
            let survival_dist = Bernoulli::new(phi)?;
            if !survival_dist.sample(rng) {
                self.remove(id);
                n_removed += 1;
            }
        }

        Ok(n_removed)
    }

    /// Best fit individual among all those ever created.
    ///
    /// Among individuals standing on `dest`, the one with the cheapest path;
    /// if none reached it, the most comfortable one. Ties keep creation order.
    pub fn best_fit(&self, grid: &Grid, dest: Coord, k: u32) -> Result<Option<IndId>, GridError> {
        let mut best_hit: Option<(IndId, u32)> = None;
        for (id, ind) in self.iter_all().filter(|(_, ind)| ind.pos() == dest) {
            let cost = ind.cost(grid)?;
            if best_hit.is_none_or(|(_, min_cost)| cost < min_cost) {
                best_hit = Some((id, cost));
            }
        }
        if let Some((id, _)) = best_hit {
            return Ok(Some(id));
        }

        let mut best_comfort: Option<(IndId, f64)> = None;
        for (id, ind) in self.iter_all() {
            let phi = ind.comfort(grid, dest, k)?;
            if best_comfort.is_none_or(|(_, max_phi)| phi > max_phi) {
                best_comfort = Some((id, phi));
            }
        }
        Ok(best_comfort.map(|(id, _)| id))
    }
}
