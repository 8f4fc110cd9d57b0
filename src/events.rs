use crate::calendar::{Calendar, Event, EventKind, Time};
use crate::grid::{Coord, Grid, GridError};
use crate::model::{IndId, Individual};
use crate::population::Population;
use anyhow::{Context, Result};
use rand::{Rng, seq::IndexedRandom};
use rand_distr::{Distribution, Exp};

/// Model parameters read by the event strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Destination cell.
    pub dest: Coord,
    /// Comfort exponent.
    pub k: u32,
    /// Time after which nothing is scheduled.
    pub horizon: Time,

    /// Base mean of the time until death.
    pub death_mean: f64,
    /// Base mean of the time between moves.
    pub move_mean: f64,
    /// Base mean of the time between reproductions.
    pub rep_mean: f64,

    /// Alive population above which an epidemic strikes, if `epidemics` is set.
    pub n_ind_max: usize,
    pub epidemics: bool,
}

/// Read-only part of the simulation shared by every event.
#[derive(Debug, Clone)]
pub struct World {
    pub grid: Grid,
    pub params: Params,
}

impl World {
    pub fn comfort(&self, ind: &Individual) -> Result<f64, GridError> {
        ind.comfort(&self.grid, self.params.dest, self.params.k)
    }

    /// Draw the time until the next event of `ind`.
    ///
    /// Exponentially distributed with mean `(1 - ln(phi)) * mean`, rounded up,
    /// where `phi` is the comfort of `ind`: comfortable individuals act sooner.
    pub fn next_interval<R: Rng>(&self, mean: f64, ind: &Individual, rng: &mut R) -> Result<Time> {
        let phi = self.comfort(ind)?;
        let lambda = 1.0 / ((1.0 - phi.ln()) * mean);
        let interval_dist = Exp::new(lambda).context("failed to create interval distribution")?;
        Ok(interval_dist.sample(rng).ceil() as Time)
    }
}

/// Push `event` only if it happens before `death` and not after `horizon`.
///
/// Returns whether the event was scheduled.
pub fn schedule_within_life(cal: &mut Calendar, event: Event, death: Time, horizon: Time) -> bool {
    if event.time < death && event.time <= horizon {
        cal.push(event);
        true
    } else {
        false
    }
}

/// Add `ind` to the population, born at `now`, and schedule its first events.
///
/// Draws its death time, then its first reproduction and move. Events at or after
/// its death, or after the horizon, are not scheduled.
pub fn give_birth<R: Rng>(
    mut ind: Individual,
    now: Time,
    world: &World,
    cal: &mut Calendar,
    pop: &mut Population,
    rng: &mut R,
) -> Result<IndId> {
    let params = &world.params;

    let death = now.saturating_add(world.next_interval(params.death_mean, &ind, rng)?);
    ind.set_birth(now);
    ind.set_death(death);

    let t_rep = now.saturating_add(world.next_interval(params.rep_mean, &ind, rng)?);
    let t_move = now.saturating_add(world.next_interval(params.move_mean, &ind, rng)?);

    let id = pop.add(ind);
    if now > params.horizon {
        return Ok(id);
    }

    if death <= params.horizon {
        cal.push(Event::new(death, id, EventKind::Death));
    }
    let rep_event = Event::new(t_rep, id, EventKind::Reproduce);
    schedule_within_life(cal, rep_event, death, params.horizon);
    let move_event = Event::new(t_move, id, EventKind::Move);
    schedule_within_life(cal, move_event, death, params.horizon);

    Ok(id)
}

impl EventKind {
    /// Apply this event to `target` at time `now`.
    pub fn apply<R: Rng>(
        self,
        target: IndId,
        now: Time,
        world: &World,
        cal: &mut Calendar,
        pop: &mut Population,
        rng: &mut R,
    ) -> Result<()> {
        match self {
            EventKind::Move => apply_move(target, now, world, cal, pop, rng),
            EventKind::Death => {
                pop.remove(target);
                let ind = pop.get(target);
                log::trace!(
                    "{target:?} (parent {:?}) died at t = {now}, aged {}",
                    ind.parent(),
                    now.saturating_sub(ind.birth())
                );
                Ok(())
            }
            EventKind::Reproduce => apply_reproduce(target, now, world, cal, pop, rng),
        }
    }
}

/// Schedule the next `kind` event of `target` after `now`, drawn with base `mean`.
fn reschedule<R: Rng>(
    target: (IndId, &Individual),
    kind: EventKind,
    mean: f64,
    now: Time,
    world: &World,
    cal: &mut Calendar,
    rng: &mut R,
) -> Result<()> {
    let (id, ind) = target;
    let horizon = world.params.horizon;
    if now >= ind.death() || now >= horizon {
        return Ok(());
    }
    let time = now.saturating_add(world.next_interval(mean, ind, rng)?);
    schedule_within_life(cal, Event::new(time, id, kind), ind.death(), horizon);
    Ok(())
}

fn apply_move<R: Rng>(
    target: IndId,
    now: Time,
    world: &World,
    cal: &mut Calendar,
    pop: &mut Population,
    rng: &mut R,
) -> Result<()> {
    let moves = world.grid.valid_moves(pop.get(target).pos());
    let Some(&next) = moves.choose(rng) else {
        return Ok(());
    };

    let ind = pop.get_mut(target);
    ind.move_to(next);

    let mean = world.params.move_mean;
    reschedule((target, &*ind), EventKind::Move, mean, now, world, cal, rng)
        .context("failed to reschedule move")
}

fn apply_reproduce<R: Rng>(
    target: IndId,
    now: Time,
    world: &World,
    cal: &mut Calendar,
    pop: &mut Population,
    rng: &mut R,
) -> Result<()> {
    let params = &world.params;
    let parent = pop.get(target);

    reschedule((target, parent), EventKind::Reproduce, params.rep_mean, now, world, cal, rng)
        .context("failed to reschedule reproduction")?;

    let child = parent.reproduce(target, &world.grid, params.dest, params.k)?;
    give_birth(child, now, world, cal, pop, rng).context("failed to give birth")?;

    if params.epidemics {
        let n_alive = pop.all_alive(now).len();
        if n_alive > params.n_ind_max {
            let n_removed = pop
                .apply_epidemic(now, &world.grid, params.dest, params.k, rng)
                .context("failed to apply epidemic")?;
            log::info!("epidemic at t = {now}: {n_removed} of {n_alive} individuals removed");
        }
    }

    Ok(())
}
