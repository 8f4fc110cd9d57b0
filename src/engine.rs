use crate::calendar::{Calendar, Time};
use crate::config::Config;
use crate::events::{World, give_birth};
use crate::model::{IndId, Individual};
use crate::population::Population;
use crate::report::{BestFit, Observation, Report, Score};
use anyhow::{Context, Result};
use rand_chacha::ChaCha12Rng;

/// Number of intervals the horizon is split into for observations.
pub const N_OBS: usize = 20;

/// Stage of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Draining,
    Terminated,
}

/// Simulation engine.
///
/// Holds the grid and parameters, the event calendar, the population and the random
/// number generator, and drives the event loop from the initial population to the
/// final report.
pub struct Engine {
    world: World,
    cal: Calendar,
    pop: Population,
    rng: ChaCha12Rng,

    time: Time,
    n_events: u64,
    phase: Phase,
}

impl Engine {
    /// Create a new `Engine` and seed its initial population.
    ///
    /// Every random draw of the run, including random grid features, comes from `rng`.
    pub fn new(cfg: &Config, mut rng: ChaCha12Rng) -> Result<Self> {
        let grid = cfg.build_grid(&mut rng);
        let world = World {
            grid,
            params: cfg.params(),
        };

        let mut engine = Self {
            world,
            cal: Calendar::new(),
            pop: Population::new(),
            rng,
            time: 0,
            n_events: 0,
            phase: Phase::Initializing,
        };

        for _ in 0..cfg.init.n_ind {
            give_birth(
                Individual::new(cfg.grid.start),
                0,
                &engine.world,
                &mut engine.cal,
                &mut engine.pop,
                &mut engine.rng,
            )
            .context("failed to seed initial population")?;
        }
        log::debug!(
            "seeded {} individuals with {} pending events on a grid with {} zones",
            engine.pop.n_members(),
            engine.cal.len(),
            engine.world.grid.zones().len()
        );

        Ok(engine)
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    pub fn population(&self) -> &Population {
        &self.pop
    }

    #[cfg(test)]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Run the simulation until the calendar empties or the horizon is passed.
    ///
    /// Observations are taken at the `N_OBS + 1` checkpoints `0, tau / N_OBS, ...`;
    /// those not reached by any event are taken from the final state.
    pub fn run(&mut self) -> Result<Report> {
        let horizon = self.world.params.horizon;
        let obs_interval = horizon / N_OBS as Time;
        let mut observations = Vec::with_capacity(N_OBS + 1);

        self.enter(Phase::Running);
        while let Some(event) = self.cal.pop() {
            if event.time > horizon {
                log::debug!("next event at t = {} is past the horizon", event.time);
                break;
            }
            self.time = event.time;

            while observations.len() <= N_OBS
                && self.time >= observations.len() as Time * obs_interval
            {
                let obs = self
                    .observe(observations.len(), obs_interval)
                    .context("failed to observe")?;
                observations.push(obs);
            }

            // Removed individuals keep their pending events; these are skipped.
            if !self.pop.contains(event.target) {
                log::trace!("skipped {event:?}: target was removed");
                continue;
            }

            log::trace!("dispatching {event:?}");
            event
                .kind
                .apply(
                    event.target,
                    self.time,
                    &self.world,
                    &mut self.cal,
                    &mut self.pop,
                    &mut self.rng,
                )
                .with_context(|| format!("failed to apply {event:?}"))?;
            self.n_events += 1;
        }
        if self.cal.is_empty() {
            log::debug!("calendar exhausted at t = {}", self.time);
        } else {
            log::debug!(
                "{} events still pending, the next at t = {:?}",
                self.cal.len(),
                self.cal.peek_time()
            );
        }

        self.enter(Phase::Draining);
        while observations.len() <= N_OBS {
            let obs = self
                .observe(observations.len(), obs_interval)
                .context("failed to observe")?;
            observations.push(obs);
        }

        let best_fit = self.final_best_fit().context("failed to select best fit")?;
        self.enter(Phase::Terminated);

        Ok(Report {
            observations,
            best_fit,
        })
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Best fit individual, if any individual was ever created.
    pub fn best_fit(&self) -> Result<Option<IndId>> {
        let params = &self.world.params;
        let best = self
            .pop
            .best_fit(&self.world.grid, params.dest, params.k)?;
        Ok(best)
    }

    fn observe(&self, idx: usize, obs_interval: Time) -> Result<Observation> {
        let grid = &self.world.grid;
        let params = &self.world.params;

        let (hit, best_path, score) = match self.best_fit()? {
            Some(id) => {
                let ind = self.pop.get(id);
                let hit = ind.pos() == params.dest;
                let score = if hit {
                    Score::Cost(ind.cost(grid)?)
                } else {
                    Score::Comfort(ind.comfort(grid, params.dest, params.k)?)
                };
                (hit, ind.path().to_vec(), score)
            }
            None => (false, Vec::new(), Score::Cost(0)),
        };

        // Events at exactly the checkpoint time have not been applied yet.
        let time = idx as Time * obs_interval;
        let obs = Observation {
            idx,
            time,
            n_events: self.n_events,
            pop_size: self.pop.all_alive(time).len(),
            hit,
            best_path,
            score,
        };

        let progress = 100.0 * idx as f64 / N_OBS as f64;
        log::info!(
            "completed {progress:06.2}% (t = {}, {} events, {} alive)",
            obs.time,
            obs.n_events,
            obs.pop_size
        );

        Ok(obs)
    }

    fn final_best_fit(&self) -> Result<BestFit> {
        let best_fit = match self.best_fit()? {
            Some(id) => {
                let ind = self.pop.get(id);
                BestFit {
                    path: ind.path().to_vec(),
                    cost: ind.cost(&self.world.grid)?,
                }
            }
            None => BestFit {
                path: Vec::new(),
                cost: 0,
            },
        };
        Ok(best_fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{Event, EventKind};
    use crate::config::{GridConfig, InitConfig, ModelConfig, OutputConfig};
    use crate::grid::{Coord, CostZone};
    use rand::SeedableRng;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    fn config(n_rows: usize, n_cols: usize, horizon: u64, n_ind: usize) -> Config {
        Config {
            grid: GridConfig {
                n_rows,
                n_cols,
                start: c(1, 1),
                dest: c(n_rows as i32, n_cols as i32),
                obstacles: Vec::new(),
                zones: Vec::new(),
                n_random_zones: 0,
                n_random_obstacles: 0,
            },
            model: ModelConfig {
                horizon,
                k: 1,
                death_mean: 10.0,
                move_mean: 1.0,
                rep_mean: 30.0,
                epidemics: false,
            },
            init: InitConfig {
                n_ind,
                n_ind_max: 1000,
            },
            output: OutputConfig::default(),
        }
    }

    fn run(cfg: &Config, seed: u64) -> (Engine, Report) {
        let mut engine = Engine::new(cfg, ChaCha12Rng::seed_from_u64(seed)).unwrap();
        let report = engine.run().unwrap();
        (engine, report)
    }

    fn assert_valid_path(path: &[Coord], n_rows: i32, n_cols: i32) {
        assert!(!path.is_empty());
        for c in path {
            assert!((1..=n_rows).contains(&c.x) && (1..=n_cols).contains(&c.y));
        }
        for pair in path.windows(2) {
            assert_eq!(pair[0].dist(pair[1]), 1);
        }
        let mut sorted = path.to_vec();
        sorted.sort_by_key(|c| (c.x, c.y));
        sorted.dedup();
        assert_eq!(sorted.len(), path.len(), "path has a repeated cell");
    }

    #[test]
    fn single_individual_stays_on_grid() {
        let cfg = config(5, 5, 50, 1);
        for seed in 0..10 {
            let (engine, report) = run(&cfg, seed);
            for (_, ind) in engine.population().iter_all() {
                assert_valid_path(ind.path(), 5, 5);
            }
            assert_eq!(report.observations.len(), N_OBS + 1);
            assert_eq!(engine.phase(), Phase::Terminated);
        }
    }

    #[test]
    fn observations_are_ordered_checkpoints() {
        let cfg = config(8, 8, 100, 5);
        let (engine, report) = run(&cfg, 3);
        for (i, obs) in report.observations.iter().enumerate() {
            assert_eq!(obs.idx, i);
            assert_eq!(obs.time, i as Time * 5);
            assert!(obs.n_events <= engine.n_events());
        }
        for pair in report.observations.windows(2) {
            assert!(pair[0].n_events <= pair[1].n_events);
        }
        assert!(engine.time() <= 100);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut cfg = config(10, 10, 200, 4);
        cfg.grid.n_random_zones = 3;
        cfg.grid.n_random_obstacles = 5;
        let (_, report_a) = run(&cfg, 17);
        let (_, report_b) = run(&cfg, 17);
        assert_eq!(report_a, report_b);
    }

    #[test]
    fn final_best_fit_matches_population() {
        let cfg = config(6, 6, 300, 6);
        let (engine, report) = run(&cfg, 8);
        let id = engine.best_fit().unwrap().unwrap();
        let ind = engine.population().get(id);
        assert_eq!(report.best_fit.path, ind.path());
        assert_eq!(report.best_fit.cost, ind.cost(&engine.world().grid).unwrap());

        let any_hit = engine
            .population()
            .iter_all()
            .any(|(_, ind)| ind.pos() == c(6, 6));
        assert_eq!(ind.pos() == c(6, 6), any_hit);
    }

    #[test]
    fn empty_calendar_still_yields_every_observation() {
        // Everyone dies long after the horizon and never gets to act.
        let mut cfg = config(3, 3, 20, 2);
        cfg.model.move_mean = 1e9;
        cfg.model.rep_mean = 1e9;
        cfg.model.death_mean = 1e9;
        let (engine, report) = run(&cfg, 1);
        assert_eq!(engine.n_events(), 0);
        assert_eq!(report.observations.len(), N_OBS + 1);
        for obs in &report.observations {
            assert_eq!(obs.pop_size, 2);
            assert_eq!(obs.best_path, vec![c(1, 1)]);
            assert!(matches!(obs.score, Score::Comfort(_)));
        }
        assert_eq!(report.best_fit.cost, 0);
    }

    #[test]
    fn inflated_zone_cost_shows_in_best_fit() {
        // A single row fully covered by a zone: every edge costs 5.
        let mut cfg = config(1, 4, 2000, 60);
        cfg.grid.zones.push(CostZone::new(c(1, 1), c(1, 4), 5));
        cfg.model.death_mean = 50.0;
        cfg.model.rep_mean = 1e9;

        let (engine, report) = run(&cfg, 12);
        let grid = &engine.world().grid;
        for y in 1..4 {
            assert_eq!(grid.edge_cost(c(1, y), c(1, y + 1)), Ok(5));
        }

        // The only simple path from the start to the destination.
        let full_path = vec![c(1, 1), c(1, 2), c(1, 3), c(1, 4)];
        assert_eq!(report.best_fit.path, full_path);
        assert_eq!(report.best_fit.cost, 15);
        for obs in report.observations.iter().filter(|obs| obs.hit) {
            assert_eq!(obs.best_path, full_path);
            assert_eq!(obs.score, Score::Cost(15));
        }
    }

    #[test]
    fn epidemics_keep_population_bounded() {
        let mut cfg = config(6, 6, 400, 10);
        cfg.model.epidemics = true;
        cfg.model.death_mean = 1000.0;
        cfg.model.rep_mean = 1.0;
        cfg.init.n_ind_max = 30;
        let (engine, _) = run(&cfg, 5);
        // Each reproduction adds one individual before the cull.
        assert!(engine.population().all_alive(engine.time()).len() <= 31);
    }

    /// Engine with one individual at (1, 1) dying at `death` and nothing scheduled.
    fn lone_individual(death: Time) -> Engine {
        let mut cfg = config(5, 5, 100, 1);
        cfg.model.move_mean = 1e9;
        cfg.model.rep_mean = 1e9;
        cfg.model.death_mean = 1e9;
        let mut engine = Engine::new(&cfg, ChaCha12Rng::seed_from_u64(0)).unwrap();
        engine.cal = Calendar::new();
        engine.pop.get_mut(IndId(0)).set_death(death);
        engine
    }

    #[test]
    fn pop_size_is_counted_at_each_checkpoint() {
        // Death at t = 7 falls between the checkpoints at t = 5 and t = 10.
        let mut engine = lone_individual(7);
        engine.cal.push(Event::new(7, IndId(0), EventKind::Death));
        let report = engine.run().unwrap();

        let pop_sizes: Vec<_> = report
            .observations
            .iter()
            .map(|obs| (obs.time, obs.pop_size))
            .collect();
        assert_eq!(pop_sizes[0], (0, 1));
        assert_eq!(pop_sizes[1], (5, 1));
        for &(time, pop_size) in &pop_sizes[2..] {
            assert_eq!(pop_size, 0, "alive at t = {time}");
        }
        assert_eq!(engine.n_events(), 1);
    }

    #[test]
    fn events_of_removed_individuals_are_skipped() {
        let mut engine = lone_individual(2);
        engine.cal.push(Event::new(2, IndId(0), EventKind::Death));
        engine.cal.push(Event::new(3, IndId(0), EventKind::Move));
        engine.cal.push(Event::new(4, IndId(0), EventKind::Reproduce));
        engine.cal.push(Event::new(6, IndId(0), EventKind::Move));
        let report = engine.run().unwrap();

        assert_eq!(engine.n_events(), 1);
        assert_eq!(engine.population().n_created(), 1);
        assert_eq!(engine.population().get(IndId(0)).path(), [c(1, 1)]);
        assert_eq!(report.last().map(|obs| obs.n_events), Some(1));
        assert_eq!(report.best_fit.path, vec![c(1, 1)]);
    }

    #[test]
    fn individual_removed_before_run_never_acts() {
        let mut engine = lone_individual(50);
        engine.cal.push(Event::new(1, IndId(0), EventKind::Move));
        engine.cal.push(Event::new(1, IndId(0), EventKind::Reproduce));
        assert!(engine.pop.remove(IndId(0)));
        let report = engine.run().unwrap();

        assert_eq!(engine.n_events(), 0);
        assert_eq!(engine.population().n_created(), 1);
        assert_eq!(engine.population().get(IndId(0)).path(), [c(1, 1)]);
        assert!(report.observations.iter().all(|obs| obs.pop_size == 0));
    }
}
