use crate::report::Report;
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Quantity accumulated over the reports of several runs.
pub trait Obs {
    fn update(&mut self, report: &Report) -> Result<()>;
    fn report(&self) -> ObsReport;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsReport {
    pub name: String,
    pub stats: AccumulatorReport,
}

/// Whether the destination was hit by the end of the run.
pub struct HitFrac {
    acc: Accumulator,
}

impl Obs for HitFrac {
    fn update(&mut self, report: &Report) -> Result<()> {
        let last = report.last().context("report has no observations")?;
        self.acc.add(if last.hit { 1.0 } else { 0.0 });
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "hit_frac".into(),
            stats: self.acc.report(),
        }
    }
}

/// Final best fit cost, over the runs that hit the destination.
pub struct HitCost {
    acc: Accumulator,
}

impl Obs for HitCost {
    fn update(&mut self, report: &Report) -> Result<()> {
        let last = report.last().context("report has no observations")?;
        if last.hit {
            self.acc.add(report.best_fit.cost as f64);
        }
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "hit_cost".into(),
            stats: self.acc.report(),
        }
    }
}

/// Alive population at the last checkpoint.
pub struct FinalPopSize {
    acc: Accumulator,
}

impl Obs for FinalPopSize {
    fn update(&mut self, report: &Report) -> Result<()> {
        let last = report.last().context("report has no observations")?;
        self.acc.add(last.pop_size as f64);
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "final_pop_size".into(),
            stats: self.acc.report(),
        }
    }
}

/// Realized events over the whole run.
pub struct NEvents {
    acc: Accumulator,
}

impl Obs for NEvents {
    fn update(&mut self, report: &Report) -> Result<()> {
        let last = report.last().context("report has no observations")?;
        self.acc.add(last.n_events as f64);
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "n_events".into(),
            stats: self.acc.report(),
        }
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(HitFrac {
                acc: Accumulator::new(),
            }),
            Box::new(HitCost {
                acc: Accumulator::new(),
            }),
            Box::new(FinalPopSize {
                acc: Accumulator::new(),
            }),
            Box::new(NEvents {
                acc: Accumulator::new(),
            }),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_report(&mut self, report: &Report) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(report).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn results(&self) -> Vec<ObsReport> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self.results()).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
