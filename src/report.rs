//! Observation records produced by a simulation run.

use crate::grid::Coord;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Score of the best fit individual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Score {
    /// Path cost, when the destination has been hit.
    Cost(u32),
    /// Comfort, otherwise.
    Comfort(f64),
}

/// Snapshot of the simulation at one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Checkpoint index, from 0.
    pub idx: usize,
    /// Checkpoint time.
    pub time: u64,
    /// Number of events realized so far.
    pub n_events: u64,
    /// Number of alive individuals.
    pub pop_size: usize,
    /// Whether the best fit individual stands on the destination.
    pub hit: bool,
    /// Path of the best fit individual, empty if there is none.
    pub best_path: Vec<Coord>,
    pub score: Score,
}

/// Best fit individual at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestFit {
    pub path: Vec<Coord>,
    pub cost: u32,
}

/// Everything a run reports: one observation per checkpoint, then the best fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub observations: Vec<Observation>,
    pub best_fit: BestFit,
}

impl Report {
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let report = decode::from_read(&mut reader).context("failed to deserialize report")?;
        Ok(report)
    }

    pub fn save_text<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        std::fs::write(file, self.to_string()).with_context(|| format!("failed to write {file:?}"))
    }

    /// Last observation, taken when the run ended.
    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

struct PathFmt<'a>(&'a [Coord]);

impl fmt::Display for PathFmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cost(cost) => write!(f, "{cost}"),
            Score::Comfort(phi) => write!(f, "{phi:.6}"),
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Observation {}:", self.idx)?;
        writeln!(f, "Present time: {}", self.time)?;
        writeln!(f, "Number of realized events: {}", self.n_events)?;
        writeln!(f, "Population size: {}", self.pop_size)?;
        let hit = if self.hit { "yes" } else { "no" };
        writeln!(f, "Final point has been hit: {hit}")?;
        writeln!(f, "Path of the best fit individual: {}", PathFmt(&self.best_path))?;
        writeln!(f, "Cost/Comfort: {}", self.score)
    }
}

impl fmt::Display for BestFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Best fit individual: {} with cost {}", PathFmt(&self.path), self.cost)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for obs in &self.observations {
            writeln!(f, "{obs}")?;
        }
        writeln!(f, "{}", self.best_fit)
    }
}
