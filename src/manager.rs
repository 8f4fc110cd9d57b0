use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::report::Report;
use anyhow::{Context, Result, bail};
use glob::glob;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory: one config, any number of runs.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg_file = Self::config_file(&sim_dir)?;
        let cfg = Config::from_file(&cfg_file)
            .with_context(|| format!("failed to load {cfg_file:?}"))?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    fn config_file(sim_dir: &Path) -> Result<PathBuf> {
        for name in ["config.toml", "config.txt"] {
            let file = sim_dir.join(name);
            if file.is_file() {
                return Ok(file);
            }
        }
        bail!("no config.toml or config.txt in {sim_dir:?}");
    }

    pub fn create_run(&self, seed: Option<u64>) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let rng = match seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let mut engine = Engine::new(&self.cfg, rng).context("failed to construct engine")?;
        let report = engine.run().context("failed to run simulation")?;
        log::info!(
            "finished at t = {} after {} events, {} individuals created",
            engine.time(),
            engine.n_events(),
            engine.population().n_created()
        );
        log::info!("{}", report.best_fit);

        let report_file = self.report_file(run_idx);
        report
            .save(&report_file)
            .with_context(|| format!("failed to save {report_file:?}"))?;
        if self.cfg.output.write_text {
            let text_file = self.text_report_file(run_idx);
            report
                .save_text(&text_file)
                .with_context(|| format!("failed to save {text_file:?}"))?;
        }

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        if n_runs == 0 {
            bail!("no runs to analyze in {:?}", self.sim_dir);
        }

        let mut analyzer = Analyzer::new();
        for run_idx in 0..n_runs {
            let report_file = self.report_file(run_idx);
            let report = Report::load(&report_file)
                .with_context(|| format!("failed to load {report_file:?}"))?;
            analyzer
                .add_report(&report)
                .with_context(|| format!("failed to analyze run {run_idx}"))?;
        }

        for result in analyzer.results() {
            log::info!("{result:?}");
        }

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .with_context(|| format!("failed to save {results_file:?}"))?;
        log::info!("saved {results_file:?}");

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
            log::info!("removed {results_file:?}");
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn report_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("report.msgpack")
    }

    fn text_report_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("report.txt")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}
