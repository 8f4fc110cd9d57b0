use crate::events::Params;
use crate::grid::{Coord, CostZone, Grid};
use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, ops::RangeBounds, path::Path, str::FromStr};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file (or from the plain-text input format) and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub model: ModelConfig,
    pub init: InitConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Spatial parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of rows (`x` ranges over `1..=n_rows`).
    pub n_rows: usize,
    /// Number of columns (`y` ranges over `1..=n_cols`).
    pub n_cols: usize,

    /// Birth cell of the initial individuals.
    pub start: Coord,
    /// Destination cell.
    pub dest: Coord,

    /// Cells that cannot be entered.
    #[serde(default)]
    pub obstacles: Vec<Coord>,
    /// Special cost zones.
    #[serde(default)]
    pub zones: Vec<CostZone>,

    /// Number of zones added at random positions.
    #[serde(default)]
    pub n_random_zones: usize,
    /// Number of obstacles added at random positions.
    #[serde(default)]
    pub n_random_obstacles: usize,
}

/// Event timing parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Simulation horizon.
    pub horizon: u64,
    /// Comfort exponent.
    pub k: u32,

    /// Base mean of the time until death.
    pub death_mean: f64,
    /// Base mean of the time between moves.
    pub move_mean: f64,
    /// Base mean of the time between reproductions.
    pub rep_mean: f64,

    /// Cull the population whenever it grows beyond `init.n_ind_max`.
    #[serde(default)]
    pub epidemics: bool,
}

/// Initial population parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Initial number of individuals.
    pub n_ind: usize,
    /// Maximum number of individuals.
    pub n_ind_max: usize,
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Also write the report as plain text.
    pub write_text: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { write_text: true }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// Files with a `.toml` extension are parsed as TOML, any other file is parsed
    /// with [`Config::from_text`]. Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            std::fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config = if file.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents).context("failed to deserialize config")?
        } else {
            Self::from_text(&contents).context("failed to parse config")?
        };

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Parse the plain-text input format.
    ///
    /// The first line holds `N M xi yi xf yf n_zones n_obstacles tau nu nu_max k mu delta rho`.
    /// If `n_zones > 0` a header line follows with one `x1 y1 x2 y2 cost` line per zone,
    /// then, if `n_obstacles > 0`, a header line with one `x y` line per obstacle.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

        let line = lines.next().context("missing parameter line")?;
        let fields: Vec<_> = line.split_whitespace().collect();
        if fields.len() != 15 {
            bail!("parameter line must have 15 fields, but has {}", fields.len());
        }

        let coord = |i: usize| -> Result<Coord> {
            Ok(Coord::new(parse_field(&fields, i)?, parse_field(&fields, i + 1)?))
        };
        let n_zones: usize = parse_field(&fields, 6)?;
        let n_obstacles: usize = parse_field(&fields, 7)?;

        let mut zones = Vec::with_capacity(n_zones);
        if n_zones > 0 {
            lines.next().context("missing special cost zones header")?;
            for i_zone in 0..n_zones {
                let line = lines
                    .next()
                    .with_context(|| format!("missing special cost zone {i_zone}"))?;
                let z: Vec<_> = line.split_whitespace().collect();
                let zone = CostZone::new(
                    Coord::new(parse_field(&z, 0)?, parse_field(&z, 1)?),
                    Coord::new(parse_field(&z, 2)?, parse_field(&z, 3)?),
                    parse_field(&z, 4)?,
                );
                zones.push(zone);
            }
        }

        let mut obstacles = Vec::with_capacity(n_obstacles);
        if n_obstacles > 0 {
            lines.next().context("missing obstacles header")?;
            for i_obst in 0..n_obstacles {
                let line = lines
                    .next()
                    .with_context(|| format!("missing obstacle {i_obst}"))?;
                let o: Vec<_> = line.split_whitespace().collect();
                obstacles.push(Coord::new(parse_field(&o, 0)?, parse_field(&o, 1)?));
            }
        }

        Ok(Self {
            grid: GridConfig {
                n_rows: parse_field(&fields, 0)?,
                n_cols: parse_field(&fields, 1)?,
                start: coord(2)?,
                dest: coord(4)?,
                obstacles,
                zones,
                n_random_zones: 0,
                n_random_obstacles: 0,
            },
            model: ModelConfig {
                horizon: parse_field(&fields, 8)?,
                k: parse_field(&fields, 11)?,
                death_mean: parse_field(&fields, 12)?,
                move_mean: parse_field(&fields, 13)?,
                rep_mean: parse_field(&fields, 14)?,
                epidemics: false,
            },
            init: InitConfig {
                n_ind: parse_field(&fields, 9)?,
                n_ind_max: parse_field(&fields, 10)?,
            },
            output: OutputConfig::default(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        check_num(grid.n_rows, 1..10_000).context("invalid number of rows")?;
        check_num(grid.n_cols, 1..10_000).context("invalid number of columns")?;
        let x_range = 1..=grid.n_rows as i32;
        let y_range = 1..=grid.n_cols as i32;
        check_num(grid.start.x, x_range.clone()).context("invalid start row")?;
        check_num(grid.start.y, y_range.clone()).context("invalid start column")?;
        check_num(grid.dest.x, x_range).context("invalid destination row")?;
        check_num(grid.dest.y, y_range).context("invalid destination column")?;
        for (i_zone, zone) in grid.zones.iter().enumerate() {
            check_num(zone.cost, 1..10_000)
                .with_context(|| format!("invalid cost of zone {i_zone}"))?;
        }
        check_num(grid.n_random_zones, 0..10_000).context("invalid number of random zones")?;
        check_num(grid.n_random_obstacles, 0..10_000)
            .context("invalid number of random obstacles")?;

        let model = &self.model;
        check_num(model.horizon, 1..1_000_000_000).context("invalid horizon")?;
        check_num(model.k, 1..100).context("invalid comfort exponent")?;
        check_num(model.death_mean, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid death mean")?;
        check_num(model.move_mean, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid move mean")?;
        check_num(model.rep_mean, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid reproduction mean")?;

        check_num(self.init.n_ind, 1..100_000).context("invalid initial number of individuals")?;
        check_num(self.init.n_ind_max, self.init.n_ind..)
            .context("invalid maximum number of individuals")?;

        Ok(())
    }

    /// Build the grid, adding the random zones and obstacles drawn from `rng`.
    pub fn build_grid<R: Rng>(&self, rng: &mut R) -> Grid {
        let grid_cfg = &self.grid;
        let mut grid = Grid::new(grid_cfg.n_rows as i32, grid_cfg.n_cols as i32);
        for zone in &grid_cfg.zones {
            grid.add_zone(zone.clone());
        }
        for &obstacle in &grid_cfg.obstacles {
            grid.add_obstacle(obstacle);
        }
        grid.add_random_zones(grid_cfg.n_random_zones, rng);
        grid.add_random_obstacles(grid_cfg.n_random_obstacles, rng);
        grid
    }

    pub fn params(&self) -> Params {
        Params {
            dest: self.grid.dest,
            k: self.model.k,
            horizon: self.model.horizon,
            death_mean: self.model.death_mean,
            move_mean: self.model.move_mean,
            rep_mean: self.model.rep_mean,
            n_ind_max: self.init.n_ind_max,
            epidemics: self.model.epidemics,
        }
    }
}

fn parse_field<T>(fields: &[&str], idx: usize) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let field = fields
        .get(idx)
        .with_context(|| format!("missing field {idx}"))?;
    field
        .parse()
        .with_context(|| format!("invalid field {idx}: {field:?}"))
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    const TOML_CONFIG: &str = r#"
[grid]
n_rows = 5
n_cols = 4
start = [1, 1]
dest = [5, 4]
obstacles = [[2, 2], [3, 3]]
zones = [{ corner_a = [2, 1], corner_b = [4, 3], cost = 4 }]

[model]
horizon = 100
k = 3
death_mean = 10.0
move_mean = 1.0
rep_mean = 1.0

[init]
n_ind = 10
n_ind_max = 100
"#;

    const TEXT_CONFIG: &str = "5 4 1 1 5 4 1 2 100 10 100 3 10 1 1
special cost zones:
2 1 4 3 4
obstacles:
2 2
3 3
";

    #[test]
    fn toml_and_text_formats_agree() {
        let from_toml: Config = toml::from_str(TOML_CONFIG).unwrap();
        let from_text = Config::from_text(TEXT_CONFIG).unwrap();
        assert_eq!(from_toml, from_text);
        assert!(from_toml.output.write_text);
        assert!(!from_toml.model.epidemics);
        from_toml.validate().unwrap();
    }

    #[test]
    fn text_without_zones_or_obstacles() {
        let cfg = Config::from_text("5 5 1 1 5 5 0 0 50 1 10 1 3 2 4\n").unwrap();
        assert!(cfg.grid.zones.is_empty());
        assert!(cfg.grid.obstacles.is_empty());
        assert_eq!(cfg.model.death_mean, 3.0);
        assert_eq!(cfg.model.move_mean, 2.0);
        assert_eq!(cfg.model.rep_mean, 4.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn text_errors_are_reported() {
        assert!(Config::from_text("").is_err());
        assert!(Config::from_text("5 5 1 1 5 5 0 0 50 1 10 1 3 2").is_err());
        assert!(Config::from_text("5 5 1 1 5 5 0 0 50 1 10 1 3 2 x").is_err());
        // Declares one zone but lists none.
        assert!(Config::from_text("5 5 1 1 5 5 1 0 50 1 10 1 3 2 4\nzones:\n").is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let valid: Config = toml::from_str(TOML_CONFIG).unwrap();

        let mut cfg = valid.clone();
        cfg.grid.n_rows = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.grid.dest = Coord::new(6, 1);
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.model.move_mean = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.model.death_mean = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.model.rep_mean = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = valid.clone();
        cfg.init.n_ind_max = 5;
        assert!(cfg.validate().is_err());

        let mut cfg = valid;
        cfg.grid.zones[0].cost = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn build_grid_includes_configured_and_random_features() {
        let mut cfg: Config = toml::from_str(TOML_CONFIG).unwrap();
        cfg.grid.n_random_zones = 3;
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let grid = cfg.build_grid(&mut rng);
        assert_eq!(grid.zones().len(), 4);
        assert_eq!(grid.zones()[0], cfg.grid.zones[0]);
        assert!(grid.is_obstacle(Coord::new(2, 2)));
        assert!(grid.is_obstacle(Coord::new(3, 3)));
        assert_eq!((grid.n_rows(), grid.n_cols()), (5, 4));

        let params = cfg.params();
        assert_eq!(params.dest, Coord::new(5, 4));
        assert_eq!(params.horizon, 100);
    }
}
