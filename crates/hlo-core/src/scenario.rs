//! Scenario catalog: plans and HLO labels keyed by scenario name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::plan::{Plan, PlanError, PlanFormat, parse_initial_world};

/// Where to find a scenario's plan and how to label its goals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Plan file, relative to the resource directory unless absolute.
    pub plan: PathBuf,
    /// Format of the plan file.
    pub format: PlanFormat,
    /// Initial world CSV, relative to the resource directory unless absolute.
    pub initial_world: PathBuf,
    /// One label per goal, in plan order (e.g. "wall", "row").
    pub labels: Vec<String>,
}

impl ScenarioConfig {
    /// The house scenario: four walls, then four rows, from a high-level plan.
    pub fn house() -> Self {
        Self {
            plan: PathBuf::from("domains/house-highlevel.plan"),
            format: PlanFormat::Highlevel,
            initial_world: PathBuf::from("worlds/house.csv"),
            labels: ["wall", "wall", "wall", "wall", "row", "row", "row", "row"]
                .map(String::from)
                .to_vec(),
        }
    }

    /// The bridge scenario: floor then two railings, from a block plan.
    pub fn bridge() -> Self {
        Self {
            plan: PathBuf::from("domains/bridge-block.plan"),
            format: PlanFormat::Block,
            initial_world: PathBuf::from("worlds/bridge.csv"),
            labels: ["floor", "railing", "railing"].map(String::from).to_vec(),
        }
    }

    /// The scenarios known out of the box.
    pub fn defaults() -> BTreeMap<String, Self> {
        BTreeMap::from([
            ("bridge".to_string(), Self::bridge()),
            ("house".to_string(), Self::house()),
        ])
    }
}

/// A loaded scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    name: String,
    plan: Plan,
    labels: Vec<String>,
}

impl Scenario {
    /// Builds a scenario, requiring exactly one label per goal.
    pub fn new(name: impl Into<String>, plan: Plan, labels: Vec<String>) -> Result<Self, PlanError> {
        let name = name.into();
        if plan.goals().len() != labels.len() {
            return Err(PlanError::LabelMismatch {
                scenario: name,
                goals: plan.goals().len(),
                labels: labels.len(),
            });
        }
        Ok(Self { name, plan, labels })
    }

    /// Reads and parses the files named by `config`.
    pub fn load(name: &str, config: &ScenarioConfig, base_dir: &Path) -> Result<Self, PlanError> {
        let plan_path = resolve(base_dir, &config.plan);
        let world_path = resolve(base_dir, &config.initial_world);

        let plan_text = read(&plan_path)?;
        let world_text = read(&world_path)?;

        let goals = config
            .format
            .parse(&plan_text, &plan_path.display().to_string())?;
        let initial_world = parse_initial_world(&world_text, &world_path.display().to_string())?;
        let plan = Plan::new(name, goals, initial_world)?;

        tracing::debug!(
            scenario = name,
            goals = plan.goals().len(),
            initial_blocks = plan.initial_world().len(),
            "loaded scenario"
        );
        Self::new(name, plan, config.labels.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Configured scenarios, each loaded on its own.
///
/// A scenario whose files cannot be loaded keeps its error; `get` returns it
/// so only the sessions of that scenario fail.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<String, Scenario>,
    failures: BTreeMap<String, PlanError>,
}

impl ScenarioCatalog {
    pub fn load(configs: &BTreeMap<String, ScenarioConfig>, base_dir: &Path) -> Self {
        let mut catalog = Self::default();
        for (name, config) in configs {
            match Scenario::load(name, config, base_dir) {
                Ok(scenario) => {
                    catalog.scenarios.insert(name.clone(), scenario);
                }
                Err(e) => {
                    tracing::warn!(scenario = name.as_str(), error = %e, "failed to load scenario");
                    catalog.failures.insert(name.clone(), e);
                }
            }
        }
        catalog
    }

    pub fn from_scenarios(scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        Self {
            scenarios: scenarios
                .into_iter()
                .map(|s| (s.name.clone(), s))
                .collect(),
            failures: BTreeMap::new(),
        }
    }

    /// The loaded scenario, its load error, or `UnknownScenario`.
    pub fn get(&self, name: &str) -> Result<&Scenario, PlanError> {
        if let Some(scenario) = self.scenarios.get(name) {
            return Ok(scenario);
        }
        Err(self
            .failures
            .get(name)
            .cloned()
            .unwrap_or_else(|| PlanError::UnknownScenario(name.to_string())))
    }

    /// Names of the scenarios that loaded.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn read(path: &Path) -> Result<String, PlanError> {
    fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}
