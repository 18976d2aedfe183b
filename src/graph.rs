use crate::error::{CosegError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Energy table of a factor
#[derive(Debug, Clone, PartialEq)]
pub enum FactorFunction {
    /// One energy per label of a single variable
    Unary(Vec<f32>),
    /// Pairwise smoothness term: `equal` when both labels match, `different` otherwise
    Potts { equal: f32, different: f32 },
    /// Dense table over all label combinations, last variable index varying fastest
    Table(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    variables: Vec<usize>,
    function: FactorFunction,
}

impl Factor {
    pub fn variables(&self) -> &[usize] {
        &self.variables
    }

    pub fn function(&self) -> &FactorFunction {
        &self.function
    }

    pub fn order(&self) -> usize {
        self.variables.len()
    }

    /// Energy of this factor for a labeling already checked against the model
    pub(crate) fn energy(&self, labeling: &[usize], label_counts: &[usize]) -> f32 {
        match &self.function {
            FactorFunction::Unary(costs) => costs[labeling[self.variables[0]]],
            FactorFunction::Potts { equal, different } => {
                let first = labeling[self.variables[0]];
                if self.variables[1..].iter().all(|&v| labeling[v] == first) {
                    *equal
                } else {
                    *different
                }
            }
            FactorFunction::Table(table) => {
                let index = self
                    .variables
                    .iter()
                    .fold(0, |acc, &v| acc * label_counts[v] + labeling[v]);
                table[index]
            }
        }
    }
}

/// Discrete labeling problem handed to an inference backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorGraph {
    label_counts: Vec<usize>,
    factors: Vec<Factor>,
}

impl FactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable taking `labels` distinct values; returns its index
    pub fn add_variable(&mut self, labels: usize) -> Result<usize> {
        if labels == 0 {
            return Err(CosegError::InvalidModel(
                "variables need at least one label".into(),
            ));
        }
        self.label_counts.push(labels);
        Ok(self.label_counts.len() - 1)
    }

    pub fn add_factor(&mut self, variables: Vec<usize>, function: FactorFunction) -> Result<()> {
        if variables.is_empty() {
            return Err(CosegError::InvalidModel("factor without variables".into()));
        }
        if let Some(&v) = variables.iter().find(|&&v| v >= self.label_counts.len()) {
            return Err(CosegError::InvalidModel(format!(
                "factor references unknown variable {v}"
            )));
        }

        match &function {
            FactorFunction::Unary(costs) => {
                if variables.len() != 1 {
                    return Err(CosegError::InvalidModel(format!(
                        "unary factor over {} variables",
                        variables.len()
                    )));
                }
                let labels = self.label_counts[variables[0]];
                if costs.len() != labels {
                    return Err(CosegError::InvalidModel(format!(
                        "unary factor has {} costs for {} labels",
                        costs.len(),
                        labels
                    )));
                }
            }
            FactorFunction::Potts { .. } => {
                if variables.len() < 2 {
                    return Err(CosegError::InvalidModel(
                        "Potts factor needs at least two variables".into(),
                    ));
                }
            }
            FactorFunction::Table(table) => {
                let expected: usize = variables.iter().map(|&v| self.label_counts[v]).product();
                if table.len() != expected {
                    return Err(CosegError::InvalidModel(format!(
                        "table factor has {} entries, expected {}",
                        table.len(),
                        expected
                    )));
                }
            }
        }

        self.factors.push(Factor {
            variables,
            function,
        });
        Ok(())
    }

    pub fn num_variables(&self) -> usize {
        self.label_counts.len()
    }

    /// Label count of a variable, `None` for an unknown index
    pub fn num_labels(&self, variable: usize) -> Option<usize> {
        self.label_counts.get(variable).copied()
    }

    pub fn label_counts(&self) -> &[usize] {
        &self.label_counts
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Total energy of a labeling, or an error if it does not fit the model
    pub fn energy(&self, labeling: &[usize]) -> Result<f32> {
        self.check_labeling(labeling)?;
        Ok(self
            .factors
            .iter()
            .map(|f| f.energy(labeling, &self.label_counts))
            .sum())
    }

    pub fn check_labeling(&self, labeling: &[usize]) -> Result<()> {
        if labeling.len() != self.num_variables() {
            return Err(CosegError::InvalidModel(format!(
                "labeling covers {} variables, model has {}",
                labeling.len(),
                self.num_variables()
            )));
        }
        if let Some((v, &l)) = labeling
            .iter()
            .enumerate()
            .find(|&(v, &l)| l >= self.label_counts[v])
        {
            return Err(CosegError::InvalidModel(format!(
                "label {l} out of range for variable {v}"
            )));
        }
        Ok(())
    }
}

/// Solver producing one label per variable of a factor graph
///
/// Energy minimization (graph cuts, QPBO, ...) lives outside this crate;
/// algorithms that need it are generic over this trait.
pub trait InferenceBackend {
    fn infer(&mut self, model: &FactorGraph) -> anyhow::Result<Vec<usize>>;

    fn name(&self) -> &str {
        "external"
    }
}

/// Read-only overview of a factor graph, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    pub variables: usize,
    pub min_labels: usize,
    pub max_labels: usize,
    pub factors: usize,
    /// Factor count per factor order
    pub order_histogram: BTreeMap<usize, usize>,
}

impl ModelSummary {
    pub fn of(model: &FactorGraph) -> Self {
        let mut order_histogram = BTreeMap::new();
        for factor in model.factors() {
            *order_histogram.entry(factor.order()).or_insert(0) += 1;
        }

        Self {
            variables: model.num_variables(),
            min_labels: model.label_counts().iter().copied().min().unwrap_or(0),
            max_labels: model.label_counts().iter().copied().max().unwrap_or(0),
            factors: model.factors().len(),
            order_histogram,
        }
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_labels == self.max_labels {
            writeln!(
                f,
                "Model has {} variables ({} labels each)",
                self.variables, self.min_labels
            )?;
        } else {
            writeln!(
                f,
                "Model has {} variables ({} labels min, {} labels max)",
                self.variables, self.min_labels, self.max_labels
            )?;
        }
        write!(f, "Model has {} factors;", self.factors)?;
        for (order, count) in &self.order_histogram {
            write!(f, "\n\t{count} factors w/ order={order}")?;
        }
        Ok(())
    }
}
