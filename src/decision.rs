use crate::system::Network;
use serde::Serialize;

/// First-stage state of a facility: out of the network, or installed
/// at one of its capacity levels. The tagged variant makes the
/// non-anticipativity invariant checkable by plain equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FacilityState {
    NotInstalled,
    Installed(usize),
}

impl FacilityState {
    /// The state index used by the model columns: 0 for not
    /// installed, the level otherwise.
    pub fn index(&self) -> usize {
        match self {
            Self::NotInstalled => 0,
            Self::Installed(level) => *level,
        }
    }

    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            Self::NotInstalled
        } else {
            Self::Installed(index)
        }
    }

    pub fn is_installed(&self) -> bool {
        !matches!(self, Self::NotInstalled)
    }
}

/// The first-stage output of the SAA solve: what gets installed where
/// and at which level it operates each period. Identical across every
/// training scenario by construction; read-only for the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Installation state per facility, from the `Y` columns.
    pub installation: Vec<FacilityState>,
    /// Operating state per facility and period. Equals the
    /// installation state in every period under fixed capacity; comes
    /// from the `Z` columns under flexible capacity.
    pub operation: Vec<Vec<FacilityState>>,
}

impl Decision {
    pub fn new(
        installation: Vec<FacilityState>,
        operation: Vec<Vec<FacilityState>>,
    ) -> Self {
        Self {
            installation,
            operation,
        }
    }

    pub fn state(&self, facility: usize, period: usize) -> FacilityState {
        self.operation[facility][period]
    }

    pub fn num_installed(&self) -> usize {
        self.installation.iter().filter(|s| s.is_installed()).count()
    }

    /// Whether every installed facility operates at one constant level
    /// across all periods, as required under fixed capacity.
    pub fn has_constant_levels(&self) -> bool {
        self.operation.iter().enumerate().all(|(i, periods)| {
            periods.iter().all(|state| *state == self.installation[i])
        })
    }

    /// Deterministic cost of the decision: installation plus the
    /// operation cost of each chosen period state.
    pub fn first_stage_cost(&self, network: &Network) -> f64 {
        let mut cost = 0.0;
        for (i, facility) in network.facilities.iter().enumerate() {
            cost += facility.cost_installation[self.installation[i].index()];
            for t in 0..network.periods {
                cost += facility.cost_operation[self.state(i, t).index()][t];
            }
        }
        cost
    }

    pub fn summary(&self, network: &Network) -> Vec<DecisionSummaryRow> {
        network
            .facilities
            .iter()
            .enumerate()
            .map(|(i, facility)| DecisionSummaryRow {
                facility: facility.name.clone(),
                installed_level: self.installation[i].index(),
                operating_levels: (0..network.periods)
                    .map(|t| self.state(i, t).index())
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct DecisionSummaryRow {
    pub facility: String,
    pub installed_level: usize,
    pub operating_levels: Vec<usize>,
}
