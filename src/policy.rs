use crate::decision::FacilityState;
use crate::error::Error;
use crate::scenario::TrainingSet;
use crate::system::{Facility, Network};

pub const FIXED_CAPACITY: &str = "fixed-capacity";
pub const FLEX_CAPACITY: &str = "flex-capacity";

/// Capacity regime of an instance. Under `FixedCapacity` a facility
/// keeps the level it was installed at for every period; under
/// `FlexCapacity` the operating level is re-chosen each period, never
/// exceeding the installed level. No switching cost applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flexibility {
    FixedCapacity,
    FlexCapacity,
}

impl Flexibility {
    pub fn parse(kind: &str) -> Result<Self, Error> {
        match kind {
            FIXED_CAPACITY => Ok(Self::FixedCapacity),
            FLEX_CAPACITY => Ok(Self::FlexCapacity),
            _ => Err(Error::Configuration(format!(
                "unknown type of flexibility: {}",
                kind
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedCapacity => FIXED_CAPACITY,
            Self::FlexCapacity => FLEX_CAPACITY,
        }
    }
}

/// The single component that knows which facility states are
/// admissible where. The model builder consults it for every
/// facility/period pair instead of branching on the regime locally.
#[derive(Debug, Clone, Copy)]
pub struct CapacityPolicy {
    pub flexibility: Flexibility,
}

impl CapacityPolicy {
    pub fn new(flexibility: Flexibility) -> Self {
        Self { flexibility }
    }

    /// Installation choices for a facility: stay out, or install at
    /// one of its levels. Identical in both regimes and for every
    /// period; the regimes differ in how periods couple, not in the
    /// state set.
    pub fn admissible_states(
        &self,
        facility: &Facility,
        _period: usize,
    ) -> Vec<FacilityState> {
        let mut states = vec![FacilityState::NotInstalled];
        for level in 1..=facility.num_levels() {
            states.push(FacilityState::Installed(level));
        }
        states
    }

    /// States a facility may operate at in a period given its
    /// installation. Fixed capacity pins the installed level;
    /// flexible capacity allows any level of no greater capacity,
    /// including idling.
    pub fn operating_states(
        &self,
        facility: &Facility,
        installed: FacilityState,
    ) -> Vec<FacilityState> {
        match installed {
            FacilityState::NotInstalled => vec![FacilityState::NotInstalled],
            FacilityState::Installed(level) => match self.flexibility {
                Flexibility::FixedCapacity => {
                    vec![FacilityState::Installed(level)]
                }
                Flexibility::FlexCapacity => {
                    let cap = facility.capacity[level];
                    let mut states = vec![FacilityState::NotInstalled];
                    for q in 1..=facility.num_levels() {
                        if facility.capacity[q] <= cap {
                            states.push(FacilityState::Installed(q));
                        }
                    }
                    states
                }
            },
        }
    }

    /// Checks that the admissible states can cover every training
    /// scenario's minimum requirement in every period: even with all
    /// facilities at their top level, some draw may need more
    /// satellite fleet than exists once the DC saturates.
    pub fn validate(
        &self,
        network: &Network,
        training: &TrainingSet,
    ) -> Result<(), Error> {
        let satellite_total: f64 = network
            .facilities
            .iter()
            .map(|f| f.max_capacity())
            .sum();
        let dc_capacity =
            network.dc_fleet_capacity.unwrap_or(f64::INFINITY);
        for (n, scenario) in training.scenarios().iter().enumerate() {
            for t in 0..network.periods {
                let required = scenario.min_satellite_fleet(t, dc_capacity);
                if required > satellite_total {
                    return Err(Error::InfeasiblePolicy {
                        scenario: n,
                        period: t,
                    });
                }
            }
        }
        Ok(())
    }
}
