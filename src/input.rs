use crate::error::Error;
use crate::policy::Flexibility;
use crate::scenario::{
    partition, PixelModel, Scenario, ScenarioGenerator, TestingSet,
    TrainingSet,
};
use crate::system::{Facility, Network};
use rand_distr::LogNormal;
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
pub struct Config {
    pub instance_id: String,
    pub num_training: usize,
    pub num_testing: usize,
    pub periods: usize,
    pub type_of_flexibility: String,
    #[serde(default)]
    pub continuous_assignment: bool,
    pub training_time_limit: f64,
    pub evaluation_time_limit: f64,
    pub num_workers: Option<usize>,
}

pub fn read_config_input(filepath: &str) -> Result<Config, Error> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: Config = serde_json::from_str(&contents)?;
    Ok(parsed)
}

#[derive(Deserialize)]
pub struct FacilityInput {
    pub id: usize,
    pub name: String,
    pub capacity: Vec<f64>,
    pub cost_installation: Vec<f64>,
    pub cost_operation: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
pub struct NetworkInput {
    pub facilities: Vec<FacilityInput>,
    pub dc_fleet_capacity: Option<f64>,
}

pub fn read_network_input(filepath: &str) -> Result<NetworkInput, Error> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: NetworkInput = serde_json::from_str(&contents)?;
    Ok(parsed)
}

fn validate_id_range(ids: &[usize], elem_name: &str) -> Result<(), Error> {
    let num_elements = ids.len();
    for elem_id in 0..num_elements {
        if !ids.iter().any(|id| *id == elem_id) {
            return Err(Error::Configuration(format!(
                "ID {} not found for {}",
                elem_id, elem_name
            )));
        }
    }
    Ok(())
}

impl NetworkInput {
    pub fn build_network(&self, config: &Config) -> Result<Network, Error> {
        let facility_ids: Vec<usize> =
            self.facilities.iter().map(|f| f.id).collect();
        validate_id_range(&facility_ids, "facilities")?;

        let num_facilities = facility_ids.len();
        let mut facilities = Vec::<Facility>::with_capacity(num_facilities);
        for id in 0..num_facilities {
            let input = match self.facilities.iter().find(|f| f.id == id) {
                Some(input) => input,
                None => unreachable!(),
            };
            validate_facility(input, config.periods)?;
            facilities.push(Facility::new(
                id,
                input.name.clone(),
                input.capacity.clone(),
                input.cost_installation.clone(),
                input.cost_operation.clone(),
            ));
        }
        Ok(Network::new(
            facilities,
            config.periods,
            self.dc_fleet_capacity,
        ))
    }
}

fn validate_facility(input: &FacilityInput, periods: usize) -> Result<(), Error> {
    let num_states = input.capacity.len();
    if num_states < 2 {
        return Err(Error::Configuration(format!(
            "facility {} needs the not-installed state and at least one level",
            input.name
        )));
    }
    if input.capacity[0] != 0.0 {
        return Err(Error::Configuration(format!(
            "facility {} state 0 must have zero capacity",
            input.name
        )));
    }
    if input.cost_installation.len() != num_states
        || input.cost_operation.len() != num_states
    {
        return Err(Error::Configuration(format!(
            "facility {} cost tables do not cover its {} states",
            input.name, num_states
        )));
    }
    // State 0 costs flow into objective columns as-is, so a nonzero
    // value would charge facilities that were never installed.
    if input.cost_installation[0] != 0.0
        || input.cost_operation[0].iter().any(|&c| c != 0.0)
    {
        return Err(Error::Configuration(format!(
            "facility {} state 0 must carry zero costs",
            input.name
        )));
    }
    for costs in input.cost_operation.iter() {
        if costs.len() != periods {
            return Err(Error::Configuration(format!(
                "facility {} operation costs span {} periods, instance has {}",
                input.name,
                costs.len(),
                periods
            )));
        }
    }
    Ok(())
}

/// One realized pixel of a scenario: per-period serving costs for both
/// echelons and the fleet each server would consume.
#[derive(Deserialize)]
pub struct PixelRecordInput {
    pub pixel: String,
    pub dc_serving_cost: Vec<f64>,
    /// Indexed facility then period.
    pub facility_serving_cost: Vec<Vec<f64>>,
    /// Indexed facility then period.
    pub fleet_size: Vec<Vec<f64>>,
    pub dc_fleet_size: Vec<f64>,
}

#[derive(Deserialize)]
pub struct ScenarioInput {
    pub pixels: Vec<PixelRecordInput>,
}

impl ScenarioInput {
    /// The input groups records per pixel; the model indexes facility
    /// first, so the serving tables are transposed here.
    pub fn build_scenario(
        &self,
        num_facilities: usize,
        periods: usize,
    ) -> Result<Scenario, String> {
        for record in self.pixels.iter() {
            if record.facility_serving_cost.len() != num_facilities
                || record.fleet_size.len() != num_facilities
            {
                return Err(format!(
                    "pixel {} does not cover the {} facilities",
                    record.pixel, num_facilities
                ));
            }
        }
        let num_pixels = self.pixels.len();
        let facility_serving_cost: Vec<Vec<Vec<f64>>> = (0..num_facilities)
            .map(|i| {
                (0..num_pixels)
                    .map(|k| self.pixels[k].facility_serving_cost[i].clone())
                    .collect()
            })
            .collect();
        let fleet_size: Vec<Vec<Vec<f64>>> = (0..num_facilities)
            .map(|i| {
                (0..num_pixels)
                    .map(|k| self.pixels[k].fleet_size[i].clone())
                    .collect()
            })
            .collect();
        Ok(Scenario {
            pixels: self.pixels.iter().map(|p| p.pixel.clone()).collect(),
            dc_serving_cost: self
                .pixels
                .iter()
                .map(|p| p.dc_serving_cost.clone())
                .collect(),
            facility_serving_cost,
            fleet_size,
            dc_fleet_size: self
                .pixels
                .iter()
                .map(|p| p.dc_fleet_size.clone())
                .collect(),
            periods,
        })
    }
}

#[derive(Deserialize)]
pub struct LognormalParams {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Deserialize)]
pub struct PixelModelInput {
    pub name: String,
    pub demand: LognormalParams,
    pub dc_cost_rate: f64,
    pub facility_cost_rates: Vec<f64>,
    pub fleet_rate: f64,
}

#[derive(Deserialize)]
pub struct SamplingInput {
    pub seed: u64,
    pub pixels: Vec<PixelModelInput>,
}

#[derive(Deserialize)]
pub struct ScenariosInput {
    #[serde(default)]
    pub scenarios: Vec<ScenarioInput>,
    pub sampling: Option<SamplingInput>,
}

pub fn read_scenarios_input(filepath: &str) -> Result<ScenariosInput, Error> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: ScenariosInput = serde_json::from_str(&contents)?;
    Ok(parsed)
}

impl ScenariosInput {
    pub fn build_scenarios(
        &self,
        config: &Config,
        num_facilities: usize,
    ) -> Result<Vec<Scenario>, Error> {
        match &self.sampling {
            Some(sampling) => {
                if !self.scenarios.is_empty() {
                    return Err(Error::Configuration(String::from(
                        "both explicit scenarios and a sampling model given",
                    )));
                }
                let mut generator = ScenarioGenerator::new(config.periods);
                for pixel in sampling.pixels.iter() {
                    if pixel.facility_cost_rates.len() != num_facilities {
                        return Err(Error::Configuration(format!(
                            "pixel model {} does not cover the {} facilities",
                            pixel.name, num_facilities
                        )));
                    }
                    let demand =
                        LogNormal::new(pixel.demand.mu, pixel.demand.sigma)
                            .map_err(|e| {
                                Error::Configuration(format!(
                                    "pixel model {}: {}",
                                    pixel.name, e
                                ))
                            })?;
                    generator.add_pixel(PixelModel {
                        name: pixel.name.clone(),
                        demand,
                        dc_cost_rate: pixel.dc_cost_rate,
                        facility_cost_rates: pixel
                            .facility_cost_rates
                            .clone(),
                        fleet_rate: pixel.fleet_rate,
                    });
                }
                let count = config.num_training + config.num_testing;
                Ok(generator.generate(count, sampling.seed))
            }
            None => {
                let mut scenarios =
                    Vec::<Scenario>::with_capacity(self.scenarios.len());
                for (index, input) in self.scenarios.iter().enumerate() {
                    let scenario = input
                        .build_scenario(num_facilities, config.periods)
                        .map_err(|reason| Error::MalformedScenario {
                            index,
                            reason,
                        })?;
                    scenario
                        .validate(num_facilities, config.periods)
                        .map_err(|reason| Error::MalformedScenario {
                            index,
                            reason,
                        })?;
                    scenarios.push(scenario);
                }
                Ok(scenarios)
            }
        }
    }
}

/// One loaded instance, immutable from here on. The train/test split
/// happens exactly once, before anything can read the scenarios.
pub struct Instance {
    pub instance_id: String,
    pub flexibility: Flexibility,
    pub continuous_assignment: bool,
    pub training_time_limit: f64,
    pub evaluation_time_limit: f64,
    pub num_workers: Option<usize>,
    pub network: Network,
    pub training: TrainingSet,
    pub testing: TestingSet,
}

pub struct Input {
    pub config: Config,
    pub network: NetworkInput,
    pub scenarios: ScenariosInput,
}

impl Input {
    pub fn build(path: &str) -> Result<Self, Error> {
        let config = read_config_input(&(path.to_owned() + "/config.json"))?;
        let network =
            read_network_input(&(path.to_owned() + "/network.json"))?;
        let scenarios =
            read_scenarios_input(&(path.to_owned() + "/scenarios.json"))?;
        Ok(Self {
            config,
            network,
            scenarios,
        })
    }

    pub fn build_instance(&self) -> Result<Instance, Error> {
        let flexibility =
            Flexibility::parse(&self.config.type_of_flexibility)?;
        let network = self.network.build_network(&self.config)?;
        let scenarios = self
            .scenarios
            .build_scenarios(&self.config, network.facilities.len())?;
        let (training, testing) = partition(
            scenarios,
            self.config.num_training,
            self.config.num_testing,
        )
        .map_err(Error::Configuration)?;
        Ok(Instance {
            instance_id: self.config.instance_id.clone(),
            flexibility,
            continuous_assignment: self.config.continuous_assignment,
            training_time_limit: self.config.training_time_limit,
            evaluation_time_limit: self.config.evaluation_time_limit,
            num_workers: self.config.num_workers,
            network,
            training,
            testing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config() {
        let filepath = "example/config.json";
        let config = read_config_input(filepath).unwrap();
        assert_eq!(config.instance_id, "example");
        assert_eq!(config.num_training, 2);
        assert_eq!(config.num_testing, 1);
        assert_eq!(config.type_of_flexibility, "fixed-capacity");
    }

    #[test]
    fn test_read_network() {
        let filepath = "example/network.json";
        let network = read_network_input(filepath).unwrap();
        assert_eq!(network.facilities.len(), 1);
        assert_eq!(network.dc_fleet_capacity, None);
    }

    #[test]
    fn test_read_scenarios() {
        let filepath = "example/scenarios.json";
        let scenarios = read_scenarios_input(filepath).unwrap();
        assert_eq!(scenarios.scenarios.len(), 3);
        assert!(scenarios.sampling.is_none());
    }

    #[test]
    fn test_build_instance() {
        let input = Input::build("example").unwrap();
        let instance = input.build_instance().unwrap();
        assert_eq!(instance.flexibility, Flexibility::FixedCapacity);
        assert_eq!(instance.network.facilities.len(), 1);
        assert_eq!(instance.training.len(), 2);
        assert_eq!(instance.testing.len(), 1);
    }

    #[test]
    fn test_unknown_flexibility_is_rejected() {
        let mut input = Input::build("example").unwrap();
        input.config.type_of_flexibility = String::from("elastic");
        assert!(matches!(
            input.build_instance(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_partition_must_cover_the_sample() {
        let mut input = Input::build("example").unwrap();
        input.config.num_testing = 5;
        assert!(matches!(
            input.build_instance(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_nonzero_state_zero_cost_is_rejected() {
        let mut input = Input::build("example").unwrap();
        input.network.facilities[0].cost_installation[0] = 5.0;
        assert!(matches!(
            input.build_instance(),
            Err(Error::Configuration(_))
        ));

        let mut input = Input::build("example").unwrap();
        input.network.facilities[0].cost_operation[0][1] = 3.0;
        assert!(matches!(
            input.build_instance(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_scenario_is_rejected() {
        let mut input = Input::build("example").unwrap();
        input.scenarios.scenarios[1].pixels[0].dc_serving_cost.pop();
        let result = input.build_instance();
        assert!(matches!(
            result,
            Err(Error::MalformedScenario { index: 1, .. })
        ));
    }

    #[test]
    fn test_build_sampled_scenarios() {
        let data = r#"{
            "sampling": {
                "seed": 42,
                "pixels": [
                    {
                        "name": "p0",
                        "demand": { "mu": 1.0, "sigma": 0.25 },
                        "dc_cost_rate": 10.0,
                        "facility_cost_rates": [1.0],
                        "fleet_rate": 2.0
                    }
                ]
            }
        }"#;
        let scenarios: ScenariosInput = serde_json::from_str(data).unwrap();
        let config = Config {
            instance_id: String::from("sampled"),
            num_training: 4,
            num_testing: 2,
            periods: 2,
            type_of_flexibility: String::from("fixed-capacity"),
            continuous_assignment: true,
            training_time_limit: 60.0,
            evaluation_time_limit: 60.0,
            num_workers: None,
        };
        let built = scenarios.build_scenarios(&config, 1).unwrap();
        assert_eq!(built.len(), 6);
        for scenario in built.iter() {
            scenario.validate(1, 2).unwrap();
        }
    }
}
