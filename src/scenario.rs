use rand::prelude::*;
use rand_distr::LogNormal;
use rand_xoshiro::Xoshiro256Plus;

/// A full draw of demand-driven parameters across all periods: which
/// pixels realized demand, what serving them costs from each echelon,
/// and the fleet each assignment would consume.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Spatial demand identifiers, one per realized pixel.
    pub pixels: Vec<String>,
    /// Cost of serving pixel `k` from the DC in period `t`.
    pub dc_serving_cost: Vec<Vec<f64>>,
    /// Cost of serving pixel `k` from facility `i` in period `t`.
    pub facility_serving_cost: Vec<Vec<Vec<f64>>>,
    /// Fleet consumed at facility `i` when it serves pixel `k` in
    /// period `t`.
    pub fleet_size: Vec<Vec<Vec<f64>>>,
    /// Fleet consumed at the DC when it serves pixel `k` in period `t`.
    pub dc_fleet_size: Vec<Vec<f64>>,
    pub periods: usize,
}

impl Scenario {
    pub fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Shape check against the instance dimensions. Returns the first
    /// violation found, described for the error report.
    pub fn validate(
        &self,
        num_facilities: usize,
        periods: usize,
    ) -> Result<(), String> {
        let num_pixels = self.num_pixels();
        if self.periods != periods {
            return Err(format!(
                "scenario spans {} periods, instance has {}",
                self.periods, periods
            ));
        }
        if self.dc_serving_cost.len() != num_pixels
            || self.dc_fleet_size.len() != num_pixels
        {
            return Err(String::from("dc cost/fleet tables not pixel-indexed"));
        }
        for k in 0..num_pixels {
            if self.dc_serving_cost[k].len() != periods
                || self.dc_fleet_size[k].len() != periods
            {
                return Err(format!(
                    "dc cost/fleet of pixel {} not period-indexed",
                    self.pixels[k]
                ));
            }
        }
        if self.facility_serving_cost.len() != num_facilities
            || self.fleet_size.len() != num_facilities
        {
            return Err(String::from(
                "facility cost/fleet tables not facility-indexed",
            ));
        }
        for i in 0..num_facilities {
            if self.facility_serving_cost[i].len() != num_pixels
                || self.fleet_size[i].len() != num_pixels
            {
                return Err(format!(
                    "facility {} cost/fleet tables not pixel-indexed",
                    i
                ));
            }
            for k in 0..num_pixels {
                if self.facility_serving_cost[i][k].len() != periods
                    || self.fleet_size[i][k].len() != periods
                {
                    return Err(format!(
                        "facility {} cost/fleet of pixel {} not \
                         period-indexed",
                        i, self.pixels[k]
                    ));
                }
            }
        }
        Ok(())
    }

    /// Lower bound on the total fleet that must be dispatched from
    /// satellites in period `t` if the DC absorbs at most `dc_capacity`
    /// fleet units. Used as a coverage screen before building any
    /// model, so it must never exceed what a feasible assignment
    /// needs: pixels are offloaded to the DC fractionally, by
    /// decreasing satellite need saved per DC fleet unit, which
    /// relaxes every integral assignment.
    pub fn min_satellite_fleet(&self, t: usize, dc_capacity: f64) -> f64 {
        let num_facilities = self.fleet_size.len();
        // Cheapest satellite fleet need per pixel
        let satellite_need: Vec<f64> = (0..self.num_pixels())
            .map(|k| {
                (0..num_facilities)
                    .map(|i| self.fleet_size[i][k][t])
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let saved_per_unit = |k: usize| {
            let weight = self.dc_fleet_size[k][t];
            if weight == 0.0 {
                f64::INFINITY
            } else {
                satellite_need[k] / weight
            }
        };
        let mut order: Vec<usize> = (0..self.num_pixels()).collect();
        order.sort_by(|a, b| saved_per_unit(*b).total_cmp(&saved_per_unit(*a)));
        let mut remaining_dc = dc_capacity;
        let mut required: f64 = satellite_need.iter().sum();
        for k in order {
            if remaining_dc <= 0.0 {
                break;
            }
            let weight = self.dc_fleet_size[k][t];
            if weight <= remaining_dc {
                remaining_dc -= weight;
                required -= satellite_need[k];
            } else {
                required -= satellite_need[k] * remaining_dc / weight;
                remaining_dc = 0.0;
            }
        }
        required.max(0.0)
    }

    /// Single-pixel scenario where every facility needs
    /// `fleet_by_period[t]` fleet units to serve the pixel. Convenient
    /// fixture for the acceptance scenarios.
    pub fn single_pixel(
        num_facilities: usize,
        fleet_by_period: &[f64],
        facility_cost: f64,
        dc_cost: f64,
    ) -> Self {
        let periods = fleet_by_period.len();
        Self {
            pixels: vec![String::from("p0")],
            dc_serving_cost: vec![vec![dc_cost; periods]],
            facility_serving_cost: vec![
                vec![vec![facility_cost; periods]];
                num_facilities
            ],
            fleet_size: vec![vec![fleet_by_period.to_vec()]; num_facilities],
            dc_fleet_size: vec![fleet_by_period.to_vec()],
            periods,
        }
    }
}

/// The `N` scenarios the optimization is allowed to see. Only this
/// type can reach the model builder.
pub struct TrainingSet {
    scenarios: Vec<Scenario>,
}

/// The `M` held-out scenarios. Only the evaluator reads them; nothing
/// exposes them to the model-building path.
pub struct TestingSet {
    scenarios: Vec<Scenario>,
}

impl TrainingSet {
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl TestingSet {
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Splits an ordered scenario list into the disjoint train/test
/// partitions: the first `num_training` records train, the next
/// `num_testing` are held out. The counts must exactly cover the list.
pub fn partition(
    mut scenarios: Vec<Scenario>,
    num_training: usize,
    num_testing: usize,
) -> Result<(TrainingSet, TestingSet), String> {
    if scenarios.len() != num_training + num_testing {
        return Err(format!(
            "{} scenarios provided, N + M = {}",
            scenarios.len(),
            num_training + num_testing
        ));
    }
    let testing = scenarios.split_off(num_training);
    Ok((
        TrainingSet { scenarios },
        TestingSet { scenarios: testing },
    ))
}

/// Demand model for one pixel: a lognormal draw per period, turned
/// into serving costs and fleet needs through per-echelon rates.
pub struct PixelModel {
    pub name: String,
    pub demand: LogNormal<f64>,
    pub dc_cost_rate: f64,
    pub facility_cost_rates: Vec<f64>,
    pub fleet_rate: f64,
}

/// Samples synthetic scenarios for experiments where no pre-computed
/// scenario files exist.
pub struct ScenarioGenerator {
    pub pixels: Vec<PixelModel>,
    pub periods: usize,
}

impl ScenarioGenerator {
    pub fn new(periods: usize) -> Self {
        Self {
            pixels: vec![],
            periods,
        }
    }

    pub fn add_pixel(&mut self, pixel: PixelModel) {
        self.pixels.push(pixel);
    }

    pub fn generate(&self, count: usize, seed: u64) -> Vec<Scenario> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let num_facilities = self
            .pixels
            .first()
            .map(|p| p.facility_cost_rates.len())
            .unwrap_or(0);

        (0..count)
            .map(|_| {
                let num_pixels = self.pixels.len();
                let mut scenario = Scenario {
                    pixels: self.pixels.iter().map(|p| p.name.clone()).collect(),
                    dc_serving_cost: vec![vec![0.0; self.periods]; num_pixels],
                    facility_serving_cost: vec![
                        vec![
                            vec![0.0; self.periods];
                            num_pixels
                        ];
                        num_facilities
                    ],
                    fleet_size: vec![
                        vec![vec![0.0; self.periods]; num_pixels];
                        num_facilities
                    ],
                    dc_fleet_size: vec![vec![0.0; self.periods]; num_pixels],
                    periods: self.periods,
                };
                for (k, pixel) in self.pixels.iter().enumerate() {
                    for t in 0..self.periods {
                        let demand = pixel.demand.sample(&mut rng);
                        scenario.dc_serving_cost[k][t] =
                            pixel.dc_cost_rate * demand;
                        scenario.dc_fleet_size[k][t] =
                            pixel.fleet_rate * demand;
                        for i in 0..num_facilities {
                            scenario.facility_serving_cost[i][k][t] =
                                pixel.facility_cost_rates[i] * demand;
                            scenario.fleet_size[i][k][t] =
                                pixel.fleet_rate * demand;
                        }
                    }
                }
                scenario
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pixel_fixture_shape() {
        let scenario = Scenario::single_pixel(2, &[5.0, 9.0], 1.0, 40.0);
        assert_eq!(scenario.num_pixels(), 1);
        assert_eq!(scenario.periods, 2);
        assert!(scenario.validate(2, 2).is_ok());
        assert_eq!(scenario.fleet_size[1][0][1], 9.0);
    }

    #[test]
    fn test_validate_period_mismatch() {
        let scenario = Scenario::single_pixel(1, &[5.0, 9.0], 1.0, 40.0);
        assert!(scenario.validate(1, 3).is_err());
    }

    #[test]
    fn test_partition_counts() {
        let scenarios: Vec<Scenario> = (0..5)
            .map(|_| Scenario::single_pixel(1, &[5.0], 1.0, 40.0))
            .collect();
        let (training, testing) = partition(scenarios, 3, 2).unwrap();
        assert_eq!(training.len(), 3);
        assert_eq!(testing.len(), 2);
    }

    #[test]
    fn test_partition_count_mismatch() {
        let scenarios: Vec<Scenario> = (0..4)
            .map(|_| Scenario::single_pixel(1, &[5.0], 1.0, 40.0))
            .collect();
        assert!(partition(scenarios, 3, 2).is_err());
    }

    #[test]
    fn test_min_satellite_fleet_with_unlimited_dc() {
        let scenario = Scenario::single_pixel(1, &[5.0, 9.0], 1.0, 40.0);
        assert_eq!(scenario.min_satellite_fleet(0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_min_satellite_fleet_with_closed_dc() {
        let scenario = Scenario::single_pixel(1, &[5.0, 9.0], 1.0, 40.0);
        assert_eq!(scenario.min_satellite_fleet(1, 0.0), 9.0);
    }

    #[test]
    fn test_min_satellite_fleet_with_saturated_dc() {
        // 2 of the 9 DC fleet units are absorbed fractionally
        let scenario = Scenario::single_pixel(1, &[5.0, 9.0], 1.0, 40.0);
        let bound = scenario.min_satellite_fleet(1, 2.0);
        assert!((bound - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_satellite_fleet_never_exceeds_a_feasible_assignment() {
        // DC capacity 10; serving the heavy pixel from the DC leaves
        // only 2 satellite units for the light ones, so the bound must
        // stay at or below 2
        let scenario = Scenario {
            pixels: vec![
                String::from("heavy"),
                String::from("light-1"),
                String::from("light-2"),
            ],
            dc_serving_cost: vec![vec![10.0]; 3],
            facility_serving_cost: vec![vec![vec![1.0]; 3]],
            fleet_size: vec![vec![vec![100.0], vec![1.0], vec![1.0]]],
            dc_fleet_size: vec![vec![6.0], vec![5.0], vec![5.0]],
            periods: 1,
        };
        assert!(scenario.min_satellite_fleet(0, 10.0) <= 2.0);
    }

    #[test]
    fn test_generate_is_deterministic_per_seed() {
        let mut generator = ScenarioGenerator::new(2);
        generator.add_pixel(PixelModel {
            name: String::from("p0"),
            demand: LogNormal::new(1.0, 0.4).unwrap(),
            dc_cost_rate: 3.0,
            facility_cost_rates: vec![1.0],
            fleet_rate: 0.5,
        });
        let a = generator.generate(4, 17);
        let b = generator.generate(4, 17);
        assert_eq!(a.len(), 4);
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.dc_serving_cost, sb.dc_serving_cost);
            assert_eq!(sa.fleet_size, sb.fleet_size);
        }
    }
}
