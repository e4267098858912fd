/// A candidate satellite facility. State 0 always means "not
/// installed" and carries zero capacity and zero costs; states
/// `1..=num_levels` are the real capacity levels, ordered by
/// increasing capacity.
#[derive(Debug, Clone)]
pub struct Facility {
    pub id: usize,
    pub name: String,
    /// Fleet capacity per state, `capacity[0] == 0.0`.
    pub capacity: Vec<f64>,
    /// One-time installation cost per state, `cost_installation[0] == 0.0`.
    pub cost_installation: Vec<f64>,
    /// Operation cost per state and period, `cost_operation[0]` all zeros.
    pub cost_operation: Vec<Vec<f64>>,
}

impl Facility {
    pub fn new(
        id: usize,
        name: String,
        capacity: Vec<f64>,
        cost_installation: Vec<f64>,
        cost_operation: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            id,
            name,
            capacity,
            cost_installation,
            cost_operation,
        }
    }

    /// Number of real capacity levels (excluding the state-0 sentinel).
    pub fn num_levels(&self) -> usize {
        self.capacity.len() - 1
    }

    pub fn max_capacity(&self) -> f64 {
        self.capacity.iter().cloned().fold(0.0, f64::max)
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct NetworkMetadata {
    pub facilities_count: usize,
    pub periods_count: usize,
    pub levels_count: usize,
}

/// The two-echelon delivery network: one distribution center (the
/// first echelon, always available) and the candidate satellites.
#[derive(Debug, Clone)]
pub struct Network {
    pub facilities: Vec<Facility>,
    pub periods: usize,
    /// Fleet capacity of the distribution center per period. `None`
    /// means the DC can always absorb the whole demand.
    pub dc_fleet_capacity: Option<f64>,
    pub meta: NetworkMetadata,
}

impl Network {
    pub fn new(
        facilities: Vec<Facility>,
        periods: usize,
        dc_fleet_capacity: Option<f64>,
    ) -> Self {
        let facilities_count = facilities.len();
        let levels_count = facilities
            .iter()
            .map(|f| f.num_levels())
            .max()
            .unwrap_or(0);
        Self {
            facilities,
            periods,
            dc_fleet_capacity,
            meta: NetworkMetadata {
                facilities_count,
                periods_count: periods,
                levels_count,
            },
        }
    }

    /// Two-period, two-level single-facility network: level 1 holds a
    /// fleet of 5 for 100 upfront and 10 per period, level 2 holds 10
    /// for 180 upfront and 20 per period.
    pub fn default() -> Self {
        let facilities = vec![Facility::new(
            0,
            String::from("s0"),
            vec![0.0, 5.0, 10.0],
            vec![0.0, 100.0, 180.0],
            vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![20.0, 20.0]],
        )];
        Self::new(facilities, 2, None)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_create_default_network() {
        let network = Network::default();
        assert_eq!(network.facilities.len(), 1);
        assert_eq!(network.periods, 2);
        assert_eq!(network.meta.levels_count, 2);
        assert_eq!(network.facilities[0].num_levels(), 2);
        assert_eq!(network.facilities[0].max_capacity(), 10.0);
    }

    #[test]
    fn test_facility_state_sentinel() {
        let network = Network::default();
        assert_eq!(network.facilities[0].capacity[0], 0.0);
        assert_eq!(network.facilities[0].cost_installation[0], 0.0);
    }
}
