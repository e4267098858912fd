/// Helper function for evaluating the arithmetic mean of a slice.
/// Returns 0.0 for an empty slice.
///
/// ## Example
///
/// ```
/// let v = vec![1.0, 2.0, 3.0];
///
/// let m = satnet_rs::utils::mean(&v);
/// assert_eq!(m, 2.0);
/// ```
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / (values.len() as f64)
}

/// Helper function for evaluating the sample standard deviation of a
/// slice, with the (n - 1) correction. Returns 0.0 for slices with
/// less than two elements.
///
/// ## Example
///
/// ```
/// let v = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
///
/// let s = satnet_rs::utils::std_deviation(&v);
/// assert!((s - 2.138089935299395).abs() < 1e-12);
/// ```
pub fn std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (sum_sq / ((values.len() - 1) as f64)).sqrt()
}
