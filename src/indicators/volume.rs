//! Volume statistics

/// Arithmetic mean volume across the whole series
pub fn mean_volume(volumes: &[f64]) -> Option<f64> {
    if volumes.is_empty() {
        return None;
    }
    Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
}
