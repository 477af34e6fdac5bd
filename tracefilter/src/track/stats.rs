//! Speed distribution statistics.

use std::fmt;

use crate::geo::mps_to_kmh;

/// Mean, median and maximum speed of a track, in km/h.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedStats {
    pub mean_kmh: f64,
    pub median_kmh: f64,
    pub max_kmh: f64,
}

impl SpeedStats {
    /// Compute statistics from speeds in m/s.
    ///
    /// Returns `None` for an empty input. NaN speeds are ignored.
    pub fn from_speeds<I>(speeds_mps: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut speeds: Vec<f64> = speeds_mps.into_iter().filter(|v| !v.is_nan()).collect();
        if speeds.is_empty() {
            return None;
        }

        speeds.sort_by(f64::total_cmp);

        let count = speeds.len();
        let mean = speeds.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 0 {
            (speeds[count / 2 - 1] + speeds[count / 2]) / 2.0
        } else {
            speeds[count / 2]
        };
        let max = speeds[count - 1];

        Some(Self {
            mean_kmh: mps_to_kmh(mean),
            median_kmh: mps_to_kmh(median),
            max_kmh: mps_to_kmh(max),
        })
    }
}

impl fmt::Display for SpeedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean {:.1} km/h, median {:.1} km/h, max {:.1} km/h",
            self.mean_kmh, self.median_kmh, self.max_kmh
        )
    }
}
