//! Human-friendly scaling of metric values.
//!
//! A scaler is chosen once per row from a reference value, so both columns of a row
//! print with the same prefix and precision.

#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    scale: f64,
    decimals: usize,
    suffix: String,
}

/// `(threshold, divisor, decimals, prefix)`; first match wins.
const TIME_STEPS: &[(f64, f64, usize, &str)] = &[
    (99.5e9, 1e9, 0, "s"),
    (9.95e9, 1e9, 1, "s"),
    (0.995e9, 1e9, 2, "s"),
    (99.5e6, 1e6, 0, "ms"),
    (9.95e6, 1e6, 1, "ms"),
    (0.995e6, 1e6, 2, "ms"),
    (99.5e3, 1e3, 0, "µs"),
    (9.95e3, 1e3, 1, "µs"),
    (0.995e3, 1e3, 2, "µs"),
    (99.5, 1.0, 0, "ns"),
    (9.95, 1.0, 1, "ns"),
];

const SI_STEPS: &[(f64, f64, usize, &str)] = &[
    (99.5e12, 1e12, 0, "T"),
    (9.95e12, 1e12, 1, "T"),
    (0.995e12, 1e12, 2, "T"),
    (99.5e9, 1e9, 0, "G"),
    (9.95e9, 1e9, 1, "G"),
    (0.995e9, 1e9, 2, "G"),
    (99.5e6, 1e6, 0, "M"),
    (9.95e6, 1e6, 1, "M"),
    (0.995e6, 1e6, 2, "M"),
    (99.5e3, 1e3, 0, "k"),
    (9.95e3, 1e3, 1, "k"),
    (0.995e3, 1e3, 2, "k"),
    (99.5, 1.0, 0, ""),
    (9.95, 1.0, 1, ""),
];

impl Scaler {
    pub fn new(reference: f64, unit: &str) -> Self {
        if unit == "ns/op" {
            let (scale, decimals, prefix) = pick(TIME_STEPS, reference, "ns");
            return Self {
                scale,
                decimals,
                suffix: prefix.to_string(),
            };
        }
        // MB/s values are already scaled by a million
        let prescale = if unit == "MB/s" { 1e6 } else { 1.0 };
        let (scale, decimals, prefix) = pick(SI_STEPS, reference * prescale, "");
        let suffix = match unit {
            "B/op" => format!("{prefix}B"),
            "MB/s" => format!("{prefix}B/s"),
            _ => prefix.to_string(),
        };
        Self {
            scale: scale / prescale,
            decimals,
            suffix,
        }
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}{}", self.decimals, value / self.scale, self.suffix)
    }
}

fn pick(steps: &[(f64, f64, usize, &'static str)], value: f64, base: &'static str) -> (f64, usize, &'static str) {
    steps
        .iter()
        .find(|(threshold, ..)| value >= *threshold)
        .map_or((1.0, 2, base), |(_, scale, decimals, prefix)| (*scale, *decimals, *prefix))
}
