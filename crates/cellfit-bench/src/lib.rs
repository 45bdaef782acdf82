use std::time::Instant;

use cellfit_core::{resize, CoreError, ResizeRequest, ResizeTarget, SearchConfig};

#[derive(Debug, Clone)]
pub struct BenchmarkCase {
    pub name: String,
    pub width: u64,
    pub height: u64,
    pub target_height: f64,
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub name: String,
    pub numerator: u32,
    pub denominator: u32,
    pub elapsed_micros: u128,
}

pub fn default_cases() -> Vec<BenchmarkCase> {
    vec![
        BenchmarkCase {
            name: "small".to_string(),
            width: 64,
            height: 64,
            target_height: 16.0,
        },
        BenchmarkCase {
            name: "screenshot".to_string(),
            width: 1023,
            height: 765,
            target_height: 384.0,
        },
        BenchmarkCase {
            name: "large".to_string(),
            width: 4201,
            height: 5365,
            target_height: 54.0,
        },
    ]
}

pub fn run(cases: &[BenchmarkCase], max_denominator: u32) -> Result<Vec<BenchmarkReport>, CoreError> {
    let config = SearchConfig {
        max_denominator,
        ..SearchConfig::default()
    };
    cases
        .iter()
        .map(|case| -> Result<BenchmarkReport, CoreError> {
            let request = ResizeRequest::new(case.height, case.width, ResizeTarget::height(case.target_height))
                .with_config(config);
            let start = Instant::now();
            let selection = resize(&request)?;
            Ok(BenchmarkReport {
                name: case.name.clone(),
                numerator: selection.numerator,
                denominator: selection.denominator,
                elapsed_micros: start.elapsed().as_micros(),
            })
        })
        .collect()
}

pub fn describe(cases: &[BenchmarkCase]) -> String {
    cases
        .iter()
        .map(|c| format!("{}:{}x{}->{}", c.name, c.width, c.height, c.target_height))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_every_case() {
        assert_eq!(
            describe(&default_cases()),
            "small:64x64->16, screenshot:1023x765->384, large:4201x5365->54"
        );
    }

    #[test]
    fn run_reports_selected_fraction_per_case() {
        let reports = run(&default_cases(), 100).expect("all cases resolve");
        let picked: Vec<(&str, u32, u32)> = reports
            .iter()
            .map(|r| (r.name.as_str(), r.numerator, r.denominator))
            .collect();
        assert_eq!(picked, vec![("small", 1, 4), ("screenshot", 1, 2), ("large", 1, 99)]);
    }

    #[test]
    fn run_surfaces_core_errors() {
        assert_eq!(run(&default_cases(), 0).unwrap_err(), CoreError::NoSolution);
    }
}
