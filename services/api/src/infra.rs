use fairprice::config::ValuationConfig;
use fairprice::error::AppError;
use fairprice::valuation::{PropertyRecord, ValuationEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Build the engine from the configured coefficient table, or an explicit
/// override path.
pub(crate) fn build_engine(
    config: &ValuationConfig,
    coefficients: Option<&Path>,
) -> Result<ValuationEngine, AppError> {
    let table = match coefficients {
        Some(path) => fairprice::valuation::CoefficientTable::from_path(path)?,
        None => config.coefficient_table()?,
    };
    Ok(ValuationEngine::new(table))
}

pub(crate) fn read_target(path: &Path) -> Result<PropertyRecord, AppError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

pub(crate) fn parse_confidence(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|err| format!("failed to parse '{raw}' as a confidence level ({err})"))?;
    let level = if value > 1.0 { value / 100.0 } else { value };
    if level > 0.0 && level < 1.0 {
        Ok(level)
    } else {
        Err(format!("confidence level '{raw}' must lie between 0 and 1 (or 0% and 100%)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_accepts_fractions_and_percentages() {
        assert_eq!(parse_confidence("0.9"), Ok(0.9));
        assert_eq!(parse_confidence("95%"), Ok(0.95));
        assert_eq!(parse_confidence("99"), Ok(0.99));
        assert!(parse_confidence("0").is_err());
        assert!(parse_confidence("high").is_err());
    }
}
