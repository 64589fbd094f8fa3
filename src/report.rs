use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::aggregate::{
    self, ActualPeriod, Dimension, GenreSummary, Measure, Ranked, Reducer, RegionalProfile,
    SalesPivot, ScoreCorrelation, Subset,
};
use crate::config::{AnalysisConfig, HypothesisConfig};
use crate::hypothesis::{Sample, TTestResult, student_t_test};
use crate::{CleaningSummary, Frame, GamestatError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisOutcome {
    pub dimension: Dimension,
    pub measure: Measure,
    pub null_hypothesis: String,
    pub result: TTestResult,
}

/// Everything the analysis stage produces for one cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub cleaning: CleaningSummary,
    pub reference_year: i32,
    pub actual_period: ActualPeriod,
    pub actual_rows: usize,
    pub releases_by_year: Vec<(i32, usize)>,
    pub top_platforms: Vec<Ranked>,
    pub active_platforms: Vec<Ranked>,
    pub platform_launch_years: Vec<(String, i32)>,
    pub score_correlations: Vec<ScoreCorrelation>,
    pub genre_summary: Vec<GenreSummary>,
    pub regional_profiles: Vec<RegionalProfile>,
    pub reference_year_profiles: Vec<RegionalProfile>,
    pub hypotheses: Vec<HypothesisOutcome>,
}

impl Report {
    pub fn build(
        frame: &Frame,
        cleaning: CleaningSummary,
        config: &AnalysisConfig,
    ) -> Result<Self, GamestatError> {
        let everything = Subset::all(frame);
        let pivot = SalesPivot::build(&everything);
        let reference_year = config
            .reference_year
            .or_else(|| pivot.latest_year())
            .ok_or(GamestatError::EmptyDataset)?;
        let active_platforms = pivot.active_platforms(reference_year);

        let platforms: BTreeSet<String> = match &config.platforms {
            Some(list) => list.iter().cloned().collect(),
            None => active_platforms.iter().map(|r| r.key.clone()).collect(),
        };
        let actual_period = ActualPeriod {
            first_year: config.first_year,
            last_year: config.last_year,
            platforms,
        };
        let actual = actual_period.apply(frame);
        info!(
            first_year = actual_period.first_year,
            last_year = actual_period.last_year,
            platforms = actual_period.platforms.len(),
            rows = actual.len(),
            "actual period selected"
        );

        // Launch years come from the whole history, listed for the platforms in the period.
        let launch = aggregate::platform_launch_years(&everything);
        let mut platform_launch_years: Vec<(String, i32)> = launch
            .into_iter()
            .filter(|(p, _)| actual_period.platforms.contains(p))
            .collect();
        platform_launch_years.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let hypotheses = config
            .hypotheses
            .iter()
            .map(|h| test_hypothesis(&actual, h, config.alpha))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Report {
            generated_at: Utc::now().to_rfc3339(),
            cleaning,
            reference_year,
            actual_rows: actual.len(),
            releases_by_year: aggregate::releases_by_year(&everything),
            top_platforms: aggregate::top(
                &everything,
                Dimension::Platform,
                Measure::SumSales,
                Reducer::Sum,
                config.top_platforms,
            ),
            active_platforms,
            platform_launch_years,
            score_correlations: config
                .correlation_platforms
                .iter()
                .map(|p| aggregate::score_correlation(&actual, p))
                .collect(),
            genre_summary: aggregate::genre_summary(&actual),
            regional_profiles: aggregate::regional_profiles(&actual, config.top_n),
            reference_year_profiles: aggregate::regional_profiles(
                &everything.year(reference_year),
                config.top_n,
            ),
            hypotheses,
            actual_period,
        })
    }

    pub fn to_json(&self) -> Result<String, GamestatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), GamestatError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "report exported");
        Ok(())
    }
}

fn test_hypothesis(
    subset: &Subset<'_>,
    hypothesis: &HypothesisConfig,
    alpha: f64,
) -> Result<HypothesisOutcome, GamestatError> {
    let first = Sample::from_group(
        subset,
        hypothesis.dimension,
        &hypothesis.first,
        hypothesis.measure,
    );
    let second = Sample::from_group(
        subset,
        hypothesis.dimension,
        &hypothesis.second,
        hypothesis.measure,
    );
    Ok(HypothesisOutcome {
        dimension: hypothesis.dimension,
        measure: hypothesis.measure,
        null_hypothesis: format!(
            "mean {} of {} {} equals that of {}",
            hypothesis.measure, hypothesis.dimension, hypothesis.first, hypothesis.second
        ),
        result: student_t_test(&first, &second, alpha)?,
    })
}
