use serde::Serialize;
use tracing::{debug, info, warn};

use crate::stats::{group_medians, quantiles};
use crate::types::{
    CRITIC_SCORE, MissingCount, SALES_TIER, SUM_SALES, SalesTier, TierCuts, USER_SCORE,
    UserScore,
};
use crate::{Dataset, Frame, GamestatError};

/// Legacy ESRB label and the current label it was folded into.
pub const RATING_ALIASES: [(&str, &str); 1] = [("K-A", "E")];
pub const UNKNOWN_RATING: &str = "Unknown";

pub type StepFn = fn(Frame) -> Result<Frame, GamestatError>;

/// A named transformation from the table-so-far to the table-after.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub name: &'static str,
    pub apply: StepFn,
}

/// Cleaning steps in the order they must run. Score imputation reads `sales_tier`, which
/// reads `sum_sales`, which is only meaningful once unnamed rows are gone.
pub const STEPS: [Step; 7] = [
    Step {
        name: "impute_year_by_platform",
        apply: impute_year_by_platform,
    },
    Step {
        name: "drop_unnamed",
        apply: drop_unnamed,
    },
    Step {
        name: "sum_sales",
        apply: compute_sum_sales,
    },
    Step {
        name: "sales_tier",
        apply: assign_sales_tier,
    },
    Step {
        name: "impute_critic_score",
        apply: impute_critic_score,
    },
    Step {
        name: "normalize_user_score",
        apply: normalize_user_score,
    },
    Step {
        name: "normalize_rating",
        apply: normalize_rating,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub name: &'static str,
    pub rows_before: usize,
    pub rows_after: usize,
    /// Rows whose values changed; for row-dropping steps, rows removed; for header
    /// normalization, headers renamed.
    pub rows_changed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    pub tier_cuts: Option<TierCuts>,
    pub missing_before: Vec<MissingCount>,
    pub missing_after: Vec<MissingCount>,
    pub steps: Vec<StepOutcome>,
}

/// Lower-cases and trims every header.
pub fn normalize_column_names(mut dataset: Dataset) -> Dataset {
    for header in &mut dataset.headers {
        *header = header.trim().to_lowercase();
    }
    dataset
}

pub const NORMALIZE_COLUMN_NAMES: &str = "normalize_column_names";

/// Full cleaning stage. Header normalization runs first on the raw table, since decoding
/// looks columns up by their lower-case names; it is recorded as the first step outcome.
/// The typed steps in [`STEPS`] follow.
pub fn clean(dataset: Dataset) -> Result<(Frame, CleaningSummary), GamestatError> {
    if dataset.is_empty() {
        return Err(GamestatError::EmptyDataset);
    }
    let raw_headers = dataset.headers.clone();
    let dataset = normalize_column_names(dataset);
    let renamed = raw_headers
        .iter()
        .zip(&dataset.headers)
        .filter(|(a, b)| a != b)
        .count();
    info!(
        step = NORMALIZE_COLUMN_NAMES,
        rows = dataset.len(),
        changed = renamed,
        "cleaning step applied"
    );
    let header_outcome = StepOutcome {
        name: NORMALIZE_COLUMN_NAMES,
        rows_before: dataset.len(),
        rows_after: dataset.len(),
        rows_changed: renamed,
    };

    let frame = Frame::decode(&dataset)?;
    let (frame, mut summary) = run_steps(frame, &STEPS)?;
    summary.steps.insert(0, header_outcome);
    Ok((frame, summary))
}

pub fn run_steps(
    frame: Frame,
    steps: &[Step],
) -> Result<(Frame, CleaningSummary), GamestatError> {
    let rows_in = frame.len();
    let missing_before = frame.missing_counts();
    let mut outcomes = Vec::with_capacity(steps.len());
    let mut frame = frame;

    for step in steps {
        let before = frame.clone();
        frame = (step.apply)(frame)?;
        let rows_changed = if before.len() == frame.len() {
            before
                .records
                .iter()
                .zip(&frame.records)
                .filter(|(a, b)| a != b)
                .count()
        } else {
            before.len() - frame.len()
        };
        info!(
            step = step.name,
            rows = frame.len(),
            changed = rows_changed,
            "cleaning step applied"
        );
        outcomes.push(StepOutcome {
            name: step.name,
            rows_before: before.len(),
            rows_after: frame.len(),
            rows_changed,
        });
    }

    let summary = CleaningSummary {
        rows_in,
        rows_out: frame.len(),
        tier_cuts: frame.tier_cuts,
        missing_before,
        missing_after: frame.missing_counts(),
        steps: outcomes,
    };
    Ok((frame, summary))
}

/// Fills missing years with the median year of the row's platform. A platform with no known
/// year at all keeps its gaps.
pub fn impute_year_by_platform(mut frame: Frame) -> Result<Frame, GamestatError> {
    let medians = group_medians(frame.records.iter().filter_map(|r| {
        r.year_of_release
            .map(|y| (r.platform.clone(), f64::from(y)))
    }));

    for record in frame.records.iter_mut().filter(|r| r.year_of_release.is_none()) {
        match medians.get(&record.platform) {
            // Half-year medians truncate to the whole year below.
            Some(&median) => record.year_of_release = Some(median.trunc() as i32),
            None => warn!(
                platform = %record.platform,
                "no known release year for platform; leaving year missing"
            ),
        }
    }
    Ok(frame)
}

pub fn drop_unnamed(mut frame: Frame) -> Result<Frame, GamestatError> {
    frame.records.retain(|r| r.name.is_some());
    Ok(frame)
}

pub fn compute_sum_sales(mut frame: Frame) -> Result<Frame, GamestatError> {
    for record in &mut frame.records {
        record.sum_sales = Some(record.regional_total());
    }
    Ok(frame)
}

/// Classifies every row against quartile cut points computed once from the whole table.
pub fn assign_sales_tier(mut frame: Frame) -> Result<Frame, GamestatError> {
    let sums = frame
        .records
        .iter()
        .map(|r| {
            r.sum_sales.ok_or(GamestatError::MissingDerived {
                step: "sales_tier",
                column: SUM_SALES,
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let Some(q) = quantiles(&sums, &[0.25, 0.5, 0.75]) else {
        frame.tier_cuts = None;
        return Ok(frame);
    };
    let cuts = TierCuts {
        p25: q[0],
        p50: q[1],
        p75: q[2],
    };
    debug!(p25 = cuts.p25, p50 = cuts.p50, p75 = cuts.p75, "sales tier cut points");

    for (record, sum) in frame.records.iter_mut().zip(sums) {
        record.sales_tier = Some(SalesTier::classify(sum, &cuts));
    }
    frame.tier_cuts = Some(cuts);
    Ok(frame)
}

fn require_tiers(frame: &Frame, step: &'static str) -> Result<(), GamestatError> {
    if frame.records.iter().any(|r| r.sales_tier.is_none()) {
        return Err(GamestatError::MissingDerived {
            step,
            column: SALES_TIER,
        });
    }
    Ok(())
}

pub fn impute_critic_score(mut frame: Frame) -> Result<Frame, GamestatError> {
    require_tiers(&frame, "impute_critic_score")?;
    let medians = group_medians(
        frame
            .records
            .iter()
            .filter_map(|r| Some((r.sales_tier?, r.critic_score?))),
    );

    for record in frame.records.iter_mut().filter(|r| r.critic_score.is_none()) {
        let tier = record.sales_tier.unwrap_or(SalesTier::Medium);
        match medians.get(&tier) {
            Some(&median) => record.critic_score = Some(median),
            None => warn!(tier = %tier, column = CRITIC_SCORE, "no scores in tier to impute from"),
        }
    }
    Ok(frame)
}

/// Maps the sentinel to missing, parses the rest, then fills gaps with the tier median of
/// the real scores.
pub fn normalize_user_score(mut frame: Frame) -> Result<Frame, GamestatError> {
    require_tiers(&frame, "normalize_user_score")?;
    for record in &mut frame.records {
        record.user_score = match std::mem::replace(&mut record.user_score, UserScore::Missing) {
            UserScore::ToBeDetermined | UserScore::Missing => UserScore::Missing,
            UserScore::Text(raw) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => UserScore::Score(v),
                _ => {
                    return Err(GamestatError::Parse {
                        column: USER_SCORE,
                        row: record.source_row,
                        value: raw,
                    });
                }
            },
            score @ UserScore::Score(_) => score,
        };
    }

    let medians = group_medians(
        frame
            .records
            .iter()
            .filter_map(|r| Some((r.sales_tier?, r.user_score.value()?))),
    );

    for record in &mut frame.records {
        if record.user_score != UserScore::Missing {
            continue;
        }
        let tier = record.sales_tier.unwrap_or(SalesTier::Medium);
        match medians.get(&tier) {
            Some(&median) => record.user_score = UserScore::Score(median),
            None => warn!(tier = %tier, column = USER_SCORE, "no scores in tier to impute from"),
        }
    }
    Ok(frame)
}

pub fn normalize_rating(mut frame: Frame) -> Result<Frame, GamestatError> {
    for record in &mut frame.records {
        let rating = match record.rating.take() {
            Some(label) => RATING_ALIASES
                .iter()
                .find(|(legacy, _)| *legacy == label)
                .map_or(label, |(_, current)| current.to_string()),
            None => UNKNOWN_RATING.to_string(),
        };
        record.rating = Some(rating);
    }
    Ok(frame)
}
