use std::fmt;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::GamestatError;
use crate::aggregate::{Dimension, Measure, Subset};
use crate::stats::{mean, population_std_dev, sample_variance};

pub const DEFAULT_ALPHA: f64 = 0.05;

/// A labelled set of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label: String,
    pub values: Vec<f64>,
}

impl Sample {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Sample {
            label: label.into(),
            values,
        }
    }

    /// Values of `measure` for the rows of `subset` whose `dimension` equals `key`.
    pub fn from_group(subset: &Subset<'_>, dimension: Dimension, key: &str, measure: Measure) -> Self {
        Sample::new(
            format!("{dimension}={key}"),
            subset.sample(dimension, key, measure),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    pub label: String,
    pub len: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    RejectNull,
    FailToRejectNull,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::RejectNull => f.write_str("reject H0: means differ"),
            Decision::FailToRejectNull => f.write_str("fail to reject H0: means are equal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTestResult {
    pub first: SampleSummary,
    pub second: SampleSummary,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub alpha: f64,
    pub decision: Decision,
}

fn summarize(sample: &Sample) -> Result<SampleSummary, GamestatError> {
    let insufficient = || GamestatError::InsufficientSample {
        group: sample.label.clone(),
        len: sample.values.len(),
    };
    if sample.values.len() < 2 {
        return Err(insufficient());
    }
    Ok(SampleSummary {
        label: sample.label.clone(),
        len: sample.values.len(),
        mean: mean(&sample.values).ok_or_else(insufficient)?,
        std_dev: population_std_dev(&sample.values).ok_or_else(insufficient)?,
    })
}

/// Two-sided Student's t-test for equal means, assuming equal variances.
pub fn student_t_test(
    first: &Sample,
    second: &Sample,
    alpha: f64,
) -> Result<TTestResult, GamestatError> {
    let a = summarize(first)?;
    let b = summarize(second)?;
    let (n1, n2) = (a.len as f64, b.len as f64);
    let df = n1 + n2 - 2.0;

    let var1 = sample_variance(&first.values).unwrap_or(0.0);
    let var2 = sample_variance(&second.values).unwrap_or(0.0);
    let pooled = ((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / df;
    let std_err = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    let diff = a.mean - b.mean;

    let (t_statistic, p_value) = if std_err == 0.0 {
        // Both samples are constant: the means are either identical or certainly different.
        if diff == 0.0 {
            (0.0, 1.0)
        } else {
            (diff.signum() * f64::INFINITY, 0.0)
        }
    } else {
        let t = diff / std_err;
        let dist =
            StudentsT::new(0.0, 1.0, df).map_err(|e| GamestatError::Distribution(e.to_string()))?;
        (t, (2.0 * dist.sf(t.abs())).min(1.0))
    };

    let decision = if p_value < alpha {
        Decision::RejectNull
    } else {
        Decision::FailToRejectNull
    };
    debug!(
        first = %a.label,
        second = %b.label,
        t = t_statistic,
        p = p_value,
        %decision,
        "t-test"
    );

    Ok(TTestResult {
        first: a,
        second: b,
        t_statistic,
        degrees_of_freedom: df,
        p_value,
        alpha,
        decision,
    })
}
