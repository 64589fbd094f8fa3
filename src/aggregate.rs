use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::{mean, median, pearson};
use crate::{Frame, Record, Region};

/// Categorical column a table can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Platform,
    Genre,
    Rating,
    Year,
    SalesTier,
}

impl Dimension {
    pub fn key(&self, record: &Record) -> Option<String> {
        match self {
            Dimension::Platform => Some(record.platform.clone()),
            Dimension::Genre => record.genre.clone(),
            Dimension::Rating => record.rating.clone(),
            Dimension::Year => record.year_of_release.map(|y| y.to_string()),
            Dimension::SalesTier => record.sales_tier.map(|t| t.to_string()),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::Platform => "platform",
            Dimension::Genre => "genre",
            Dimension::Rating => "rating",
            Dimension::Year => "year",
            Dimension::SalesTier => "sales_tier",
        })
    }
}

/// Numeric column a group reduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    SumSales,
    RegionSales(Region),
    CriticScore,
    UserScore,
}

impl Measure {
    pub fn value(&self, record: &Record) -> Option<f64> {
        match self {
            Measure::SumSales => record.sum_sales,
            Measure::RegionSales(region) => Some(record.sales_in(*region)),
            Measure::CriticScore => record.critic_score,
            Measure::UserScore => record.user_score.value(),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::SumSales => f.write_str("sum_sales"),
            Measure::RegionSales(region) => f.write_str(region.column()),
            Measure::CriticScore => f.write_str("critic_score"),
            Measure::UserScore => f.write_str("user_score"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Sum,
    Mean,
    Median,
    Count,
}

impl Reducer {
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        match self {
            Reducer::Sum => Some(values.iter().sum()),
            Reducer::Mean => mean(values),
            Reducer::Median => median(values),
            Reducer::Count => Some(values.len() as f64),
        }
    }
}

/// One group key and its reduced value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked {
    pub key: String,
    pub value: f64,
}

/// Read-only view over some rows of a cleaned frame.
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    rows: Vec<&'a Record>,
}

impl<'a> Subset<'a> {
    pub fn all(frame: &'a Frame) -> Self {
        Subset {
            rows: frame.records().iter().collect(),
        }
    }

    pub fn filter<P>(&self, predicate: P) -> Subset<'a>
    where
        P: Fn(&Record) -> bool,
    {
        Subset {
            rows: self.rows.iter().copied().filter(|&r| predicate(r)).collect(),
        }
    }

    pub fn year(&self, year: i32) -> Subset<'a> {
        self.filter(|r| r.year_of_release == Some(year))
    }

    pub fn rows(&self) -> &[&'a Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of `measure` for rows whose `dimension` equals `key`.
    pub fn sample(&self, dimension: Dimension, key: &str, measure: Measure) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|r| dimension.key(r).as_deref() == Some(key))
            .filter_map(|r| measure.value(r))
            .collect()
    }
}

/// Years and platforms an analysis is restricted to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActualPeriod {
    pub first_year: i32,
    pub last_year: i32,
    pub platforms: BTreeSet<String>,
}

impl ActualPeriod {
    pub fn contains(&self, record: &Record) -> bool {
        record
            .year_of_release
            .is_some_and(|y| (self.first_year..=self.last_year).contains(&y))
            && self.platforms.contains(&record.platform)
    }

    pub fn apply<'a>(&self, frame: &'a Frame) -> Subset<'a> {
        Subset::all(frame).filter(|r| self.contains(r))
    }
}

fn rank(groups: BTreeMap<String, Vec<f64>>, reducer: Reducer) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = groups
        .into_par_iter()
        .filter_map(|(key, values)| reducer.reduce(&values).map(|value| Ranked { key, value }))
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
    ranked
}

/// Groups rows by `dimension`, reduces `measure` per group and orders groups by the reduced
/// value, largest first. Rows missing the key or the value are skipped.
pub fn group_by(
    subset: &Subset<'_>,
    dimension: Dimension,
    measure: Measure,
    reducer: Reducer,
) -> Vec<Ranked> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in subset.rows() {
        if let (Some(key), Some(value)) = (dimension.key(record), measure.value(record)) {
            groups.entry(key).or_default().push(value);
        }
    }
    debug!(%dimension, %measure, groups = groups.len(), "grouped rows");
    rank(groups, reducer)
}

pub fn top(
    subset: &Subset<'_>,
    dimension: Dimension,
    measure: Measure,
    reducer: Reducer,
    n: usize,
) -> Vec<Ranked> {
    let mut ranked = group_by(subset, dimension, measure, reducer);
    ranked.truncate(n);
    ranked
}

/// Releases per year, in chronological order.
pub fn releases_by_year(subset: &Subset<'_>) -> Vec<(i32, usize)> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for year in subset.rows().iter().filter_map(|r| r.year_of_release) {
        *counts.entry(year).or_default() += 1;
    }
    counts.into_iter().collect()
}

/// Total sales for every (year, platform) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesPivot {
    cells: BTreeMap<i32, BTreeMap<String, f64>>,
}

impl SalesPivot {
    pub fn build(subset: &Subset<'_>) -> Self {
        let mut cells: BTreeMap<i32, BTreeMap<String, f64>> = BTreeMap::new();
        for record in subset.rows() {
            if let (Some(year), Some(sales)) = (record.year_of_release, record.sum_sales) {
                *cells
                    .entry(year)
                    .or_default()
                    .entry(record.platform.clone())
                    .or_default() += sales;
            }
        }
        SalesPivot { cells }
    }

    pub fn get(&self, year: i32, platform: &str) -> Option<f64> {
        self.cells.get(&year)?.get(platform).copied()
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.cells.keys().copied()
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.cells.keys().next_back().copied()
    }

    /// Platforms with non-zero sales in `year`, best-selling first.
    pub fn active_platforms(&self, year: i32) -> Vec<Ranked> {
        let mut ranked: Vec<Ranked> = self
            .cells
            .get(&year)
            .into_iter()
            .flatten()
            .filter(|(_, sales)| **sales > 0.0)
            .map(|(platform, sales)| Ranked {
                key: platform.clone(),
                value: *sales,
            })
            .collect();
        ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
        ranked
    }
}

/// First release year seen for each platform.
pub fn platform_launch_years(subset: &Subset<'_>) -> BTreeMap<String, i32> {
    let mut first: BTreeMap<String, i32> = BTreeMap::new();
    for record in subset.rows() {
        if let Some(year) = record.year_of_release {
            first
                .entry(record.platform.clone())
                .and_modify(|y| *y = (*y).min(year))
                .or_insert(year);
        }
    }
    first
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCorrelation {
    pub platform: String,
    pub rows: usize,
    pub critic_score: Option<f64>,
    pub user_score: Option<f64>,
}

fn sales_correlation(rows: &[&Record], measure: Measure) -> Option<f64> {
    let (sales, scores): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|r| Some((r.sum_sales?, measure.value(r)?)))
        .unzip();
    pearson(&sales, &scores)
}

/// Pearson correlation of total sales with critic and user scores on one platform.
pub fn score_correlation(subset: &Subset<'_>, platform: &str) -> ScoreCorrelation {
    let rows = subset.filter(|r| r.platform == platform);
    ScoreCorrelation {
        platform: platform.to_string(),
        rows: rows.len(),
        critic_score: sales_correlation(rows.rows(), Measure::CriticScore),
        user_score: sales_correlation(rows.rows(), Measure::UserScore),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreSummary {
    pub genre: String,
    pub releases: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
}

/// Total, mean and median sales per genre, highest median first.
pub fn genre_summary(subset: &Subset<'_>) -> Vec<GenreSummary> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in subset.rows() {
        if let (Some(genre), Some(sales)) = (&record.genre, record.sum_sales) {
            groups.entry(genre.clone()).or_default().push(sales);
        }
    }
    let mut summary: Vec<GenreSummary> = groups
        .into_par_iter()
        .filter_map(|(genre, sales)| {
            Some(GenreSummary {
                releases: sales.len(),
                sum: sales.iter().sum(),
                mean: mean(&sales)?,
                median: median(&sales)?,
                genre,
            })
        })
        .collect();
    summary.sort_by(|a, b| {
        b.median
            .total_cmp(&a.median)
            .then_with(|| a.genre.cmp(&b.genre))
    });
    summary
}

/// Best-selling platforms, genres and ratings within one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalProfile {
    pub region: Region,
    pub platforms: Vec<Ranked>,
    pub genres: Vec<Ranked>,
    pub ratings: Vec<Ranked>,
}

pub fn regional_profiles(subset: &Subset<'_>, n: usize) -> Vec<RegionalProfile> {
    Region::PROFILED
        .into_iter()
        .map(|region| {
            let measure = Measure::RegionSales(region);
            RegionalProfile {
                region,
                platforms: top(subset, Dimension::Platform, measure, Reducer::Sum, n),
                genres: top(subset, Dimension::Genre, measure, Reducer::Sum, n),
                ratings: top(subset, Dimension::Rating, measure, Reducer::Sum, n),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserScore;
    use crate::types::tests::record;

    fn sold(platform: &str, year: i32, sales: f64) -> Record {
        let mut r = record(platform, Some(year), [sales, 0.0, 0.0, 0.0]);
        r.sum_sales = Some(sales);
        r
    }

    #[test]
    fn test_group_by_sum_orders_descending() {
        let frame = Frame::new(vec![
            sold("PS4", 2015, 10.0),
            sold("PS4", 2016, 5.0),
            sold("XOne", 2016, 3.0),
        ]);
        let ranked = group_by(
            &Subset::all(&frame),
            Dimension::Platform,
            Measure::SumSales,
            Reducer::Sum,
        );
        assert_eq!(
            ranked,
            vec![
                Ranked {
                    key: "PS4".to_string(),
                    value: 15.0
                },
                Ranked {
                    key: "XOne".to_string(),
                    value: 3.0
                },
            ]
        );
    }

    #[test]
    fn test_group_by_ties_break_on_key() {
        let frame = Frame::new(vec![sold("WiiU", 2015, 2.0), sold("3DS", 2015, 2.0)]);
        let ranked = group_by(
            &Subset::all(&frame),
            Dimension::Platform,
            Measure::SumSales,
            Reducer::Mean,
        );
        assert_eq!(ranked[0].key, "3DS");
        assert_eq!(ranked[1].key, "WiiU");
    }

    #[test]
    fn test_reducers() {
        let v = [1.0, 2.0, 9.0];
        assert_eq!(Reducer::Sum.reduce(&v), Some(12.0));
        assert_eq!(Reducer::Mean.reduce(&v), Some(4.0));
        assert_eq!(Reducer::Median.reduce(&v), Some(2.0));
        assert_eq!(Reducer::Count.reduce(&v), Some(3.0));
        assert_eq!(Reducer::Median.reduce(&[]), None);
    }

    #[test]
    fn test_actual_period_filters_years_and_platforms() {
        let frame = Frame::new(vec![
            sold("PS4", 2011, 1.0),
            sold("PS4", 2012, 1.0),
            sold("PS4", 2016, 1.0),
            sold("PS2", 2013, 1.0),
        ]);
        let period = ActualPeriod {
            first_year: 2012,
            last_year: 2016,
            platforms: BTreeSet::from(["PS4".to_string()]),
        };
        let subset = period.apply(&frame);
        assert_eq!(subset.len(), 2);
        assert!(subset.rows().iter().all(|r| r.platform == "PS4"));
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_pivot_and_active_platforms() {
        let frame = Frame::new(vec![
            sold("PS4", 2016, 4.0),
            sold("PS4", 2016, 1.0),
            sold("XOne", 2016, 2.0),
            sold("Wii", 2016, 0.0),
            sold("DS", 2013, 1.0),
        ]);
        let pivot = SalesPivot::build(&Subset::all(&frame));
        assert_eq!(pivot.get(2016, "PS4"), Some(5.0));
        assert_eq!(pivot.latest_year(), Some(2016));
        assert_eq!(pivot.years().collect::<Vec<_>>(), [2013, 2016]);
        let active: Vec<_> = pivot.active_platforms(2016).into_iter().map(|r| r.key).collect();
        assert_eq!(active, ["PS4", "XOne"]);
        assert!(pivot.active_platforms(1980).is_empty());
    }

    #[test]
    fn test_launch_years_and_release_counts() {
        let frame = Frame::new(vec![
            sold("PS4", 2014, 1.0),
            sold("PS4", 2013, 1.0),
            sold("3DS", 2011, 1.0),
        ]);
        let subset = Subset::all(&frame);
        let launch = platform_launch_years(&subset);
        assert_eq!(launch.get("PS4"), Some(&2013));
        assert_eq!(launch.get("3DS"), Some(&2011));
        assert_eq!(releases_by_year(&subset), [(2011, 1), (2013, 1), (2014, 1)]);
    }

    #[test]
    fn test_score_correlation() {
        let mut rows: Vec<Record> = [1.0, 2.0, 3.0]
            .into_iter()
            .map(|s| sold("PS4", 2015, s))
            .collect();
        for (r, score) in rows.iter_mut().zip([50.0, 60.0, 70.0]) {
            r.critic_score = Some(score);
            r.user_score = UserScore::Score(8.0);
        }
        let frame = Frame::new(rows);
        let corr = score_correlation(&Subset::all(&frame), "PS4");
        assert_eq!(corr.rows, 3);
        assert!((corr.critic_score.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(corr.user_score, None);
    }

    #[test]
    fn test_genre_summary_orders_by_median() {
        let mut a = sold("PS4", 2015, 1.0);
        a.genre = Some("Shooter".to_string());
        let mut b = sold("PS4", 2015, 3.0);
        b.genre = Some("Shooter".to_string());
        let mut c = sold("PS4", 2015, 0.5);
        c.genre = Some("Puzzle".to_string());
        let frame = Frame::new(vec![a, b, c]);
        let summary = genre_summary(&Subset::all(&frame));
        assert_eq!(summary[0].genre, "Shooter");
        assert_eq!(summary[0].sum, 4.0);
        assert_eq!(summary[0].median, 2.0);
        assert_eq!(summary[1].releases, 1);
    }

    #[test]
    fn test_regional_profiles() {
        let mut jp = record("3DS", Some(2015), [0.0, 0.0, 2.0, 0.0]);
        jp.sum_sales = Some(2.0);
        jp.rating = Some("E".to_string());
        let mut na = record("XOne", Some(2015), [3.0, 0.0, 0.0, 0.0]);
        na.sum_sales = Some(3.0);
        na.rating = Some("M".to_string());
        let frame = Frame::new(vec![jp, na]);
        let profiles = regional_profiles(&Subset::all(&frame), 1);
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].region, Region::NorthAmerica);
        assert_eq!(profiles[0].platforms[0].key, "XOne");
        assert_eq!(profiles[0].ratings[0].key, "M");
        assert_eq!(profiles[2].platforms[0].key, "3DS");
        assert_eq!(profiles[2].platforms.len(), 1);
    }
}
