use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::{Dataset, GamestatError};

pub const NAME: &str = "name";
pub const PLATFORM: &str = "platform";
pub const YEAR_OF_RELEASE: &str = "year_of_release";
pub const GENRE: &str = "genre";
pub const NA_SALES: &str = "na_sales";
pub const EU_SALES: &str = "eu_sales";
pub const JP_SALES: &str = "jp_sales";
pub const OTHER_SALES: &str = "other_sales";
pub const CRITIC_SCORE: &str = "critic_score";
pub const USER_SCORE: &str = "user_score";
pub const RATING: &str = "rating";
pub const SUM_SALES: &str = "sum_sales";
pub const SALES_TIER: &str = "sales_tier";

/// Columns every input file must carry, after header normalization.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    NAME,
    PLATFORM,
    YEAR_OF_RELEASE,
    GENRE,
    NA_SALES,
    EU_SALES,
    JP_SALES,
    OTHER_SALES,
    CRITIC_SCORE,
    USER_SCORE,
    RATING,
];

/// Placeholder the source uses for user scores that are not yet determined.
pub const USER_SCORE_SENTINEL: &str = "tbd";

pub fn is_missing(cell: &str) -> bool {
    matches!(
        cell.trim(),
        "" | "NA" | "N/A" | "NaN" | "nan" | "null"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SalesTier {
    Low,
    Medium,
    High,
}

impl SalesTier {
    pub fn classify(sum_sales: f64, cuts: &TierCuts) -> Self {
        if sum_sales <= cuts.p25 {
            SalesTier::Low
        } else if sum_sales > cuts.p75 {
            SalesTier::High
        } else {
            SalesTier::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalesTier::Low => "Low",
            SalesTier::Medium => "Medium",
            SalesTier::High => "High",
        }
    }

    fn parse(cell: &str) -> Option<Self> {
        match cell.trim() {
            "Low" => Some(SalesTier::Low),
            "Medium" => Some(SalesTier::Medium),
            "High" => Some(SalesTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for SalesTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quartiles of `sum_sales` over the whole table, fixed once per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCuts {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserScore {
    Missing,
    ToBeDetermined,
    /// Not yet converted to a number.
    Text(String),
    Score(f64),
}

impl UserScore {
    pub fn from_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if is_missing(cell) {
            UserScore::Missing
        } else if cell.eq_ignore_ascii_case(USER_SCORE_SENTINEL) {
            UserScore::ToBeDetermined
        } else {
            UserScore::Text(cell.to_string())
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            UserScore::Score(v) => Some(*v),
            _ => None,
        }
    }

    fn to_cell(&self) -> String {
        match self {
            UserScore::Missing => String::new(),
            UserScore::ToBeDetermined => USER_SCORE_SENTINEL.to_string(),
            UserScore::Text(s) => s.clone(),
            UserScore::Score(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    NorthAmerica,
    Europe,
    Japan,
    Other,
}

impl Region {
    pub const PROFILED: [Region; 3] = [Region::NorthAmerica, Region::Europe, Region::Japan];

    pub fn column(&self) -> &'static str {
        match self {
            Region::NorthAmerica => NA_SALES,
            Region::Europe => EU_SALES,
            Region::Japan => JP_SALES,
            Region::Other => OTHER_SALES,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "NA",
            Region::Europe => "EU",
            Region::Japan => "JP",
            Region::Other => "Other",
        }
    }
}

/// One game released on one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: Option<String>,
    pub platform: String,
    pub year_of_release: Option<i32>,
    pub genre: Option<String>,
    pub na_sales: f64,
    pub eu_sales: f64,
    pub jp_sales: f64,
    pub other_sales: f64,
    pub critic_score: Option<f64>,
    pub user_score: UserScore,
    pub rating: Option<String>,
    pub sum_sales: Option<f64>,
    pub sales_tier: Option<SalesTier>,
    /// 1-based data row in the input, kept so later errors point at the original line.
    pub source_row: usize,
}

impl Record {
    pub fn regional_total(&self) -> f64 {
        self.na_sales + self.eu_sales + self.jp_sales + self.other_sales
    }

    pub fn sales_in(&self, region: Region) -> f64 {
        match region {
            Region::NorthAmerica => self.na_sales,
            Region::Europe => self.eu_sales,
            Region::Japan => self.jp_sales,
            Region::Other => self.other_sales,
        }
    }
}

/// Typed table that flows through the cleaning steps and is read by the analysis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub(crate) records: Vec<Record>,
    pub(crate) tier_cuts: Option<TierCuts>,
}

impl Frame {
    pub fn new(records: Vec<Record>) -> Self {
        Frame {
            records,
            tier_cuts: None,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn tier_cuts(&self) -> Option<TierCuts> {
        self.tier_cuts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decodes a dataset whose headers are already lower-case.
    ///
    /// Derived columns present in the input are carried over; the cleaning steps recompute
    /// them anyway.
    pub fn decode(dataset: &Dataset) -> Result<Self, GamestatError> {
        let mut idx = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = dataset
                .column_index(column)
                .ok_or(GamestatError::MissingColumn { column })?;
        }
        let [name, platform, year, genre, na, eu, jp, other, critic, user, rating] = idx;
        let sum_idx = dataset.column_index(SUM_SALES);
        let tier_idx = dataset.column_index(SALES_TIER);

        let records = dataset
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let row_no = i + 1;
                if row.len() != dataset.headers.len() {
                    return Err(GamestatError::RaggedRow {
                        row: row_no,
                        expected: dataset.headers.len(),
                        found: row.len(),
                    });
                }
                let platform_cell = row[platform].trim();
                if is_missing(platform_cell) {
                    return Err(GamestatError::Parse {
                        column: PLATFORM,
                        row: row_no,
                        value: row[platform].clone(),
                    });
                }
                Ok(Record {
                    name: text_cell(&row[name]),
                    platform: platform_cell.to_string(),
                    year_of_release: parse_year(&row[year], row_no)?,
                    genre: text_cell(&row[genre]),
                    na_sales: parse_sales(&row[na], NA_SALES, row_no)?,
                    eu_sales: parse_sales(&row[eu], EU_SALES, row_no)?,
                    jp_sales: parse_sales(&row[jp], JP_SALES, row_no)?,
                    other_sales: parse_sales(&row[other], OTHER_SALES, row_no)?,
                    critic_score: parse_optional(&row[critic], CRITIC_SCORE, row_no)?,
                    user_score: UserScore::from_cell(&row[user]),
                    rating: text_cell(&row[rating]),
                    sum_sales: match sum_idx {
                        Some(j) => parse_optional(&row[j], SUM_SALES, row_no)?,
                        None => None,
                    },
                    sales_tier: tier_idx.and_then(|j| SalesTier::parse(&row[j])),
                    source_row: row_no,
                })
            })
            .collect::<Result<Vec<_>, GamestatError>>()?;

        Ok(Frame::new(records))
    }

    /// Renders the frame back into a raw table, derived columns included.
    pub fn to_dataset(&self) -> Dataset {
        let mut headers: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        headers.push(SUM_SALES.to_string());
        headers.push(SALES_TIER.to_string());
        let rows = self
            .records
            .iter()
            .map(|r| {
                vec![
                    r.name.clone().unwrap_or_default(),
                    r.platform.clone(),
                    r.year_of_release.map(|y| y.to_string()).unwrap_or_default(),
                    r.genre.clone().unwrap_or_default(),
                    r.na_sales.to_string(),
                    r.eu_sales.to_string(),
                    r.jp_sales.to_string(),
                    r.other_sales.to_string(),
                    r.critic_score.map(|v| v.to_string()).unwrap_or_default(),
                    r.user_score.to_cell(),
                    r.rating.clone().unwrap_or_default(),
                    r.sum_sales.map(|v| v.to_string()).unwrap_or_default(),
                    r.sales_tier.map(|t| t.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        Dataset::new(headers, rows)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), GamestatError> {
        let dataset = self.to_dataset();
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&dataset.headers)?;
        for row in &dataset.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Missing-value census for the columns cleaning is responsible for.
    pub fn missing_counts(&self) -> Vec<MissingCount> {
        let count = |f: fn(&Record) -> bool| self.records.iter().filter(|r| f(r)).count();
        vec![
            MissingCount::new(NAME, count(|r| r.name.is_none())),
            MissingCount::new(YEAR_OF_RELEASE, count(|r| r.year_of_release.is_none())),
            MissingCount::new(GENRE, count(|r| r.genre.is_none())),
            MissingCount::new(CRITIC_SCORE, count(|r| r.critic_score.is_none())),
            MissingCount::new(USER_SCORE, count(|r| r.user_score.value().is_none())),
            MissingCount::new(RATING, count(|r| r.rating.is_none())),
            MissingCount::new(SUM_SALES, count(|r| r.sum_sales.is_none())),
            MissingCount::new(SALES_TIER, count(|r| r.sales_tier.is_none())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCount {
    pub column: &'static str,
    pub missing: usize,
}

impl MissingCount {
    fn new(column: &'static str, missing: usize) -> Self {
        MissingCount { column, missing }
    }
}

fn text_cell(cell: &str) -> Option<String> {
    if is_missing(cell) {
        None
    } else {
        Some(cell.trim().to_string())
    }
}

fn parse_optional(
    cell: &str,
    column: &'static str,
    row: usize,
) -> Result<Option<f64>, GamestatError> {
    if is_missing(cell) {
        return Ok(None);
    }
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| GamestatError::Parse {
            column,
            row,
            value: cell.to_string(),
        })
}

// Absent regional sales count as zero, the same way a row-wise sum skips them.
fn parse_sales(cell: &str, column: &'static str, row: usize) -> Result<f64, GamestatError> {
    match parse_optional(cell, column, row)? {
        None => Ok(0.0),
        Some(v) if v >= 0.0 => Ok(v),
        Some(_) => Err(GamestatError::Parse {
            column,
            row,
            value: cell.to_string(),
        }),
    }
}

fn parse_year(cell: &str, row: usize) -> Result<Option<i32>, GamestatError> {
    match parse_optional(cell, YEAR_OF_RELEASE, row)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 && v >= 0.0 && v <= f64::from(i32::MAX) => Ok(Some(v as i32)),
        Some(_) => Err(GamestatError::Parse {
            column: YEAR_OF_RELEASE,
            row,
            value: cell.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(platform: &str, year: Option<i32>, sales: [f64; 4]) -> Record {
        Record {
            name: Some(format!("{platform} game")),
            platform: platform.to_string(),
            year_of_release: year,
            genre: Some("Action".to_string()),
            na_sales: sales[0],
            eu_sales: sales[1],
            jp_sales: sales[2],
            other_sales: sales[3],
            critic_score: None,
            user_score: UserScore::Missing,
            rating: None,
            sum_sales: None,
            sales_tier: None,
            source_row: 1,
        }
    }

    fn dataset(rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_tier_boundaries() {
        let cuts = TierCuts {
            p25: 0.17,
            p50: 0.3,
            p75: 0.47,
        };
        assert_eq!(SalesTier::classify(0.17, &cuts), SalesTier::Low);
        assert_eq!(SalesTier::classify(0.18, &cuts), SalesTier::Medium);
        assert_eq!(SalesTier::classify(0.47, &cuts), SalesTier::Medium);
        assert_eq!(SalesTier::classify(0.48, &cuts), SalesTier::High);
    }

    #[test]
    fn test_user_score_cells() {
        assert_eq!(UserScore::from_cell(""), UserScore::Missing);
        assert_eq!(UserScore::from_cell("tbd"), UserScore::ToBeDetermined);
        assert_eq!(UserScore::from_cell(" TBD "), UserScore::ToBeDetermined);
        assert_eq!(UserScore::from_cell("8.5"), UserScore::Text("8.5".to_string()));
    }

    #[test]
    fn test_decode_row() {
        let ds = dataset(&[&[
            "Wii Sports", "Wii", "2006.0", "Sports", "41.36", "28.96", "3.77", "8.45", "76", "8",
            "E",
        ]]);
        let frame = Frame::decode(&ds).unwrap();
        let r = &frame.records()[0];
        assert_eq!(r.name.as_deref(), Some("Wii Sports"));
        assert_eq!(r.year_of_release, Some(2006));
        assert_eq!(r.critic_score, Some(76.0));
        assert_eq!(r.user_score, UserScore::Text("8".to_string()));
        assert_eq!(r.sum_sales, None);
    }

    #[test]
    fn test_decode_missing_cells() {
        let ds = dataset(&[&["", "GEN", "", "", "1.0", "", "0.5", "0", "", "", ""]]);
        let frame = Frame::decode(&ds).unwrap();
        let r = &frame.records[0];
        assert_eq!(r.name, None);
        assert_eq!(r.year_of_release, None);
        assert_eq!(r.eu_sales, 0.0);
        assert_eq!(r.critic_score, None);
        assert_eq!(r.rating, None);
    }

    #[test]
    fn test_decode_rejects_fractional_year() {
        let ds = dataset(&[&["X", "PS2", "2001.5", "Action", "1", "0", "0", "0", "", "", ""]]);
        assert!(matches!(
            Frame::decode(&ds),
            Err(GamestatError::Parse { column: YEAR_OF_RELEASE, row: 1, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_short_row() {
        let ds = dataset(&[
            &["X", "PS2", "2001", "Action", "1", "0", "0", "0", "", "", ""],
            &["A", "PS4"],
        ]);
        assert!(matches!(
            Frame::decode(&ds),
            Err(GamestatError::RaggedRow { row: 2, expected: 11, found: 2 })
        ));
    }

    #[test]
    fn test_decode_keeps_source_rows() {
        let ds = dataset(&[
            &["X", "PS2", "2001", "Action", "1", "0", "0", "0", "", "", ""],
            &["Y", "PS2", "2002", "Action", "1", "0", "0", "0", "", "", ""],
        ]);
        let frame = Frame::decode(&ds).unwrap();
        let rows: Vec<usize> = frame.records().iter().map(|r| r.source_row).collect();
        assert_eq!(rows, [1, 2]);
    }

    #[test]
    fn test_decode_rejects_negative_sales() {
        let ds = dataset(&[&["X", "PS2", "2001", "Action", "-1", "0", "0", "0", "", "", ""]]);
        assert!(matches!(
            Frame::decode(&ds),
            Err(GamestatError::Parse { column: NA_SALES, .. })
        ));
    }

    #[test]
    fn test_decode_missing_column() {
        let ds = Dataset::new(vec![NAME.to_string()], vec![vec!["X".to_string()]]);
        assert!(matches!(
            Frame::decode(&ds),
            Err(GamestatError::MissingColumn { column: PLATFORM })
        ));
    }

    #[test]
    fn test_csv_output_decodes_to_same_frame() {
        let mut r = record("PS4", Some(2015), [1.25, 0.5, 0.0, 0.125]);
        r.user_score = UserScore::Score(7.5);
        r.critic_score = Some(81.0);
        r.sum_sales = Some(r.regional_total());
        r.sales_tier = Some(SalesTier::High);
        let frame = Frame::new(vec![r]);
        let mut buf = Vec::new();
        frame.write_csv(&mut buf).unwrap();
        let back = Frame::decode(&Dataset::from_reader(buf.as_slice()).unwrap()).unwrap();
        let got = &back.records[0];
        assert_eq!(got.sum_sales, Some(1.875));
        assert_eq!(got.sales_tier, Some(SalesTier::High));
        assert_eq!(got.user_score, UserScore::Text("7.5".to_string()));
    }
}
