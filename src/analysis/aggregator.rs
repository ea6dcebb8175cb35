//! In-memory aggregation for dashboard widgets.
//!
//! The sidebar filters only ever narrow the records used for the summary
//! metrics and the range histogram. The aggregation queries always run over
//! the full store and are not touched by anything in this module.

use crate::config::DashboardConfig;
use crate::models::Record;
use serde::Serialize;
use std::collections::BTreeSet;

/// Values available for each filter, sorted and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<i64>,
    pub makes: Vec<String>,
    pub counties: Vec<String>,
}

impl FilterOptions {
    /// Collect the distinct non-null years, makes and counties.
    pub fn from_records(records: &[Record]) -> Self {
        let years: BTreeSet<i64> = records.iter().filter_map(|r| r.model_year).collect();
        let makes: BTreeSet<&str> = records.iter().filter_map(|r| r.make.as_deref()).collect();
        let counties: BTreeSet<&str> =
            records.iter().filter_map(|r| r.county.as_deref()).collect();

        Self {
            years: years.into_iter().collect(),
            makes: makes.into_iter().map(String::from).collect(),
            counties: counties.into_iter().map(String::from).collect(),
        }
    }
}

/// The user's selection for each filter.
///
/// An empty selection leaves that dimension unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardFilters {
    pub years: Vec<i64>,
    pub makes: Vec<String>,
    pub counties: Vec<String>,
}

impl DashboardFilters {
    /// The preselected values: most recent years, first makes and counties.
    pub fn default_selection(options: &FilterOptions, config: &DashboardConfig) -> Self {
        let skip = options.years.len().saturating_sub(config.default_year_count);
        Self {
            years: options.years[skip..].to_vec(),
            makes: options
                .makes
                .iter()
                .take(config.default_make_count)
                .cloned()
                .collect(),
            counties: options
                .counties
                .iter()
                .take(config.default_county_count)
                .cloned()
                .collect(),
        }
    }

    /// Returns true if no dimension is constrained.
    pub fn is_unfiltered(&self) -> bool {
        self.years.is_empty() && self.makes.is_empty() && self.counties.is_empty()
    }

    /// Check whether a record passes every active filter.
    pub fn matches(&self, record: &Record) -> bool {
        fn passes(selected: &[String], value: Option<&str>) -> bool {
            selected.is_empty() || value.is_some_and(|v| selected.iter().any(|s| s == v))
        }

        let year_ok = self.years.is_empty()
            || record.model_year.is_some_and(|y| self.years.contains(&y));

        year_ok
            && passes(&self.makes, record.make.as_deref())
            && passes(&self.counties, record.county.as_deref())
    }

    /// Records that pass the filters, in their original order.
    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Headline numbers shown on the overview tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_vehicles: usize,
    pub unique_makes: usize,
    /// Mean over every non-null range, zeros included. 0 when there are none.
    pub average_range: f64,
    pub unique_counties: usize,
}

impl SummaryMetrics {
    pub fn from_records(records: &[&Record]) -> Self {
        let makes: BTreeSet<&str> = records.iter().filter_map(|r| r.make.as_deref()).collect();
        let counties: BTreeSet<&str> =
            records.iter().filter_map(|r| r.county.as_deref()).collect();

        let ranges: Vec<f64> = records.iter().filter_map(|r| r.electric_range).collect();
        let average_range = if ranges.is_empty() {
            0.0
        } else {
            ranges.iter().sum::<f64>() / ranges.len() as f64
        };

        Self {
            total_vehicles: records.len(),
            unique_makes: makes.len(),
            average_range,
            unique_counties: counties.len(),
        }
    }
}

/// One equal-width histogram bucket. `upper` is inclusive only for the last bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Histogram of known (positive) electric ranges.
///
/// Returns an empty vector when no record has a known range.
pub fn range_histogram(records: &[&Record], bins: usize) -> Vec<HistogramBin> {
    let values: Vec<f64> = records.iter().filter_map(|r| r.known_range()).collect();
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for value in values {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        histogram[idx].count += 1;
    }

    histogram
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: Option<i64>, make: &str, county: &str, range: Option<f64>) -> Record {
        Record {
            make: Some(make.to_string()),
            model_year: year,
            county: Some(county.to_string()),
            electric_range: range,
            ..Default::default()
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record(Some(2018), "TESLA", "King", Some(215.0)),
            record(Some(2020), "TESLA", "King", Some(0.0)),
            record(Some(2019), "NISSAN", "Pierce", Some(150.0)),
            record(None, "KIA", "Spokane", None),
            record(Some(2022), "BMW", "Yakima", Some(30.0)),
        ]
    }

    #[test]
    fn test_filter_options_sorted_and_distinct() {
        let options = FilterOptions::from_records(&sample());
        assert_eq!(options.years, vec![2018, 2019, 2020, 2022]);
        assert_eq!(options.makes, vec!["BMW", "KIA", "NISSAN", "TESLA"]);
        assert_eq!(options.counties, vec!["King", "Pierce", "Spokane", "Yakima"]);
    }

    #[test]
    fn test_default_selection() {
        let options = FilterOptions::from_records(&sample());
        let config = DashboardConfig {
            default_year_count: 2,
            default_make_count: 3,
            default_county_count: 10,
            ..Default::default()
        };

        let filters = DashboardFilters::default_selection(&options, &config);
        assert_eq!(filters.years, vec![2020, 2022]);
        assert_eq!(filters.makes, vec!["BMW", "KIA", "NISSAN"]);
        assert_eq!(filters.counties.len(), 4);
    }

    #[test]
    fn test_empty_filters_pass_everything() {
        let records = sample();
        let filters = DashboardFilters::default();
        assert!(filters.is_unfiltered());
        assert_eq!(filters.apply(&records).len(), records.len());
    }

    #[test]
    fn test_filters_combine() {
        let records = sample();
        let filters = DashboardFilters {
            years: vec![2018, 2020],
            makes: vec!["TESLA".to_string()],
            counties: vec![],
        };
        let filtered = filters.apply(&records);
        assert_eq!(filtered.len(), 2);

        // A record with no year never matches an active year filter
        let filters = DashboardFilters {
            years: vec![2018],
            ..Default::default()
        };
        assert!(!filters.matches(&records[3]));
    }

    #[test]
    fn test_summary_metrics() {
        let records = sample();
        let all: Vec<&Record> = records.iter().collect();
        let metrics = SummaryMetrics::from_records(&all);

        assert_eq!(metrics.total_vehicles, 5);
        assert_eq!(metrics.unique_makes, 4);
        assert_eq!(metrics.unique_counties, 4);
        // (215 + 0 + 150 + 30) / 4
        assert!((metrics.average_range - 98.75).abs() < 1e-9);
    }

    #[test]
    fn test_summary_metrics_empty() {
        let metrics = SummaryMetrics::from_records(&[]);
        assert_eq!(metrics, SummaryMetrics::default());
    }

    #[test]
    fn test_histogram_counts_only_known_ranges() {
        let records = sample();
        let all: Vec<&Record> = records.iter().collect();
        let histogram = range_histogram(&all, 5);

        assert_eq!(histogram.len(), 5);
        assert_eq!(histogram.iter().map(|b| b.count).sum::<usize>(), 3);
        assert_eq!(histogram[0].lower, 30.0);
        assert_eq!(histogram[4].upper, 215.0);
        assert_eq!(histogram[4].count, 1);
    }

    #[test]
    fn test_histogram_single_value_and_empty() {
        let r = record(Some(2020), "KIA", "King", Some(239.0));
        let histogram = range_histogram(&[&r, &r], 30);
        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram[0].count, 2);

        let unknown = record(Some(2020), "KIA", "King", Some(0.0));
        assert!(range_histogram(&[&unknown], 30).is_empty());
    }
}
