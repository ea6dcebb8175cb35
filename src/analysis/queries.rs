//! The aggregation query set.
//!
//! Seven read-only grouping queries over the `ev_population` table. Every
//! query drops rows whose grouping column is null and breaks ties on equal
//! counts or averages lexically, so repeated calls return identical tables.

use crate::error::Result;
use crate::models::ResultTable;
use crate::store::RecordStore;
use serde::Serialize;
use std::fmt;

/// Counties considered by [`count_by_city_within_named_counties`].
pub const NAMED_COUNTIES: [&str; 4] = ["King", "Pierce", "Snohomish", "Spokane"];

pub const TOP_MAKES_LIMIT: usize = 5;
pub const AVG_RANGE_LIMIT: usize = 10;
pub const CITY_LIMIT: usize = 20;
pub const TOP_MODELS_LIMIT: usize = 15;

const TOP_MAKES_SQL: &str = r#"
    SELECT "Make", COUNT(*) AS total
    FROM ev_population
    WHERE "Make" IS NOT NULL
    GROUP BY "Make"
    ORDER BY total DESC, "Make" ASC
    LIMIT 5
"#;

const COUNT_BY_YEAR_SQL: &str = r#"
    SELECT "Model Year" AS Year, COUNT(*) AS EV_Count
    FROM ev_population
    WHERE "Model Year" IS NOT NULL
    GROUP BY "Model Year"
    ORDER BY Year ASC
"#;

const COUNT_BY_COUNTY_SQL: &str = r#"
    SELECT "County", COUNT(*) AS EV_Count
    FROM ev_population
    WHERE "County" IS NOT NULL
    GROUP BY "County"
    ORDER BY EV_Count DESC, "County" ASC
"#;

const AVG_RANGE_BY_MAKE_SQL: &str = r#"
    SELECT "Make", AVG("Electric Range") AS Avg_Range
    FROM ev_population
    WHERE "Electric Range" > 0 AND "Make" IS NOT NULL
    GROUP BY "Make"
    ORDER BY Avg_Range DESC, "Make" ASC
    LIMIT 10
"#;

const COUNT_BY_CITY_SQL: &str = r#"
    SELECT "City", COUNT(*) AS Count
    FROM ev_population
    WHERE "County" IN (?1, ?2, ?3, ?4) AND "City" IS NOT NULL
    GROUP BY "City"
    ORDER BY Count DESC, "City" ASC
    LIMIT 20
"#;

// Percentage uses the windowed total over every grouped row, rounded to two
// decimals, so the column sums to 100 within 0.01 across the returned groups.
const TYPE_CAFV_DISTRIBUTION_SQL: &str = r#"
    SELECT
        "Electric Vehicle Type",
        "Clean Alternative Fuel Vehicle (CAFV) Eligibility",
        COUNT(*) AS Count,
        ROUND(100.0 * COUNT(*) / SUM(COUNT(*)) OVER (), 2) AS Percentage
    FROM ev_population
    WHERE "Electric Vehicle Type" IS NOT NULL
      AND "Clean Alternative Fuel Vehicle (CAFV) Eligibility" IS NOT NULL
    GROUP BY "Electric Vehicle Type", "Clean Alternative Fuel Vehicle (CAFV) Eligibility"
    ORDER BY Count DESC,
             "Electric Vehicle Type" ASC,
             "Clean Alternative Fuel Vehicle (CAFV) Eligibility" ASC
"#;

const TOP_MODELS_BY_RANGE_SQL: &str = r#"
    SELECT "Make", "Model", AVG("Electric Range") AS Avg_Range, COUNT(*) AS Model_Count
    FROM ev_population
    WHERE "Electric Range" > 0 AND "Make" IS NOT NULL AND "Model" IS NOT NULL
    GROUP BY "Make", "Model"
    ORDER BY Avg_Range DESC, "Make" ASC, "Model" ASC
    LIMIT 15
"#;

/// Top 5 makes by registration count.
pub fn top_makes(store: &RecordStore) -> Result<ResultTable> {
    store.query("top_makes", TOP_MAKES_SQL, &[])
}

/// Registrations per model year, oldest first.
pub fn count_by_year(store: &RecordStore) -> Result<ResultTable> {
    store.query("count_by_year", COUNT_BY_YEAR_SQL, &[])
}

/// Full county ranking by registration count.
pub fn count_by_county(store: &RecordStore) -> Result<ResultTable> {
    store.query("count_by_county", COUNT_BY_COUNTY_SQL, &[])
}

/// Top 10 makes by mean electric range over rows with a known range.
pub fn avg_range_by_make(store: &RecordStore) -> Result<ResultTable> {
    store.query("avg_range_by_make", AVG_RANGE_BY_MAKE_SQL, &[])
}

/// Top 20 cities by count, restricted to [`NAMED_COUNTIES`].
pub fn count_by_city_within_named_counties(store: &RecordStore) -> Result<ResultTable> {
    let [a, b, c, d] = NAMED_COUNTIES;
    store.query(
        "count_by_city_within_named_counties",
        COUNT_BY_CITY_SQL,
        &[&a, &b, &c, &d],
    )
}

/// Counts and share of total per (vehicle type, CAFV eligibility) pair.
pub fn distribution_by_type_and_cafv(store: &RecordStore) -> Result<ResultTable> {
    store.query(
        "distribution_by_type_and_cafv",
        TYPE_CAFV_DISTRIBUTION_SQL,
        &[],
    )
}

/// Top 15 (make, model) pairs by mean electric range.
pub fn top_models_by_range(store: &RecordStore) -> Result<ResultTable> {
    store.query("top_models_by_range", TOP_MODELS_BY_RANGE_SQL, &[])
}

/// One of the seven aggregation queries, for callers that pick them by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationQuery {
    TopMakes,
    CountByYear,
    CountByCounty,
    AvgRangeByMake,
    CountByCity,
    TypeCafvDistribution,
    TopModelsByRange,
}

impl AggregationQuery {
    pub const ALL: [AggregationQuery; 7] = [
        AggregationQuery::TopMakes,
        AggregationQuery::CountByYear,
        AggregationQuery::CountByCounty,
        AggregationQuery::AvgRangeByMake,
        AggregationQuery::CountByCity,
        AggregationQuery::TypeCafvDistribution,
        AggregationQuery::TopModelsByRange,
    ];

    /// Run this query against the store.
    pub fn run(&self, store: &RecordStore) -> Result<ResultTable> {
        match self {
            AggregationQuery::TopMakes => top_makes(store),
            AggregationQuery::CountByYear => count_by_year(store),
            AggregationQuery::CountByCounty => count_by_county(store),
            AggregationQuery::AvgRangeByMake => avg_range_by_make(store),
            AggregationQuery::CountByCity => count_by_city_within_named_counties(store),
            AggregationQuery::TypeCafvDistribution => distribution_by_type_and_cafv(store),
            AggregationQuery::TopModelsByRange => top_models_by_range(store),
        }
    }

    /// File name (without extension) for exported summaries and charts.
    pub fn file_stem(&self) -> &'static str {
        match self {
            AggregationQuery::TopMakes => "top_ev_makes",
            AggregationQuery::CountByYear => "ev_by_year",
            AggregationQuery::CountByCounty => "ev_by_county",
            AggregationQuery::AvgRangeByMake => "avg_electric_range_by_make",
            AggregationQuery::CountByCity => "ev_by_city_named_counties",
            AggregationQuery::TypeCafvDistribution => "ev_by_type_and_cafv",
            AggregationQuery::TopModelsByRange => "top_ev_models_by_range",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            AggregationQuery::TopMakes => "Top 5 EV Manufacturers",
            AggregationQuery::CountByYear => "EV Count by Year",
            AggregationQuery::CountByCounty => "EV Count by County",
            AggregationQuery::AvgRangeByMake => "Average Electric Range by Make (Top 10)",
            AggregationQuery::CountByCity => "EV Count by City (King, Pierce, Snohomish, Spokane)",
            AggregationQuery::TypeCafvDistribution => {
                "EV Distribution by Type and CAFV Eligibility"
            }
            AggregationQuery::TopModelsByRange => "EV Models by Range and Popularity",
        }
    }
}

impl fmt::Display for AggregationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}
