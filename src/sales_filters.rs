use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::sales_pipeline::{LineItemRecord, LineItemTable};

/// `countries` and `products` treat an empty set differently: no selected
/// country keeps nothing, no selected product keeps everything.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesFilter {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub countries: BTreeSet<String>,
    pub products: BTreeSet<String>,
}

impl SalesFilter {
    pub fn full_range(line_items: &LineItemTable) -> Option<Self> {
        let (date_from, date_to) = line_items.date_bounds()?;
        Some(Self {
            date_from,
            date_to,
            countries: line_items.distinct_countries().into_iter().collect(),
            products: BTreeSet::new(),
        })
    }

    pub fn matches(&self, row: &LineItemRecord) -> bool {
        row_matches(
            row,
            self.date_from,
            self.date_to,
            &self.countries,
            &self.products,
        )
    }

    pub fn apply(&self, line_items: &LineItemTable) -> LineItemTable {
        filter_line_items(
            line_items,
            self.date_from,
            self.date_to,
            &self.countries,
            &self.products,
        )
    }
}

fn row_matches(
    row: &LineItemRecord,
    date_from: NaiveDate,
    date_to: NaiveDate,
    countries: &BTreeSet<String>,
    products: &BTreeSet<String>,
) -> bool {
    if row.order_date < date_from || row.order_date > date_to {
        return false;
    }
    if !countries.contains(&row.country) {
        return false;
    }
    products.is_empty() || products.contains(&row.product_name)
}

pub fn filter_line_items(
    line_items: &LineItemTable,
    date_from: NaiveDate,
    date_to: NaiveDate,
    countries: &BTreeSet<String>,
    products: &BTreeSet<String>,
) -> LineItemTable {
    let rows = line_items
        .iter()
        .filter(|row| row_matches(row, date_from, date_to, countries, products))
        .cloned()
        .collect::<Vec<_>>();
    tracing::debug!(
        input_rows = line_items.len(),
        kept_rows = rows.len(),
        %date_from,
        %date_to,
        countries = countries.len(),
        products = products.len(),
        "filtered line items"
    );
    LineItemTable::from_rows(rows)
}
