use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::entities::{NorthwindTables, OrderDetail};

#[derive(Debug, Clone, PartialEq)]
pub struct LineItemRecord {
    pub order_id: i64,
    pub country: String,
    pub order_date: NaiveDate,
    pub product_name: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItemTable {
    rows: Vec<LineItemRecord>,
}

impl LineItemTable {
    pub fn from_rows(rows: Vec<LineItemRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LineItemRecord] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineItemRecord> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|r| r.revenue).sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.rows.iter().map(|r| r.quantity).sum()
    }

    pub fn distinct_countries(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|r| r.country.as_str()))
    }

    pub fn distinct_products(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|r| r.product_name.as_str()))
    }

    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.order_date).min()?;
        let max = self.rows.iter().map(|r| r.order_date).max()?;
        Some((min, max))
    }
}

impl<'a> IntoIterator for &'a LineItemTable {
    type Item = &'a LineItemRecord;
    type IntoIter = std::slice::Iter<'a, LineItemRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryTotal {
    pub country: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductQuantity {
    pub product_name: String,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRevenue {
    pub product_name: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub year_month: String,
    pub total_revenue: f64,
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for v in values {
        if seen.insert(v) {
            out.push(v.to_string());
        }
    }
    out
}

// First-encounter group order; the stable sorts below rely on it for ties.
fn group_sum<'a, T, V>(
    rows: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> String,
    value: impl Fn(&T) -> V,
) -> Vec<(String, V)>
where
    T: 'a,
    V: Copy + std::ops::AddAssign,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, V)> = Vec::new();
    for row in rows {
        let k = key(row);
        let v = value(row);
        match index.get(&k) {
            Some(&idx) => groups[idx].1 += v,
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, v));
            }
        }
    }
    groups
}

// Negative prices or quantities are data errors; such lines carry no revenue.
fn is_countable(detail: &OrderDetail) -> bool {
    detail.unit_price >= 0.0 && detail.quantity >= 0
}

pub fn build_line_items(tables: &NorthwindTables) -> LineItemTable {
    let customers = tables
        .customers
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect::<HashMap<_, _>>();
    let products = tables
        .products
        .iter()
        .map(|p| (p.id, p))
        .collect::<HashMap<_, _>>();
    let mut details_by_order: HashMap<i64, Vec<usize>> = HashMap::new();
    for (idx, detail) in tables.order_details.iter().enumerate() {
        if let Some(order_id) = detail.order_id {
            details_by_order.entry(order_id).or_default().push(idx);
        }
    }

    let mut rows = Vec::new();
    let mut joined_details = 0_usize;
    let mut dropped_orders = 0_usize;
    for order in &tables.orders {
        let Some(detail_indexes) = details_by_order.get(&order.id) else {
            continue;
        };
        joined_details += detail_indexes.len();
        let customer = order
            .customer_id
            .as_deref()
            .and_then(|id| customers.get(id));
        let (Some(customer), Some(order_date)) = (customer, order.order_date) else {
            dropped_orders += 1;
            continue;
        };
        for &idx in detail_indexes {
            let detail = &tables.order_details[idx];
            let Some(product) = detail.product_id.and_then(|id| products.get(&id)) else {
                continue;
            };
            if !is_countable(detail) {
                continue;
            }
            rows.push(LineItemRecord {
                order_id: order.id,
                country: customer.country.clone(),
                order_date,
                product_name: product.name.clone(),
                unit_price: detail.unit_price,
                quantity: detail.quantity,
                revenue: detail.unit_price * detail.quantity as f64,
            });
        }
    }

    let dropped_details = tables.order_details.len().saturating_sub(rows.len());
    if dropped_details > 0 {
        tracing::debug!(
            dropped_details,
            dropped_orders,
            unmatched_order_details = tables.order_details.len().saturating_sub(joined_details),
            "inner join dropped unresolved order lines"
        );
    }
    LineItemTable::from_rows(rows)
}

pub fn aggregate_by_country(line_items: &LineItemTable) -> Vec<CountryTotal> {
    let mut out = group_sum(
        line_items.iter(),
        |r: &LineItemRecord| r.country.clone(),
        |r: &LineItemRecord| r.revenue,
    )
    .into_iter()
    .map(|(country, total_revenue)| CountryTotal {
        country,
        total_revenue,
    })
    .collect::<Vec<_>>();
    out.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    out
}

pub fn aggregate_top_products(line_items: &LineItemTable, n: usize) -> Vec<ProductQuantity> {
    let mut out = group_sum(
        line_items.iter(),
        |r: &LineItemRecord| r.product_name.clone(),
        |r: &LineItemRecord| r.quantity,
    )
    .into_iter()
    .map(|(product_name, total_quantity)| ProductQuantity {
        product_name,
        total_quantity,
    })
    .collect::<Vec<_>>();
    out.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
    out.truncate(n);
    out
}

pub fn aggregate_top_products_by_revenue(
    line_items: &LineItemTable,
    n: usize,
) -> Vec<ProductRevenue> {
    let mut out = group_sum(
        line_items.iter(),
        |r: &LineItemRecord| r.product_name.clone(),
        |r: &LineItemRecord| r.revenue,
    )
    .into_iter()
    .map(|(product_name, total_revenue)| ProductRevenue {
        product_name,
        total_revenue,
    })
    .collect::<Vec<_>>();
    out.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    out.truncate(n);
    out
}

pub fn aggregate_monthly(line_items: &LineItemTable) -> Vec<MonthlyTotal> {
    let mut out = group_sum(
        line_items.iter(),
        |r: &LineItemRecord| r.order_date.format("%Y-%m").to_string(),
        |r: &LineItemRecord| r.revenue,
    )
    .into_iter()
    .map(|(year_month, total_revenue)| MonthlyTotal {
        year_month,
        total_revenue,
    })
    .collect::<Vec<_>>();
    out.sort_by(|a, b| a.year_month.cmp(&b.year_month));
    out
}

/// Revenue per shipping country over Order -> Customer -> OrderDetail.
/// Products are not joined, so lines pointing at unknown products still count.
pub fn ship_country_sales(tables: &NorthwindTables) -> Vec<CountryTotal> {
    let customer_ids = tables
        .customers
        .iter()
        .map(|c| c.id.as_str())
        .collect::<std::collections::HashSet<_>>();
    let mut details_by_order: HashMap<i64, Vec<usize>> = HashMap::new();
    for (idx, detail) in tables.order_details.iter().enumerate() {
        if let Some(order_id) = detail.order_id {
            details_by_order.entry(order_id).or_default().push(idx);
        }
    }

    let mut lines: Vec<(String, f64)> = Vec::new();
    for order in &tables.orders {
        let has_customer = order
            .customer_id
            .as_deref()
            .is_some_and(|id| customer_ids.contains(id));
        if !has_customer {
            continue;
        }
        let Some(detail_indexes) = details_by_order.get(&order.id) else {
            continue;
        };
        let Some(ship_country) = order.ship_country.as_ref().filter(|c| !c.is_empty()) else {
            continue;
        };
        for &idx in detail_indexes {
            let detail = &tables.order_details[idx];
            if !is_countable(detail) {
                continue;
            }
            lines.push((
                ship_country.clone(),
                detail.unit_price * detail.quantity as f64,
            ));
        }
    }

    let mut out = group_sum(
        lines.iter(),
        |(c, _): &(String, f64)| c.clone(),
        |(_, v): &(String, f64)| *v,
    )
    .into_iter()
    .map(|(country, total_revenue)| CountryTotal {
        country,
        total_revenue,
    })
    .collect::<Vec<_>>();
    out.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    out
}
