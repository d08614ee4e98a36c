use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::config::DashboardConfig;
use crate::entities::NorthwindTables;
use crate::northwind_db::{load_tables, table_stats, TableStats};
use crate::sales_filters::SalesFilter;
use crate::sales_pipeline::{
    aggregate_by_country, aggregate_monthly, aggregate_top_products,
    aggregate_top_products_by_revenue, build_line_items, ship_country_sales, CountryTotal,
    LineItemTable,
};

const MAX_TOP_N: u32 = 100;

#[derive(Debug, Clone)]
pub struct DashboardContext {
    pub tables: NorthwindTables,
    pub table_stats: TableStats,
    pub line_items: LineItemTable,
    pub country_options: Vec<String>,
    pub product_options: Vec<String>,
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
    pub default_top_n: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardViewRequest {
    #[serde(rename = "from")]
    pub from_date: Option<String>,
    #[serde(rename = "to")]
    pub to_date: Option<String>,
    pub countries: Option<Vec<String>>,
    pub products: Option<Vec<String>>,
    pub top_n: Option<u32>,
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10_f64.powi(digits);
    (value * factor).round() / factor
}

fn parse_optional_date(
    raw: Option<String>,
    field_name: &str,
    fallback: NaiveDate,
) -> Result<NaiveDate, String> {
    let text = raw.unwrap_or_default().trim().to_string();
    if text.is_empty() {
        return Ok(fallback);
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} 日期格式必须为 YYYY-MM-DD"))
}

fn trimmed_set(values: Vec<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

impl DashboardContext {
    pub fn load(config: &DashboardConfig) -> Result<Self, String> {
        let raw = load_tables(&config.db_path)?;
        let stats = table_stats(&raw);
        let tables = NorthwindTables::from_raw(&raw)?;
        Ok(Self::from_tables(tables, stats, config.top_n))
    }

    pub fn from_tables(tables: NorthwindTables, table_stats: TableStats, top_n: usize) -> Self {
        let line_items = build_line_items(&tables);
        let country_options = aggregate_by_country(&line_items)
            .into_iter()
            .map(|row| row.country)
            .collect();
        let product_options = line_items.distinct_products();
        let date_bounds = line_items.date_bounds();
        tracing::info!(
            line_items = line_items.len(),
            countries = line_items.distinct_countries().len(),
            products = line_items.distinct_products().len(),
            "dashboard context ready"
        );
        Self {
            tables,
            table_stats,
            line_items,
            country_options,
            product_options,
            date_bounds,
            default_top_n: top_n,
        }
    }

    // Known countries in option order, then any unknown ones.
    fn ordered_selection(&self, selected: &BTreeSet<String>) -> Vec<String> {
        let mut out = self
            .country_options
            .iter()
            .filter(|c| selected.contains(*c))
            .cloned()
            .collect::<Vec<_>>();
        out.extend(
            selected
                .iter()
                .filter(|c| !self.country_options.contains(*c))
                .cloned(),
        );
        out
    }

    pub fn resolve_filter(&self, req: DashboardViewRequest) -> Result<SalesFilter, String> {
        let Some((min_date, max_date)) = self.date_bounds else {
            let today = chrono::Local::now().date_naive();
            return Ok(SalesFilter {
                date_from: parse_optional_date(req.from_date, "from", today)?,
                date_to: parse_optional_date(req.to_date, "to", today)?,
                countries: req.countries.map(trimmed_set).unwrap_or_default(),
                products: req.products.map(trimmed_set).unwrap_or_default(),
            });
        };
        let date_from = parse_optional_date(req.from_date, "from", min_date)?;
        let date_to = parse_optional_date(req.to_date, "to", max_date)?;
        let countries = match req.countries {
            Some(values) => trimmed_set(values),
            None => self.country_options.iter().cloned().collect(),
        };
        let products = req.products.map(trimmed_set).unwrap_or_default();
        Ok(SalesFilter {
            date_from,
            date_to,
            countries,
            products,
        })
    }
}

fn country_rows_json(rows: &[CountryTotal]) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            json!({
                "country": row.country,
                "total_revenue": round_to(row.total_revenue, 2),
            })
        })
        .collect()
}

pub fn dashboard_view_query(
    ctx: &DashboardContext,
    req: DashboardViewRequest,
) -> Result<Value, String> {
    let top_n = match req.top_n {
        Some(0) => return Err("top_n 必须大于 0".to_string()),
        Some(v) => v.min(MAX_TOP_N) as usize,
        None => ctx.default_top_n,
    };
    let filter = ctx.resolve_filter(req)?;
    let filtered = filter.apply(&ctx.line_items);

    let by_country = aggregate_by_country(&filtered);
    let top_products = aggregate_top_products(&filtered, top_n);
    let top_products_by_revenue = aggregate_top_products_by_revenue(&filtered, top_n);
    let monthly = aggregate_monthly(&filtered);

    let selected_countries = ctx.ordered_selection(&filter.countries);
    let selected_products = filter.products.iter().cloned().collect::<Vec<_>>();
    let total_revenue = filtered.total_revenue();
    tracing::debug!(
        rows = filtered.len(),
        top_n,
        total_revenue,
        "dashboard view recomputed"
    );

    Ok(json!({
        "filters": {
            "from": filter.date_from.format("%Y-%m-%d").to_string(),
            "to": filter.date_to.format("%Y-%m-%d").to_string(),
            "countries": selected_countries,
            "products": selected_products,
            "top_n": top_n,
        },
        "options": {
            "countries": ctx.country_options,
            "products": ctx.product_options,
            "date_bounds": ctx.date_bounds.map(|(min, max)| json!({
                "min": min.format("%Y-%m-%d").to_string(),
                "max": max.format("%Y-%m-%d").to_string(),
            })),
        },
        "has_data": !filtered.is_empty(),
        "summary": {
            "row_count": filtered.len(),
            "total_revenue": round_to(total_revenue, 2),
            "total_quantity": filtered.total_quantity(),
        },
        "sales_by_country": country_rows_json(&by_country),
        "top_products": top_products,
        "top_products_by_revenue": top_products_by_revenue
            .iter()
            .map(|row| json!({
                "product_name": row.product_name,
                "total_revenue": round_to(row.total_revenue, 2),
            }))
            .collect::<Vec<_>>(),
        "monthly_sales": monthly
            .iter()
            .map(|row| json!({
                "year_month": row.year_month,
                "total_revenue": round_to(row.total_revenue, 2),
            }))
            .collect::<Vec<_>>(),
        "insights": {
            "period": format!(
                "{} to {}",
                filter.date_from.format("%Y-%m-%d"),
                filter.date_to.format("%Y-%m-%d")
            ),
            "countries": selected_countries.join(", "),
            "products": if selected_products.is_empty() {
                "All".to_string()
            } else {
                selected_products.join(", ")
            },
        },
    }))
}

pub fn ship_country_sales_query(ctx: &DashboardContext) -> Value {
    let rows = ship_country_sales(&ctx.tables);
    let total: f64 = rows.iter().map(|r| r.total_revenue).sum();
    json!({
        "summary": {
            "country_count": rows.len(),
            "total_revenue": round_to(total, 2),
        },
        "rows": country_rows_json(&rows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{create_temp_path, seed_northwind_fixture};
    use std::fs;
    use std::path::PathBuf;

    fn load_fixture_context(prefix: &str) -> (PathBuf, DashboardContext) {
        let db_path = create_temp_path(prefix, "sqlite");
        seed_northwind_fixture(&db_path);
        let config = DashboardConfig {
            db_path: db_path.clone(),
            top_n: 10,
            pretty: false,
        };
        let ctx = DashboardContext::load(&config).expect("load dashboard context");
        (db_path, ctx)
    }

    fn v_at<'a>(v: &'a Value, path: &[&str]) -> &'a Value {
        let mut cur = v;
        for key in path {
            cur = cur
                .get(*key)
                .unwrap_or_else(|| panic!("missing key: {}", key));
        }
        cur
    }

    fn v_f64(v: &Value, path: &[&str]) -> f64 {
        v_at(v, path)
            .as_f64()
            .unwrap_or_else(|| panic!("expected f64 at path {:?}", path))
    }

    fn v_i64(v: &Value, path: &[&str]) -> i64 {
        v_at(v, path)
            .as_i64()
            .unwrap_or_else(|| panic!("expected i64 at path {:?}", path))
    }

    fn v_str<'a>(v: &'a Value, path: &[&str]) -> &'a str {
        v_at(v, path)
            .as_str()
            .unwrap_or_else(|| panic!("expected str at path {:?}", path))
    }

    fn v_array<'a>(v: &'a Value, path: &[&str]) -> &'a Vec<Value> {
        v_at(v, path)
            .as_array()
            .unwrap_or_else(|| panic!("expected array at path {:?}", path))
    }

    fn approx_eq(a: f64, b: f64, eps: f64) {
        assert!(
            (a - b).abs() <= eps,
            "approx not equal: left={a} right={b} eps={eps}"
        );
    }

    #[test]
    fn default_request_shows_everything_with_widget_defaults() {
        let (db_path, ctx) = load_fixture_context("northwind_dashboard_default");

        let payload =
            dashboard_view_query(&ctx, DashboardViewRequest::default()).expect("default view");
        assert_eq!(v_str(&payload, &["filters", "from"]), "2012-07-04");
        assert_eq!(v_str(&payload, &["filters", "to"]), "2012-09-01");
        assert_eq!(v_i64(&payload, &["filters", "top_n"]), 10);
        assert_eq!(payload.get("has_data").and_then(Value::as_bool), Some(true));
        assert_eq!(v_i64(&payload, &["summary", "row_count"]), 7);
        approx_eq(v_f64(&payload, &["summary", "total_revenue"]), 1464.5, 1e-6);

        let options = v_array(&payload, &["options", "countries"]);
        assert_eq!(
            options.iter().filter_map(Value::as_str).collect::<Vec<_>>(),
            vec!["France", "Germany", "Mexico"]
        );
        assert_eq!(v_str(&payload, &["options", "date_bounds", "min"]), "2012-07-04");

        let by_country = v_array(&payload, &["sales_by_country"]);
        assert_eq!(by_country.len(), 3);
        assert_eq!(by_country[0].get("country").and_then(Value::as_str), Some("France"));

        let top = v_array(&payload, &["top_products"]);
        assert_eq!(
            top[0].get("product_name").and_then(Value::as_str),
            Some("Aniseed Syrup")
        );
        assert_eq!(top[0].get("total_quantity").and_then(Value::as_i64), Some(50));

        let monthly = v_array(&payload, &["monthly_sales"]);
        assert_eq!(
            monthly
                .iter()
                .filter_map(|m| m.get("year_month").and_then(Value::as_str))
                .collect::<Vec<_>>(),
            vec!["2012-07", "2012-08", "2012-09"]
        );
        assert_eq!(v_str(&payload, &["insights", "products"]), "All");
        assert_eq!(
            v_str(&payload, &["insights", "countries"]),
            "France, Germany, Mexico"
        );

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn explicit_filters_narrow_every_chart() {
        let (db_path, ctx) = load_fixture_context("northwind_dashboard_filtered");

        let payload = dashboard_view_query(
            &ctx,
            DashboardViewRequest {
                from_date: Some("2012-07-05".to_string()),
                to_date: Some("2012-08-31".to_string()),
                countries: Some(vec!["France".to_string(), "Germany".to_string()]),
                products: Some(vec!["Chai".to_string(), " Chang ".to_string()]),
                top_n: Some(1),
            },
        )
        .expect("filtered view");

        assert_eq!(v_i64(&payload, &["summary", "row_count"]), 2);
        approx_eq(v_f64(&payload, &["summary", "total_revenue"]), 550.0, 1e-6);
        assert_eq!(v_array(&payload, &["top_products"]).len(), 1);
        assert_eq!(
            v_str(&payload, &["insights", "products"]),
            "Chai, Chang"
        );
        let by_country = v_array(&payload, &["sales_by_country"]);
        assert_eq!(by_country[0].get("country").and_then(Value::as_str), Some("France"));
        approx_eq(
            by_country[1]
                .get("total_revenue")
                .and_then(Value::as_f64)
                .expect("germany revenue"),
            190.0,
            1e-6,
        );

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn explicit_empty_country_list_renders_no_data() {
        let (db_path, ctx) = load_fixture_context("northwind_dashboard_no_country");

        let payload = dashboard_view_query(
            &ctx,
            DashboardViewRequest {
                countries: Some(vec![]),
                ..DashboardViewRequest::default()
            },
        )
        .expect("empty country view");
        assert_eq!(payload.get("has_data").and_then(Value::as_bool), Some(false));
        assert_eq!(v_i64(&payload, &["summary", "row_count"]), 0);
        assert!(v_array(&payload, &["sales_by_country"]).is_empty());
        assert!(v_array(&payload, &["top_products"]).is_empty());
        assert!(v_array(&payload, &["monthly_sales"]).is_empty());
        assert_eq!(v_array(&payload, &["options", "countries"]).len(), 3);

        let no_products = dashboard_view_query(
            &ctx,
            DashboardViewRequest {
                products: Some(vec![]),
                ..DashboardViewRequest::default()
            },
        )
        .expect("empty product view");
        assert_eq!(v_i64(&no_products, &["summary", "row_count"]), 7);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn invalid_requests_are_validation_errors() {
        let (db_path, ctx) = load_fixture_context("northwind_dashboard_invalid");

        let bad_date = dashboard_view_query(
            &ctx,
            DashboardViewRequest {
                from_date: Some("07/04/2012".to_string()),
                ..DashboardViewRequest::default()
            },
        )
        .expect_err("bad date");
        assert!(bad_date.contains("日期格式必须"), "unexpected error: {bad_date}");

        let zero_top = dashboard_view_query(
            &ctx,
            DashboardViewRequest {
                top_n: Some(0),
                ..DashboardViewRequest::default()
            },
        )
        .expect_err("zero top_n");
        assert!(zero_top.contains("top_n"));

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn ship_country_query_totals_by_shipping_country() {
        let (db_path, ctx) = load_fixture_context("northwind_dashboard_ship");

        let payload = ship_country_sales_query(&ctx);
        assert_eq!(v_i64(&payload, &["summary", "country_count"]), 3);
        approx_eq(v_f64(&payload, &["summary", "total_revenue"]), 1499.5, 1e-6);
        let rows = v_array(&payload, &["rows"]);
        assert_eq!(rows[0].get("country").and_then(Value::as_str), Some("France"));

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn selected_countries_echo_in_revenue_order() {
        use crate::entities::{Customer, NorthwindTables, Order, OrderDetail, Product};
        use crate::northwind_db::TableStats;

        let on = NaiveDate::from_ymd_opt(2020, 3, 1);
        let order = |id: i64, customer: &str| Order {
            id,
            customer_id: Some(customer.to_string()),
            order_date: on,
            ship_country: None,
        };
        let line = |order_id: i64, price: f64| OrderDetail {
            order_id: Some(order_id),
            product_id: Some(1),
            unit_price: price,
            quantity: 1,
        };
        let tables = NorthwindTables {
            orders: vec![order(1, "AUS"), order(2, "ESP")],
            customers: vec![
                Customer {
                    id: "AUS".into(),
                    country: "Austria".into(),
                },
                Customer {
                    id: "ESP".into(),
                    country: "Spain".into(),
                },
            ],
            order_details: vec![line(1, 10.0), line(2, 100.0)],
            products: vec![Product {
                id: 1,
                name: "Chai".into(),
                category_id: None,
            }],
        };
        let stats = TableStats {
            table_count: 4,
            total_rows: 0,
            rows: vec![],
        };
        let ctx = DashboardContext::from_tables(tables, stats, 5);

        let payload = dashboard_view_query(
            &ctx,
            DashboardViewRequest {
                countries: Some(vec!["Austria".to_string(), "Spain".to_string()]),
                ..DashboardViewRequest::default()
            },
        )
        .expect("view");
        assert_eq!(v_str(&payload, &["insights", "countries"]), "Spain, Austria");
        let echoed = v_array(&payload, &["filters", "countries"])
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>();
        assert_eq!(echoed, vec!["Spain", "Austria"]);
    }
}
