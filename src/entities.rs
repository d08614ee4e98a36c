use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value as SqlValue;

use crate::northwind_db::{RawTable, RawTables};

pub const ORDER_TABLE: &str = "Order";
pub const CUSTOMER_TABLE: &str = "Customer";
pub const ORDER_DETAIL_TABLE: &str = "OrderDetail";
pub const PRODUCT_TABLE: &str = "Product";

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub ship_country: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub order_id: Option<i64>,
    pub product_id: Option<i64>,
    pub unit_price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct NorthwindTables {
    pub orders: Vec<Order>,
    pub customers: Vec<Customer>,
    pub order_details: Vec<OrderDetail>,
    pub products: Vec<Product>,
}

static NULL_VALUE: SqlValue = SqlValue::Null;

fn cell(row: &[SqlValue], idx: usize) -> &SqlValue {
    row.get(idx).unwrap_or(&NULL_VALUE)
}

fn value_as_text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Text(s) => Some(s.trim().to_string()),
        SqlValue::Integer(v) => Some(v.to_string()),
        SqlValue::Real(v) => Some(v.to_string()),
        SqlValue::Null | SqlValue::Blob(_) => None,
    }
}

fn value_as_i64(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Integer(v) => Some(*v),
        SqlValue::Real(v) if v.fract() == 0.0 => Some(*v as i64),
        SqlValue::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Integer(v) => Some(*v as f64),
        SqlValue::Real(v) => Some(*v),
        SqlValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    None
}

fn value_as_date(value: &SqlValue) -> Option<NaiveDate> {
    match value {
        SqlValue::Text(s) => parse_order_date(s),
        _ => None,
    }
}

fn require_table<'a>(tables: &'a RawTables, name: &str) -> Result<&'a RawTable, String> {
    tables
        .get(name)
        .ok_or_else(|| format!("数据库缺少表: {name}"))
}

fn require_column(table: &RawTable, column: &str) -> Result<usize, String> {
    table
        .column_index(column)
        .ok_or_else(|| format!("表 {} 缺少字段: {column}", table.name))
}

fn typed_orders(table: &RawTable) -> Result<Vec<Order>, String> {
    let id_idx = require_column(table, "Id")?;
    let customer_idx = require_column(table, "CustomerId")?;
    let date_idx = require_column(table, "OrderDate")?;
    let ship_idx = require_column(table, "ShipCountry")?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(Order {
                id: value_as_i64(cell(row, id_idx))?,
                customer_id: value_as_text(cell(row, customer_idx)),
                order_date: value_as_date(cell(row, date_idx)),
                ship_country: value_as_text(cell(row, ship_idx)),
            })
        })
        .collect())
}

fn typed_customers(table: &RawTable) -> Result<Vec<Customer>, String> {
    let id_idx = require_column(table, "Id")?;
    let country_idx = require_column(table, "Country")?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(Customer {
                id: value_as_text(cell(row, id_idx))?,
                country: value_as_text(cell(row, country_idx)).unwrap_or_default(),
            })
        })
        .collect())
}

fn typed_order_details(table: &RawTable) -> Result<Vec<OrderDetail>, String> {
    let order_idx = require_column(table, "OrderId")?;
    let product_idx = require_column(table, "ProductId")?;
    let price_idx = require_column(table, "UnitPrice")?;
    let quantity_idx = require_column(table, "Quantity")?;

    Ok(table
        .rows
        .iter()
        .map(|row| OrderDetail {
            order_id: value_as_i64(cell(row, order_idx)),
            product_id: value_as_i64(cell(row, product_idx)),
            unit_price: value_as_f64(cell(row, price_idx)).unwrap_or(0.0),
            quantity: value_as_i64(cell(row, quantity_idx)).unwrap_or(0),
        })
        .collect())
}

fn typed_products(table: &RawTable) -> Result<Vec<Product>, String> {
    let id_idx = require_column(table, "Id")?;
    let name_idx = require_column(table, "ProductName")?;
    let category_idx = table.column_index("CategoryId");

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(Product {
                id: value_as_i64(cell(row, id_idx))?,
                name: value_as_text(cell(row, name_idx)).unwrap_or_default(),
                category_id: category_idx.and_then(|idx| value_as_i64(cell(row, idx))),
            })
        })
        .collect())
}

impl NorthwindTables {
    pub fn from_raw(tables: &RawTables) -> Result<Self, String> {
        let typed = Self {
            orders: typed_orders(require_table(tables, ORDER_TABLE)?)?,
            customers: typed_customers(require_table(tables, CUSTOMER_TABLE)?)?,
            order_details: typed_order_details(require_table(tables, ORDER_DETAIL_TABLE)?)?,
            products: typed_products(require_table(tables, PRODUCT_TABLE)?)?,
        };
        tracing::debug!(
            orders = typed.orders.len(),
            customers = typed.customers.len(),
            order_details = typed.order_details.len(),
            products = typed.products.len(),
            "typed northwind tables"
        );
        Ok(typed)
    }
}
