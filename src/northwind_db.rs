use rusqlite::{types::Value as SqlValue, Connection, OpenFlags};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RawTable {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

pub type RawTables = BTreeMap<String, RawTable>;

#[derive(Debug, Clone, Serialize)]
pub struct TableStatsRow {
    pub table: String,
    pub column_count: usize,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub table_count: usize,
    pub total_rows: usize,
    pub rows: Vec<TableStatsRow>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn list_non_system_tables(conn: &Connection) -> Result<Vec<String>, String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .map_err(|e| format!("读取 sqlite_master 失败: {e}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| format!("查询 sqlite_master 失败: {e}"))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|e| format!("读取表名失败: {e}"))?);
    }
    Ok(names)
}

fn read_table(conn: &Connection, table: &str) -> Result<RawTable, String> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| format!("读取表 {table} 失败: {e}"))?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let column_count = columns.len();
    let row_iter = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(row.get::<_, SqlValue>(idx)?);
            }
            Ok(values)
        })
        .map_err(|e| format!("读取表 {table} 失败: {e}"))?;
    let mut rows = Vec::new();
    for row in row_iter {
        rows.push(row.map_err(|e| format!("读取表 {table} 行数据失败: {e}"))?);
    }
    Ok(RawTable {
        name: table.to_string(),
        columns,
        rows,
    })
}

pub fn load_tables(db_path: &Path) -> Result<RawTables, String> {
    if !db_path.exists() {
        return Err(format!("数据库不存在: {}", db_path.to_string_lossy()));
    }
    if !db_path.is_file() {
        return Err(format!("数据库路径不是文件: {}", db_path.to_string_lossy()));
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| format!("打开数据库失败: {e}"))?;

    let mut tables = RawTables::new();
    for name in list_non_system_tables(&conn)? {
        let table = read_table(&conn, &name)?;
        tracing::debug!(
            table = %name,
            columns = table.columns.len(),
            rows = table.rows.len(),
            "loaded table"
        );
        tables.insert(name, table);
    }
    drop(conn);

    tracing::info!(
        db = %db_path.to_string_lossy(),
        tables = tables.len(),
        "database loaded"
    );
    Ok(tables)
}

pub fn table_stats(tables: &RawTables) -> TableStats {
    let rows = tables
        .values()
        .map(|t| TableStatsRow {
            table: t.name.clone(),
            column_count: t.columns.len(),
            row_count: t.rows.len(),
        })
        .collect::<Vec<_>>();
    TableStats {
        table_count: rows.len(),
        total_rows: rows.iter().map(|r| r.row_count).sum(),
        rows,
    }
}
