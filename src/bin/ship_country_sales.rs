use northwind_dashboard_lib::{
    entities::NorthwindTables, init_tracing, northwind_db::load_tables,
    sales_pipeline::ship_country_sales, DashboardConfig,
};
use serde_json::json;
use std::env;

fn run(config: &DashboardConfig) -> Result<serde_json::Value, String> {
    let raw = load_tables(&config.db_path)?;
    let tables = NorthwindTables::from_raw(&raw)?;
    let rows = ship_country_sales(&tables);
    tracing::info!(countries = rows.len(), "ship country totals computed");
    Ok(json!({
        "db_path": config.db_path.to_string_lossy(),
        "rows": rows,
    }))
}

fn main() {
    init_tracing();
    let args = env::args().skip(1).collect::<Vec<_>>();

    let result = DashboardConfig::resolve(&args).and_then(|config| {
        let payload = run(&config)?;
        let out = if config.pretty {
            serde_json::to_string_pretty(&payload)
        } else {
            serde_json::to_string(&payload)
        };
        out.map_err(|e| format!("serialize response failed: {e}"))
    });

    match result {
        Ok(out) => println!("{out}"),
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}
