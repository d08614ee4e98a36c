pub mod config;
pub mod dashboard;
pub mod entities;
pub mod northwind_db;
pub mod sales_filters;
pub mod sales_pipeline;
pub mod session;
#[cfg(test)]
mod test_fixtures;

use std::io::{self, Write};

pub use config::DashboardConfig;
pub use dashboard::{
    dashboard_view_query, ship_country_sales_query, DashboardContext, DashboardViewRequest,
};
pub use sales_filters::{filter_line_items, SalesFilter};
pub use sales_pipeline::{
    aggregate_by_country, aggregate_monthly, aggregate_top_products,
    aggregate_top_products_by_revenue, build_line_items, LineItemRecord, LineItemTable,
};
pub use session::{run_session, SessionResponse};

const DEFAULT_LOG_DIRECTIVE: &str = "northwind_dashboard_lib=info";

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn exit_with_error(category: &str, message: String, pretty: bool) -> ! {
    tracing::error!(category, %message, "dashboard session aborted");
    let resp = SessionResponse::error(category, message, "DashboardError");
    println!("{}", resp.to_json_line(pretty));
    let _ = io::stdout().flush();
    std::process::exit(1);
}

pub fn run() {
    init_tracing();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let pretty = args.iter().any(|arg| arg == "--pretty");

    let config = match DashboardConfig::resolve(&args) {
        Ok(config) => config,
        Err(message) => exit_with_error("CONFIG_ERROR", message, pretty),
    };
    let ctx = match DashboardContext::load(&config) {
        Ok(ctx) => ctx,
        Err(message) => exit_with_error("DB_LOAD_ERROR", message, config.pretty),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match run_session(&ctx, stdin.lock(), stdout.lock(), config.pretty) {
        Ok(served) => tracing::info!(served, "dashboard session finished"),
        Err(message) => exit_with_error("PROTOCOL_ERROR", message, config.pretty),
    }
}
