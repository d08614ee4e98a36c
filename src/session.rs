use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, Write};

use crate::dashboard::{
    dashboard_view_query, ship_country_sales_query, DashboardContext, DashboardViewRequest,
};

pub const VIEW_ENDPOINT: &str = "/dashboard/view";
pub const SHIP_COUNTRY_SALES_ENDPOINT: &str = "/dashboard/ship-country-sales";
pub const TABLE_STATS_ENDPOINT: &str = "/dashboard/table-stats";

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    pub endpoint: Option<String>,
    #[serde(default)]
    pub query: Value,
}

#[derive(Debug, Serialize)]
pub struct SessionErrorBody {
    pub category: String,
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
pub enum SessionResponse {
    #[serde(rename = "success")]
    Success { payload: Value },
    #[serde(rename = "error")]
    Error { error: SessionErrorBody },
}

impl SessionResponse {
    pub fn error(
        category: impl Into<String>,
        message: impl Into<String>,
        error_type: impl Into<String>,
    ) -> Self {
        SessionResponse::Error {
            error: SessionErrorBody {
                category: category.into(),
                message: message.into(),
                error_type: error_type.into(),
            },
        }
    }

    pub fn to_json_line(&self, pretty: bool) -> String {
        let out = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        out.unwrap_or_else(|e| {
            json!({
                "status": "error",
                "error": {
                    "category": "PROTOCOL_ERROR",
                    "message": format!("serialize response failed: {e}"),
                    "type": "SerializeError",
                }
            })
            .to_string()
        })
    }
}

fn classify_error_message(message: &str) -> &'static str {
    if message.starts_with("unsupported endpoint:") {
        return "UNSUPPORTED_ENDPOINT";
    }
    if message.starts_with("invalid JSON request:") || message.starts_with("request root invalid:")
    {
        return "PROTOCOL_ERROR";
    }
    let validation_keywords = ["日期格式必须", "top_n", "request.query invalid"];
    if validation_keywords.iter().any(|k| message.contains(k)) {
        return "VALIDATION_ERROR";
    }
    "UNKNOWN_ERROR"
}

fn dispatch(ctx: &DashboardContext, req: SessionRequest) -> Result<Value, String> {
    let endpoint = req
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(VIEW_ENDPOINT);
    match endpoint {
        VIEW_ENDPOINT => {
            let query = if req.query.is_null() {
                DashboardViewRequest::default()
            } else {
                serde_json::from_value::<DashboardViewRequest>(req.query)
                    .map_err(|e| format!("request.query invalid for dashboard view: {e}"))?
            };
            dashboard_view_query(ctx, query)
        }
        SHIP_COUNTRY_SALES_ENDPOINT => Ok(ship_country_sales_query(ctx)),
        TABLE_STATS_ENDPOINT => serde_json::to_value(&ctx.table_stats)
            .map_err(|e| format!("serialize table stats failed: {e}")),
        other => Err(format!("unsupported endpoint: {other}")),
    }
}

pub fn handle_request_line(ctx: &DashboardContext, line: &str) -> SessionResponse {
    let result = serde_json::from_str::<Value>(line)
        .map_err(|e| format!("invalid JSON request: {e}"))
        .and_then(|v| {
            serde_json::from_value::<SessionRequest>(v)
                .map_err(|e| format!("request root invalid: {e}"))
        })
        .and_then(|req| {
            tracing::debug!(endpoint = ?req.endpoint, "handling request");
            dispatch(ctx, req)
        });
    match result {
        Ok(payload) => SessionResponse::Success { payload },
        Err(message) => {
            let category = classify_error_message(&message);
            tracing::warn!(category, %message, "request failed");
            SessionResponse::error(category, message, "DashboardError")
        }
    }
}

pub fn run_session<R: BufRead, W: Write>(
    ctx: &DashboardContext,
    mut reader: R,
    mut writer: W,
    pretty: bool,
) -> Result<usize, String> {
    let mut served = 0_usize;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| format!("读取 stdin 失败: {e}"))?;
        if read == 0 {
            break;
        }
        let resp = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_request_line(ctx, line),
            Err(e) => {
                let message = format!("invalid JSON request: line is not valid UTF-8: {e}");
                tracing::warn!(%message, "request failed");
                SessionResponse::error("PROTOCOL_ERROR", message, "DashboardError")
            }
        };
        writeln!(writer, "{}", resp.to_json_line(pretty))
            .map_err(|e| format!("写入 stdout 失败: {e}"))?;
        writer
            .flush()
            .map_err(|e| format!("写入 stdout 失败: {e}"))?;
        served += 1;
    }
    Ok(served)
}
