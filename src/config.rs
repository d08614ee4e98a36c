use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_REPO_DB_RELATIVE_PATH: &str = "data/Northwind_small.sqlite";
const DEFAULT_TOP_N: usize = 10;
const CONFIG_PATH_ENV: &str = "NORTHWIND_DASHBOARD_CONFIG";
const DB_PATH_ENV: &str = "NORTHWIND_DB_PATH";
const TOP_N_ENV: &str = "NORTHWIND_TOP_N";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub db_path: PathBuf,
    pub top_n: usize,
    pub pretty: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_repo_db_path(),
            top_n: DEFAULT_TOP_N,
            pretty: false,
        }
    }
}

fn resolve_repo_db_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_REPO_DB_RELATIVE_PATH)
}

fn parse_top_n(raw: &str, source: &str) -> Result<usize, String> {
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("{source} 必须为正整数: {raw}"))?;
    if value == 0 {
        return Err(format!("{source} 必须大于 0"));
    }
    Ok(value)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, String> {
    match args.iter().position(|arg| arg == flag) {
        None => Ok(None),
        Some(idx) => args
            .get(idx + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| format!("{flag} 缺少参数值")),
    }
}

fn load_config_file(path: &Path) -> Result<DashboardConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("读取配置文件失败 ({}): {e}", path.to_string_lossy()))?;
    let config: DashboardConfig = serde_json::from_str(&content)
        .map_err(|e| format!("配置文件格式无效 ({}): {e}", path.to_string_lossy()))?;
    if config.top_n == 0 {
        return Err("配置文件 top_n 必须大于 0".to_string());
    }
    Ok(config)
}

impl DashboardConfig {
    pub fn resolve(args: &[String]) -> Result<Self, String> {
        Self::resolve_with_env(args, |key| std::env::var(key).ok())
    }

    pub fn resolve_with_env(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        let config_path = match flag_value(args, "--config")? {
            Some(path) => Some(PathBuf::from(path)),
            None => env(CONFIG_PATH_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };
        let mut config = match config_path {
            Some(path) => load_config_file(&path)?,
            None => DashboardConfig::default(),
        };

        if let Some(db_path) = env(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(db_path.trim());
        }
        if let Some(top_n) = env(TOP_N_ENV).filter(|v| !v.trim().is_empty()) {
            config.top_n = parse_top_n(&top_n, TOP_N_ENV)?;
        }

        if let Some(db_path) = flag_value(args, "--db")? {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(top_n) = flag_value(args, "--top-n")? {
            config.top_n = parse_top_n(top_n, "--top-n")?;
        }
        if args.iter().any(|arg| arg == "--pretty") {
            config.pretty = true;
        }

        Ok(config)
    }
}
