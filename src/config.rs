use std::path::PathBuf;

/// Where the two datasets and the model artifact live. The only external
/// configuration the dashboard takes: env vars override the defaults.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub consolidated: PathBuf,
    pub treated: PathBuf,
    pub model: PathBuf,
}

const ENV_CONSOLIDATED: &str = "CO2SCOPE_CONSOLIDATED";
const ENV_TREATED: &str = "CO2SCOPE_TREATED";
const ENV_MODEL: &str = "CO2SCOPE_MODEL";

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            consolidated: env_path(ENV_CONSOLIDATED, "data/consolidated_vehicles.parquet"),
            treated: env_path(ENV_TREATED, "data/treated_vehicles.parquet"),
            model: env_path(ENV_MODEL, "data/emission_model.json"),
        }
    }
}
