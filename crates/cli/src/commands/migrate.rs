use lynco_core::config::{AppConfig, LoadOptions};
use lynco_db::{connect_from_config, migrations};

use crate::commands::{runtime, CommandResult, ErrorClass};

const COMMAND: &str = "migrate";

pub fn run(options: LoadOptions) -> CommandResult {
    match apply(options) {
        Ok(version) => CommandResult::success(COMMAND, format!("schema is at version {version}")),
        Err((class, message)) => CommandResult::failure(COMMAND, class, message),
    }
}

fn apply(options: LoadOptions) -> Result<i64, (ErrorClass, String)> {
    let config = AppConfig::load(options).map_err(|error| {
        (ErrorClass::ConfigValidation, format!("configuration issue: {error}"))
    })?;
    let runtime = runtime().map_err(|error| {
        (ErrorClass::RuntimeInit, format!("failed to initialize async runtime: {error}"))
    })?;

    runtime.block_on(async {
        let pool = connect_from_config(&config.database).await.map_err(|error| {
            (ErrorClass::DbConnectivity, format!("failed to connect to database: {error}"))
        })?;
        let applied = migrations::run_pending(&pool).await;
        pool.close().await;
        applied.map_err(|error| (ErrorClass::Migration, error.to_string()))?;
        Ok::<_, (ErrorClass, String)>(migrations::latest_version())
    })
}
