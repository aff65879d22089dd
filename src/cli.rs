use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

pub fn config_path_from_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for {arg}"))?;
                config_path = Some(PathBuf::from(value));
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other}. usage: pulsewatch [--config <path>]"
                ));
            }
        }
    }

    if config_path.is_none() {
        if let Ok(env_path) = env::var("PULSEWATCH_CONFIG") {
            if !env_path.trim().is_empty() {
                config_path = Some(PathBuf::from(env_path));
            }
        }
    }

    Ok(config_path.unwrap_or_else(|| PathBuf::from("./pulsewatch.jsonc")))
}
