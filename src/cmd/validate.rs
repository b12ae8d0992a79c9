//! `stratum validate`: check configuration without starting.
//!
//! Loads projects from the config file or the environment, validates
//! them, and reports the result as human-readable text or JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::{self, validation};
use crate::error::StratumError;

pub async fn execute(args: &ValidateArgs) -> Result<(), StratumError> {
    let (config, label) = config::load(args.config.as_deref()).await?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {label} has {} errors\n", errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "project": e.project,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(StratumError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&label, &config)
            );
        }
        ValidateFormat::Json => {
            let (db, api) = config.count_by_kind();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "source": label,
                    "projects": config.projects.len(),
                    "database": db,
                    "api": api,
                })
            );
        }
    }

    Ok(())
}
