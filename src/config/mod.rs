//! Configuration loading and validation.
//!
//! Projects come either from a config file (format picked by extension)
//! or, when no file is given, from `PROJECT_{n}_*` environment variables.
//! [`load`] parses and names projects; [`load_validated`] additionally
//! rejects anything [`validation::validate`] flags.

pub mod env_source;
pub mod model;
pub mod validation;

use std::path::Path;

use crate::error::StratumError;
use model::Config;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, StratumError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| StratumError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| StratumError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| StratumError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(StratumError::UnsupportedFormat(other.to_string())),
    }
}

/// Load projects from `path`, or from the environment when `None`.
///
/// Returns the config with default names assigned, plus a label naming
/// where it came from.
pub async fn load(path: Option<&Path>) -> Result<(Config, String), StratumError> {
    let (mut config, label) = match path {
        Some(path) => {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(StratumError::ConfigFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let content = tokio::fs::read_to_string(path).await?;
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let label = path.display().to_string();
            (parse_config_str(ext, &content, &label)?, label)
        }
        None => (env_source::load()?, "environment".to_string()),
    };

    config.assign_default_names();
    Ok((config, label))
}

pub async fn load_validated(path: Option<&Path>) -> Result<(Config, String), StratumError> {
    let (config, label) = load(path).await?;
    validation::validate(&config).map_err(|errors| StratumError::ConfigValidation { errors })?;
    Ok((config, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "yaml")]
    #[test]
    fn parses_yaml_projects() {
        let yaml = r"
projects:
  - route: /users/{id}/avatar
    id: id
    content_type: image/png
    cache_ttl_seconds: 600
    source:
      type: database
      dsn: postgres://u:p@db/app
      table: users
      column: avatar
  - name: posts
    route: /posts/{post_id}
    id: post_id
    source:
      type: api
      endpoint: https://api.example.com/posts/{post_id}
      auth:
        type: bearer
        secret: tok
";
        let mut config = parse_config_str("yaml", yaml, "test.yaml").unwrap();
        config.assign_default_names();
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].name, "project_1");
        assert_eq!(config.projects[0].cache_ttl_seconds, 600);
        assert_eq!(config.projects[1].name, "posts");
        assert_eq!(config.projects[1].cache_ttl_seconds, 3600);
        assert_eq!(
            config.projects[1].content_type,
            model::DEFAULT_CONTENT_TYPE
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = parse_config_str("ini", "", "x.ini").unwrap_err();
        assert!(matches!(err, StratumError::UnsupportedFormat(ref ext) if ext == "ini"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load(Some(Path::new("/nonexistent/stratum.yaml")))
            .await
            .unwrap_err();
        assert!(matches!(err, StratumError::ConfigFileNotFound { .. }));
    }
}
