//! Subcommand handlers

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::{Map, Value};

use vergate_core::{
    catalog, ApiVersion, CompatibilityManager, DetectionConfig, Feature, HttpTransport,
    VersionDetector,
};

use crate::cli::Cli;

pub fn build_manager(cli: &Cli) -> Result<CompatibilityManager> {
    let config = DetectionConfig::default();
    let manager = match &cli.rules {
        Some(path) => {
            let rules = catalog::load_rules(path)
                .with_context(|| format!("failed to load rule table from {}", path.display()))?;
            CompatibilityManager::new(config, catalog::default_matrix()?, rules)?
        }
        None => catalog::default_manager(config)?,
    };
    Ok(manager)
}

fn transport(cli: &Cli) -> Result<HttpTransport> {
    Ok(HttpTransport::new(&cli.base_url)?)
}

/// Explicit `--at` version, or the detected one
async fn version_at(cli: &Cli, manager: &CompatibilityManager, at: &Option<String>) -> Result<ApiVersion> {
    match at {
        Some(raw) => Ok(ApiVersion::parse(raw)?),
        None => {
            let transport = transport(cli)?;
            Ok(manager.ensure_version(&transport).await?)
        }
    }
}

pub async fn handle_detect(cli: &Cli) -> Result<()> {
    let transport = transport(cli)?;
    let version = VersionDetector::detect(&transport, &DetectionConfig::default())
        .await
        .with_context(|| format!("could not detect the server version at {}", cli.base_url))?;
    println!("{} {}", "server version:".bold(), version.to_string().green());
    Ok(())
}

pub async fn handle_features(cli: &Cli, at: &Option<String>) -> Result<()> {
    let manager = build_manager(cli)?;
    let version = version_at(cli, &manager, at).await?;
    println!("{} {}\n", "feature matrix at".bold(), version.to_string().cyan());

    for feature in Feature::ALL {
        let supported = manager.matrix().is_supported(feature, &version);
        let marker = if supported {
            "supported".green()
        } else {
            "unsupported".red()
        };
        let bounds = match manager.matrix().gate(feature) {
            Some(gate) => match &gate.removed_at {
                Some(removed) => format!("[{}, {})", gate.introduced_at, removed),
                None => format!("[{}, )", gate.introduced_at),
            },
            None => "ungated".to_string(),
        };
        println!("  {:<26} {:<12} {}", feature.to_string(), marker, bounds.dimmed());
    }
    Ok(())
}

pub async fn handle_resolve(cli: &Cli, operation: &str, at: &Option<String>) -> Result<()> {
    let manager = build_manager(cli)?;
    let version = version_at(cli, &manager, at).await?;
    let rule = manager.rules().resolve(operation, &version)?;
    println!(
        "{} {} {}",
        format!("{} @ {} ->", operation, version).bold(),
        rule.endpoint.method.cyan(),
        rule.endpoint.path.green()
    );
    if !rule.parameter_renames.is_empty() {
        for rename in &rule.parameter_renames {
            println!("  rename {} -> {}", rename.from, rename.to);
        }
    }
    if !rule.transforms.is_empty() {
        for step in &rule.transforms {
            println!("  transform {} ({})", step.param, step.transform);
        }
    }
    Ok(())
}

pub async fn handle_adapt(
    cli: &Cli,
    operation: &str,
    raw_params: &[String],
    at: &Option<String>,
) -> Result<()> {
    let manager = build_manager(cli)?;
    let version = version_at(cli, &manager, at).await?;
    let params = parse_params(raw_params)?;
    let adapted = manager.adapt_at(&version, operation, &params)?;
    println!("{}", serde_json::to_string_pretty(&adapted)?);
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("parameter '{}' is not in KEY=VALUE form", entry);
        };
        params.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&[
            "orgUnit=a;b;c".to_string(),
            "program=p1".to_string(),
        ])
        .unwrap();
        assert_eq!(params.get("orgUnit"), Some(&Value::String("a;b;c".into())));
        assert_eq!(params.get("program"), Some(&Value::String("p1".into())));
    }

    #[test]
    fn test_parse_params_rejects_bare_words() {
        assert!(parse_params(&["orgUnit".to_string()]).is_err());
    }
}
