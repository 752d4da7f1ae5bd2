//! `wamd config` subcommands

use std::path::{Path, PathBuf};
use wamd::config::{default_config_path, GatewayConfig};
use wamd::engine::PlatformType;

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(default_config_path)
}

/// Write the commented default configuration file
pub fn init(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_path(path);

    if path.exists() && !force {
        return Err(format!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    GatewayConfig::create_default(&path)?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}

/// Load the file (defaults when absent) and apply environment overrides
pub fn effective(path: &Path) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let mut config = if path.exists() {
        GatewayConfig::load(path)?
    } else {
        GatewayConfig::default()
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// Print the effective configuration
pub fn show(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_path(path);
    let config = effective(&path)?;
    wamd::logging::init(&config.logging);
    tracing::debug!(path = %path.display(), "showing effective configuration");

    if path.exists() {
        println!("# Loaded from {}", path.display());
    } else {
        println!("# {} not found, showing defaults", path.display());
    }

    let platform = PlatformType::from_tag(&config.client.platform_type);
    if platform == PlatformType::Unknown {
        println!(
            "# ⚠️  platform_type '{}' is not recognized and will be advertised as unknown",
            config.client.platform_type
        );
    } else {
        println!("# platform_type resolves to {:?}", platform);
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wamd").join("config.toml");

        init(Some(path.clone()), false).unwrap();

        assert!(GatewayConfig::load(&path).is_ok());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[media]\ncompress = true\n").unwrap();

        assert!(init(Some(path.clone()), false).is_err());
        init(Some(path.clone()), true).unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert!(!config.media.compress);
    }

    #[test]
    fn test_show_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        assert!(show(Some(temp_dir.path().join("absent.toml"))).is_ok());
    }

    #[test]
    fn test_effective_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[pairing]\npairing_window = \"5m\"\n").unwrap();

        let config = effective(&path).unwrap();
        assert_eq!(config.pairing.pairing_window.as_secs(), 300);
    }
}
