//! TOML parser with helpful error messages

use std::path::Path;

use super::ConfigError;
use super::schema::FileConfig;

/// Parse spacedeploy.toml with detailed error messages
pub fn parse_config_toml(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_toml_str(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse spacedeploy.toml content from string
pub fn parse_config_toml_str(content: &str) -> Result<FileConfig, String> {
    toml::from_str(content).map_err(|e| enhance_toml_error(e, content))
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> String {
    let message = error.message().to_string();

    match error.span() {
        Some(span) => {
            let offset = span.start.min(content.len());
            let line_num = content[..offset].matches('\n').count() + 1;
            format!(
                "TOML parsing error at line {}:\n{}\n\nError: {}",
                line_num,
                get_line_context(content, line_num),
                message
            )
        }
        None => format!("TOML parsing error: {}", message),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 1).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
