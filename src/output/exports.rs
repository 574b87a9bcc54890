use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::config::OutputFormat;

/// Exports a view or an outcome in a machine-readable format.
///
/// - JSON: compact, or indented when `pretty` is set
/// - YAML: always block style
///
/// Summary output is rendered by [`print_summary`](super::print_summary).
pub fn export<T: Serialize>(
    value: &T,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            anyhow::bail!("Summary format is rendered directly, not exported")
        }
        OutputFormat::Json => export_json(value, pretty, output),
        OutputFormat::Yaml => export_yaml(value, output),
    }
}

fn export_json<T: Serialize>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_yaml<T: Serialize>(value: &T, output: &mut dyn Write) -> Result<()> {
    let yaml = serde_yaml::to_string(value)?;
    write!(output, "{yaml}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{BuildView, StageStatus};

    fn create_test_view() -> BuildView {
        BuildView {
            job_name: "deploy".to_string(),
            job_full_name: "deploy".to_string(),
            build_number: 42,
            build_url: String::new(),
            overall_status: StageStatus::Success,
            running: false,
            stages: vec![],
        }
    }

    #[test]
    fn test_export_json() {
        let mut output = Vec::new();
        export(&create_test_view(), OutputFormat::Json, false, &mut output).unwrap();

        let json = String::from_utf8(output).unwrap();
        assert!(json.contains("\"build_number\":42"));
        assert!(json.contains("\"overall_status\":\"SUCCESS\""));
        assert_eq!(json.lines().count(), 1);
    }

    #[test]
    fn test_export_pretty_json() {
        let mut output = Vec::new();
        export(&create_test_view(), OutputFormat::Json, true, &mut output).unwrap();

        let json = String::from_utf8(output).unwrap();
        assert!(json.contains("  \"job_name\": \"deploy\""));
    }

    #[test]
    fn test_export_yaml() {
        let mut output = Vec::new();
        export(&create_test_view(), OutputFormat::Yaml, false, &mut output).unwrap();

        let yaml = String::from_utf8(output).unwrap();
        assert!(yaml.contains("job_name: deploy"));
        assert!(yaml.contains("overall_status: SUCCESS"));
    }

    #[test]
    fn test_summary_is_not_exported() {
        let mut output = Vec::new();
        assert!(export(&create_test_view(), OutputFormat::Summary, false, &mut output).is_err());
    }
}
