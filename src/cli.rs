use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use stageview::config::{Config, OutputFormat};
use stageview::engine::sources::StageGraphAnalysis;
use stageview::engine::{ApprovalController, LogAggregator, StageViewBuilder, SubmittedValues};
use stageview::output::{self, bright_green, bright_red, dim};
use stageview::store::BuildStore;
use stageview::{BuildRef, BuildView};

#[derive(Parser)]
#[command(name = "stageview")]
#[command(author, version, about = "Build stages & approvals", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./stageview.{toml,json,yaml,yml})
    #[arg(short, long, global = true, env = "STAGEVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of build snapshots
    #[arg(short, long, global = true, env = "STAGEVIEW_STORE")]
    store: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stages currently waiting for input
    View {
        /// Build reference, e.g. `team/deploy#42`
        build: BuildRef,
    },
    /// Every stage of a build
    Stages {
        build: BuildRef,

        /// Include per-stage logs in the summary
        #[arg(long, default_value_t = false)]
        logs: bool,
    },
    /// Submit values for a pending approval
    Submit {
        build: BuildRef,

        approval: String,

        /// Parameter value, repeatable
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_parameter)]
        params: Vec<(String, Value)>,

        /// Parameter values as a JSON object; `--param` entries take precedence
        #[arg(long, value_name = "OBJECT")]
        json: Option<String>,
    },
    /// Abort a pending approval
    Abort { build: BuildRef, approval: String },
}

#[derive(Debug, Serialize)]
struct Outcome<'a> {
    build: String,
    approval: &'a str,
    action: &'static str,
    accepted: bool,
}

/// Parses `NAME=VALUE`; values stay textual and are coerced per parameter type.
fn parse_parameter(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in `{raw}`"));
    }
    Ok((name.to_string(), Value::String(value.to_string())))
}

fn submitted_values(params: &[(String, Value)], json: Option<&str>) -> Result<SubmittedValues> {
    let mut values = match json {
        Some(json) => serde_json::from_str::<SubmittedValues>(json)
            .context("--json must be an object of parameter values")?,
        None => SubmittedValues::new(),
    };
    for (name, value) in params {
        values.insert(name.clone(), value.clone());
    }
    Ok(values)
}

impl Cli {
    fn open_store(&self, config: &Config) -> Result<Arc<BuildStore>> {
        let root = match &self.store {
            Some(path) => path.clone(),
            None => config.store.resolve_path()?,
        };
        Ok(Arc::new(BuildStore::new(root, config.store.analysis)))
    }

    async fn builder(&self, config: &Config, store: &Arc<BuildStore>) -> Result<StageViewBuilder> {
        let analysis: Arc<dyn StageGraphAnalysis> = store.clone();
        StageViewBuilder::probe(
            store.clone(),
            store.clone(),
            store.clone(),
            Some(analysis),
            config.view.segmentation,
            LogAggregator::new(config.view.max_stage_log_bytes),
        )
        .await
        .context("Failed to set up stage reconstruction")
    }

    fn format(&self, config: &Config) -> OutputFormat {
        self.format.unwrap_or(config.output.format)
    }

    fn emit<T: Serialize>(&self, value: &T, config: &Config) -> Result<()> {
        let format = self.format(config);
        let pretty = self.pretty || config.output.pretty;

        if let Some(output_path) = &self.output {
            let mut file = std::fs::File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            output::export(value, format, pretty, &mut file)?;
            info!("Output written to: {}", output_path.display());
        } else {
            output::export(value, format, pretty, &mut std::io::stdout().lock())?;
        }
        Ok(())
    }

    fn emit_view(&self, view: &BuildView, config: &Config, show_logs: bool) -> Result<()> {
        if self.format(config) != OutputFormat::Summary {
            return self.emit(view, config);
        }
        if self.output.is_some() {
            warn!("--output is ignored for summary output");
        }
        output::print_summary(view, show_logs || config.output.show_logs);
        Ok(())
    }

    fn emit_outcome(&self, outcome: &Outcome<'_>, config: &Config) -> Result<()> {
        if self.format(config) != OutputFormat::Summary {
            self.emit(outcome, config)?;
        } else if outcome.accepted {
            println!(
                "{} {} {} {}",
                bright_green("✔"),
                outcome.action,
                outcome.approval,
                dim(format!("on {}", outcome.build))
            );
        } else {
            println!(
                "{} {} {} {}",
                bright_red("✘"),
                outcome.action,
                outcome.approval,
                dim(format!("not pending on {}", outcome.build))
            );
        }

        if !outcome.accepted {
            bail!(
                "Approval {} is not pending on {}",
                outcome.approval,
                outcome.build
            );
        }
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let store = self.open_store(&config)?;

        match &self.command {
            Commands::View { build } => {
                info!("Collecting pending approvals of {build}");
                let view = self
                    .builder(&config, &store)
                    .await?
                    .stage_view(build)
                    .await
                    .with_context(|| format!("Failed to read {build}"))?;
                self.emit_view(&view, &config, false)
            }
            Commands::Stages { build, logs } => {
                info!("Collecting stages of {build}");
                let view = self
                    .builder(&config, &store)
                    .await?
                    .full_stage_view(build)
                    .await
                    .with_context(|| format!("Failed to read {build}"))?;
                self.emit_view(&view, &config, *logs)
            }
            Commands::Submit {
                build,
                approval,
                params,
                json,
            } => {
                let values = submitted_values(params, json.as_deref())?;
                let accepted = ApprovalController::new(store)
                    .submit(build, approval, &values)
                    .await;
                let outcome = Outcome {
                    build: build.to_string(),
                    approval,
                    action: "submit",
                    accepted,
                };
                self.emit_outcome(&outcome, &config)
            }
            Commands::Abort { build, approval } => {
                let accepted = ApprovalController::new(store).abort(build, approval).await;
                let outcome = Outcome {
                    build: build.to_string(),
                    approval,
                    action: "abort",
                    accepted,
                };
                self.emit_outcome(&outcome, &config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stageview::engine::types::{Approval, BuildMetadata};
    use stageview::store::{ApprovalOutcome, BuildSnapshot};
    use tempfile::TempDir;

    fn create_store(dir: &TempDir) -> BuildRef {
        let approval: Approval = serde_json::from_value(json!({
            "id": "abc123",
            "message": "Deploy?",
            "origin_node_id": "1",
            "parameters": [{"name": "TARGET", "declared_type": "string"}]
        }))
        .unwrap();
        let build = BuildRef::new("deploy", 42);
        let snapshot = BuildSnapshot {
            metadata: BuildMetadata {
                job_full_name: "deploy".to_string(),
                number: 42,
                url: String::new(),
                running: true,
                result: None,
                start_time_millis: 0,
                duration_millis: None,
            },
            nodes: vec![],
            build_log: String::new(),
            pending_approvals: vec![approval],
            stage_spans: None,
            history: vec![],
        };

        let store = BuildStore::new(dir.path(), false);
        tokio_test::block_on(store.put(&build, snapshot)).unwrap();
        build
    }

    fn run(dir: &TempDir, args: &[&str]) -> Result<()> {
        let store = dir.path().to_string_lossy().to_string();
        let config = dir.path().join("missing.toml").to_string_lossy().to_string();
        let mut argv = vec![
            "stageview",
            "--store",
            store.as_str(),
            "--config",
            config.as_str(),
            "--format",
            "json",
        ];
        argv.extend_from_slice(args);
        tokio_test::block_on(Cli::try_parse_from(argv)?.execute())
    }

    #[test]
    fn test_parse_parameter() {
        assert_eq!(
            parse_parameter("TARGET=prod=eu").unwrap(),
            ("TARGET".to_string(), json!("prod=eu"))
        );
        assert!(parse_parameter("TARGET").is_err());
        assert!(parse_parameter("=prod").is_err());
    }

    #[test]
    fn test_params_override_json_object() {
        let params = vec![("TARGET".to_string(), json!("prod"))];
        let values = submitted_values(&params, Some(r#"{"TARGET": "dev", "CONFIRM": true}"#)).unwrap();

        assert_eq!(values["TARGET"], json!("prod"));
        assert_eq!(values["CONFIRM"], json!(true));
        assert!(submitted_values(&[], Some("[1, 2]")).is_err());
    }

    #[test]
    fn test_malformed_build_reference_is_rejected() {
        assert!(Cli::try_parse_from(["stageview", "view", "deploy"]).is_err());
        assert!(Cli::try_parse_from(["stageview", "view", "deploy#42"]).is_ok());
    }

    #[test]
    fn test_submit_then_repeat_fails() {
        let dir = TempDir::new().unwrap();
        let build = create_store(&dir);

        run(&dir, &["submit", "deploy#42", "abc123", "-p", "TARGET=prod"]).unwrap();
        assert!(run(&dir, &["submit", "deploy#42", "abc123"]).is_err());
        assert!(run(&dir, &["abort", "deploy#42", "abc123"]).is_err());

        let store = BuildStore::new(dir.path(), false);
        let history = tokio_test::block_on(store.history(&build)).unwrap();
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0].outcome, ApprovalOutcome::Submitted { .. }));
    }

    #[test]
    fn test_view_of_unknown_build_fails() {
        let dir = TempDir::new().unwrap();
        create_store(&dir);

        assert!(run(&dir, &["view", "deploy#43"]).is_err());
        assert!(run(&dir, &["view", "deploy#42"]).is_ok());
    }
}
