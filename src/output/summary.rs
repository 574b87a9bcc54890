use std::fmt::Write;

use comfy_table::Cell;

use crate::engine::types::{Approval, ParameterType, ParameterValue};
use crate::view::BuildView;

use super::styling::{bright, bright_yellow, cyan, dim, status_text};
use super::tables::{create_table, format_duration, format_timestamp, header_cells, status_cell};

/// Prints a human-readable summary of a build view to stdout.
///
/// Displays:
/// - Overview: job, build number, URL and overall status
/// - Stages: one row per stage with color-coded status and timing
/// - Pending Approvals: message, proceed label and parameters of each approval
/// - Logs: per-stage output, when `show_logs` is set
pub fn print_summary(view: &BuildView, show_logs: bool) {
    println!("{}", render_summary(view, show_logs));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn parameter_type(kind: ParameterType) -> &'static str {
    match kind {
        ParameterType::String => "string",
        ParameterType::Text => "text",
        ParameterType::Password => "password",
        ParameterType::Boolean => "boolean",
        ParameterType::Choice => "choice",
        ParameterType::Other => "other",
    }
}

fn parameter_default(value: Option<&ParameterValue>) -> String {
    match value {
        Some(ParameterValue::Boolean(flag)) => flag.to_string(),
        Some(ParameterValue::Text(text)) => text.clone(),
        None => "-".to_string(),
    }
}

fn render_approval(output: &mut String, stage_name: &str, approval: &Approval) {
    let _ = writeln!(
        output,
        "  {} {} {}",
        cyan(stage_name),
        dim(format!("[{}]", approval.id)),
        approval.message
    );
    let _ = writeln!(output, "  {} {}", dim("Proceed with:"), bright_yellow(&approval.proceed_label));

    if approval.parameters.is_empty() {
        output.push('\n');
        return;
    }

    let mut table = create_table();
    table.set_header(header_cells(&["Parameter", "Type", "Default", "Description"]));
    for parameter in &approval.parameters {
        table.add_row(vec![
            Cell::new(&parameter.name),
            Cell::new(parameter_type(parameter.declared_type)),
            Cell::new(parameter_default(parameter.default_value.as_ref())),
            Cell::new(&parameter.description),
        ]);
    }
    let _ = writeln!(output, "{table}\n");
}

fn render_summary(view: &BuildView, show_logs: bool) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Job:"),
        cyan(&view.job_full_name),
        dim("Build:"),
        bright_yellow(format!("#{}", view.build_number)),
        dim("URL:"),
        dim(&view.build_url),
        dim("Status:"),
        status_text(view.overall_status),
    );

    add_section_header(&mut output, "🧱", "Stages");
    if view.stages.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("No stages"));
    } else {
        let mut table = create_table();
        table.set_header(header_cells(&["Stage", "Status", "Started (UTC)", "Duration", "Input"]));
        for stage in &view.stages {
            table.add_row(vec![
                Cell::new(&stage.name),
                status_cell(stage.status),
                Cell::new(format_timestamp(stage.start_time_millis)),
                Cell::new(format_duration(stage.duration_millis)),
                Cell::new(stage.approval.as_ref().map_or("", |approval| approval.id.as_str())),
            ]);
        }
        let _ = writeln!(output, "{table}\n");
    }

    let pending: Vec<_> = view.pending_approvals().collect();
    if !pending.is_empty() {
        add_section_header(&mut output, "✋", "Pending Approvals");
        for (stage, approval) in pending {
            render_approval(&mut output, &stage.name, approval);
        }
    }

    if show_logs {
        add_section_header(&mut output, "📜", "Logs");
        for stage in view.stages.iter().filter(|stage| !stage.logs.is_empty()) {
            let _ = writeln!(output, "{}", bright(format!("── {} ──", stage.name)));
            let _ = writeln!(output, "{}", stage.logs.trim_end());
        }
    }

    output
}
