use console::style;

use crate::view::StageStatus;

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Status text colored the same way as its table cell.
pub fn status_text(status: StageStatus) -> console::StyledObject<String> {
    match status {
        StageStatus::Success => bright_green(status),
        StageStatus::Failed | StageStatus::Aborted => bright_red(status),
        StageStatus::PausedPendingInput | StageStatus::Unstable => bright_yellow(status),
        StageStatus::InProgress => cyan(status),
        StageStatus::NotStarted => dim(status),
    }
}
