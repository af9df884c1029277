//! Plain-text rendering of configurations, violations and run results.

use std::fmt;

use tableau_export::{ExportTask, LifecycleState};
use tableau_export_config::Violation;
use tableau_export_config_models::{Configuration, REDACTED_SECRET};

/// Human-readable summary. The token secret is always masked.
#[must_use]
pub fn config_summary(config: &Configuration) -> String {
    ConfigSummary(config.redacted()).to_string()
}

/// Display adapter over an already redacted configuration.
struct ConfigSummary(Configuration);

impl fmt::Display for ConfigSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.0;
        let site = if config.site_id.is_empty() {
            "(default)"
        } else {
            config.site_id.as_str()
        };
        let secret = if config.token_secret.is_empty() {
            "(not set)"
        } else {
            REDACTED_SECRET
        };

        writeln!(f, "Server:          {}", config.server_url)?;
        writeln!(f, "Site:            {site}")?;
        writeln!(f, "PAT name:        {}", config.token_name)?;
        writeln!(f, "PAT secret:      {secret}")?;
        writeln!(f, "Workbook:        {}", config.workbook_name)?;
        writeln!(f, "Mode:            {}", config.export_mode)?;
        writeln!(f, "Format:          {}", config.export_format)?;
        writeln!(f, "Numbering:       {}", on_off(config.numbering_enabled))?;
        if !config.excluded_views.is_empty() {
            writeln!(f, "Excluded views:  {}", config.excluded_views.join(", "))?;
        }

        if config.is_automate() {
            write_row_settings(f, config)?;
        }
        Ok(())
    }
}

fn write_row_settings(f: &mut fmt::Formatter<'_>, config: &Configuration) -> fmt::Result {
    let file = config.excel_filepath.as_deref().unwrap_or("(not uploaded)");
    let naming: String = config.file_naming_option.clone().into();
    let org_1: String = config.organize_by_1.clone().into();
    let org_2: String = config.organize_by_2.clone().into();

    writeln!(f, "Source file:     {file}")?;
    writeln!(f, "Sheet:           {}", config.sheet_name)?;
    writeln!(f, "Key field:       {}", config.tableau_filter_field)?;
    writeln!(f, "File naming:     {naming}")?;
    writeln!(f, "Organize by:     {org_1} / {org_2}")?;

    for (i, filter) in config.filters.iter().enumerate() {
        writeln!(
            f,
            "Filter #{}:       {} in [{}]",
            i + 1,
            filter.field,
            filter.values_str
        )?;
    }
    for (i, c) in config.conditions.iter().enumerate() {
        writeln!(
            f,
            "Condition #{}:    {} {} '{}' -> exclude [{}]",
            i + 1,
            c.field,
            c.comparison,
            c.value,
            c.excluded_views_str
        )?;
    }
    for (i, p) in config.parameters.iter().enumerate() {
        writeln!(f, "Parameter #{}:    {} = {}", i + 1, p.name, p.value)?;
    }
    Ok(())
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

pub fn print_violations(violations: &[Violation]) {
    eprintln!("Cannot start the export:");
    for violation in violations {
        eprintln!("  - {violation}");
    }
}

pub fn print_run_result(state: LifecycleState, task: &ExportTask) {
    println!();
    match task.task_id() {
        Some(id) => println!("Task {id}: {state}"),
        None => println!("Export: {state}"),
    }
    if !task.message().is_empty() {
        println!("{}", task.message());
    }
    println!("Progress: {}%", task.progress());
}

#[cfg(test)]
mod tests {
    use tableau_export_config_models::{ExportMode, FilterRule};

    use super::*;

    #[test]
    fn summary_never_shows_secret() {
        let config = Configuration {
            server_url: "https://tableau.example.com".to_string(),
            token_secret: "very-secret-value".to_string(),
            ..Configuration::default()
        };

        let summary = config_summary(&config);
        assert!(!summary.contains("very-secret-value"));
        assert!(summary.contains(REDACTED_SECRET));
        assert!(summary.contains("(default)"));
    }

    #[test]
    fn all_once_summary_omits_row_settings() {
        let mut config = Configuration {
            export_mode: ExportMode::AllOnce,
            ..Configuration::default()
        };
        config.filters.push(FilterRule {
            field: "Region".to_string(),
            values_str: "East".to_string(),
        });

        let summary = config_summary(&config);
        assert!(!summary.contains("Filter #1"));
        assert!(summary.contains("all_once"));
    }

    #[test]
    fn automate_summary_numbers_rule_rows() {
        let mut config = Configuration::default();
        config.filters.push(FilterRule {
            field: "Region".to_string(),
            values_str: "East".to_string(),
        });
        config.add_parameter();

        let summary = config_summary(&config);
        assert!(summary.contains("Source file:     (not uploaded)"));
        assert!(summary.contains("Filter #1:       Region in [East]"));
        assert!(summary.lines().any(|line| line.starts_with("Parameter #1:")));
    }
}
