//! Pre-submission checks for a [`Configuration`].
//!
//! [`validate`] is pure: it never mutates its input and never touches the
//! network. Rules run in a fixed order so messages come out in a stable
//! order, and every violation is reported rather than just the first.
//! Emptiness is judged on trimmed values; column membership is exact.

use strum_macros::Display;
use tableau_export_config_models::Configuration;

/// Connection settings that must always be filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionField {
    /// Tableau server URL.
    #[strum(serialize = "Tableau Server URL")]
    ServerUrl,
    /// PAT name.
    #[strum(serialize = "PAT Name")]
    TokenName,
    /// PAT secret.
    #[strum(serialize = "PAT Secret")]
    TokenSecret,
    /// Workbook name.
    #[strum(serialize = "Workbook Name")]
    WorkbookName,
}

/// Output settings that may name a spreadsheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ColumnSetting {
    /// Key field applied as a Tableau filter.
    #[strum(serialize = "Key Field")]
    KeyField,
    /// File naming column.
    #[strum(serialize = "File Naming")]
    FileNaming,
    /// First folder level.
    #[strum(serialize = "Organize By 1")]
    OrganizeBy1,
    /// Second folder level.
    #[strum(serialize = "Organize By 2")]
    OrganizeBy2,
}

/// One reason a configuration cannot be submitted.
///
/// Row numbers are 1-based, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// A required connection setting is empty.
    #[error("{0} is required")]
    MissingConnectionField(ConnectionField),

    /// Automate mode without an uploaded spreadsheet.
    #[error("Source Excel File must be uploaded")]
    MissingSourceFile,

    /// Automate mode without a selected sheet.
    #[error("A sheet must be selected from the uploaded Excel file")]
    MissingSheet,

    /// The selected sheet has no header row.
    #[error("Sheet '{sheet}' has no columns")]
    SheetHasNoColumns {
        /// Selected sheet.
        sheet: String,
    },

    /// An output setting names a column the sheet does not have.
    #[error("{setting} column '{column}' is not in the selected sheet")]
    UnknownColumn {
        /// Which setting.
        setting: ColumnSetting,
        /// Offending column name.
        column: String,
    },

    /// Filter row without a field.
    #[error("Filter #{row}: a field is required")]
    FilterMissingField {
        /// Row number.
        row: usize,
    },

    /// Filter row naming an unknown column.
    #[error("Filter #{row}: column '{column}' is not in the selected sheet")]
    FilterUnknownField {
        /// Row number.
        row: usize,
        /// Offending column name.
        column: String,
    },

    /// Filter row without any selected values.
    #[error("Filter #{row}: at least one value must be selected")]
    FilterMissingValues {
        /// Row number.
        row: usize,
    },

    /// Condition row without a field.
    #[error("Condition #{row}: a field is required")]
    ConditionMissingField {
        /// Row number.
        row: usize,
    },

    /// Condition row naming an unknown column.
    #[error("Condition #{row}: column '{column}' is not in the selected sheet")]
    ConditionUnknownField {
        /// Row number.
        row: usize,
        /// Offending column name.
        column: String,
    },

    /// Non-blank comparison without a value.
    #[error("Condition #{row}: a value is required for '{comparison}'")]
    ConditionMissingValue {
        /// Row number.
        row: usize,
        /// Comparison display name.
        comparison: String,
    },

    /// Condition row that excludes nothing.
    #[error("Condition #{row}: at least one view to exclude must be selected")]
    ConditionMissingExcludedViews {
        /// Row number.
        row: usize,
    },

    /// Parameter row without a name.
    #[error("Parameter #{row}: a name is required")]
    ParameterMissingName {
        /// Row number.
        row: usize,
    },

    /// Parameter row without a value.
    #[error("Parameter #{row}: a value is required")]
    ParameterMissingValue {
        /// Row number.
        row: usize,
    },
}

/// Checks `config` against the columns of the loaded sheet.
///
/// `available_columns` is empty when no sheet has been loaded yet; column
/// membership checks are skipped in that case, and in all-once mode.
/// Condition and parameter rows are checked in every mode. An empty result
/// means the configuration may be submitted.
#[must_use]
pub fn validate(config: &Configuration, available_columns: &[String]) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_connection(config, &mut violations);

    let automate = config.is_automate();
    if automate {
        check_source(config, available_columns, &mut violations);
    }

    let columns = Some(available_columns).filter(|c| automate && !c.is_empty());
    if let Some(columns) = columns {
        check_column_settings(config, columns, &mut violations);
        check_filters(config, columns, &mut violations);
    }

    check_conditions(config, columns, &mut violations);
    check_parameters(config, &mut violations);

    violations
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_known(columns: &[String], column: &str) -> bool {
    columns.iter().any(|c| c == column)
}

fn check_connection(config: &Configuration, out: &mut Vec<Violation>) {
    let fields = [
        (ConnectionField::ServerUrl, &config.server_url),
        (ConnectionField::TokenName, &config.token_name),
        (ConnectionField::TokenSecret, &config.token_secret),
        (ConnectionField::WorkbookName, &config.workbook_name),
    ];

    for (field, value) in fields {
        if is_blank(value) {
            out.push(Violation::MissingConnectionField(field));
        }
    }
}

fn check_source(config: &Configuration, columns: &[String], out: &mut Vec<Violation>) {
    if config.excel_filepath.as_deref().is_none_or(is_blank) {
        out.push(Violation::MissingSourceFile);
    } else if is_blank(&config.sheet_name) {
        out.push(Violation::MissingSheet);
    } else if columns.is_empty() {
        out.push(Violation::SheetHasNoColumns {
            sheet: config.sheet_name.clone(),
        });
    }
}

fn check_column_settings(config: &Configuration, columns: &[String], out: &mut Vec<Violation>) {
    let key_field = Some(config.tableau_filter_field.as_str()).filter(|c| !is_blank(c));
    let settings = [
        (ColumnSetting::KeyField, key_field),
        (
            ColumnSetting::FileNaming,
            config.file_naming_option.as_column(),
        ),
        (ColumnSetting::OrganizeBy1, config.organize_by_1.as_column()),
        (ColumnSetting::OrganizeBy2, config.organize_by_2.as_column()),
    ];

    for (setting, column) in settings {
        if let Some(column) = column
            && !is_known(columns, column)
        {
            out.push(Violation::UnknownColumn {
                setting,
                column: column.to_string(),
            });
        }
    }
}

fn check_filters(config: &Configuration, columns: &[String], out: &mut Vec<Violation>) {
    for (i, filter) in config.filters.iter().enumerate() {
        let row = i + 1;
        if is_blank(&filter.field) {
            out.push(Violation::FilterMissingField { row });
        } else if !is_known(columns, &filter.field) {
            out.push(Violation::FilterUnknownField {
                row,
                column: filter.field.clone(),
            });
        }
        if is_blank(&filter.values_str) {
            out.push(Violation::FilterMissingValues { row });
        }
    }
}

/// `columns` is `None` when membership cannot be judged; the field is then
/// only required to be present.
fn check_conditions(
    config: &Configuration,
    columns: Option<&[String]>,
    out: &mut Vec<Violation>,
) {
    for (i, condition) in config.conditions.iter().enumerate() {
        let row = i + 1;
        if is_blank(&condition.field) {
            out.push(Violation::ConditionMissingField { row });
        } else if let Some(columns) = columns
            && !is_known(columns, &condition.field)
        {
            out.push(Violation::ConditionUnknownField {
                row,
                column: condition.field.clone(),
            });
        }
        if !condition.comparison.is_blank_check() && is_blank(&condition.value) {
            out.push(Violation::ConditionMissingValue {
                row,
                comparison: condition.comparison.to_string(),
            });
        }
        if is_blank(&condition.excluded_views_str) {
            out.push(Violation::ConditionMissingExcludedViews { row });
        }
    }
}

fn check_parameters(config: &Configuration, out: &mut Vec<Violation>) {
    for (i, parameter) in config.parameters.iter().enumerate() {
        let row = i + 1;
        if is_blank(&parameter.name) {
            out.push(Violation::ParameterMissingName { row });
        }
        if is_blank(&parameter.value) {
            out.push(Violation::ParameterMissingValue { row });
        }
    }
}

#[cfg(test)]
mod tests {
    use tableau_export_config_models::{
        ComparisonType, ConditionRule, ExportMode, FileNaming, FilterRule, OrganizeBy,
        ParameterOverride,
    };

    use super::*;

    fn columns() -> Vec<String> {
        vec!["Store".to_string(), "Region".to_string()]
    }

    fn connected() -> Configuration {
        Configuration {
            server_url: "https://tableau.example.com".to_string(),
            token_name: "exporter".to_string(),
            token_secret: "secret".to_string(),
            workbook_name: "Sales".to_string(),
            ..Configuration::default()
        }
    }

    fn ready() -> Configuration {
        Configuration {
            excel_filepath: Some("uploaded_configs/stores.xlsx".to_string()),
            sheet_name: "Sheet1".to_string(),
            ..connected()
        }
    }

    #[test]
    fn default_automate_config_reports_connection_and_file_only() {
        let violations = validate(&Configuration::default(), &[]);

        assert_eq!(violations.len(), 5);
        assert_eq!(
            &violations[..4],
            &[
                Violation::MissingConnectionField(ConnectionField::ServerUrl),
                Violation::MissingConnectionField(ConnectionField::TokenName),
                Violation::MissingConnectionField(ConnectionField::TokenSecret),
                Violation::MissingConnectionField(ConnectionField::WorkbookName),
            ]
        );
        assert_eq!(
            violations[4].to_string(),
            "Source Excel File must be uploaded"
        );
    }

    #[test]
    fn whitespace_only_connection_fields_are_missing() {
        let config = Configuration {
            server_url: "   ".to_string(),
            ..connected()
        };
        let violations = validate(&config, &columns());
        assert!(violations.contains(&Violation::MissingConnectionField(
            ConnectionField::ServerUrl
        )));
    }

    fn region_condition_without_value() -> ConditionRule {
        ConditionRule {
            field: "Region".to_string(),
            comparison: ComparisonType::Equals,
            value: String::new(),
            excluded_views_str: "A".to_string(),
        }
    }

    #[test]
    fn all_once_skips_source_but_checks_conditions_and_parameters() {
        let mut config = connected();
        config.export_mode = ExportMode::AllOnce;
        config.filters.push(FilterRule::default());
        config.conditions.push(region_condition_without_value());
        config.add_parameter();

        assert_eq!(
            validate(&config, &[]),
            vec![
                Violation::ConditionMissingValue {
                    row: 1,
                    comparison: ComparisonType::Equals.to_string()
                },
                Violation::ParameterMissingName { row: 1 },
                Violation::ParameterMissingValue { row: 1 },
            ]
        );
    }

    #[test]
    fn all_once_with_clean_rows_is_submittable() {
        let config = Configuration {
            export_mode: ExportMode::AllOnce,
            ..connected()
        };
        assert!(validate(&config, &[]).is_empty());
    }

    #[test]
    fn conditions_checked_without_known_columns() {
        let mut config = ready();
        config.conditions.push(region_condition_without_value());
        config.conditions.push(ConditionRule {
            field: " ".to_string(),
            comparison: ComparisonType::IsBlank,
            value: String::new(),
            excluded_views_str: String::new(),
        });

        assert_eq!(
            validate(&config, &[]),
            vec![
                Violation::SheetHasNoColumns {
                    sheet: "Sheet1".to_string()
                },
                Violation::ConditionMissingValue {
                    row: 1,
                    comparison: ComparisonType::Equals.to_string()
                },
                Violation::ConditionMissingField { row: 2 },
                Violation::ConditionMissingExcludedViews { row: 2 },
            ]
        );
    }

    #[test]
    fn missing_sheet_reported_after_upload() {
        let config = Configuration {
            excel_filepath: Some("x.xlsx".to_string()),
            ..connected()
        };
        assert_eq!(validate(&config, &[]), vec![Violation::MissingSheet]);
    }

    #[test]
    fn loaded_sheet_without_columns_is_a_violation() {
        let violations = validate(&ready(), &[]);
        assert_eq!(
            violations,
            vec![Violation::SheetHasNoColumns {
                sheet: "Sheet1".to_string()
            }]
        );
    }

    #[test]
    fn sentinels_skip_membership_checks() {
        assert!(validate(&ready(), &columns()).is_empty());
    }

    #[test]
    fn unknown_output_columns_are_named() {
        let config = Configuration {
            tableau_filter_field: "Store".to_string(),
            file_naming_option: FileNaming::Column("Manager".to_string()),
            organize_by_2: OrganizeBy::Column("Country".to_string()),
            ..ready()
        };
        let violations = validate(&config, &columns());
        assert_eq!(violations.len(), 2);
        assert_eq!(
            violations[0].to_string(),
            "File Naming column 'Manager' is not in the selected sheet"
        );
        assert_eq!(
            violations[1],
            Violation::UnknownColumn {
                setting: ColumnSetting::OrganizeBy2,
                column: "Country".to_string()
            }
        );
    }

    #[test]
    fn every_bad_rule_row_is_reported() {
        let config = Configuration {
            filters: vec![
                FilterRule::default(),
                FilterRule {
                    field: "Missing".to_string(),
                    values_str: "A".to_string(),
                },
            ],
            conditions: vec![
                ConditionRule {
                    field: "Store".to_string(),
                    comparison: ComparisonType::IsBlank,
                    value: String::new(),
                    excluded_views_str: "Cover".to_string(),
                },
                ConditionRule {
                    field: "Region".to_string(),
                    comparison: ComparisonType::GreaterThan,
                    value: " ".to_string(),
                    excluded_views_str: String::new(),
                },
            ],
            parameters: vec![ParameterOverride {
                name: "Year".to_string(),
                value: String::new(),
            }],
            ..ready()
        };

        let violations = validate(&config, &columns());
        assert_eq!(
            violations,
            vec![
                Violation::FilterMissingField { row: 1 },
                Violation::FilterMissingValues { row: 1 },
                Violation::FilterUnknownField {
                    row: 2,
                    column: "Missing".to_string()
                },
                Violation::ConditionMissingValue {
                    row: 2,
                    comparison: "Greater Than".to_string()
                },
                Violation::ConditionMissingExcludedViews { row: 2 },
                Violation::ParameterMissingValue { row: 1 },
            ]
        );
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let config = ready();
        let before = config.clone();
        let _ = validate(&config, &columns());
        assert_eq!(config, before);
    }
}
