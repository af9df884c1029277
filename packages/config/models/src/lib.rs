#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The export configuration record.
//!
//! A [`Configuration`] describes one export run end to end: how to reach
//! the Tableau server, which workbook to render, whether rows of an
//! uploaded spreadsheet drive the run, and how output files are named
//! and organized. The same record is sent verbatim to the backend's
//! `/start_export` endpoint, so field names follow the backend's JSON
//! contract.
//!
//! Nothing in this crate trims or normalizes values. Callers trim at the
//! boundary where user-edited values are consumed (see the validator in
//! `tableau_export_config`).

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Wire value of the "name files after the view" sentinel.
pub const BY_VIEW: &str = "By view";

/// Wire value of the "no folder level" sentinel.
pub const NO_COLUMN: &str = "None";

/// Mask shown in place of a populated token secret.
pub const REDACTED_SECRET: &str = "********";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the backend iterates over views.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExportMode {
    /// One pass per spreadsheet row, with per-row filters, conditions and
    /// parameter overrides.
    #[default]
    Automate,
    /// Export every non-excluded view once.
    AllOnce,
}

/// Rendered file format.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ExportFormat {
    /// Portable Document Format.
    #[default]
    Pdf,
    /// High resolution PNG image.
    Png,
}

impl ExportFormat {
    /// File extension written by the backend for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }
}

/// Comparison applied by a [`ConditionRule`] to a row's cell.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ComparisonType {
    /// Cell equals the value (numeric when both sides parse as numbers).
    #[default]
    #[serde(rename = "Equals")]
    #[strum(serialize = "Equals")]
    Equals,
    /// Negation of [`Self::Equals`].
    #[serde(rename = "Not Equals")]
    #[strum(serialize = "Not Equals")]
    NotEquals,
    /// Numeric greater-than.
    #[serde(rename = "Greater Than")]
    #[strum(serialize = "Greater Than")]
    GreaterThan,
    /// Numeric less-than.
    #[serde(rename = "Less Than")]
    #[strum(serialize = "Less Than")]
    LessThan,
    /// Cell is empty or missing.
    #[serde(rename = "Is Blank")]
    #[strum(serialize = "Is Blank")]
    IsBlank,
    /// Cell has a non-blank value.
    #[serde(rename = "Is Not Blank")]
    #[strum(serialize = "Is Not Blank")]
    IsNotBlank,
}

impl ComparisonType {
    /// Every comparison, in the order a picker should offer them.
    pub const ALL: &[Self] = &[
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::LessThan,
        Self::IsBlank,
        Self::IsNotBlank,
    ];

    /// Blank checks ignore the condition's value entirely.
    #[must_use]
    pub const fn is_blank_check(self) -> bool {
        matches!(self, Self::IsBlank | Self::IsNotBlank)
    }
}

/// How output files are named.
///
/// Serialized as the bare string the backend expects: `"By view"` or a
/// spreadsheet column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileNaming {
    /// Name each file after the rendered view.
    #[default]
    ByView,
    /// Name each file after the row's value in this column.
    Column(String),
}

impl FileNaming {
    /// The configured column, or `None` for the sentinel.
    #[must_use]
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Self::ByView => None,
            Self::Column(c) => Some(c),
        }
    }
}

impl From<String> for FileNaming {
    fn from(value: String) -> Self {
        if value.is_empty() || value == BY_VIEW {
            Self::ByView
        } else {
            Self::Column(value)
        }
    }
}

impl From<FileNaming> for String {
    fn from(value: FileNaming) -> Self {
        match value {
            FileNaming::ByView => BY_VIEW.to_string(),
            FileNaming::Column(c) => c,
        }
    }
}

/// One folder level of the output tree.
///
/// Serialized as `"None"` or a spreadsheet column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrganizeBy {
    /// No folder level.
    #[default]
    None,
    /// One sub-folder per distinct value of this column.
    Column(String),
}

impl OrganizeBy {
    /// The configured column, or `None` for the sentinel.
    #[must_use]
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Column(c) => Some(c),
        }
    }
}

impl From<String> for OrganizeBy {
    fn from(value: String) -> Self {
        if value.is_empty() || value == NO_COLUMN {
            Self::None
        } else {
            Self::Column(value)
        }
    }
}

impl From<OrganizeBy> for String {
    fn from(value: OrganizeBy) -> Self {
        match value {
            OrganizeBy::None => NO_COLUMN.to_string(),
            OrganizeBy::Column(c) => c,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule rows
// ---------------------------------------------------------------------------

/// Keeps only spreadsheet rows whose `field` is one of the listed values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Column to test.
    pub field: String,
    /// Comma-separated list of accepted values, exactly as entered.
    pub values_str: String,
}

/// Excludes views for rows that satisfy a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRule {
    /// Column to test.
    pub field: String,
    /// Comparison to apply.
    #[serde(rename = "type")]
    pub comparison: ComparisonType,
    /// Right-hand side of the comparison. Unused for blank checks.
    pub value: String,
    /// Comma-separated view names excluded when the condition holds.
    pub excluded_views_str: String,
}

/// Overrides a Tableau parameter, either with a literal or with the value
/// of a same-named column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOverride {
    /// Tableau parameter name.
    pub name: String,
    /// Literal value, or a column name to read per row.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything the backend needs to perform one export run.
///
/// `Debug` never prints the token secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Tableau server URL.
    pub server_url: String,
    /// Site content URL; empty selects the default site.
    pub site_id: String,
    /// Personal access token name.
    pub token_name: String,
    /// Personal access token secret.
    pub token_secret: String,
    /// Workbook whose views are exported.
    pub workbook_name: String,
    /// Per-row automation or a single pass.
    pub export_mode: ExportMode,
    /// Server-side handle of the uploaded spreadsheet. Only valid for the
    /// session that uploaded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excel_filepath: Option<String>,
    /// Sheet of the uploaded spreadsheet that drives the run.
    pub sheet_name: String,
    /// Key field applied as a Tableau filter for each row.
    pub tableau_filter_field: String,
    /// Output file naming.
    pub file_naming_option: FileNaming,
    /// First folder level.
    pub organize_by_1: OrganizeBy,
    /// Second folder level.
    pub organize_by_2: OrganizeBy,
    /// Rendered file format.
    pub export_format: ExportFormat,
    /// Prefix file names with a two-digit sequence number.
    pub numbering_enabled: bool,
    /// Views never exported.
    pub excluded_views: Vec<String>,
    /// Row filters, in user order.
    pub filters: Vec<FilterRule>,
    /// Conditional view exclusions, in user order.
    pub conditions: Vec<ConditionRule>,
    /// Parameter overrides, in user order.
    pub parameters: Vec<ParameterOverride>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            site_id: String::new(),
            token_name: String::new(),
            token_secret: String::new(),
            workbook_name: String::new(),
            export_mode: ExportMode::default(),
            excel_filepath: None,
            sheet_name: String::new(),
            tableau_filter_field: String::new(),
            file_naming_option: FileNaming::default(),
            organize_by_1: OrganizeBy::default(),
            organize_by_2: OrganizeBy::default(),
            export_format: ExportFormat::default(),
            numbering_enabled: true,
            excluded_views: Vec::new(),
            filters: Vec::new(),
            conditions: Vec::new(),
            parameters: Vec::new(),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.token_secret.is_empty() {
            ""
        } else {
            REDACTED_SECRET
        };
        f.debug_struct("Configuration")
            .field("server_url", &self.server_url)
            .field("site_id", &self.site_id)
            .field("token_name", &self.token_name)
            .field("token_secret", &secret)
            .field("workbook_name", &self.workbook_name)
            .field("export_mode", &self.export_mode)
            .field("excel_filepath", &self.excel_filepath)
            .field("sheet_name", &self.sheet_name)
            .field("tableau_filter_field", &self.tableau_filter_field)
            .field("file_naming_option", &self.file_naming_option)
            .field("organize_by_1", &self.organize_by_1)
            .field("organize_by_2", &self.organize_by_2)
            .field("export_format", &self.export_format)
            .field("numbering_enabled", &self.numbering_enabled)
            .field("excluded_views", &self.excluded_views)
            .field("filters", &self.filters)
            .field("conditions", &self.conditions)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl Configuration {
    /// Whether spreadsheet rows drive this run.
    #[must_use]
    pub fn is_automate(&self) -> bool {
        self.export_mode == ExportMode::Automate
    }

    /// Copy safe for display: the token secret is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.token_secret.is_empty() {
            copy.token_secret = REDACTED_SECRET.to_string();
        }
        copy
    }

    /// Copy with the session-scoped file handle removed.
    #[must_use]
    pub fn without_source_file(&self) -> Self {
        let mut copy = self.clone();
        copy.excel_filepath = None;
        copy
    }

    /// Forgets the uploaded spreadsheet and everything derived from it.
    pub fn clear_source(&mut self) {
        self.excel_filepath = None;
        self.sheet_name.clear();
    }

    /// Appends an empty filter row and returns its index.
    pub fn add_filter(&mut self) -> usize {
        push_default(&mut self.filters)
    }

    /// Removes the filter at `index`. Out of range is a no-op.
    pub fn remove_filter(&mut self, index: usize) -> Option<FilterRule> {
        remove_at(&mut self.filters, index)
    }

    /// Appends an empty condition row and returns its index.
    pub fn add_condition(&mut self) -> usize {
        push_default(&mut self.conditions)
    }

    /// Removes the condition at `index`. Out of range is a no-op.
    pub fn remove_condition(&mut self, index: usize) -> Option<ConditionRule> {
        remove_at(&mut self.conditions, index)
    }

    /// Appends an empty parameter row and returns its index.
    pub fn add_parameter(&mut self) -> usize {
        push_default(&mut self.parameters)
    }

    /// Removes the parameter at `index`. Out of range is a no-op.
    pub fn remove_parameter(&mut self, index: usize) -> Option<ParameterOverride> {
        remove_at(&mut self.parameters, index)
    }

    /// Whether `view` is globally excluded.
    #[must_use]
    pub fn is_view_excluded(&self, view: &str) -> bool {
        self.excluded_views.iter().any(|v| v == view)
    }

    /// Adds or removes `view` from the global exclusions.
    pub fn set_view_excluded(&mut self, view: &str, excluded: bool) {
        if excluded {
            if !self.is_view_excluded(view) {
                self.excluded_views.push(view.to_string());
            }
        } else {
            self.excluded_views.retain(|v| v != view);
        }
    }
}

fn push_default<T: Default>(rows: &mut Vec<T>) -> usize {
    rows.push(T::default());
    rows.len() - 1
}

fn remove_at<T>(rows: &mut Vec<T>, index: usize) -> Option<T> {
    (index < rows.len()).then(|| rows.remove(index))
}
