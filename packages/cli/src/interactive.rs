//! Menu-driven configuration editor and export runner.
//!
//! Keeps one [`Controller`] for the whole session: edits, uploads and
//! loaded views accumulate in it until the user quits.

use std::error::Error;
use std::path::PathBuf;

use dialoguer::{Input, MultiSelect, Select};
use tableau_export_cli_utils::{MultiProgress, confirm, edit_secret, edit_text};
use tableau_export_config::store::check_name;
use tableau_export_config_models::{
    BY_VIEW, ComparisonType, Configuration, ExportFormat, ExportMode, FileNaming, NO_COLUMN,
    OrganizeBy,
};

use crate::report;
use crate::session::{self, Controller, Session};

/// Top-level actions in the interactive menu.
enum Action {
    Connection,
    Options,
    Upload,
    Sheet,
    Views,
    Filters,
    Conditions,
    Parameters,
    TestConnection,
    Show,
    Run,
    Save,
    Load,
    Delete,
    Reset,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Connection,
        Self::Options,
        Self::Upload,
        Self::Sheet,
        Self::Views,
        Self::Filters,
        Self::Conditions,
        Self::Parameters,
        Self::TestConnection,
        Self::Show,
        Self::Run,
        Self::Save,
        Self::Load,
        Self::Delete,
        Self::Reset,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Connection => "Edit connection",
            Self::Options => "Edit export options",
            Self::Upload => "Upload source Excel file",
            Self::Sheet => "Select sheet",
            Self::Views => "Load views & set exclusions",
            Self::Filters => "Edit filters",
            Self::Conditions => "Edit conditions",
            Self::Parameters => "Edit parameters",
            Self::TestConnection => "Test connection",
            Self::Show => "Show configuration",
            Self::Run => "Start export",
            Self::Save => "Save configuration",
            Self::Load => "Load saved configuration",
            Self::Delete => "Delete saved configuration",
            Self::Reset => "Clear export status",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the interactive menu until the user quits.
///
/// # Errors
///
/// Returns an error if a prompt fails or the store cannot be written.
/// Backend failures are printed and the menu continues.
#[allow(clippy::future_not_send)]
pub async fn run(session: &mut Session, multi: &MultiProgress) -> Result<(), Box<dyn Error>> {
    println!("Tableau Exporter ({})", session.backend.base_url());
    println!();

    let mut ctl = session.controller(Configuration::default());
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::Connection => edit_connection(ctl.config_mut())?,
            Action::Options => edit_options(&mut ctl)?,
            Action::Upload => handle_upload(&mut ctl).await?,
            Action::Sheet => handle_sheet(&mut ctl).await?,
            Action::Views => handle_views(&mut ctl).await?,
            Action::Filters => edit_filters(&mut ctl)?,
            Action::Conditions => edit_conditions(&mut ctl)?,
            Action::Parameters => edit_parameters(ctl.config_mut())?,
            Action::TestConnection => match ctl.test_connection().await {
                Ok(message) => println!("{message}"),
                Err(e) => eprintln!("Connection failed: {e}"),
            },
            Action::Show => show(&ctl),
            Action::Run => {
                session::run_export(&mut ctl, multi).await?;
            }
            Action::Save => handle_save(session, ctl.config())?,
            Action::Load => handle_load(session, &mut ctl)?,
            Action::Delete => handle_delete(session)?,
            Action::Reset => {
                ctl.reset();
                println!("Export status cleared.");
            }
            Action::Quit => break,
        }
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Editors
// ---------------------------------------------------------------------------

fn edit_connection(config: &mut Configuration) -> Result<(), Box<dyn Error>> {
    config.server_url = edit_text("Tableau Server URL", &config.server_url)?;
    config.site_id = edit_text("Site ID (empty for default)", &config.site_id)?;
    config.token_name = edit_text("PAT Name", &config.token_name)?;
    config.token_secret = edit_secret("PAT Secret", &config.token_secret)?;
    config.workbook_name = edit_text("Workbook Name", &config.workbook_name)?;
    Ok(())
}

fn edit_options(ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    let columns = ctl.columns().to_vec();
    let config = ctl.config_mut();

    let modes = [ExportMode::Automate, ExportMode::AllOnce];
    let mode_labels = ["Automate (one pass per spreadsheet row)", "All views once"];
    let current = modes.iter().position(|m| *m == config.export_mode);
    let idx = Select::new()
        .with_prompt("Export mode")
        .items(&mode_labels[..])
        .default(current.unwrap_or(0))
        .interact()?;
    config.export_mode = modes[idx];

    let formats = [ExportFormat::Pdf, ExportFormat::Png];
    let format_labels: Vec<String> = formats.iter().map(ToString::to_string).collect();
    let current = formats.iter().position(|f| *f == config.export_format);
    let idx = Select::new()
        .with_prompt("Export format")
        .items(&format_labels)
        .default(current.unwrap_or(0))
        .interact()?;
    config.export_format = formats[idx];

    config.numbering_enabled = confirm(
        "Prefix files with sequence numbers?",
        config.numbering_enabled,
    )?;

    if !config.is_automate() {
        return Ok(());
    }
    if columns.is_empty() {
        println!("Upload a source file to choose key field, naming and folders.");
        return Ok(());
    }

    config.tableau_filter_field = pick_column(
        "Key field",
        &columns,
        None,
        Some(config.tableau_filter_field.as_str()),
    )?
    .unwrap_or_default();

    let naming = pick_column(
        "File naming",
        &columns,
        Some(BY_VIEW),
        config.file_naming_option.as_column(),
    )?;
    config.file_naming_option = naming.map_or(FileNaming::ByView, FileNaming::Column);

    let org_1 = pick_column(
        "Organize by (level 1)",
        &columns,
        Some(NO_COLUMN),
        config.organize_by_1.as_column(),
    )?;
    config.organize_by_1 = org_1.map_or(OrganizeBy::None, OrganizeBy::Column);

    let org_2 = pick_column(
        "Organize by (level 2)",
        &columns,
        Some(NO_COLUMN),
        config.organize_by_2.as_column(),
    )?;
    config.organize_by_2 = org_2.map_or(OrganizeBy::None, OrganizeBy::Column);

    Ok(())
}

/// Selects one of `columns`, optionally preceded by a sentinel entry that
/// maps to `None`.
fn pick_column(
    prompt: &str,
    columns: &[String],
    sentinel: Option<&str>,
    current: Option<&str>,
) -> dialoguer::Result<Option<String>> {
    let offset = usize::from(sentinel.is_some());
    let mut items: Vec<&str> = sentinel.into_iter().collect();
    items.extend(columns.iter().map(String::as_str));

    let default = current
        .and_then(|c| columns.iter().position(|col| col == c))
        .map_or(0, |i| i + offset);

    let idx = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(default)
        .interact()?;

    Ok(idx.checked_sub(offset).map(|i| columns[i].clone()))
}

/// Asks for a column, falling back to free text when none are loaded.
fn column_or_text(prompt: &str, columns: &[String], current: &str) -> dialoguer::Result<String> {
    if columns.is_empty() {
        return edit_text(prompt, current);
    }
    Ok(pick_column(prompt, columns, None, Some(current))?.unwrap_or_default())
}

/// Shared add/edit/remove loop for the three rule lists.
#[derive(Clone, Copy)]
enum RowAction {
    Add,
    Edit,
    Remove,
    Done,
}

impl RowAction {
    const ALL: &[Self] = &[Self::Add, Self::Edit, Self::Remove, Self::Done];

    const fn label(&self) -> &'static str {
        match self {
            Self::Add => "Add row",
            Self::Edit => "Edit row",
            Self::Remove => "Remove row",
            Self::Done => "Done",
        }
    }
}

fn row_action(title: &str, rows: &[String]) -> dialoguer::Result<RowAction> {
    println!("{title}:");
    if rows.is_empty() {
        println!("  (none)");
    }
    for (i, row) in rows.iter().enumerate() {
        println!("  {}. {row}", i + 1);
    }

    let labels: Vec<&str> = RowAction::ALL.iter().map(RowAction::label).collect();
    let idx = Select::new().items(&labels).default(0).interact()?;
    Ok(RowAction::ALL[idx])
}

fn pick_row(rows: &[String]) -> dialoguer::Result<Option<usize>> {
    if rows.is_empty() {
        return Ok(None);
    }
    Select::new()
        .with_prompt("Which row?")
        .items(rows)
        .default(0)
        .interact_opt()
}

fn edit_filters(ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    let columns = ctl.columns().to_vec();
    let config = ctl.config_mut();

    loop {
        let rows: Vec<String> = config
            .filters
            .iter()
            .map(|f| format!("{} in [{}]", f.field, f.values_str))
            .collect();

        let index = match row_action("Filters", &rows)? {
            RowAction::Add => Some(config.add_filter()),
            RowAction::Edit => pick_row(&rows)?,
            RowAction::Remove => {
                if let Some(i) = pick_row(&rows)? {
                    config.remove_filter(i);
                }
                None
            }
            RowAction::Done => return Ok(()),
        };

        if let Some(row) = index.and_then(|i| config.filters.get_mut(i)) {
            row.field = column_or_text("Field", &columns, &row.field)?;
            row.values_str = edit_text("Values (comma separated)", &row.values_str)?;
        }
    }
}

fn edit_conditions(ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    let columns = ctl.columns().to_vec();
    let config = ctl.config_mut();

    loop {
        let rows: Vec<String> = config
            .conditions
            .iter()
            .map(|c| {
                format!(
                    "{} {} '{}' -> exclude [{}]",
                    c.field, c.comparison, c.value, c.excluded_views_str
                )
            })
            .collect();

        let index = match row_action("Conditions", &rows)? {
            RowAction::Add => Some(config.add_condition()),
            RowAction::Edit => pick_row(&rows)?,
            RowAction::Remove => {
                if let Some(i) = pick_row(&rows)? {
                    config.remove_condition(i);
                }
                None
            }
            RowAction::Done => return Ok(()),
        };

        if let Some(row) = index.and_then(|i| config.conditions.get_mut(i)) {
            row.field = column_or_text("Field", &columns, &row.field)?;

            let labels: Vec<String> = ComparisonType::ALL.iter().map(ToString::to_string).collect();
            let current = ComparisonType::ALL.iter().position(|c| *c == row.comparison);
            let idx = Select::new()
                .with_prompt("Comparison")
                .items(&labels)
                .default(current.unwrap_or(0))
                .interact()?;
            row.comparison = ComparisonType::ALL[idx];

            if row.comparison.is_blank_check() {
                row.value.clear();
            } else {
                row.value = edit_text("Value", &row.value)?;
            }
            row.excluded_views_str =
                edit_text("Views to exclude (comma separated)", &row.excluded_views_str)?;
        }
    }
}

fn edit_parameters(config: &mut Configuration) -> Result<(), Box<dyn Error>> {
    loop {
        let rows: Vec<String> = config
            .parameters
            .iter()
            .map(|p| format!("{} = {}", p.name, p.value))
            .collect();

        let index = match row_action("Parameters", &rows)? {
            RowAction::Add => Some(config.add_parameter()),
            RowAction::Edit => pick_row(&rows)?,
            RowAction::Remove => {
                if let Some(i) = pick_row(&rows)? {
                    config.remove_parameter(i);
                }
                None
            }
            RowAction::Done => return Ok(()),
        };

        if let Some(row) = index.and_then(|i| config.parameters.get_mut(i)) {
            row.name = edit_text("Parameter name", &row.name)?;
            row.value = edit_text("Value (literal or column name)", &row.value)?;
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[allow(clippy::future_not_send)]
async fn handle_upload(ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    let path: String = Input::new()
        .with_prompt("Path to .xlsx file")
        .interact_text()?;

    let path = PathBuf::from(path.trim());
    if let Err(e) = session::prepare_source(ctl, Some(path.as_path()), None).await {
        eprintln!("Upload failed: {e}");
    }
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn handle_sheet(ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    if ctl.sheets().is_empty() {
        println!("Upload a source file first.");
        return Ok(());
    }

    let sheets = ctl.sheets().to_vec();
    let current = sheets.iter().position(|s| *s == ctl.config().sheet_name);
    let idx = Select::new()
        .with_prompt("Sheet")
        .items(&sheets)
        .default(current.unwrap_or(0))
        .interact()?;

    match ctl.select_sheet(&sheets[idx]).await {
        Ok(()) => println!("{} column(s): {}", ctl.columns().len(), ctl.columns().join(", ")),
        Err(e) => eprintln!("Could not read columns: {e}"),
    }
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn handle_views(ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    let views = match ctl.load_views().await {
        Ok(views) => views.to_vec(),
        Err(e) => {
            eprintln!("Could not load views: {e}");
            return Ok(());
        }
    };
    if views.is_empty() {
        println!("No views found.");
        return Ok(());
    }

    let defaults: Vec<bool> = views
        .iter()
        .map(|v| ctl.config().is_view_excluded(v))
        .collect();
    let selected = MultiSelect::new()
        .with_prompt("Views to exclude (space=toggle, enter=confirm)")
        .items(&views)
        .defaults(&defaults)
        .interact()?;

    let config = ctl.config_mut();
    for (i, view) in views.iter().enumerate() {
        config.set_view_excluded(view, selected.contains(&i));
    }
    println!("{} view(s) excluded.", selected.len());
    Ok(())
}

fn show(ctl: &Controller) {
    print!("{}", report::config_summary(ctl.config()));

    let violations = ctl.violations();
    if violations.is_empty() {
        println!("\nReady to export.");
    } else {
        println!();
        report::print_violations(&violations);
    }

    let task = ctl.task();
    if task.task_id().is_some() || task.log().next().is_some() {
        report::print_run_result(ctl.state(), task);
        for line in task.log() {
            println!("  {line}");
        }
    }
}

fn handle_save(session: &mut Session, config: &Configuration) -> Result<(), Box<dyn Error>> {
    let name: String = Input::new()
        .with_prompt("Save as")
        .interact_text()?;

    let name = match check_name(&name) {
        Ok(name) => name.to_string(),
        Err(e) => {
            eprintln!("{e}");
            return Ok(());
        }
    };

    if session.store.contains(&name)
        && !confirm(&format!("Overwrite configuration '{name}'?"), false)?
    {
        return Ok(());
    }

    match session.store.save(&name, config) {
        Ok(()) => println!("Saved configuration: {name}"),
        Err(e) => eprintln!("Could not save: {e}"),
    }
    Ok(())
}

fn pick_saved(session: &Session, prompt: &str) -> dialoguer::Result<Option<String>> {
    let names = session.store.list_names();
    if names.is_empty() {
        println!("No saved configurations.");
        return Ok(None);
    }
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&names)
        .default(0)
        .interact_opt()?;
    Ok(idx.map(|i| names[i].clone()))
}

fn handle_load(session: &Session, ctl: &mut Controller) -> Result<(), Box<dyn Error>> {
    let Some(name) = pick_saved(session, "Load which configuration?")? else {
        return Ok(());
    };

    match session.store.load(&name) {
        Ok(config) => {
            ctl.replace_config(config);
            println!("Loaded configuration: {name}");
            if ctl.config().is_automate() {
                println!("Upload the source Excel file again before exporting.");
            }
        }
        Err(e) => eprintln!("Could not load '{name}': {e}"),
    }
    Ok(())
}

fn handle_delete(session: &mut Session) -> Result<(), Box<dyn Error>> {
    let Some(name) = pick_saved(session, "Delete which configuration?")? else {
        return Ok(());
    };

    if !confirm(&format!("Delete configuration '{name}'?"), false)? {
        return Ok(());
    }
    session.store.delete(&name)?;
    println!("Deleted configuration: {name}");
    Ok(())
}
