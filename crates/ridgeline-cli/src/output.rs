//! Terminal output helpers: a status table for components/deployments and
//! the handful of colored status lines every command prints.

use comfy_table::{presets, Attribute, Cell, CellAlignment, ContentArrangement, Table};
use owo_colors::OwoColorize;
use ridgeline_ipc::{ComponentDetails, DeploymentRecord, LocalDeploymentStatus};
use ridgeline_lifecycle::ServiceState;

pub fn components_table(components: &[ComponentDetails]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("COMPONENT").add_attribute(Attribute::Bold),
        Cell::new("VERSION").add_attribute(Attribute::Bold),
        Cell::new("STATE").add_attribute(Attribute::Bold),
    ]);
    for component in components {
        table.add_row(vec![
            Cell::new(&component.name),
            Cell::new(&component.version),
            state_cell(component.state),
        ]);
    }
    table
}

pub fn deployments_table(records: &[DeploymentRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("DEPLOYMENT").add_attribute(Attribute::Bold),
        Cell::new("GROUP").add_attribute(Attribute::Bold),
        Cell::new("STATUS").add_attribute(Attribute::Bold),
        Cell::new("CREATED").add_attribute(Attribute::Bold),
        Cell::new("MESSAGE").add_attribute(Attribute::Bold),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.deployment_id),
            Cell::new(&record.group_name),
            deployment_status_cell(record.status),
            Cell::new(record.created_at.to_rfc3339()),
            Cell::new(record.message.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

fn state_cell(state: ServiceState) -> Cell {
    let text = format!("{state:?}");
    let cell = Cell::new(&text).set_alignment(CellAlignment::Left);
    match state {
        ServiceState::Running | ServiceState::Finished => cell.fg(comfy_table::Color::Green),
        ServiceState::Broken => cell.fg(comfy_table::Color::Red),
        ServiceState::Errored => cell.fg(comfy_table::Color::Yellow),
        _ => cell,
    }
}

fn deployment_status_cell(status: LocalDeploymentStatus) -> Cell {
    let text = format!("{status:?}");
    let cell = Cell::new(&text);
    match status {
        LocalDeploymentStatus::Succeeded => cell.fg(comfy_table::Color::Green),
        LocalDeploymentStatus::Failed => cell.fg(comfy_table::Color::Red),
        LocalDeploymentStatus::InProgress | LocalDeploymentStatus::Queued => cell.fg(comfy_table::Color::Yellow),
    }
}

pub fn success(message: &str) {
    println!("{} {message}", "✓".green().bold());
}

pub fn failure(message: &str) {
    eprintln!("{} {message}", "✗".red().bold());
}

pub fn info(message: &str) {
    println!("{} {message}", "i".blue().bold());
}
