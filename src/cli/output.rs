//! Output formatting utilities

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat, is_list: bool) -> OutputFormat {
    match format {
        OutputFormat::Auto if is_list => OutputFormat::Table,
        other => other,
    }
}

/// Column layout for a list command
pub struct Listing<'a, T> {
    pub noun: &'a str,
    pub headers: &'a [&'a str],
    pub row: fn(&T) -> Vec<String>,
    pub id: fn(&T) -> String,
}

impl<T: Serialize> Listing<'_, T> {
    pub fn print(&self, items: &[T], format: OutputFormat) -> Result<()> {
        match effective_format(format, true) {
            OutputFormat::Json => print_json(&items)?,
            OutputFormat::Yaml => print_yaml(&items)?,
            OutputFormat::Id => {
                for item in items {
                    println!("{}", (self.id)(item));
                }
            }
            OutputFormat::Tsv => {
                println!("{}", self.headers.join("\t"));
                for item in items {
                    println!("{}", (self.row)(item).join("\t"));
                }
            }
            OutputFormat::Table | OutputFormat::Auto => {
                if items.is_empty() {
                    println!("{}", style(format!("No {} found.", self.noun)).dim());
                    return Ok(());
                }
                println!("{}", render_table(self.headers, items.iter().map(self.row)));
                println!(
                    "{}",
                    style(format!("{} {}(s)", items.len(), self.noun)).dim()
                );
            }
        }
        Ok(())
    }
}

/// Print a single record; `pretty` renders the human summary
pub fn print_record<T: Serialize>(
    value: &T,
    format: OutputFormat,
    id: &str,
    pretty: impl FnOnce(&T),
) -> Result<()> {
    match effective_format(format, false) {
        OutputFormat::Json => print_json(value)?,
        OutputFormat::Yaml => print_yaml(value)?,
        OutputFormat::Id => println!("{}", id),
        OutputFormat::Auto | OutputFormat::Table | OutputFormat::Tsv => pretty(value),
    }
    Ok(())
}

pub fn render_table(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(|h| h.to_string()));
    for row in rows {
        builder.push_record(row);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print!("{}", serde_yml::to_string(value).into_diagnostic()?);
    Ok(())
}

/// `Label: value` line of a record summary
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("{}: {}", style(label).bold(), value);
}

pub fn rule() {
    println!("{}", style("─".repeat(60)).dim());
}

/// `✓ message` on success
pub fn success(message: impl std::fmt::Display) {
    println!("{} {}", style("✓").green(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_format_depends_on_shape() {
        assert_eq!(effective_format(OutputFormat::Auto, true), OutputFormat::Table);
        assert_eq!(effective_format(OutputFormat::Auto, false), OutputFormat::Auto);
        assert_eq!(effective_format(OutputFormat::Json, true), OutputFormat::Json);
    }

    #[test]
    fn test_render_table_contains_cells() {
        let table = render_table(
            &["NUMBER", "NAME"],
            vec![vec!["C-1".to_string(), "Harbour".to_string()]].into_iter(),
        );
        assert!(table.contains("NUMBER"));
        assert!(table.contains("Harbour"));
    }
}
