use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn banner(title: &str, subtitle: &str) {
    println!("{} {}", Icons::DATABASE, title.style(theme().header.clone()));
    if !subtitle.is_empty() {
        println!("   {}", subtitle.style(theme().dim.clone()));
    }
}

pub fn header(text: &str) {
    println!("{} {}", Icons::PACKAGE, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

/// `ex:report (prov:Entity)` with identifier and type styled
pub fn prov_type(identifier: &str, prov_type: &str) -> String {
    format!(
        "{} ({})",
        identifier.style(theme().identifier.clone()),
        prov_type.style(theme().prov_type.clone())
    )
}
