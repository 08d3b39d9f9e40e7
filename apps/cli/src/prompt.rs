//! Minimal stdin prompt helpers. Spec §6 scopes terminal presentation
//! (colors, localization, progress bars) out of core — this is the
//! plainest possible read-a-line loop, grounded on
//! `usabarashi-voicevox-cli`'s `client::input::get_input_text` use of
//! `std::io::stdin` rather than on any teacher TUI crate (the teacher
//! has no plain-stdin CLI of its own).

use std::io::{self, Write};

fn read_line(label: &str) -> String {
    print!("{label}");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).expect("failed to read from stdin");
    line.trim().to_string()
}

pub fn text(label: &str) -> String {
    loop {
        let value = read_line(label);
        if !value.is_empty() {
            return value;
        }
        println!("  (required)");
    }
}

pub fn text_default(label: &str, default: &str) -> String {
    let value = read_line(&format!("{label} [{default}]: "));
    if value.is_empty() { default.to_string() } else { value }
}

pub fn optional(label: &str) -> Option<String> {
    let value = read_line(label);
    if value.is_empty() { None } else { Some(value) }
}

pub fn confirm(label: &str, default: bool) -> bool {
    let hint = if default { "Y/n" } else { "y/N" };
    let value = read_line(&format!("{label} ({hint}): ")).to_lowercase();
    match value.as_str() {
        "" => default,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => {
            println!("  please answer y or n");
            confirm(label, default)
        }
    }
}

pub fn parse_loop<T, F>(label: &str, mut parse: F) -> T
where
    F: FnMut(&str) -> Option<T>,
{
    loop {
        let value = read_line(label);
        if let Some(parsed) = parse(&value) {
            return parsed;
        }
        println!("  unrecognized value: {value}");
    }
}
