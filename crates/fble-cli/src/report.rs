//! Diagnostic printing (spec §7: `source:line:col: severity: message`),
//! colorized the way `colored` lets any `Display`-like string be.

use colored::Colorize;
use fble_common::{Diagnostic, Severity};

pub fn print_diagnostics(diags: &[Diagnostic]) {
    for d in diags {
        let severity = match d.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        eprintln!("{}: {severity}: {}", d.loc, d.message);
    }
}
