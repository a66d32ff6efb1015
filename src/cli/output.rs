//! Terminal output.
//!
//! Data (envelopes, plaintext, tokens, keys) goes to stdout so it can be
//! piped; status lines go to stderr. Styling is dropped when NO_COLOR is set.

use std::fmt::Display;
use std::io::{self, Write};

use console::{style, StyledObject};

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn paint<D: Display>(value: D, f: impl FnOnce(StyledObject<D>) -> StyledObject<D>) -> String {
    if colors_enabled() {
        f(style(value)).to_string()
    } else {
        value.to_string()
    }
}

/// `✓ msg` in green.
pub fn success(msg: &str) {
    eprintln!("{} {}", paint("✓", |s| s.green()), msg);
}

/// `✗ msg` in red.
pub fn error(msg: &str) {
    eprintln!("{} {}", paint("✗", |s| s.red()), msg);
}

/// `→ msg` in cyan, e.g. `→ run: coffer init`.
pub fn hint(msg: &str) {
    eprintln!("{} {}", paint("→", |s| s.cyan()), paint(msg, |s| s.cyan()));
}

pub fn header(title: &str) {
    eprintln!("{}", paint(title, |s| s.bold()));
}

/// An indented `label  value` line, label dimmed and value bold.
pub fn kv(label: &str, value: impl Display) {
    eprintln!("  {}  {}", paint(label, |s| s.dim()), paint(value, |s| s.bold()));
}

pub fn dimmed(msg: &str) {
    eprintln!("{}", paint(msg, |s| s.dim()));
}

/// A path, colored for embedding in a status line.
pub fn path(p: &str) -> String {
    paint(p, |s| s.cyan())
}

/// One line of machine-readable output on stdout.
pub fn data(value: &str) {
    println!("{}", value);
}

/// Raw bytes on stdout, unmodified.
pub fn raw(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()
}
