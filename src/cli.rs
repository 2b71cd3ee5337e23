//! Interactive prompts

use std::io::{self, Write};

use crate::config::ProviderKind;
use crate::error::{Error, Result};

/// Selected operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Write,
    Read,
}

pub fn banner() {
    println!("============================================");
    println!("  tunefs — playlists as a block device");
    println!("============================================");
}

/// Print a label and read one trimmed line from stdin.
pub fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn prompt_platform() -> Result<ProviderKind> {
    match prompt("Platform (1=Spotify, 2=YouTube)")?.as_str() {
        "1" => Ok(ProviderKind::Spotify),
        "2" => Ok(ProviderKind::YouTube),
        other => Err(Error::Config(format!("invalid platform choice: {}", other))),
    }
}

pub fn prompt_mode() -> Result<Mode> {
    match prompt("Mode (1=write, 2=read)")?.as_str() {
        "1" => Ok(Mode::Write),
        "2" => Ok(Mode::Read),
        other => Err(Error::Config(format!("invalid mode choice: {}", other))),
    }
}
