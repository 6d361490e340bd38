//! User interaction prompts and colored output macros
//!
//! ERROR HANDLING STRATEGY FOR DECORATIVE I/O:
//! All termcolor operations use `let _ =` to deliberately ignore errors.
//! Colored output is decorative and non-essential. If stderr/stdout is
//! unavailable (broken pipe, no TTY, etc.), the program continues gracefully
//! without colors.

use crate::bridge::TeamRecord;
use crate::error::{ProvisionError, Result};
use std::io::{self, Write};
use termcolor::WriteColor;

/// Macro for printing success messages with green color
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        let bufwtr = termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Green)));
        let _ = write!(&mut buffer, "✓ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Macro for printing warnings with yellow color
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let bufwtr = termcolor::BufferWriter::stderr(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Yellow)));
        let _ = write!(&mut buffer, "⚠️  ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Macro for printing errors with red color
#[macro_export]
macro_rules! error_msg {
    ($($arg:tt)*) => {{
        let bufwtr = termcolor::BufferWriter::stderr(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Red)));
        let _ = write!(&mut buffer, "❌ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Prompt for a team when the account carries more than one.
///
/// Lists the teams numbered from 1 and loops until a valid choice arrives:
/// - Re-prompts on empty or non-numeric input
/// - Re-prompts on out-of-range numbers
/// - Treats EOF (Ctrl+D) and "q"/"quit" as cancellation
///
/// Returns the 0-based index into `teams`.
pub fn prompt_team_choice(teams: &[TeamRecord]) -> Result<usize> {
    println!("You have {} teams:", teams.len());
    for (i, team) in teams.iter().enumerate() {
        println!("{}) {} \"{}\" ({})", i + 1, team.team_id, team.name, team.kind);
    }

    loop {
        print!("Which team to use? (1-{} or 'q' to cancel): ", teams.len());
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes_read = io::stdin().read_line(&mut input)?;

        // Handle EOF (Ctrl+D on Unix, Ctrl+Z on Windows)
        if bytes_read == 0 {
            println!("\nSelection cancelled.");
            return Err(ProvisionError::InvalidSelection(
                "selection cancelled".to_string(),
            ));
        }

        let input = input.trim();

        if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
            return Err(ProvisionError::InvalidSelection(
                "selection cancelled by user".to_string(),
            ));
        }

        if input.is_empty() {
            error_msg!("Choice cannot be empty");
            continue;
        }

        match input.parse::<usize>() {
            Ok(choice) if (1..=teams.len()).contains(&choice) => return Ok(choice - 1),
            Ok(choice) => {
                error_msg!("{} is out of range, pick 1-{}", choice, teams.len());
                continue;
            }
            Err(_) => {
                error_msg!("'{}' is not a number", input);
                continue;
            }
        }
    }
}

/// Prompt for the account secret when it is not supplied via the
/// environment. Input is read as a plain line; the toolchain itself handles
/// any second-factor prompting over the inherited stdin.
pub fn prompt_secret(account_id: &str) -> Result<String> {
    print!("Password for {account_id}: ");
    io::stdout().flush()?;

    let mut input = String::new();
    let bytes_read = io::stdin().read_line(&mut input)?;
    if bytes_read == 0 {
        return Err(ProvisionError::InvalidSelection(
            "no password supplied".to_string(),
        ));
    }
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
