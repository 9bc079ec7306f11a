//! Console output for humans: colored status lines, separator rules and
//! yes/no prompts. Diagnostics go through `tracing` instead.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_WIDTH: usize = 80;

/// Exit status for an interrupt outside a prompt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Set while [`confirm`] waits for an answer.
static PROMPTING: AtomicBool = AtomicBool::new(false);
static INTERRUPT_HANDLER: Once = Once::new();

/// Terminal width from `COLUMNS`, or 80. The terminal itself is never
/// queried.
#[must_use]
pub fn width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|columns| columns.trim().parse().ok())
        .filter(|&columns: &usize| columns > 0)
        .unwrap_or(DEFAULT_WIDTH)
}

/// A full-width separator rule.
#[must_use]
pub fn hr() -> String {
    "=".repeat(width())
}

pub fn print_header(message: &str) {
    println!("{}", message.bold().magenta());
}

pub fn print_info(message: &str) {
    println!("{}", message.blue());
}

/// Echo a command before it runs.
pub fn print_command(command: &str) {
    eprintln!("{}", format!("+ {command}").dimmed());
}

pub fn print_warning(message: &str) {
    eprintln!("{}", message.yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

/// Whether `answer` means yes.
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ctrl-C at a prompt answers "no" and ends the run like a declined
/// confirmation; anywhere else it exits with the usual interrupt status.
fn on_interrupt() {
    if PROMPTING.load(Ordering::SeqCst) {
        println!();
        print_warning("Aborted");
        std::process::exit(0);
    }
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

fn install_interrupt_handler() {
    INTERRUPT_HANDLER.call_once(|| {
        if let Err(err) = ctrlc::set_handler(on_interrupt) {
            tracing::warn!("could not install interrupt handler: {err}");
        }
    });
}

/// Read one answer from `input`. End of input, an interrupted read or any
/// other read error counts as "no".
fn read_answer(input: &mut impl BufRead) -> bool {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) | Err(_) => {
            println!();
            false
        }
        Ok(_) => is_yes(&answer),
    }
}

/// Ask `prompt [y/N]` on stdout and read the answer from stdin.
#[must_use]
pub fn confirm(prompt: &str) -> bool {
    install_interrupt_handler();
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    PROMPTING.store(true, Ordering::SeqCst);
    let confirmed = read_answer(&mut io::stdin().lock());
    PROMPTING.store(false, Ordering::SeqCst);
    confirmed
}
