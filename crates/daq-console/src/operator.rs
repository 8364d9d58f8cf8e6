//! Terminal operator for guided calibration

use daq_core::workflow::{NoticeLevel, Operator};
use std::io::{self, BufRead, Write};

/// Asks questions on stdout and reads answers from stdin
pub struct TerminalOperator;

impl TerminalOperator {
    fn ask(&self, title: &str, question: &str) -> Option<String> {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "\n[{title}] {question} ");
        let _ = stdout.flush();
        drop(stdout);

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) => None,
            Ok(_) => Some(answer.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                tracing::warn!("failed to read operator input: {e}");
                None
            }
        }
    }
}

impl Operator for TerminalOperator {
    fn confirm(&self, title: &str, question: &str) -> bool {
        self.ask(title, &format!("{question} [y/N]"))
            .map(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    fn prompt(&self, title: &str, question: &str) -> Option<String> {
        self.ask(title, question)
    }

    fn notify(&self, level: NoticeLevel, title: &str, message: &str) {
        let tag = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        println!("[{tag}] {title}: {message}");
    }
}
