//! Line-oriented prompts for the interactive shell.
//!
//! Generic over `BufRead`/`Write` so the shell can be driven from
//! stdin or from a buffer in tests. Every helper re-asks until the
//! answer parses; end of input yields `None`.

use std::io::{self, BufRead, Write};

use spaghetto_engine::arithmetic::{format_cents, parse_dollars};

/// A question/answer channel.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print without a newline and flush.
    pub fn say(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    /// Print a full line.
    pub fn println(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    /// Ask once, returning the trimmed answer or `None` at end of input.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.say(prompt)?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask for text; an empty answer cancels.
    pub fn ask_cancellable(&mut self, prompt: &str) -> io::Result<Option<String>> {
        Ok(self.ask(prompt)?.filter(|s| !s.is_empty()))
    }

    /// Ask a yes/no question.
    pub fn confirm(&mut self, prompt: &str) -> io::Result<Option<bool>> {
        let mut answer = self.ask(prompt)?;
        loop {
            let lowered = answer.as_deref().map(str::to_lowercase);
            match lowered.as_deref() {
                None => return Ok(None),
                Some("y") | Some("yes") => return Ok(Some(true)),
                Some("n") | Some("no") => return Ok(Some(false)),
                Some(_) => answer = self.ask("Unknown answer: ")?,
            }
        }
    }

    /// Ask for a whole number within inclusive bounds.
    pub fn ask_integer(
        &mut self,
        prompt: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> io::Result<Option<i64>> {
        let mut answer = self.ask(prompt)?;
        loop {
            let Some(text) = answer else {
                return Ok(None);
            };
            let retry = match text.replace(',', "").parse::<i64>() {
                Err(_) => "Unknown integer: ".to_string(),
                Ok(n) => match bounds_message(n, min, max, |v| v.to_string()) {
                    None => return Ok(Some(n)),
                    Some(msg) => msg,
                },
            };
            answer = self.ask(&retry)?;
        }
    }

    /// Ask for a dollar amount, returned in cents.
    pub fn ask_money(
        &mut self,
        prompt: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> io::Result<Option<i64>> {
        let mut answer = self.ask(prompt)?;
        loop {
            let Some(text) = answer else {
                return Ok(None);
            };
            let retry = match parse_dollars(&text) {
                Err(_) => "Could not parse your amount: $".to_string(),
                Ok(cents) => match bounds_message(cents, min, max, format_cents) {
                    None => return Ok(Some(cents)),
                    Some(msg) => format!("{}$", msg),
                },
            };
            answer = self.ask(&retry)?;
        }
    }
}

fn bounds_message(
    n: i64,
    min: Option<i64>,
    max: Option<i64>,
    show: impl Fn(i64) -> String,
) -> Option<String> {
    match (min, max) {
        (Some(lo), _) if n < lo => Some(format!("Must be at least {}: ", show(lo))),
        (_, Some(hi)) if n > hi => Some(format!("Must be at most {}: ", show(hi))),
        _ => None,
    }
}
