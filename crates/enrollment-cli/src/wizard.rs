use std::io::{self, BufRead, Write};

use clap::ValueEnum;
use enrollment_backend::Notice;
use enrollment_spec::{
    ErrorMap, FieldKind, FieldSpec, FieldValue, RenderPayload, render_json_ui, render_text,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: step header and prompts only.
    Clean,
    /// Verbose output: status and every visible field with its value.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RenderMode {
    Text,
    Json,
}

/// Prints step headers, validation feedback and notices.
pub struct WizardPresenter {
    verbosity: Verbosity,
    mode: RenderMode,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, mode: RenderMode) -> Self {
        Self { verbosity, mode }
    }

    pub fn show_step(&self, payload: &RenderPayload) -> CliResult<()> {
        match self.mode {
            RenderMode::Json => {
                println!("{}", serde_json::to_string_pretty(&render_json_ui(payload))?);
            }
            RenderMode::Text if self.verbosity.is_verbose() => {
                println!("{}", render_text(payload));
                println!("Status: {}", payload.status.as_str());
            }
            RenderMode::Text => {
                println!(
                    "Step {}/{}: {} ({}%)",
                    payload.progress.step,
                    payload.progress.total,
                    payload.title,
                    payload.progress.percent
                );
                println!("{}", payload.description);
                if let Some(summary) = &payload.summary {
                    println!("{summary}");
                }
            }
        }
        Ok(())
    }

    pub fn show_prompt(&self, spec: &FieldSpec, current: &FieldValue) {
        let mut line = spec.label.to_string();
        if spec.required {
            line.push_str(" *");
        }
        if let Some(hint) = hint(spec) {
            line.push(' ');
            line.push_str(&hint);
        }
        let current = current.to_string();
        if !current.is_empty() {
            line.push_str(&format!(" [{current}]"));
        }
        println!("{line}");
        if self.verbosity.is_verbose()
            && let Some(choices) = spec.choices
        {
            println!("Choices: {}", choices.join(", "));
        }
    }

    pub fn show_errors(&self, errors: &ErrorMap) {
        println!("Please fix the following:");
        for (field, message) in errors {
            if self.verbosity.is_verbose() {
                println!("  {field} - {message}");
            } else {
                println!("  {message}");
            }
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {debug}");
        }
    }

    pub fn show_notice(&self, notice: &Notice) {
        if notice.is_error() {
            eprintln!("{notice}");
        } else {
            println!("{notice}");
        }
    }
}

fn hint(spec: &FieldSpec) -> Option<String> {
    match (spec.field.kind(), spec.choices) {
        (FieldKind::Flag, _) => Some("(yes/no)".to_string()),
        (FieldKind::Text, Some(choices)) if choices.len() <= 12 => {
            Some(format!("({})", choices.join("/")))
        }
        (FieldKind::Text, Some(_)) => Some("(type a listed choice)".to_string()),
        (FieldKind::Text, None) => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// What the user typed at a field prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Blank line: keep the current value.
    Keep,
    Value(FieldValue),
    /// Stop prompting and try to move on.
    Next,
    Back,
    Exit,
}

/// Interprets one line typed at the prompt for `spec`.
pub fn parse_reply(spec: &FieldSpec, raw: &str) -> Result<Reply, AnswerParseError> {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "" => return Ok(Reply::Keep),
        "next" => return Ok(Reply::Next),
        "back" => return Ok(Reply::Back),
        "exit" => return Ok(Reply::Exit),
        _ => {}
    }

    match spec.field.kind() {
        FieldKind::Flag => parse_boolean(trimmed).map(|flag| Reply::Value(FieldValue::Flag(flag))),
        FieldKind::Text if trimmed == "-" => Ok(Reply::Value(FieldValue::Text(String::new()))),
        FieldKind::Text => match spec.choices {
            Some(choices) => parse_choice(choices, trimmed)
                .map(|choice| Reply::Value(FieldValue::Text(choice.to_string()))),
            None => Ok(Reply::Value(FieldValue::Text(trimmed.to_string()))),
        },
    }
}

pub fn parse_boolean(raw: &str) -> Result<bool, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_choice<'a>(choices: &'a [&'a str], raw: &str) -> Result<&'a str, AnswerParseError> {
    choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
        .copied()
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("'{raw}' is not one of the listed choices."),
                Some(choices.join(", ")),
            )
        })
}

/// Reads one line from stdin; running out of input is an error.
pub fn read_line() -> CliResult<String> {
    io::stdout().flush()?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err("input ended before the wizard finished".into());
    }
    Ok(line.trim().to_string())
}

pub fn prompt_line(prompt: &str, default: Option<&str>) -> CliResult<String> {
    if let Some(default_value) = default {
        print!("{} [{}]: ", prompt, default_value);
    } else {
        print!("{}: ", prompt);
    }
    let line = read_line()?;
    if line.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(line)
    }
}

pub fn prompt_non_empty(prompt: &str) -> CliResult<String> {
    loop {
        let value = prompt_line(&mark_required(prompt), None)?;
        if !value.trim().is_empty() {
            return Ok(value);
        }
        println!("Value cannot be empty.");
    }
}

pub fn prompt_bool(prompt: &str, default: bool) -> CliResult<bool> {
    let prompt_text = format!("{} (y/n)", prompt.trim());
    let default_hint = if default { "Y" } else { "N" };
    loop {
        let line = prompt_line(&prompt_text, Some(default_hint))?;
        match parse_boolean(&line) {
            Ok(value) => return Ok(value),
            Err(_) => println!("Invalid answer '{}'. Expected yes or no.", line),
        }
    }
}

fn mark_required(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.to_lowercase().contains("required") {
        trimmed.to_string()
    } else {
        format!("{} (required)", trimmed)
    }
}
