//! The person at the bench: serial numbers in, visual checks confirmed.

use inquire::{Confirm, CustomUserError, InquireError, Text, validator::Validation};

use crate::error::BenchError;

/// Typed at the serial number prompt to end the session.
pub const DONE: &str = "-1";

pub trait Operator {
    /// Ask for the next board's serial number. `None` once the operator is done.
    fn serial_number(&mut self, length: usize) -> Result<Option<String>, BenchError>;

    /// Yes/no question, e.g. whether an LED is lit.
    fn confirm(&mut self, question: &str) -> Result<bool, BenchError>;

    /// Show a message and wait until the operator has seen it.
    fn acknowledge(&mut self, message: &str) -> Result<(), BenchError>;
}

/// Check a serial number entry. `Ok(None)` is the done marker.
pub fn validate_serial(input: &str, length: usize) -> Result<Option<String>, String> {
    let input = input.trim();
    if input == DONE {
        return Ok(None);
    }
    if input.chars().count() != length {
        return Err(format!(
            "Please re-enter serial number. It must be {length} characters ({DONE} if done)"
        ));
    }
    Ok(Some(input.to_string()))
}

/// Prompts on the terminal.
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    pub fn new() -> Self {
        Self
    }
}

fn prompt_error(err: InquireError) -> BenchError {
    match err {
        InquireError::OperationInterrupted | InquireError::OperationCanceled => {
            BenchError::Interrupted
        }
        other => BenchError::Operator(other.to_string()),
    }
}

impl Operator for ConsoleOperator {
    fn serial_number(&mut self, length: usize) -> Result<Option<String>, BenchError> {
        let validator = move |input: &str| {
            Ok::<_, CustomUserError>(match validate_serial(input, length) {
                Ok(_) => Validation::Valid,
                Err(msg) => Validation::Invalid(msg.into()),
            })
        };
        let entry = Text::new("Serial Number:")
            .with_help_message(&format!(
                "1) Insert the SD card  2) Connect the PCB  3) Enter its serial number ({DONE} if done)"
            ))
            .with_validator(validator)
            .prompt()
            .map_err(prompt_error)?;
        validate_serial(&entry, length).map_err(BenchError::Operator)
    }

    fn confirm(&mut self, question: &str) -> Result<bool, BenchError> {
        Confirm::new(question)
            .with_help_message("y/n")
            .prompt()
            .map_err(prompt_error)
    }

    fn acknowledge(&mut self, message: &str) -> Result<(), BenchError> {
        Text::new(message)
            .with_help_message("Press Enter to continue")
            .prompt()
            .map(|_| ())
            .map_err(prompt_error)
    }
}
