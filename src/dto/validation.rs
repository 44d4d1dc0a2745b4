//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dto::ws::CreatePollCommand;

/// Validates that every poll option still has text once trimmed.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if let Some(position) = options.iter().position(|option| option.trim().is_empty()) {
        let mut err = ValidationError::new("option_blank");
        err.message = Some(format!("option {position} must not be empty").into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a free-text field is not only whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that the correct option points into the option list.
pub fn validate_correct_option(command: &CreatePollCommand) -> Result<(), ValidationError> {
    let in_range = usize::try_from(command.correct_option)
        .is_ok_and(|index| index < command.options.len());
    if !in_range {
        let mut err = ValidationError::new("correct_option_range");
        err.message = Some(
            format!(
                "correct option {} is outside 0..{}",
                command.correct_option,
                command.options.len()
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_options() {
        assert!(validate_options(&["A".into(), "B".into()]).is_ok());
        assert!(validate_options(&["A".into(), "  ".into()]).is_err());
        assert!(validate_options(&["".into(), "B".into()]).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Why?").is_ok());
        assert!(validate_not_blank(" \t").is_err());
    }

    #[test]
    fn test_validate_correct_option() {
        let mut command = CreatePollCommand {
            question: "Q".into(),
            options: vec!["A".into(), "B".into()],
            correct_option: 1,
            duration_seconds: 10,
        };
        assert!(validate_correct_option(&command).is_ok());

        command.correct_option = 2;
        assert!(validate_correct_option(&command).is_err());
        command.correct_option = -1;
        assert!(validate_correct_option(&command).is_err());
    }
}
