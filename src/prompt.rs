//! Yes/no confirmation prompts.

use crate::error::{Error, Result};
use std::io::{BufRead, Write};

/// Answers that count as approval, compared after lowercasing.
const AFFIRMATIVE: &[&str] = &["y", "yes"];

/// Prompt wording for deleting `count` resources of kind `noun`.
pub fn delete_message(noun: &str, count: usize) -> String {
    if count == 1 {
        format!("delete this {}", noun)
    } else {
        format!("delete {} {}s", count, noun)
    }
}

/// Write the prompt to `err` and read one line from `input`.
///
/// Returns `Ok(())` on an affirmative answer, [`Error::Aborted`] otherwise,
/// including on end of input.
pub fn ask(input: &mut dyn BufRead, err: &mut dyn Write, message: &str) -> Result<()> {
    write!(err, "Warning: Are you sure you want to {} (y/N) ? ", message)?;
    err.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();

    if AFFIRMATIVE.contains(&answer.as_str()) {
        Ok(())
    } else {
        Err(Error::Aborted)
    }
}

/// Write `message` to `err` and return the next input line, trimmed.
/// End of input yields an empty string.
pub fn read_line(input: &mut dyn BufRead, err: &mut dyn Write, message: &str) -> Result<String> {
    write!(err, "{}", message)?;
    err.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> (Result<()>, String) {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut err = Vec::new();
        let res = ask(&mut input, &mut err, "delete this droplet");
        (res, String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_affirmative_answers() {
        for a in ["y\n", "Y\n", "yes\n", "YES\n", "  Yes  \n"] {
            assert!(answer(a).0.is_ok(), "{:?}", a);
        }
    }

    #[test]
    fn test_other_answers_abort() {
        for a in ["n\n", "no\n", "\n", "", "yep\n"] {
            assert!(matches!(answer(a).0, Err(Error::Aborted)), "{:?}", a);
        }
    }

    #[test]
    fn test_prompt_written_to_err() {
        let (_, err) = answer("y\n");
        assert!(err.contains("delete this droplet"));
    }

    #[test]
    fn test_read_line_trims() {
        let mut input = Cursor::new(b"  secret-token \n".to_vec());
        let mut err = Vec::new();
        let line = read_line(&mut input, &mut err, "Token: ").unwrap();
        assert_eq!(line, "secret-token");
        assert_eq!(err, b"Token: ");
    }

    #[test]
    fn test_delete_message() {
        assert_eq!(delete_message("droplet", 1), "delete this droplet");
        assert_eq!(delete_message("droplet", 3), "delete 3 droplets");
    }
}
