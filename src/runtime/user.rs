//! User interaction operations (line prompts).

use anyhow::Result;

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Core, testable implementation that reads from any BufRead and writes to any Write.
/// Returns `None` once the input is exhausted.
pub(crate) fn prompt_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>> {
    write!(output, "{} ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

impl RealRuntime {
    pub(crate) fn prompt_impl(&self, prompt: &str) -> Result<Option<String>> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        prompt_with_io(prompt, &mut stdin_lock, &mut stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::prompt_with_io;
    use anyhow::Result;
    use std::io::Cursor;

    #[test]
    fn returns_trimmed_line() -> Result<()> {
        let mut input = Cursor::new(b"  2 \n".to_vec());
        let mut output = Vec::new();
        let answer = prompt_with_io("Pick:", &mut input, &mut output)?;
        assert_eq!(answer.as_deref(), Some("2"));
        assert_eq!(String::from_utf8(output)?, "Pick: ");
        Ok(())
    }

    #[test]
    fn empty_line_is_not_eof() -> Result<()> {
        let mut input = Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        let answer = prompt_with_io("Pick:", &mut input, &mut output)?;
        assert_eq!(answer.as_deref(), Some(""));
        Ok(())
    }

    #[test]
    fn closed_input_returns_none() -> Result<()> {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        assert!(prompt_with_io("Pick:", &mut input, &mut output)?.is_none());
        Ok(())
    }
}
