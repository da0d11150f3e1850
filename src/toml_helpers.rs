// Line/column recovery for TOML parse errors.

use crate::error::StatewireError;

/// 1-based line and column of byte `offset` in `text`.
#[must_use]
pub fn line_col_at(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}

/// Look for "line N, column M" in a parser message.
#[must_use]
pub fn extract_line_col_from_msg(msg: &str) -> Option<(usize, usize)> {
    let leading_number = |s: &str| -> Option<usize> {
        let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    };
    let after_line = &msg[msg.find("line ")? + 5..];
    let line = leading_number(after_line)?;
    let after_col = &after_line[after_line.find("column ")? + 7..];
    Some((line, leading_number(after_col)?))
}

/// Config error naming `label` and the error position when known.
pub fn toml_error(label: &str, text: &str, e: &toml::de::Error) -> StatewireError {
    let position = e
        .span()
        .map(|span| line_col_at(text, span.start))
        .or_else(|| extract_line_col_from_msg(&e.to_string()));
    let message = e.message();
    match position {
        Some((line, col)) => {
            StatewireError::Config(format!("{label} parse error at {line}:{col}: {message}"))
        }
        None => StatewireError::Config(format!("{label} parse error: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_positions() {
        let text = "a = 1\nbb = 2\n";
        assert_eq!(line_col_at(text, 0), (1, 1));
        assert_eq!(line_col_at(text, 6), (2, 1));
        assert_eq!(line_col_at(text, 9), (2, 4));
        assert_eq!(line_col_at(text, 1000), (3, 1));
    }

    #[test]
    fn message_positions() {
        assert_eq!(
            extract_line_col_from_msg("TOML parse error at line 3, column 7"),
            Some((3, 7))
        );
        assert_eq!(extract_line_col_from_msg("no position here"), None);
    }
}
