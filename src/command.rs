// Author: Lukas Bower
// Purpose: Whitespace-delimited command grammar for the synthetic admin files.

use crate::FsError;

/// Upper bound on tokens in one command, the name included.
const MAX_ARGS: usize = 64;

/// Upper bound on the byte length of a single token.
const MAX_ARG_LEN: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Command {
    pub name: String,
    pub args: Vec<String>,
}

/// Split a command write into its name and arguments.
///
/// Tokens are separated by spaces, tabs, newlines and carriage returns.
pub(crate) fn parse(data: &[u8]) -> Result<Command, FsError> {
    let mut tokens: Vec<Vec<u8>> = Vec::new();
    let mut current = Vec::new();
    let mut in_token = false;
    for &b in data {
        if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
            if in_token {
                tokens.push(std::mem::take(&mut current));
                in_token = false;
            }
            continue;
        }
        if !in_token {
            if tokens.len() >= MAX_ARGS {
                return Err(FsError::TooManyArguments);
            }
            in_token = true;
        }
        if current.len() >= MAX_ARG_LEN {
            return Err(FsError::ArgumentTooLong);
        }
        current.push(b);
    }
    if in_token {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(FsError::CommandNameMissing);
    }

    let mut words = tokens
        .into_iter()
        .map(|t| String::from_utf8_lossy(&t).into_owned());
    let name = words.next().unwrap_or_default();
    Ok(Command {
        name,
        args: words.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_any_whitespace() {
        let cmd = parse(b" uname\tglenda \r\n+adm\n").expect("parse");
        assert_eq!(cmd.name, "uname");
        assert_eq!(cmd.args, vec!["glenda", "+adm"]);
    }

    #[test]
    fn empty_input_has_no_command_name() {
        assert_eq!(parse(b""), Err(FsError::CommandNameMissing));
        assert_eq!(parse(b" \t\n"), Err(FsError::CommandNameMissing));
    }

    #[test]
    fn caps_argument_length() {
        let long = [b'a'; MAX_ARG_LEN + 1];
        assert_eq!(parse(&long), Err(FsError::ArgumentTooLong));
        let exactly = [b'b'; MAX_ARG_LEN];
        let cmd = parse(&exactly).expect("parse");
        assert_eq!(cmd.name.len(), MAX_ARG_LEN);
    }

    #[test]
    fn caps_argument_count() {
        let input = "x ".repeat(MAX_ARGS + 1);
        assert_eq!(parse(input.as_bytes()), Err(FsError::TooManyArguments));
        let input = "x ".repeat(MAX_ARGS);
        let cmd = parse(input.as_bytes()).expect("parse");
        assert_eq!(cmd.args.len(), MAX_ARGS - 1);
    }
}
