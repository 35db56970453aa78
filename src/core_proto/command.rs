use tokio::io::AsyncRead;

use super::sockbuf::SockBuf;
use super::ProtoError;
use crate::constants::MAX_ARG_LEN;
use crate::core_ftpcommand::ftpcommand::FtpCommand;

/// Sorted list of supported command verbs, searched with a binary search
/// after reading three bytes and again after widening to four.
const SUPPORTED_CMDS: &[(&str, FtpCommand)] = &[
    ("ACCT", FtpCommand::ACCT),
    ("CDUP", FtpCommand::CDUP),
    ("CWD", FtpCommand::CWD),
    ("EPRT", FtpCommand::EPRT),
    ("EPSV", FtpCommand::EPSV),
    ("LIST", FtpCommand::LIST),
    ("PASS", FtpCommand::PASS),
    ("PASV", FtpCommand::PASV),
    ("PORT", FtpCommand::PORT),
    ("PWD", FtpCommand::PWD),
    ("QUIT", FtpCommand::QUIT),
    ("RETR", FtpCommand::RETR),
    ("STOR", FtpCommand::STOR),
    ("USER", FtpCommand::USER),
];

fn lookup_verb(verb: &str) -> Option<FtpCommand> {
    SUPPORTED_CMDS
        .binary_search_by_key(&verb, |entry| entry.0)
        .ok()
        .map(|i| SUPPORTED_CMDS[i].1)
}

/// A parsed command line. The verb is matched case-insensitively; the
/// argument is kept as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: FtpCommand,
    pub arg: String,
}

/// Outcome of reading one command line. Everything except `Cmd` has
/// already resynchronized the receive buffer; the caller only needs to
/// send the matching reply (502, 202 or 500).
#[derive(Debug)]
pub enum CommandRead {
    Cmd(Command),
    /// Verb not in the supported set.
    Unknown(String),
    /// ACCT with an argument: answered "superfluous", then dropped.
    Superfluous,
    /// Bad separator, overlong argument or stray control bytes.
    SyntaxError,
}

async fn next_or_closed<R>(buf: &mut SockBuf, reader: &mut R) -> Result<u8, ProtoError>
where
    R: AsyncRead + Unpin,
{
    match buf.next_byte(reader).await? {
        Some(byte) => Ok(byte),
        None => Err(ProtoError::Closed),
    }
}

/// Read and parse the next command from the control connection.
///
/// Reads three bytes, uppercases them and checks the verb table; verbs of
/// four letters are found by reading one more byte and retrying. After a
/// known verb, either CRLF follows immediately (empty argument) or a
/// single space and then the argument, terminated by CRLF and bounded by
/// [`MAX_ARG_LEN`].
pub async fn read_command<R>(buf: &mut SockBuf, reader: &mut R) -> Result<CommandRead, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut verb = String::with_capacity(4);
    for _ in 0..3 {
        verb.push(next_or_closed(buf, reader).await?.to_ascii_uppercase() as char);
    }
    let mut cmd = lookup_verb(&verb);
    if cmd.is_none() {
        verb.push(next_or_closed(buf, reader).await?.to_ascii_uppercase() as char);
        cmd = lookup_verb(&verb);
    }
    let Some(cmd) = cmd else {
        buf.resync();
        return Ok(CommandRead::Unknown(verb));
    };

    let byte = next_or_closed(buf, reader).await?;
    if byte == b'\r' {
        if next_or_closed(buf, reader).await? == b'\n' {
            return Ok(CommandRead::Cmd(Command {
                verb: cmd,
                arg: String::new(),
            }));
        }
        buf.resync();
        return Ok(CommandRead::SyntaxError);
    }
    if cmd == FtpCommand::ACCT {
        buf.resync();
        return Ok(CommandRead::Superfluous);
    }
    if byte != b' ' {
        buf.resync();
        return Ok(CommandRead::SyntaxError);
    }

    let mut arg: Vec<u8> = Vec::new();
    loop {
        let byte = next_or_closed(buf, reader).await?;
        if byte == b'\n' && arg.last() == Some(&b'\r') {
            arg.pop();
            break;
        }
        arg.push(byte);
        if arg.len() > MAX_ARG_LEN {
            buf.resync();
            return Ok(CommandRead::SyntaxError);
        }
    }
    Ok(CommandRead::Cmd(Command {
        verb: cmd,
        arg: String::from_utf8_lossy(&arg).into_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse_one(input: &[u8]) -> Result<CommandRead, ProtoError> {
        let mut reader = input;
        let mut buf = SockBuf::new();
        read_command(&mut buf, &mut reader).await
    }

    fn expect_cmd(read: CommandRead) -> Command {
        match read {
            CommandRead::Cmd(cmd) => cmd,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn parses_verb_and_argument() {
        let cmd = expect_cmd(parse_one(b"USER alice\r\n").await.unwrap());
        assert_eq!(cmd.verb, FtpCommand::USER);
        assert_eq!(cmd.arg, "alice");
    }

    #[tokio::test]
    async fn verbs_are_case_insensitive() {
        let cmd = expect_cmd(parse_one(b"user alice\r\n").await.unwrap());
        assert_eq!(cmd.verb, FtpCommand::USER);
    }

    #[tokio::test]
    async fn three_letter_verb_resolves_without_fourth_byte() {
        let input: &[u8] = b"PWD\r\nQUIT\r\n";
        let mut reader = input;
        let mut buf = SockBuf::new();

        let first = expect_cmd(read_command(&mut buf, &mut reader).await.unwrap());
        assert_eq!(first.verb, FtpCommand::PWD);
        assert_eq!(first.arg, "");
        let second = expect_cmd(read_command(&mut buf, &mut reader).await.unwrap());
        assert_eq!(second.verb, FtpCommand::QUIT);
    }

    #[tokio::test]
    async fn unknown_verb_is_reported_and_skipped() {
        let input: &[u8] = b"SYST\r\nPWD\r\n";
        let mut reader = input;
        let mut buf = SockBuf::new();

        match read_command(&mut buf, &mut reader).await.unwrap() {
            CommandRead::Unknown(verb) => assert_eq!(verb, "SYST"),
            other => panic!("expected Unknown, got {:?}", other),
        }
        let next = expect_cmd(read_command(&mut buf, &mut reader).await.unwrap());
        assert_eq!(next.verb, FtpCommand::PWD);
    }

    #[tokio::test]
    async fn acct_with_argument_is_superfluous() {
        match parse_one(b"ACCT whatever\r\n").await.unwrap() {
            CommandRead::Superfluous => {}
            other => panic!("expected Superfluous, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_space_separator_is_a_syntax_error() {
        match parse_one(b"USER\talice\r\n").await.unwrap() {
            CommandRead::SyntaxError => {}
            other => panic!("expected SyntaxError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_argument_does_not_corrupt_the_next_command() {
        let mut input = Vec::from(&b"LIST "[..]);
        input.extend(std::iter::repeat(b'a').take(MAX_ARG_LEN + 50));
        input.extend_from_slice(b"\r\nPWD\r\n");
        let mut reader = input.as_slice();
        let mut buf = SockBuf::new();

        match read_command(&mut buf, &mut reader).await.unwrap() {
            CommandRead::SyntaxError => {}
            other => panic!("expected SyntaxError, got {:?}", other),
        }
        let next = expect_cmd(read_command(&mut buf, &mut reader).await.unwrap());
        assert_eq!(next.verb, FtpCommand::PWD);
        assert_eq!(next.arg, "");
    }

    #[tokio::test]
    async fn eof_before_a_command_is_closed() {
        match parse_one(b"").await {
            Err(ProtoError::Closed) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }
}
