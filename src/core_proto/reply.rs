use regex::Regex;
use tokio::io::AsyncRead;

use super::sockbuf::SockBuf;
use super::ProtoError;

/// A parsed FTP reply. `text` never contains the reply code of the first
/// line or the final CRLF; for multi-line replies it holds every line up
/// to and including the terminator line, joined as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
    pub multiline: bool,
}

/// Positive Preliminary: the command was accepted, another reply follows.
pub fn is_preliminary(code: u16) -> bool {
    (100..200).contains(&code)
}

/// Positive Completion: the command finished successfully.
pub fn is_completion(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Positive Intermediate: the command needs a follow-up (e.g. PASS after
/// USER).
pub fn is_intermediate(code: u16) -> bool {
    (300..400).contains(&code)
}

/// Transient Negative Completion: failed now, may succeed if retried.
pub fn is_transient_negative(code: u16) -> bool {
    (400..500).contains(&code)
}

/// Permanent Negative Completion: failed, retrying is pointless.
pub fn is_permanent_negative(code: u16) -> bool {
    (500..600).contains(&code)
}

impl Reply {
    pub fn is_preliminary(&self) -> bool {
        is_preliminary(self.code)
    }

    pub fn is_completion(&self) -> bool {
        is_completion(self.code)
    }

    pub fn is_intermediate(&self) -> bool {
        is_intermediate(self.code)
    }

    pub fn is_transient_negative(&self) -> bool {
        is_transient_negative(self.code)
    }

    pub fn is_permanent_negative(&self) -> bool {
        is_permanent_negative(self.code)
    }
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

/// Read one full reply off the control connection. Consumes exactly the
/// bytes of that reply; a following reply stays buffered for the next
/// call. A non-digit where the code should be is a `MalformedReply` and
/// the session cannot continue.
pub async fn read_reply<R>(buf: &mut SockBuf, reader: &mut R) -> Result<Reply, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut code_buf = [0u8; 3];
    for slot in code_buf.iter_mut() {
        *slot = next_or_closed(buf, reader).await?;
    }
    if !code_buf.iter().all(|b| b.is_ascii_digit()) {
        return Err(ProtoError::MalformedReply(
            String::from_utf8_lossy(&code_buf).into_owned(),
        ));
    }
    // Three ASCII digits always fit u16.
    let code: u16 = std::str::from_utf8(&code_buf)
        .expect("digits are valid utf-8")
        .parse()
        .expect("three digits fit u16");

    let separator = next_or_closed(buf, reader).await?;
    let multiline = separator == b'-';
    let text = if multiline {
        read_multi_line(buf, reader, code).await?
    } else {
        read_single_line(buf, reader).await?
    };
    Ok(Reply { code, text, multiline })
}

/// Accumulate bytes until CRLF; the CR is stripped from the result.
async fn read_single_line<R>(buf: &mut SockBuf, reader: &mut R) -> Result<String, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut text: Vec<u8> = Vec::new();
    loop {
        let byte = next_or_closed(buf, reader).await?;
        if byte == b'\n' && text.last() == Some(&b'\r') {
            text.pop();
            break;
        }
        text.push(byte);
    }
    Ok(String::from_utf8_lossy(&text).into_owned())
}

/// Accumulate full lines until one matches `^<code> .*\r$` — the same
/// numeric code, a space instead of the dash, CRLF line ending. That
/// terminator line is kept (minus its CR); nothing past its LF is
/// consumed.
async fn read_multi_line<R>(
    buf: &mut SockBuf,
    reader: &mut R,
    code: u16,
) -> Result<String, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let terminator =
        Regex::new(&format!(r"^{} .*\r$", code)).expect("terminator pattern is valid");
    let mut text: Vec<u8> = Vec::new();
    let mut line_start = 0;
    loop {
        let byte = next_or_closed(buf, reader).await?;
        if byte == b'\n' {
            let line = String::from_utf8_lossy(&text[line_start..]);
            if terminator.is_match(&line) {
                text.pop(); // trailing CR of the terminator line
                break;
            }
            text.push(byte);
            line_start = text.len();
        } else {
            text.push(byte);
        }
    }
    Ok(String::from_utf8_lossy(&text).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(input: &[u8]) -> Result<Reply, ProtoError> {
        let mut reader = input;
        let mut buf = SockBuf::new();
        read_reply(&mut buf, &mut reader).await
    }

    #[test]
    fn every_code_has_exactly_one_class() {
        for code in 100u16..600 {
            let classes = [
                is_preliminary(code),
                is_completion(code),
                is_intermediate(code),
                is_transient_negative(code),
                is_permanent_negative(code),
            ];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "code {} must belong to exactly one class",
                code
            );
        }
    }

    #[tokio::test]
    async fn single_line_reply() {
        let reply = parse(b"230 Logged in\r\n").await.unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "Logged in");
        assert!(!reply.multiline);
    }

    #[tokio::test]
    async fn multi_line_reply_keeps_all_lines() {
        let reply = parse(b"150-line one\r\n150 line two\r\n").await.unwrap();
        assert_eq!(reply.code, 150);
        assert!(reply.multiline);
        assert!(reply.text.contains("line one"));
        assert!(reply.text.contains("150 line two"));
    }

    #[tokio::test]
    async fn multi_line_reply_does_not_over_read() {
        let input: &[u8] = b"150-one\r\n150 two\r\n226 Done\r\n";
        let mut reader = input;
        let mut buf = SockBuf::new();

        let first = read_reply(&mut buf, &mut reader).await.unwrap();
        assert_eq!(first.code, 150);
        let second = read_reply(&mut buf, &mut reader).await.unwrap();
        assert_eq!(second.code, 226);
        assert_eq!(second.text, "Done");
    }

    #[tokio::test]
    async fn continuation_lines_with_dash_are_not_terminators() {
        let reply = parse(b"211-Features:\r\n211-One\r\n211 End\r\n")
            .await
            .unwrap();
        assert_eq!(reply.code, 211);
        assert!(reply.text.contains("211-One"));
        assert!(reply.text.contains("211 End"));
    }

    #[tokio::test]
    async fn non_digit_code_is_fatal() {
        match parse(b"xyz oops\r\n").await {
            Err(ProtoError::MalformedReply(_)) => {}
            other => panic!("expected MalformedReply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn eof_mid_reply_is_closed() {
        match parse(b"22").await {
            Err(ProtoError::Closed) => {}
            other => panic!("expected Closed, got {:?}", other),
        }
    }
}
