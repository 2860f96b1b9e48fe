use memchr::memchr2;

use crate::errors::*;

pub fn trim_ascii_whitespace(b: &[u8]) -> Option<&[u8]> {
    let start = b.iter().position(|&c| !c.is_ascii_whitespace())?;
    let end = b.iter().rposition(|&c| !c.is_ascii_whitespace())?;
    Some(&b[start..=end])
}

pub fn check_valid_name(b: &[u8]) -> Option<&[u8]> {
    if b.is_empty() {
        return None;
    }

    for &c in b {
        match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => (),
            _ => return None,
        }
    }

    Some(b)
}

/// The read identifier of a fastq header line: everything before the first space or tab.
pub fn read_id(header: &[u8]) -> &[u8] {
    match memchr2(b' ', b'\t', header) {
        Some(end) => &header[..end],
        None => header,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Placeholder(String),
}

/// Split a string like `--fastq={fastq}` into literal text and `{name}` placeholders.
///
/// A backslash escapes the next character, so `\{` is a literal brace.
pub fn parse_template(template: &[u8]) -> Result<Vec<TemplatePart>> {
    let mut res = Vec::new();
    let mut curr = Vec::new();
    let mut escape = false;
    let mut in_name = false;

    for &c in template {
        match c {
            b'{' if !escape => {
                if in_name {
                    Err(Error::Parse {
                        string: utf8(template),
                        context: "command template".to_owned(),
                        reason: "cannot have nested braces",
                    })?;
                }
                if !curr.is_empty() {
                    res.push(TemplatePart::Literal(utf8(&curr)));
                }
                in_name = true;
                curr.clear();
            }
            b'}' if !escape => {
                if !in_name {
                    Err(Error::Parse {
                        string: utf8(template),
                        context: "command template".to_owned(),
                        reason: "unbalanced braces",
                    })?;
                }

                let name = trim_ascii_whitespace(&curr)
                    .and_then(check_valid_name)
                    .ok_or_else(|| Error::Parse {
                        string: utf8(template),
                        context: "command template".to_owned(),
                        reason: "invalid placeholder name",
                    })?;
                res.push(TemplatePart::Placeholder(utf8(name)));
                in_name = false;
                curr.clear();
            }
            b'\\' if !escape => escape = true,
            _ => {
                escape = false;
                curr.push(c);
            }
        }
    }

    if in_name {
        Err(Error::Parse {
            string: utf8(template),
            context: "command template".to_owned(),
            reason: "unbalanced braces",
        })?;
    }

    if !curr.is_empty() {
        res.push(TemplatePart::Literal(utf8(&curr)));
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_id_stops_at_whitespace() {
        assert_eq!(read_id(b"r1 runid=abc read=12"), b"r1");
        assert_eq!(read_id(b"r2\tch=4"), b"r2");
        assert_eq!(read_id(b"r3"), b"r3");
    }

    #[test]
    fn test_parse_template_mixed() {
        let parts = parse_template(b"--fastq={fastq}.gz").unwrap();
        assert_eq!(
            parts,
            vec![
                TemplatePart::Literal("--fastq=".to_owned()),
                TemplatePart::Placeholder("fastq".to_owned()),
                TemplatePart::Literal(".gz".to_owned()),
            ]
        );
    }

    #[test]
    fn test_parse_template_escaped_brace() {
        let parts = parse_template(br"\{prefix\}").unwrap();
        assert_eq!(parts, vec![TemplatePart::Literal("{prefix}".to_owned())]);
    }

    #[test]
    fn test_parse_template_rejects_unbalanced() {
        assert!(parse_template(b"{prefix").is_err());
        assert!(parse_template(b"prefix}").is_err());
        assert!(parse_template(b"{{prefix}}").is_err());
        assert!(parse_template(b"{bad-name}").is_err());
    }
}
