//! Canonical S-expression parsing, the wire format gpg-agent uses for
//! keygrips, public keys, and ECDH results.

use crate::error::KeyError;

/// A parsed canonical S-expression: either an opaque byte string or a
/// list of further expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(Vec<u8>),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn as_atom(&self) -> Option<&[u8]> {
        match self {
            Sexp::Atom(bytes) => Some(bytes),
            Sexp::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::List(items) => Some(items),
            Sexp::Atom(_) => None,
        }
    }

    /// Walks a list of atoms looking for one equal to `tag`, returning the
    /// element right after it (used to pull e.g. the `e` component out of
    /// `(ecdh (e ...))`-shaped replies).
    pub fn find_after(&self, tag: &[u8]) -> Option<&Sexp> {
        let items = self.as_list()?;
        items
            .iter()
            .position(|item| item.as_atom() == Some(tag))
            .and_then(|i| items.get(i + 1))
    }
}

/// Parses a single canonical S-expression `(len:bytes...)` from `input`,
/// returning the parsed value and the remaining unparsed bytes.
pub fn parse(input: &[u8]) -> Result<(Sexp, &[u8]), KeyError> {
    let rest = expect(input, b"(")?;
    let (items, rest) = parse_list_body(rest)?;
    Ok((Sexp::List(items), rest))
}

fn parse_list_body(mut input: &[u8]) -> Result<(Vec<Sexp>, &[u8]), KeyError> {
    let mut items = Vec::new();
    loop {
        input = skip_ws(input);
        match input.first() {
            Some(b')') => return Ok((items, &input[1..])),
            Some(b'(') => {
                let (nested, rest) = parse_list_body(&input[1..])?;
                items.push(Sexp::List(nested));
                input = rest;
            }
            Some(c) if c.is_ascii_digit() => {
                let (atom, rest) = parse_atom(input)?;
                items.push(Sexp::Atom(atom));
                input = rest;
            }
            Some(other) => {
                return Err(KeyError::new(format!(
                    "unexpected byte {other:#04x} in S-expression"
                )))
            }
            None => return Err(KeyError::new("unterminated S-expression list")),
        }
    }
}

fn parse_atom(input: &[u8]) -> Result<(Vec<u8>, &[u8]), KeyError> {
    let colon = input
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| KeyError::new("S-expression atom missing length prefix"))?;
    let len: usize = std::str::from_utf8(&input[..colon])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| KeyError::new("S-expression atom length is not a valid integer"))?;
    let body_start = colon + 1;
    let body_end = body_start
        .checked_add(len)
        .ok_or_else(|| KeyError::new("S-expression atom length overflow"))?;
    if body_end > input.len() {
        return Err(KeyError::new("S-expression atom truncated"));
    }
    Ok((input[body_start..body_end].to_vec(), &input[body_end..]))
}

fn skip_ws(input: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < input.len() && input[i] == b' ' {
        i += 1;
    }
    &input[i..]
}

fn expect<'a>(input: &'a [u8], token: &[u8]) -> Result<&'a [u8], KeyError> {
    if input.starts_with(token) {
        Ok(&input[token.len()..])
    } else {
        Err(KeyError::new(format!(
            "expected {:?} at start of S-expression",
            std::str::from_utf8(token).unwrap_or("?")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_atoms() {
        let (value, rest) = parse(b"(3:abc(1:x2:yy))").unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            value,
            Sexp::List(vec![
                Sexp::Atom(b"abc".to_vec()),
                Sexp::List(vec![Sexp::Atom(b"x".to_vec()), Sexp::Atom(b"yy".to_vec())]),
            ])
        );
    }

    #[test]
    fn find_after_locates_tagged_value() {
        let (value, _) = parse(b"(4:ecdh(1:e2:hi))").unwrap();
        let ecdh = value.as_list().unwrap()[1].clone();
        let e = ecdh.find_after(b"e").unwrap();
        assert_eq!(e.as_atom(), Some(&b"hi"[..]));
    }

    #[test]
    fn rejects_truncated_atom() {
        assert!(parse(b"(5:abc)").is_err());
    }
}
