use std::{
    collections::BTreeMap,
    io::{Error, ErrorKind, Result, Write},
};

use crate::bencoding::value::Value;

/// Upper bound for the buffer reserved up front for a byte string.
const MAX_PREALLOCATION: usize = 64 * 1024;

impl Value {
    pub fn decode(input: &[u8]) -> Result<Self> {
        let mut parser = Parser::new();
        parser.write_all(input)?;
        parser.result()
    }
}

/// Push parser for bencoded data, fed one byte at a time.
#[derive(Debug)]
pub struct Parser {
    state: State,
    stack: Vec<StackState>,
    position: usize,
}

#[derive(Debug)]
enum State {
    Ready,
    Integer(Option<i64>, i64),
    StringLength(usize),
    StringContents(Vec<u8>, usize),
    Done(Value),
}

#[derive(Debug)]
enum StackState {
    List(Vec<Value>),
    Dictionary(Option<String>, BTreeMap<String, Value>),
}

impl StackState {
    fn new_list() -> Self {
        Self::List(Vec::new())
    }

    fn new_dictionary() -> Self {
        Self::Dictionary(None, BTreeMap::new())
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Ready,
            stack: Vec::new(),
            position: 0,
        }
    }

    fn consume(&mut self, byte: u8) -> Result<()> {
        match (&mut self.state, byte) {
            // Integer
            (State::Ready, b'i') => {
                self.state = State::Integer(None, 1);
            }
            (State::Integer(None, sign @ 1), b'-') => {
                *sign = -1;
            }
            (State::Integer(None, -1), b'0') => {
                return Err(self.invalid("negative zero not allowed"));
            }
            (State::Integer(Some(0), _), b'0'..=b'9') => {
                return Err(self.invalid("leading zeros not allowed"));
            }
            (State::Integer(integer, _), b'0'..=b'9') => {
                let digit = (byte - b'0') as i64;
                let next = integer
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit));
                match next {
                    Some(next) => *integer = Some(next),
                    None => return Err(self.invalid("integer overflow")),
                }
            }
            (&mut State::Integer(Some(integer), sign), b'e') => {
                self.emit(Value::Integer(integer * sign))?;
            }

            // List
            (State::Ready, b'l') => {
                self.stack.push(StackState::new_list());
            }

            // Dictionary
            (State::Ready, b'd') => {
                self.stack.push(StackState::new_dictionary());
            }

            // String
            (State::Ready, b'0'..=b'9') => {
                let digit = (byte - b'0') as usize;
                self.state = State::StringLength(digit);
            }
            (State::StringLength(length), b'0'..=b'9') => {
                let digit = (byte - b'0') as usize;
                match length.checked_mul(10).and_then(|n| n.checked_add(digit)) {
                    Some(next) => *length = next,
                    None => return Err(self.invalid("string length overflow")),
                }
            }
            (&mut State::StringLength(0), b':') => {
                self.emit(Value::String(Vec::new()))?;
            }
            (&mut State::StringLength(length), b':') => {
                let string = Vec::with_capacity(length.min(MAX_PREALLOCATION));
                self.state = State::StringContents(string, length);
            }
            (State::StringContents(bytes, length), _) => {
                bytes.push(byte);
                if bytes.len() == *length {
                    let string = std::mem::take(bytes);
                    self.emit(Value::String(string))?;
                }
            }

            // End collection
            (State::Ready, b'e') => match self.stack.pop() {
                Some(StackState::List(list)) => {
                    self.emit(Value::List(list))?;
                }
                Some(StackState::Dictionary(None, entries)) => {
                    self.emit(Value::Dictionary(entries))?;
                }
                Some(StackState::Dictionary(Some(key), _)) => {
                    return Err(self.invalid(&format!("missing value for key {key:?}")));
                }
                None => {
                    return Err(self.invalid("nothing to close"));
                }
            },

            // Ignore trailing whitespace
            (State::Done(_), b'\n' | b'\r' | b' ') => (),

            // Unexpected input
            _ => {
                return Err(self.invalid(&format!("unexpected byte: 0x{byte:02x}")));
            }
        }
        self.position += 1;
        Ok(())
    }

    fn emit(&mut self, value: Value) -> Result<()> {
        match (self.stack.last_mut(), value) {
            (Some(StackState::List(list)), value) => {
                list.push(value);
            }
            (Some(StackState::Dictionary(key @ None, _)), Value::String(string)) => {
                let string = String::from_utf8(string).map_err(|_| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        "dictionary key should be valid utf8",
                    )
                })?;
                *key = Some(string);
            }
            (Some(StackState::Dictionary(None, _)), _) => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "only string keys are allowed in dictionaries",
                ));
            }
            (Some(StackState::Dictionary(key @ Some(_), entries)), value) => {
                if let Some(key) = key.take() {
                    entries.insert(key, value);
                }
            }
            (None, value) => {
                self.state = State::Done(value);
                return Ok(());
            }
        }
        self.state = State::Ready;
        Ok(())
    }

    fn invalid(&self, message: &str) -> Error {
        Error::new(
            ErrorKind::InvalidInput,
            format!("{message} at position {}", self.position),
        )
    }

    pub fn result(self) -> Result<Value> {
        match self.state {
            State::Done(value) => Ok(value),
            _ => Err(Error::new(ErrorKind::UnexpectedEof, "incomplete")),
        }
    }
}

impl Write for Parser {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for byte in buf {
            self.consume(*byte)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<Value> {
        Value::decode(input)
    }

    #[test]
    fn parse_error() {
        assert!(decode(b"foo").is_err());
    }

    #[test]
    fn string() {
        assert_eq!(decode(b"3:foo").unwrap(), Value::string("foo"));
    }

    #[test]
    fn empty_string() {
        assert_eq!(decode(b"0:").unwrap(), Value::string(""));
    }

    #[test]
    fn binary_string() {
        assert_eq!(
            decode(b"3:\x00\xff\x01").unwrap(),
            Value::String(vec![0x00, 0xff, 0x01])
        );
    }

    #[test]
    fn zero() {
        assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
    }

    #[test]
    fn multi_digit_integer() {
        assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    }

    #[test]
    fn negative_integer() {
        assert_eq!(decode(b"i-12e").unwrap(), Value::Integer(-12));
    }

    #[test]
    fn fail_for_minus_zero() {
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn fail_for_leading_zero() {
        assert!(decode(b"i03e").is_err());
    }

    #[test]
    fn fail_for_empty_integer() {
        assert!(decode(b"ie").is_err());
    }

    #[test]
    fn fail_for_integer_overflow() {
        assert!(decode(b"i99999999999999999999e").is_err());
    }

    #[test]
    fn nested_list() {
        assert_eq!(
            decode(b"li1eli2ei3eee").unwrap(),
            Value::list().with_value(Value::Integer(1)).with_value(
                Value::list()
                    .with_value(Value::Integer(2))
                    .with_value(Value::Integer(3))
            )
        );
    }

    #[test]
    fn non_empty_dictionary() {
        assert_eq!(
            decode(b"d3:cow3:moo4:spam4:eggse").unwrap(),
            Value::dictionary()
                .with_entry("cow", Value::string("moo"))
                .with_entry("spam", Value::string("eggs"))
        );
    }

    #[test]
    fn fail_for_non_string_keys() {
        assert!(decode(b"di1ei2ee").is_err());
    }

    #[test]
    fn fail_for_key_without_value() {
        assert!(decode(b"d3:fooe").is_err());
    }

    #[test]
    fn fail_for_truncated_input() {
        assert!(decode(b"d3:foo3:ba").is_err());
        assert!(decode(b"l").is_err());
    }

    #[test]
    fn ignore_trailing_whitespace() {
        assert_eq!(decode(b"i42e \n").unwrap(), Value::Integer(42));
    }

    #[test]
    fn fail_for_trailing_garbage() {
        assert!(decode(b"i42ei1e").is_err());
    }

    #[test]
    fn fed_in_chunks() {
        let mut parser = Parser::new();
        parser.write_all(b"d3:foo").unwrap();
        parser.write_all(b"l1:ai7ee").unwrap();
        parser.write_all(b"e").unwrap();

        assert_eq!(
            parser.result().unwrap(),
            Value::dictionary().with_entry(
                "foo",
                Value::list()
                    .with_value(Value::string("a"))
                    .with_value(Value::Integer(7))
            )
        );
    }
}
