use std::io::{Result, Write};

use crate::bencoding::value::Value;

impl Value {
    /// Writes the canonical encoding: dictionary keys come out sorted.
    pub fn encode(&self, dest: &mut impl Write) -> Result<()> {
        match self {
            Self::String(string) => encode_string(string, dest),
            Self::Integer(integer) => write!(dest, "i{}e", integer),
            Self::List(values) => {
                write!(dest, "l")?;
                for value in values {
                    value.encode(dest)?;
                }
                write!(dest, "e")
            }
            Self::Dictionary(entries) => {
                write!(dest, "d")?;
                for (key, value) in entries {
                    encode_string(key.as_bytes(), dest)?;
                    value.encode(dest)?;
                }
                write!(dest, "e")
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.encode(&mut buffer);
        buffer
    }
}

fn encode_string(string: &[u8], dest: &mut impl Write) -> Result<()> {
    write!(dest, "{}:", string.len())?;
    dest.write_all(string)
}
