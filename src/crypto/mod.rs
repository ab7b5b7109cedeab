use sha1::{Digest, Sha1 as Sha1Hasher};

use crate::bencoding::Value;

pub const SHA1_LEN: usize = 20;

#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct Sha1(pub [u8; SHA1_LEN]);

impl Sha1 {
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha1Hasher::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(string: &str) -> Option<Self> {
        let mut bytes = [0; SHA1_LEN];
        hex::decode_to_slice(string, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

/// Hash of the canonical encoding of a value.
impl From<&Value> for Sha1 {
    fn from(value: &Value) -> Self {
        Self::digest(&value.to_bytes())
    }
}

impl std::fmt::Debug for Sha1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha1(")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}
