use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// Length of a zone identifier in canonical UUID form.
const ZONE_ID_LEN: usize = 36;

/// Byte offsets of the hyphen separators within a canonical UUID.
const HYPHEN_OFFSETS: [usize; 4] = [8, 13, 18, 23];

/// A validated zone identifier.
///
/// Zones are identified by their UUID in canonical form: 36 characters of
/// lowercase hexadecimal digits in 8-4-4-4-12 groups.
///
/// # Examples
///
/// ```
/// # use zone_metric_agent::zone::ZoneId;
/// let raw_id = "5e3f1ea8-8372-465f-9c58-3ff12e03e15c";
/// let zone_id = ZoneId::new(raw_id).unwrap();
/// assert_eq!(zone_id.as_str(), "5e3f1ea8-8372-465f-9c58-3ff12e03e15c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(Arc<str>);

impl ZoneId {
    /// Creates a new `ZoneId` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidZoneId`] if the input is not a canonical
    /// lowercase UUID.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if !is_canonical_uuid(src.as_bytes()) {
            return Err(Error::InvalidZoneId(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ZoneId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for ZoneId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ZoneId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_canonical_uuid(src: &[u8]) -> bool {
    if src.len() != ZONE_ID_LEN {
        return false;
    }

    src.iter().enumerate().all(|(i, b)| {
        if HYPHEN_OFFSETS.contains(&i) {
            *b == b'-'
        } else {
            matches!(*b, b'0'..=b'9' | b'a'..=b'f')
        }
    })
}
