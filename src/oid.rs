//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>`, so the common MIB-2 names
//! never touch the heap. Ordering is lexicographic over the arcs,
//! which is the MIB tree order walks rely on.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) allowed in an OID.
///
/// RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a
/// value". Enforced during BER decoding.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier: an ordered sequence of non-negative 32-bit arcs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted-decimal notation (e.g. "1.3.6.1.2.1.1.1.0").
    ///
    /// Parsing does not enforce the X.690 arc constraints; call
    /// [`validate()`](Self::validate) for that.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        for part in s.split('.') {
            if part.is_empty() {
                continue;
            }

            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;

            arcs.push(arc);
        }

        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with another OID.
    ///
    /// Every OID starts with itself and with the empty OID.
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Check if `other` is a proper prefix of this OID.
    pub fn is_descendant_of(&self, other: &Oid) -> bool {
        self.arcs.len() > other.arcs.len() && self.starts_with(other)
    }

    /// Get the parent OID (all arcs except the last), or `None` when empty.
    pub fn parent(&self) -> Option<Oid> {
        if self.arcs.is_empty() {
            None
        } else {
            Some(Oid {
                arcs: SmallVec::from_slice(&self.arcs[..self.arcs.len() - 1]),
            })
        }
    }

    /// Create a child OID by appending one arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Create a new OID by appending a run of arcs.
    pub fn append(&self, tail: &[u32]) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(tail);
        Oid { arcs }
    }

    /// Validate arc constraints per X.690 Section 8.19.4.
    ///
    /// arc1 must be 0, 1, or 2; arc2 must be <= 39 when arc1 < 2.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.is_empty() {
            return Ok(());
        }

        let arc1 = self.arcs[0];
        if arc1 > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(arc1)));
        }

        if self.arcs.len() >= 2 {
            let arc2 = self.arcs[1];
            if arc1 < 2 && arc2 >= 40 {
                return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                    first: arc1,
                    second: arc2,
                }));
            }
        }

        Ok(())
    }

    /// Validate that the OID doesn't exceed [`MAX_OID_LEN`].
    pub fn validate_length(&self) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            }));
        }
        Ok(())
    }

    /// Encode the OID content bytes (X.690 Section 8.19).
    ///
    /// The first two arcs are combined as `arc1 * 40 + arc2` and
    /// encoded base-128 (arc2 may exceed 127 when arc1 = 2); each
    /// remaining arc is base-128 big-endian with the continuation bit
    /// set on every byte but the last.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        if self.arcs.is_empty() {
            return bytes;
        }

        if self.arcs.len() >= 2 {
            encode_subid(&mut bytes, self.arcs[0] * 40 + self.arcs[1]);
        } else {
            encode_subid(&mut bytes, self.arcs[0] * 40);
        }

        for &arc in self.arcs.iter().skip(2) {
            encode_subid(&mut bytes, arc);
        }

        bytes
    }

    /// Decode OID content bytes.
    ///
    /// Enforces [`MAX_OID_LEN`].
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        // First subidentifier packs the first two arcs
        let (first, consumed) = decode_subid(data)?;
        if first < 40 {
            arcs.push(0);
            arcs.push(first);
        } else if first < 80 {
            arcs.push(1);
            arcs.push(first - 40);
        } else {
            arcs.push(2);
            arcs.push(first - 80);
        }

        let mut i = consumed;
        while i < data.len() {
            let (arc, n) = decode_subid(&data[i..])?;
            arcs.push(arc);
            i += n;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }

        Ok(Self { arcs })
    }
}

/// Encode one subidentifier base-128 with continuation bits.
#[inline]
fn encode_subid(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    if value == 0 {
        bytes.push(0);
        return;
    }

    let mut groups = 0;
    let mut tmp = value;
    while tmp > 0 {
        groups += 1;
        tmp >>= 7;
    }

    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one subidentifier, returning (value, bytes consumed).
fn decode_subid(data: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut i = 0;

    loop {
        if i >= data.len() {
            return Err(Error::decode(i, DecodeErrorKind::InvalidOidEncoding));
        }

        let byte = data[i];
        i += 1;

        if value > (u32::MAX >> 7) {
            return Err(Error::decode(i, DecodeErrorKind::IntegerOverflow));
        }

        value = (value << 7) | ((byte & 0x7F) as u32);

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((value, i))
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Macro to create an OID from literal arcs.
///
/// ```
/// use usnmp::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("1.3.abc.1".parse::<Oid>().is_err());
        assert!("1.3.-6.1".parse::<Oid>().is_err());
        assert!("".parse::<Oid>().unwrap().is_empty());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = oid!(1, 3, 6, 1);
        let b = oid!(1, 3, 6, 1, 0);
        let c = oid!(1, 3, 6, 2);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_prefix_relations() {
        let root = oid!(1, 3, 6, 1, 2, 1, 1);
        let leaf = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
        assert!(leaf.starts_with(&root));
        assert!(leaf.is_descendant_of(&root));
        assert!(!root.is_descendant_of(&leaf));
        // An OID starts with itself but is not its own descendant
        assert!(leaf.starts_with(&leaf));
        assert!(!leaf.is_descendant_of(&leaf));
        assert!(leaf.starts_with(&Oid::empty()));
    }

    #[test]
    fn test_parent_child_append() {
        let system = oid!(1, 3, 6, 1, 2, 1, 1);
        assert_eq!(system.child(1).to_string(), "1.3.6.1.2.1.1.1");
        assert_eq!(system.append(&[1, 0]).to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(system.parent().unwrap().to_string(), "1.3.6.1.2.1");
        assert!(Oid::empty().parent().is_none());
    }

    #[test]
    fn test_validate_arcs() {
        assert!(oid!(1, 3, 6, 1).validate().is_ok());
        assert!(Oid::from_slice(&[3, 0]).validate().is_err());
        assert!(Oid::from_slice(&[0, 40]).validate().is_err());
        assert!(Oid::from_slice(&[1, 39]).validate().is_ok());
        assert!(Oid::from_slice(&[2, 999]).validate().is_ok());
    }

    #[test]
    fn test_ber_first_subid_combination() {
        // 1.3.6.1 -> (1*40+3)=43=0x2B, 6, 1
        let oid = oid!(1, 3, 6, 1);
        assert_eq!(&oid.to_ber()[..], &[0x2B, 0x06, 0x01]);
    }

    #[test]
    fn test_ber_large_arc2() {
        // X.690 example: 2.999.3 -> first subid 1079 = 0x88 0x37
        let oid = oid!(2, 999, 3);
        assert_eq!(&oid.to_ber()[..], &[0x88, 0x37, 0x03]);
        assert_eq!(Oid::from_ber(&oid.to_ber()).unwrap(), oid);
    }

    #[test]
    fn test_ber_continuation_bit() {
        // arc 2001 = 0x0F 0x51 in base-128 with continuation
        let oid = oid!(1, 3, 6, 1, 4, 1, 2001);
        let ber = oid.to_ber();
        assert_eq!(&ber[..], &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x8F, 0x51]);
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn test_ber_roundtrip() {
        for s in [
            "1.3.6.1.2.1.1.1.0",
            "0.0",
            "1.39",
            "2.999.3.4294967295",
            "1.3.6.1.4.1.2001.1.1.1.297.93.1.27.2.2.1",
        ] {
            let oid = Oid::parse(s).unwrap();
            assert_eq!(Oid::from_ber(&oid.to_ber()).unwrap(), oid, "oid {}", s);
        }
    }

    #[test]
    fn test_from_ber_truncated_subid() {
        // Continuation bit set with no following byte
        assert!(Oid::from_ber(&[0x2B, 0x8F]).is_err());
    }

    #[test]
    fn test_from_ber_max_len() {
        let mut at_limit = vec![0x2B]; // arcs 1.3
        at_limit.extend(std::iter::repeat(0x01).take(MAX_OID_LEN - 2));
        assert_eq!(Oid::from_ber(&at_limit).unwrap().len(), MAX_OID_LEN);

        let mut over = vec![0x2B];
        over.extend(std::iter::repeat(0x01).take(MAX_OID_LEN - 1));
        assert!(Oid::from_ber(&over).is_err());
    }

    #[test]
    fn test_non_minimal_subid_accepted() {
        // 0x80 0x01 decodes as arc 1 (leading zero groups tolerated)
        let oid = Oid::from_ber(&[0x2B, 0x80, 0x01]).unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 1]);
    }
}
