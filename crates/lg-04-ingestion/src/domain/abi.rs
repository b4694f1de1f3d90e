//! # ABI Helpers
//!
//! 32-byte word access over a log's data section, plus the bytes32 id
//! normalization used for indexed topics.

use primitive_types::U256;
use tracing::warn;
use uuid::Uuid;

const WORD: usize = 32;

/// Decoded log data section.
///
/// Malformed data never fails; it decodes as zeros with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiData {
    bytes: Vec<u8>,
    event: &'static str,
}

impl AbiData {
    /// Parse `0x`-prefixed hex. Data that is not hex or not a whole number
    /// of words has no words.
    pub fn parse(event: &'static str, data: &str) -> Self {
        let clean = data.trim();
        let clean = clean
            .strip_prefix("0x")
            .or_else(|| clean.strip_prefix("0X"))
            .unwrap_or(clean);
        let bytes = match hex::decode(clean) {
            Ok(bytes) if bytes.len() % WORD == 0 => bytes,
            Ok(bytes) => {
                warn!(
                    "[lg-04] {} data length {} is not a multiple of 32 bytes",
                    event,
                    bytes.len()
                );
                Vec::new()
            }
            Err(e) => {
                warn!("[lg-04] {} data is not hex: {}", event, e);
                Vec::new()
            }
        };
        Self { bytes, event }
    }

    pub fn word_count(&self) -> usize {
        self.bytes.len() / WORD
    }

    pub fn word(&self, index: usize) -> Option<U256> {
        let start = index.checked_mul(WORD)?;
        let chunk = self.bytes.get(start..start.checked_add(WORD)?)?;
        Some(U256::from_big_endian(chunk))
    }

    /// Word `index` as a non-negative `i64`; 0 when absent or too large.
    pub fn int64(&self, index: usize) -> i64 {
        match self.word(index) {
            Some(word) if word <= U256::from(i64::MAX as u64) => word.low_u64() as i64,
            Some(_) => {
                warn!(
                    "[lg-04] {} word {} does not fit in i64, decoded as 0",
                    self.event, index
                );
                0
            }
            None => 0,
        }
    }

    /// The first `N` words as `i64`. All zeros when fewer than `N` words
    /// are present.
    pub fn int64_words<const N: usize>(&self) -> [i64; N] {
        if self.word_count() < N {
            warn!(
                "[lg-04] {} data has {} words, need {}, decoded as zeros",
                self.event,
                self.word_count(),
                N
            );
            return [0; N];
        }
        std::array::from_fn(|index| self.int64(index))
    }

    /// Dynamic `string` whose head offset is at word `index`. `None` when
    /// the tail is absent or malformed.
    pub fn string_at(&self, index: usize) -> Option<String> {
        let offset = self.small_word(index)?;
        let len = self.small_word_at_byte(offset)?;
        let start = offset.checked_add(WORD)?;
        let raw = self.bytes.get(start..start.checked_add(len)?)?;
        String::from_utf8(raw.to_vec()).ok()
    }

    fn small_word(&self, index: usize) -> Option<usize> {
        to_usize(self.word(index)?)
    }

    fn small_word_at_byte(&self, offset: usize) -> Option<usize> {
        let chunk = self.bytes.get(offset..offset.checked_add(WORD)?)?;
        to_usize(U256::from_big_endian(chunk))
    }
}

fn to_usize(word: U256) -> Option<usize> {
    if word > U256::from(u32::MAX) {
        return None;
    }
    usize::try_from(word.low_u64()).ok()
}

/// Lowercase, `0x`-prefixed, exactly 64 hex digits: shorter values are
/// left-padded with zeros, longer ones keep their last 64 digits.
pub fn normalize_bytes32(topic: &str) -> String {
    let lower = topic.trim().to_ascii_lowercase();
    let clean = lower.strip_prefix("0x").unwrap_or(&lower);
    let skip = clean.chars().count().saturating_sub(64);
    let digits: String = clean.chars().skip(skip).collect();
    format!("0x{digits:0>64}")
}

/// Off-chain loan id for a bytes32 topic.
///
/// A UUID written into either half of the word (other half zero) is
/// returned in canonical hyphenated form; anything else is returned as the
/// normalized bytes32 hex. Ids that happen to have a zero half are
/// indistinguishable from padded UUIDs.
pub fn project_loan_id(bytes32: &str) -> String {
    bytes32_to_uuid(bytes32).unwrap_or_else(|| bytes32.to_string())
}

fn bytes32_to_uuid(bytes32: &str) -> Option<String> {
    let clean = bytes32.trim().to_ascii_lowercase();
    let clean = clean.strip_prefix("0x").unwrap_or(&clean);
    if clean.len() != 64 {
        return None;
    }
    let raw = hex::decode(clean).ok()?;
    let (high, low) = raw.split_at(16);

    if low.iter().all(|b| *b == 0) {
        return Uuid::from_slice(high).ok().map(|id| id.to_string());
    }
    if high.iter().all(|b| *b == 0) {
        return Uuid::from_slice(low).ok().map(|id| id.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_hex(value: u64) -> String {
        format!("{value:064x}")
    }

    #[test]
    fn test_words_decode_big_endian() {
        let data = format!("0x{}{}{}", word_hex(500), word_hex(1000), word_hex(123));
        let abi = AbiData::parse("RepaymentRecorded", &data);
        assert_eq!(abi.word_count(), 3);
        assert_eq!(abi.int64_words::<3>(), [500, 1000, 123]);
        assert_eq!(abi.int64(3), 0);
    }

    #[test]
    fn test_malformed_data_has_no_words() {
        assert_eq!(AbiData::parse("LoanDefaulted", "0x0102").word_count(), 0);
        assert_eq!(AbiData::parse("LoanDefaulted", "0xzz").word_count(), 0);
        assert_eq!(AbiData::parse("LoanDefaulted", "0x").word_count(), 0);
    }

    #[test]
    fn test_short_data_decodes_as_zeros() {
        let data = format!("0x{}{}", word_hex(500), word_hex(1000));
        let abi = AbiData::parse("RepaymentRecorded", &data);
        assert_eq!(abi.int64_words::<3>(), [0, 0, 0]);
        assert_eq!(abi.int64_words::<2>(), [500, 1000]);
    }

    #[test]
    fn test_word_overflow_decodes_as_zero() {
        // An address in word 0 is wider than i64.
        let data = format!(
            "0x{:0>64}{}",
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            word_hex(7)
        );
        let abi = AbiData::parse("LoanRegistered", &data);
        assert_eq!(abi.int64_words::<2>(), [0, 7]);

        let max = format!("0x{:064x}", i64::MAX);
        let abi = AbiData::parse("LoanDefaulted", &max);
        assert_eq!(abi.int64(0), i64::MAX);
    }

    #[test]
    fn test_dynamic_string() {
        // principal, maturity, offset 0x60, len 3, "NGN"
        let mut data = String::from("0x");
        data.push_str(&word_hex(1));
        data.push_str(&word_hex(2));
        data.push_str(&word_hex(0x60));
        data.push_str(&word_hex(3));
        data.push_str(&format!("{:0<64}", hex::encode("NGN")));
        let abi = AbiData::parse("LoanRegistered", &data);
        assert_eq!(abi.string_at(2).as_deref(), Some("NGN"));

        let short = format!("0x{}{}", word_hex(1), word_hex(2));
        let abi = AbiData::parse("LoanRegistered", &short);
        assert_eq!(abi.string_at(2), None);
    }

    #[test]
    fn test_normalize_bytes32() {
        assert_eq!(normalize_bytes32("0xAB"), format!("0x{}ab", "0".repeat(62)));
        let long = format!("0x11{}", "2".repeat(64));
        assert_eq!(normalize_bytes32(&long), format!("0x{}", "2".repeat(64)));
    }

    #[test]
    fn test_uuid_in_high_half() {
        let topic = "0x7f1c2a9e0b5d4c3e8f7a6b5c4d3e2f1a00000000000000000000000000000000";
        assert_eq!(
            project_loan_id(topic),
            "7f1c2a9e-0b5d-4c3e-8f7a-6b5c4d3e2f1a"
        );
    }

    #[test]
    fn test_uuid_in_low_half() {
        let topic = "0x000000000000000000000000000000007f1c2a9e0b5d4c3e8f7a6b5c4d3e2f1a";
        assert_eq!(
            project_loan_id(topic),
            "7f1c2a9e-0b5d-4c3e-8f7a-6b5c4d3e2f1a"
        );
    }

    #[test]
    fn test_full_word_is_kept_as_hex() {
        let topic = format!("0x{}", "ab".repeat(32));
        assert_eq!(project_loan_id(&topic), topic);
    }
}
