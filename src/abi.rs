//! # ABI Codec
//!
//! Minimal word-level ABI packing and return-data decoding for the handful
//! of venue contract shapes the aggregator reads. Layout follows the EVM ABI:
//! big-endian 32-byte words, addresses right-aligned, dynamic arrays behind a
//! head offset followed by a length word. Decoding rejects short buffers and
//! offsets that point past the end; nothing here allocates beyond the output.

use ethers::types::{Address, Bytes, U256};

use crate::errors::AbiError;

/// One ABI word.
pub const WORD: usize = 32;

/// 4-byte function selectors for every contract call the aggregator issues,
/// first four bytes of `keccak256` of the canonical signature.
pub mod selectors {
    /// `getPair(address,address)`
    pub const V2_GET_PAIR: [u8; 4] = [0xe6, 0xa4, 0x39, 0x05];
    /// `getReserves()`
    pub const V2_GET_RESERVES: [u8; 4] = [0x09, 0x02, 0xf1, 0xac];
    /// `getPool(address,address,uint24)`
    pub const V3_GET_POOL: [u8; 4] = [0x16, 0x98, 0xee, 0x82];
    /// `quoteExactInputSingle((address,address,uint256,uint24,uint160))`
    pub const V3_QUOTE_EXACT_INPUT_SINGLE: [u8; 4] = [0xc6, 0xa5, 0x02, 0x6a];
    /// `getPoolTokens(bytes32)`
    pub const BALANCER_GET_POOL_TOKENS: [u8; 4] = [0xf9, 0x4d, 0x46, 0x68];
    /// `get_dy(int128,int128,uint256)`
    pub const CURVE_GET_DY: [u8; 4] = [0x5e, 0x0d, 0x44, 0x3f];
    /// `balances(uint256)`
    pub const CURVE_BALANCES: [u8; 4] = [0x49, 0x03, 0xb0, 0xd1];
    /// `fee()`
    pub const CURVE_FEE: [u8; 4] = [0xdd, 0xca, 0x3f, 0x43];
}

//================================================================================================//
//                                           ENCODING                                            //
//================================================================================================//

/// Builds call data: a selector followed by statically-encoded words.
#[derive(Debug)]
pub struct CallBuilder {
    data: Vec<u8>,
}

impl CallBuilder {
    pub fn new(selector: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(4 + 5 * WORD);
        data.extend_from_slice(&selector);
        Self { data }
    }

    /// Appends an `address`, right-aligned in its word.
    pub fn address(mut self, value: Address) -> Self {
        let mut word = [0u8; WORD];
        word[12..].copy_from_slice(value.as_bytes());
        self.data.extend_from_slice(&word);
        self
    }

    /// Appends a `uint256`.
    pub fn uint256(mut self, value: U256) -> Self {
        let mut word = [0u8; WORD];
        value.to_big_endian(&mut word);
        self.data.extend_from_slice(&word);
        self
    }

    /// Appends a `uint24` (still occupies a full word).
    pub fn uint24(self, value: u32) -> Self {
        self.uint256(U256::from(value & 0x00ff_ffff))
    }

    /// Appends a `bytes32` verbatim.
    pub fn bytes32(mut self, value: [u8; 32]) -> Self {
        self.data.extend_from_slice(&value);
        self
    }

    /// Appends an `int128`, sign-extended across the word.
    pub fn int128(mut self, value: i128) -> Self {
        let fill = if value < 0 { 0xff } else { 0x00 };
        let mut word = [fill; WORD];
        word[16..].copy_from_slice(&value.to_be_bytes());
        self.data.extend_from_slice(&word);
        self
    }

    pub fn build(self) -> Bytes {
        Bytes::from(self.data)
    }
}

//================================================================================================//
//                                           DECODING                                            //
//================================================================================================//

fn word_at(data: &[u8], index: usize) -> Result<&[u8], AbiError> {
    let start = index * WORD;
    let end = start + WORD;
    if data.len() < end {
        return Err(AbiError::ShortReturnData {
            need: end,
            have: data.len(),
        });
    }
    Ok(&data[start..end])
}

/// Decodes the `uint256` at word `index`. For multi-return tuples the caller
/// simply reads the leading word and ignores the rest.
pub fn decode_u256(data: &[u8], index: usize) -> Result<U256, AbiError> {
    Ok(U256::from_big_endian(word_at(data, index)?))
}

/// Decodes the `address` at word `index` (low 20 bytes of the word).
pub fn decode_address(data: &[u8], index: usize) -> Result<Address, AbiError> {
    let word = word_at(data, index)?;
    Ok(Address::from_slice(&word[12..]))
}

/// Decodes a dynamic `uint256[]` whose head offset sits at word `index`.
/// Offsets are relative to the start of the return data. Every bound is
/// checked before it is dereferenced.
pub fn decode_u256_array(data: &[u8], index: usize) -> Result<Vec<U256>, AbiError> {
    let offset_word = decode_u256(data, index)?;
    if offset_word > U256::from(data.len()) {
        return Err(AbiError::OffsetOutOfBounds {
            offset: offset_word.low_u64() as usize,
            len: data.len(),
        });
    }
    let offset = offset_word.as_usize();
    if offset + WORD > data.len() {
        return Err(AbiError::OffsetOutOfBounds {
            offset,
            len: data.len(),
        });
    }

    let remaining_words = (data.len() - offset - WORD) / WORD;
    let len_word = U256::from_big_endian(&data[offset..offset + WORD]);
    if len_word > U256::from(remaining_words) {
        return Err(AbiError::LengthOutOfBounds {
            len: len_word.low_u64() as usize,
        });
    }
    let len = len_word.as_usize();

    let mut items = Vec::with_capacity(len);
    for i in 0..len {
        let start = offset + WORD + i * WORD;
        items.push(U256::from_big_endian(&data[start..start + WORD]));
    }
    Ok(items)
}
