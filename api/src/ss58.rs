//! SS58 address encoding.
//!
//! Layout: `prefix (1 or 2 bytes) ++ account_id (32) ++ checksum (2)`, base58
//! encoded. The checksum is the first two bytes of
//! `blake2b_512("SS58PRE" ++ prefix ++ account_id)`.

use crate::error::ApiError;

/// Prefix used by generic Substrate chains.
pub const GENERIC_PREFIX: u16 = 42;

/// Largest prefix representable in the two-byte form.
pub const MAX_PREFIX: u16 = 16383;

const CHECKSUM_LEN: usize = 2;
const CHECKSUM_PREAMBLE: &[u8] = b"SS58PRE";

/// Encode account ID to SS58 format
pub fn encode(account_id: &[u8; 32], prefix: u16) -> String {
    let mut payload = Vec::with_capacity(2 + 32 + CHECKSUM_LEN);

    if prefix < 64 {
        payload.push(prefix as u8);
    } else {
        payload.push(((prefix & 0x00FC) >> 2) as u8 | 0x40);
        payload.push(((prefix >> 8) as u8) | ((prefix & 0x0003) << 6) as u8);
    }

    payload.extend_from_slice(account_id);
    let hash = checksum(&payload);
    payload.extend_from_slice(&hash[..CHECKSUM_LEN]);

    bs58::encode(payload).into_string()
}

/// Decode an SS58 address into its prefix and account ID.
pub fn decode(address: &str) -> Result<(u16, [u8; 32]), ApiError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| ApiError::InvalidAddress(format!("{address}: {e}")))?;

    let (prefix, prefix_len) = match bytes.first() {
        Some(&b0) if b0 < 64 => (b0 as u16, 1),
        Some(&b0) if b0 < 128 => {
            let b1 = *bytes
                .get(1)
                .ok_or_else(|| ApiError::InvalidAddress(format!("{address}: truncated prefix")))?;
            let lower = (((b0 & 0x3F) as u16) << 2) | ((b1 >> 6) as u16);
            let upper = ((b1 & 0x3F) as u16) << 8;
            (lower | upper, 2)
        }
        Some(_) => {
            return Err(ApiError::InvalidAddress(format!(
                "{address}: reserved prefix byte"
            )))
        }
        None => return Err(ApiError::InvalidAddress("empty address".into())),
    };

    if bytes.len() != prefix_len + 32 + CHECKSUM_LEN {
        return Err(ApiError::InvalidAddress(format!(
            "{address}: expected {} bytes, got {}",
            prefix_len + 32 + CHECKSUM_LEN,
            bytes.len()
        )));
    }

    let body_len = prefix_len + 32;
    let hash = checksum(&bytes[..body_len]);
    if bytes[body_len..] != hash[..CHECKSUM_LEN] {
        return Err(ApiError::InvalidAddress(format!("{address}: bad checksum")));
    }

    let mut account_id = [0u8; 32];
    account_id.copy_from_slice(&bytes[prefix_len..body_len]);
    Ok((prefix, account_id))
}

/// Resolve either an SS58 address or a `0x`-prefixed 32-byte hex string.
pub fn account_id_from_str(value: &str) -> Result<[u8; 32], ApiError> {
    if let Some(stripped) = value.strip_prefix("0x") {
        let bytes = hex::decode(stripped)?;
        return <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| ApiError::InvalidAddress(format!("{value}: expected 32 bytes")));
    }
    decode(value).map(|(_, id)| id)
}

fn checksum(body: &[u8]) -> [u8; 64] {
    let input: Vec<u8> = CHECKSUM_PREAMBLE.iter().chain(body.iter()).copied().collect();
    sp_crypto_hashing::blake2_512(&input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALICE: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";
    const ALICE_SS58: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

    fn alice() -> [u8; 32] {
        let mut id = [0u8; 32];
        id.copy_from_slice(&hex::decode(ALICE).unwrap());
        id
    }

    #[test]
    fn encodes_known_dev_account() {
        assert_eq!(encode(&alice(), GENERIC_PREFIX), ALICE_SS58);
    }

    #[test]
    fn decodes_known_dev_account() {
        let (prefix, id) = decode(ALICE_SS58).unwrap();
        assert_eq!(prefix, 42);
        assert_eq!(id, alice());
    }

    #[test]
    fn hex_account_ids_are_accepted() {
        let id = account_id_from_str(&format!("0x{ALICE}")).unwrap();
        assert_eq!(id, alice());
        assert!(account_id_from_str("0x0102").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("").is_err());
        assert!(decode("not-base58-0OIl").is_err());
        assert!(decode("5GrwvaEF5zXb26Fz9rcQpDWS").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn ss58_roundtrip(id in prop::array::uniform32(any::<u8>()), prefix in 0u16..=MAX_PREFIX) {
            let encoded = encode(&id, prefix);
            let (decoded_prefix, decoded_id) = decode(&encoded).expect("decode");
            prop_assert_eq!(decoded_prefix, prefix);
            prop_assert_eq!(decoded_id, id);
        }

        #[test]
        fn tampering_breaks_checksum(id in prop::array::uniform32(any::<u8>()), flip in any::<usize>()) {
            let encoded = encode(&id, GENERIC_PREFIX);
            let mut raw = bs58::decode(&encoded).into_vec().unwrap();
            let idx = 1 + flip % 32;
            raw[idx] ^= 0x01;
            let mutated = bs58::encode(raw).into_string();
            prop_assert!(decode(&mutated).is_err());
        }
    }
}
