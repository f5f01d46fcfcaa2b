//! Synthetic resource versions for legacy rows.
//!
//! `resource_version = version + internal_id * VERSION_MODULUS`. The encoded
//! number orders rows by internal id first and still recovers the row's own
//! version with a modulo.

use crate::errors::{LegacyError, LegacyResult};

pub const VERSION_MODULUS: i64 = 10_000_000;

/// Fails when the version does not fit below the modulus or the product
/// overflows, either of which would make two rows share a resource version.
pub fn encode(internal_id: i64, version: i64) -> LegacyResult<i64> {
    let out_of_range = || LegacyError::VersionOutOfRange {
        internal_id,
        version,
    };

    if internal_id < 0 || !(0..VERSION_MODULUS).contains(&version) {
        return Err(out_of_range());
    }

    internal_id
        .checked_mul(VERSION_MODULUS)
        .and_then(|base| base.checked_add(version))
        .ok_or_else(out_of_range)
}

/// Row version carried by an encoded resource version
pub fn decode(resource_version: i64) -> i64 {
    resource_version.rem_euclid(VERSION_MODULUS)
}

/// Internal row id carried by an encoded resource version
pub fn internal_id(resource_version: i64) -> i64 {
    resource_version.div_euclid(VERSION_MODULUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(0, 0).unwrap(), 0);
        assert_eq!(encode(1, 3).unwrap(), 10_000_003);
        assert_eq!(encode(42, 9_999_999).unwrap(), 429_999_999);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(matches!(
            encode(7, VERSION_MODULUS),
            Err(LegacyError::VersionOutOfRange { internal_id: 7, .. })
        ));
        assert!(encode(7, -1).is_err());
        assert!(encode(-1, 1).is_err());
        assert!(encode(i64::MAX / 2, 1).is_err());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(id in 0i64..VERSION_MODULUS, version in 0i64..VERSION_MODULUS) {
            let rv = encode(id, version).unwrap();
            prop_assert_eq!(decode(rv), version);
            prop_assert_eq!(internal_id(rv), id);
        }

        #[test]
        fn encoding_orders_by_id_then_version(
            id in 0i64..VERSION_MODULUS - 1,
            a in 0i64..VERSION_MODULUS,
            b in 0i64..VERSION_MODULUS,
        ) {
            prop_assert!(encode(id, a).unwrap() < encode(id + 1, b).unwrap());
        }
    }
}
