//! Continuation tokens for paged legacy reads.
//!
//! Wire format: `org:<id>/start:<id>/folder:<uid>`. The folder segment may be
//! empty. An empty token string means "from the beginning" and is handled by
//! [`ContinueToken::parse_optional`].

use std::fmt;
use std::str::FromStr;

use crate::errors::LegacyError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContinueToken {
    pub org_id: i64,
    /// Cursor of the last row returned: internal id, or version for history
    pub start_id: i64,
    pub folder: String,
}

impl ContinueToken {
    pub fn new(org_id: i64, start_id: i64, folder: impl Into<String>) -> Self {
        Self {
            org_id,
            start_id,
            folder: folder.into(),
        }
    }

    pub fn parse_optional(raw: &str) -> Result<Option<Self>, LegacyError> {
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }

    /// Fails unless the token was issued for the same organization
    pub fn check_org(&self, org_id: i64) -> Result<(), LegacyError> {
        if self.org_id != org_id {
            return Err(LegacyError::TokenOrgMismatch {
                token_org: self.org_id,
                query_org: org_id,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ContinueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "org:{}/start:{}/folder:{}",
            self.org_id, self.start_id, self.folder
        )
    }
}

fn segment<'a>(raw: &str, part: Option<&'a str>, label: &str) -> Result<&'a str, LegacyError> {
    let part = part.ok_or_else(|| LegacyError::InvalidToken(raw.to_string()))?;
    match part.split_once(':') {
        Some((found, value)) if found == label => Ok(value),
        _ => Err(LegacyError::InvalidToken(raw.to_string())),
    }
}

impl FromStr for ContinueToken {
    type Err = LegacyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.splitn(3, '/');
        let number = |value: &str| {
            value
                .parse::<i64>()
                .map_err(|_| LegacyError::InvalidToken(raw.to_string()))
        };

        let org_id = number(segment(raw, parts.next(), "org")?)?;
        let start_id = number(segment(raw, parts.next(), "start")?)?;
        let folder = segment(raw, parts.next(), "folder")?;

        Ok(Self {
            org_id,
            start_id,
            folder: folder.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_with_empty_folder() {
        let token: ContinueToken = "org:3/start:120/folder:".parse().unwrap();
        assert_eq!(token, ContinueToken::new(3, 120, ""));
        assert_eq!(token.to_string(), "org:3/start:120/folder:");
    }

    #[test]
    fn test_malformed_tokens() {
        for raw in [
            "org:3/start:120",
            "org:3",
            "org:x/start:1/folder:",
            "org:1/start:y/folder:",
            "org:1/begin:5/folder:",
            "start:5/org:1/folder:",
            "org:1/start:5/path:abc",
            "org1/start:5/folder:",
            "",
        ] {
            assert!(
                matches!(raw.parse::<ContinueToken>(), Err(LegacyError::InvalidToken(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(ContinueToken::parse_optional("").unwrap(), None);
        assert!(ContinueToken::parse_optional("org:1").is_err());
    }

    #[test]
    fn test_check_org() {
        let token = ContinueToken::new(2, 10, "");
        assert!(token.check_org(2).is_ok());
        assert!(matches!(
            token.check_org(3),
            Err(LegacyError::TokenOrgMismatch { token_org: 2, query_org: 3 })
        ));
    }

    proptest! {
        #[test]
        fn token_round_trips(
            org in any::<i64>(),
            start in any::<i64>(),
            folder in "[a-zA-Z0-9_/:-]{0,40}",
        ) {
            let token = ContinueToken::new(org, start, folder);
            let parsed: ContinueToken = token.to_string().parse().unwrap();
            prop_assert_eq!(parsed, token);
        }

        #[test]
        fn non_numeric_org_is_rejected(org in "[a-z]{1,8}", start in any::<i64>()) {
            let raw = format!("org:{}/start:{}/folder:", org, start);
            prop_assert!(raw.parse::<ContinueToken>().is_err());
        }
    }
}
