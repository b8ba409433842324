//! Recipient address validation.
//!
//! A recipient field may hold several addresses separated by `,` or `;`.
//! Every address must parse as a mailbox and match a conservative
//! `local@domain.tld` shape before a notification is accepted.

use std::sync::LazyLock;

use mailparse::MailAddr;
use regex::Regex;
use thiserror::Error;

#[allow(clippy::expect_used, reason = "The pattern is a literal")]
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[_a-z0-9+\-]+(\.[_a-z0-9\-]+)*@[a-z0-9\-]+(\.[a-z0-9\-]+)*(\.[a-z]{2,5})$")
        .expect("email pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("No address given")]
    Empty,

    #[error("Unable to parse address list {list:?}: {reason}")]
    Unparsable { list: String, reason: String },

    #[error("Address {0:?} is not a valid email address")]
    Invalid(String),
}

/// Parse and validate a recipient list, returning the bare addresses.
///
/// # Errors
/// [`AddressError::Empty`] when the list holds no address, otherwise the
/// first parse or shape failure.
pub fn validate_address_list(list: &str) -> Result<Vec<String>, AddressError> {
    if list.trim().is_empty() {
        return Err(AddressError::Empty);
    }

    let normalised = list.replace(';', ",");
    let parsed = mailparse::addrparse(&normalised).map_err(|e| AddressError::Unparsable {
        list: list.to_string(),
        reason: e.to_string(),
    })?;

    let addresses: Vec<String> = parsed
        .iter()
        .flat_map(|addr| match addr {
            MailAddr::Single(single) => vec![single.addr.clone()],
            MailAddr::Group(group) => group.addrs.iter().map(|s| s.addr.clone()).collect(),
        })
        .collect();

    if addresses.is_empty() {
        return Err(AddressError::Empty);
    }

    for address in &addresses {
        if !EMAIL_PATTERN.is_match(&address.trim().to_ascii_lowercase()) {
            return Err(AddressError::Invalid(address.clone()));
        }
    }

    Ok(addresses)
}

/// Convenience wrapper over [`validate_address_list`].
pub fn is_valid_address_list(list: &str) -> bool {
    validate_address_list(list).is_ok()
}
