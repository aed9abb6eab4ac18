use std::collections::HashMap;

use dialtone_shared::phone::digits_only;
use dialtone_shared::{CanonicalPhone, DeviceContact, DirectoryUserRecord, ReconciledContact};

/// Join device contacts with the directory users their numbers resolved to.
///
/// A contact links to the user of its first number, in address-book order,
/// that has a directory entry.
pub fn merge(
    contacts: &[DeviceContact],
    directory: &HashMap<CanonicalPhone, DirectoryUserRecord>,
) -> Vec<ReconciledContact> {
    contacts
        .iter()
        .map(|contact| reconcile(contact, directory))
        .collect()
}

fn reconcile(
    contact: &DeviceContact,
    directory: &HashMap<CanonicalPhone, DirectoryUserRecord>,
) -> ReconciledContact {
    let matched = contact
        .phones
        .iter()
        .find_map(|phone| directory.get(phone).map(|user| (phone, user)));

    match matched {
        Some((phone, user)) => ReconciledContact {
            contact: contact.clone(),
            user: Some(user.clone()),
            matched_phone: Some(phone.clone()),
            is_known_user: true,
            is_online: user.is_online,
            last_seen: user.last_seen(),
        },
        None => ReconciledContact {
            contact: contact.clone(),
            user: None,
            matched_phone: None,
            is_known_user: false,
            is_online: false,
            last_seen: None,
        },
    }
}

/// Case-insensitive match of an already lower-cased, non-empty `needle`
/// against name, username and raw numbers. A numeric needle also matches
/// the digits of a number regardless of its punctuation.
pub(crate) fn matches_query(contact: &ReconciledContact, needle: &str) -> bool {
    if contact.display_name().to_lowercase().contains(needle) {
        return true;
    }
    if contact
        .username()
        .is_some_and(|u| u.to_lowercase().contains(needle))
    {
        return true;
    }

    let numeric = needle
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    let needle_digits = digits_only(needle);

    contact.contact.raw_phones.iter().any(|raw| {
        raw.to_lowercase().contains(needle)
            || (numeric && !needle_digits.is_empty() && digits_only(raw).contains(&needle_digits))
    })
}
