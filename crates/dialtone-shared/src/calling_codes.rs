//! Static calling-code table and per-country display grouping.
//!
//! Entries are ordered longest prefix first so that a short code can never
//! shadow a longer one sharing its leading digits. A prefix only matches
//! when the digits that follow it have a plausible national length for that
//! country; every entry keeps `prefix + min national length >= 9`, which
//! keeps 7 and 8 digit local numbers from being mistaken for foreign ones.

use std::ops::RangeInclusive;

/// One country calling code and the national number lengths it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallingCode {
    /// Calling code digits, without `+`.
    pub prefix: &'static str,
    /// Accepted national number lengths (digits after the prefix).
    pub national_len: RangeInclusive<usize>,
    /// ISO 3166 alpha-2 region, or `"NANP"` for the shared `+1` plan.
    pub region: &'static str,
}

const fn code(
    prefix: &'static str,
    min: usize,
    max: usize,
    region: &'static str,
) -> CallingCode {
    CallingCode {
        prefix,
        national_len: RangeInclusive::new(min, max),
        region,
    }
}

pub static CALLING_CODES: &[CallingCode] = &[
    // Three digit codes
    code("973", 8, 8, "BH"),
    code("966", 9, 9, "SA"),
    code("971", 8, 9, "AE"),
    code("974", 8, 8, "QA"),
    code("965", 8, 8, "KW"),
    code("968", 8, 8, "OM"),
    code("962", 8, 9, "JO"),
    code("961", 7, 8, "LB"),
    code("963", 9, 9, "SY"),
    code("964", 10, 10, "IQ"),
    code("967", 9, 9, "YE"),
    code("970", 9, 9, "PS"),
    code("972", 8, 9, "IL"),
    code("212", 9, 9, "MA"),
    code("213", 9, 9, "DZ"),
    code("216", 8, 8, "TN"),
    code("218", 9, 10, "LY"),
    code("249", 9, 9, "SD"),
    code("234", 10, 10, "NG"),
    code("254", 9, 9, "KE"),
    code("880", 10, 10, "BD"),
    code("351", 9, 9, "PT"),
    code("353", 9, 9, "IE"),
    code("380", 9, 9, "UA"),
    // Two digit codes
    code("20", 10, 10, "EG"),
    code("44", 10, 10, "GB"),
    code("33", 9, 9, "FR"),
    code("49", 10, 11, "DE"),
    code("39", 9, 11, "IT"),
    code("34", 9, 9, "ES"),
    code("31", 9, 9, "NL"),
    code("32", 8, 9, "BE"),
    code("41", 9, 9, "CH"),
    code("43", 10, 13, "AT"),
    code("46", 7, 9, "SE"),
    code("47", 8, 8, "NO"),
    code("45", 8, 8, "DK"),
    code("48", 9, 9, "PL"),
    code("30", 10, 10, "GR"),
    code("90", 10, 10, "TR"),
    code("98", 10, 10, "IR"),
    code("86", 11, 11, "CN"),
    code("81", 10, 10, "JP"),
    code("82", 9, 10, "KR"),
    code("91", 10, 10, "IN"),
    code("92", 10, 10, "PK"),
    code("60", 9, 10, "MY"),
    code("62", 9, 12, "ID"),
    code("63", 10, 10, "PH"),
    code("65", 8, 8, "SG"),
    code("66", 9, 9, "TH"),
    code("84", 9, 10, "VN"),
    code("61", 9, 9, "AU"),
    code("64", 8, 10, "NZ"),
    code("27", 9, 9, "ZA"),
    code("55", 10, 11, "BR"),
    code("52", 10, 10, "MX"),
    code("54", 10, 10, "AR"),
    // One digit codes
    code("1", 10, 10, "NANP"),
    code("7", 10, 10, "RU"),
];

/// Find the calling code that `digits` starts with, if the remainder has a
/// national length that code accepts.
pub fn match_prefix(digits: &str) -> Option<&'static CallingCode> {
    CALLING_CODES.iter().find(|cc| {
        digits
            .strip_prefix(cc.prefix)
            .is_some_and(|national| cc.national_len.contains(&national.len()))
    })
}

/// Grouping of a national number for display.
#[derive(Debug, Clone, Copy)]
pub struct DisplayRule {
    pub prefix: &'static str,
    pub national_len: usize,
    pub groups: &'static [usize],
}

pub static DISPLAY_RULES: &[DisplayRule] = &[
    DisplayRule { prefix: "973", national_len: 8, groups: &[4, 4] },
    DisplayRule { prefix: "974", national_len: 8, groups: &[4, 4] },
    DisplayRule { prefix: "965", national_len: 8, groups: &[4, 4] },
    DisplayRule { prefix: "968", national_len: 8, groups: &[4, 4] },
    DisplayRule { prefix: "966", national_len: 9, groups: &[2, 3, 4] },
    DisplayRule { prefix: "971", national_len: 9, groups: &[2, 3, 4] },
    DisplayRule { prefix: "971", national_len: 8, groups: &[1, 3, 4] },
    DisplayRule { prefix: "962", national_len: 9, groups: &[1, 4, 4] },
    DisplayRule { prefix: "20", national_len: 10, groups: &[2, 4, 4] },
    DisplayRule { prefix: "44", national_len: 10, groups: &[4, 6] },
    DisplayRule { prefix: "33", national_len: 9, groups: &[1, 2, 2, 2, 2] },
    DisplayRule { prefix: "91", national_len: 10, groups: &[5, 5] },
    DisplayRule { prefix: "1", national_len: 10, groups: &[3, 3, 4] },
];

/// Format `national` using the rule for `prefix`, e.g. `+973 1234 5678`.
pub fn format_grouped(prefix: &str, national: &str) -> Option<String> {
    let rule = DISPLAY_RULES
        .iter()
        .find(|r| r.prefix == prefix && r.national_len == national.len())?;

    let mut out = format!("+{prefix}");
    let mut start = 0;
    for &len in rule.groups {
        // National digits are ASCII, so byte offsets are char offsets.
        let group = national.get(start..start + len)?;
        out.push(' ');
        out.push_str(group);
        start += len;
    }
    Some(out)
}
