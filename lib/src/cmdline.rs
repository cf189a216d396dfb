//! Kernel command-line tokenizing helpers.
//!
//! The command line is a whitespace-separated list of tokens. Options take the
//! form `key=value`; bare tokens are flags. Subsystems walk the tokens and
//! pick out the keys they own.

/// Iterate the whitespace-separated tokens of a command line.
pub fn tokens(cmdline: &str) -> impl Iterator<Item = &str> {
    cmdline.split_ascii_whitespace()
}

/// Split `key=value`. Bare tokens come back with no value.
pub fn split_option(token: &str) -> (&str, Option<&str>) {
    match token.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (token, None),
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("enabled")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("disabled")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}

pub fn parse_u32(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("enabled"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_options_and_numbers() {
        let mut it = tokens("  -mlfqs  timer.freq=250 quiet ");
        assert_eq!(it.next().map(split_option), Some(("-mlfqs", None)));
        assert_eq!(
            it.next().map(split_option),
            Some(("timer.freq", Some("250")))
        );
        assert_eq!(it.next().map(split_option), Some(("quiet", None)));
        assert_eq!(it.next(), None);

        assert_eq!(parse_u32("250"), Some(250));
        assert_eq!(parse_u32("0x10"), Some(16));
        assert_eq!(parse_u32("-3"), None);
        assert_eq!(parse_u32(""), None);
    }
}
