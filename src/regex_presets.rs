//! Built-in regular expressions for common string formats
//!
//! The default `regEx` messages recognize these by pattern text, so a field
//! using one of them gets a specific message ("must be a valid e-mail
//! address") instead of the generic one.

use regex::Regex;

pub const EMAIL: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$";

pub const WEAK_EMAIL: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

pub const DOMAIN: &str = r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$";

pub const WEAK_DOMAIN: &str = r"^(?:[a-zA-Z0-9-]+\.)+[a-zA-Z0-9-]+$";

pub const IPV4: &str = r"^(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])$";

pub const IPV6: &str = r"^(?:(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}|(?:[0-9a-fA-F]{1,4}:){1,7}:|(?:[0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|(?:[0-9a-fA-F]{1,4}:){1,5}(?::[0-9a-fA-F]{1,4}){1,2}|(?:[0-9a-fA-F]{1,4}:){1,4}(?::[0-9a-fA-F]{1,4}){1,3}|(?:[0-9a-fA-F]{1,4}:){1,3}(?::[0-9a-fA-F]{1,4}){1,4}|(?:[0-9a-fA-F]{1,4}:){1,2}(?::[0-9a-fA-F]{1,4}){1,5}|[0-9a-fA-F]{1,4}:(?::[0-9a-fA-F]{1,4}){1,6}|:(?:(?::[0-9a-fA-F]{1,4}){1,7}|:))$";

pub const IP: &str = r"^(?:(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])|(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}|(?:[0-9a-fA-F]{1,4}:){1,7}:|(?:[0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|:(?:(?::[0-9a-fA-F]{1,4}){1,7}|:))$";

pub const URL: &str = r"(?i)^(?:https?|ftp)://(?:\S+(?::\S*)?@)?(?:(?:[0-9]{1,3}\.){3}[0-9]{1,3}|localhost|(?:[a-z0-9\x{00a1}-\x{ffff}](?:[a-z0-9\x{00a1}-\x{ffff}-]*[a-z0-9\x{00a1}-\x{ffff}])?\.)+[a-z\x{00a1}-\x{ffff}]{2,})(?::[0-9]{2,5})?(?:[/?#]\S*)?$";

/// 17-character ids drawn from an alphabet without look-alike characters
pub const ID: &str = r"^[23456789ABCDEFGHJKLMNPQRSTWXYZabcdefghijkmnopqrstuvwxyz]{17}$";

pub const ZIP_CODE: &str = r"^[0-9]{5}(?:[-\s][0-9]{4})?$";

/// Looks up a preset by name (case-insensitive): `Email`, `WeakEmail`,
/// `Domain`, `WeakDomain`, `IP`, `IPv4`, `IPv6`, `Url`, `Id`, `ZipCode`.
pub fn preset(name: &str) -> Option<&'static str> {
    let pattern = match name.to_ascii_lowercase().as_str() {
        "email" => EMAIL,
        "weakemail" => WEAK_EMAIL,
        "domain" => DOMAIN,
        "weakdomain" => WEAK_DOMAIN,
        "ip" => IP,
        "ipv4" => IPV4,
        "ipv6" => IPV6,
        "url" => URL,
        "id" => ID,
        "zipcode" => ZIP_CODE,
        _ => return None,
    };
    Some(pattern)
}

/// Compiles a preset.
pub fn compile_preset(name: &str) -> Option<Regex> {
    preset(name).and_then(|p| Regex::new(p).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, input: &str) -> bool {
        Regex::new(pattern).unwrap().is_match(input)
    }

    #[test]
    fn test_presets_compile() {
        for name in ["Email", "WeakEmail", "Domain", "WeakDomain", "IP", "IPv4", "IPv6", "Url", "Id", "ZipCode"] {
            assert!(compile_preset(name).is_some(), "{} failed to compile", name);
        }
        assert!(preset("nope").is_none());
    }

    #[test]
    fn test_email() {
        assert!(matches(EMAIL, "someone@example.com"));
        assert!(!matches(EMAIL, "someone@localhost"));
        assert!(!matches(EMAIL, "not an email"));
    }

    #[test]
    fn test_ip() {
        assert!(matches(IPV4, "192.168.0.1"));
        assert!(!matches(IPV4, "256.1.1.1"));
        assert!(matches(IPV6, "2001:db8::1"));
        assert!(matches(IP, "::1"));
        assert!(matches(IP, "10.0.0.1"));
    }

    #[test]
    fn test_url_and_id() {
        assert!(matches(URL, "https://example.com/path?q=1"));
        assert!(matches(URL, "http://localhost:3000"));
        assert!(!matches(URL, "example.com"));
        assert!(matches(ID, "aBcDeFgHjKmNpQrSt"));
        assert!(!matches(ID, "short"));
    }

    #[test]
    fn test_zip_code() {
        assert!(matches(ZIP_CODE, "12345"));
        assert!(matches(ZIP_CODE, "12345-6789"));
        assert!(!matches(ZIP_CODE, "1234"));
    }
}
