use regex::Regex;
use std::sync::OnceLock;
use ::url::Url;

const SENSITIVE_PARAMS: &[&str] = &["username", "password", "user", "pass", "pwd", "passwd", "token"];

fn sensitive_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names = SENSITIVE_PARAMS
            .iter()
            .map(|param| regex::escape(param))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)([?&](?:{names})=)[^&]*")).expect("valid parameter regex")
    })
}

/// Mask credentials in a source URL before it is written to logs.
///
/// Covers `user:pass@host` userinfo and the query parameters IPTV providers
/// commonly use for credentials.
pub fn obfuscate_credentials(url: &str) -> String {
    let mut obfuscated = url.to_string();

    if let Ok(parsed) = Url::parse(url) {
        if !parsed.username().is_empty() || parsed.password().is_some() {
            let mut masked = parsed.clone();
            let _ = masked.set_username("****");
            let _ = masked.set_password(Some("****"));
            obfuscated = masked.to_string();
        }
    }

    sensitive_param_regex()
        .replace_all(&obfuscated, "${1}****")
        .to_string()
}
