/// Value of cookie `name` in a `Cookie` request header
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Format a `Set-Cookie` header value for an HttpOnly, site-wide cookie
pub fn format_cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly{}; SameSite=Lax",
        name, value, max_age, secure_flag
    )
}

/// `Set-Cookie` value that removes the cookie
pub fn clear_cookie(name: &str, secure: bool) -> String {
    format_cookie(name, "", 0, secure)
}
