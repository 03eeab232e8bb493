//! URL well-formedness check shared by the command parser and the blacklist
//! loader.
//!
//! Accepted shape: an optional `http://` or `https://` scheme (any case), a
//! host of at least two dot-separated labels made of ASCII alphanumerics,
//! `_` and `-`, an optional `:port` of digits, and an optional path that
//! starts with `/`.

const PATH_PUNCTUATION: &str = "-._~:/?#[]@!$&'()*+,;=";

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_label_char(c: char) -> bool {
    is_word_char(c) || c == '-'
}

fn is_path_char(c: char) -> bool {
    is_word_char(c) || PATH_PUNCTUATION.contains(c)
}

fn strip_scheme(url: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if url.len() >= scheme.len()
            && url.is_char_boundary(scheme.len())
            && url[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            return &url[scheme.len()..];
        }
    }
    url
}

pub fn is_valid_url(url: &str) -> bool {
    let rest = strip_scheme(url);

    let host_end = rest.find([':', '/']).unwrap_or(rest.len());
    let (host, mut rest) = rest.split_at(host_end);

    let mut labels = 0;
    for label in host.split('.') {
        if label.is_empty() || !label.chars().all(is_label_char) {
            return false;
        }
        labels += 1;
    }
    if labels < 2 {
        return false;
    }

    if let Some(after_colon) = rest.strip_prefix(':') {
        let port_end = after_colon.find('/').unwrap_or(after_colon.len());
        let (port, tail) = after_colon.split_at(port_end);
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        rest = tail;
    }

    if rest.is_empty() {
        return true;
    }
    rest.starts_with('/') && rest.chars().all(is_path_char)
}
