//! Import-path derivation from symbol names.
//!
//! `github.com/a/b.(*T).M` belongs to `github.com/a/b`: the package is
//! everything before the first `.` that follows the last `/`. Two things
//! break that rule and are handled here:
//!
//! - generic instantiations (`pkg.F[go.shape.int]`) can contain both `/`
//!   and `.`, so the bracketed part is removed first;
//! - for some closures and methods the compiler emits the receiver inside
//!   a path segment (`a/b.T.m/c`), so any later segment with two or more
//!   dots is cut at its first dot, unless it is a domain name such as
//!   `go.mongodb.org`.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::config::PrefixPolicy;

/// Decides whether a path segment is a domain name.
pub trait PublicSuffix: Send + Sync {
    /// `true` if `suffix` (no leading dot) is a registered public suffix.
    fn is_suffix(&self, suffix: &str) -> bool;

    /// `true` if `segment` is `<label>.<public suffix>` with one or more
    /// labels before the suffix.
    fn is_domain(&self, segment: &str) -> bool {
        if segment.is_empty()
            || !segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        {
            return false;
        }
        let labels: Vec<&str> = segment.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return false;
        }
        (1..labels.len()).any(|i| self.is_suffix(&labels[i..].join(".")))
    }
}

static SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "com", "org", "net", "io", "dev", "app", "edu", "gov", "info", "biz", "co", "me", "ai",
        "cloud", "tech", "sh", "xyz", "in", "cn", "de", "fr", "jp", "kr", "ru", "uk", "us", "eu",
        "nl", "se", "ch", "at", "be", "br", "ca", "cz", "es", "fi", "it", "pl", "pt", "tw", "ua",
        "cc", "tv", "ly", "gg", "im", "is", "to", "one", "page", "site", "land", "run", "works",
        "co.uk", "org.uk", "com.cn", "com.br", "co.jp", "com.au", "gitlab.io", "github.io",
    ]
    .into_iter()
    .collect()
});

/// Bundled list covering the domains that host Go modules in practice.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSuffixList;

impl PublicSuffix for StaticSuffixList {
    fn is_suffix(&self, suffix: &str) -> bool {
        SUFFIXES.contains(suffix)
    }
}

/// Remove generic instantiation brackets: `F[a.b]` becomes `F`.
pub fn strip_instantiation(name: &str) -> String {
    match (name.find('['), name.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            let mut s = String::with_capacity(name.len());
            s.push_str(&name[..start]);
            s.push_str(&name[end + 1..]);
            s
        }
        _ => name.to_string(),
    }
}

/// Raw package path of a symbol, before any cleanup. Empty for
/// compiler-generated symbols and names without a package.
pub fn symbol_package(name: &str, policy: PrefixPolicy) -> String {
    let name = strip_instantiation(name);
    if policy.prefixes().iter().any(|p| name.starts_with(p)) {
        return String::new();
    }
    let path_end = name.rfind('/').unwrap_or(0);
    match name[path_end..].find('.') {
        Some(i) => name[..path_end + i].to_string(),
        None => String::new(),
    }
}

/// Reverse the linker's escaping of `.`, `%` and control characters in
/// import paths (`go%2eopentelemetry%2eio`).
pub fn unescape_path(s: &str) -> Result<String, String> {
    if !s.contains('%') {
        return Ok(s.to_string());
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = s
            .get(i + 1..i + 3)
            .ok_or_else(|| format!("malformed prefix {:?}: escape sequence must contain two hex digits", s))?;
        let malformed = || {
            format!(
                "malformed prefix {:?}: escape sequence {:?} must contain two hex digits",
                s,
                &s[i..i + 3]
            )
        };
        // from_str_radix would accept a sign
        if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed());
        }
        let b = u8::from_str_radix(hex, 16).map_err(|_| malformed())?;
        out.push(b);
        i += 3;
    }
    String::from_utf8(out).map_err(|e| format!("malformed prefix {:?}: {}", s, e))
}

/// Cut receiver residue out of a package path and unescape it. Returns an
/// empty string if the path cannot be unescaped.
pub fn clean_package_path(path: &str, suffixes: &dyn PublicSuffix) -> String {
    if path.is_empty() {
        return String::new();
    }

    let keep = if path.starts_with("vendor/") { 2 } else { 1 };
    let mut out: Vec<&str> = Vec::new();
    for (i, part) in path.split('/').enumerate() {
        if i < keep {
            out.push(part);
            continue;
        }
        if part.matches('.').count() >= 2 && !suffixes.is_domain(part) {
            out.push(part.split('.').next().unwrap_or(part));
            break;
        }
        out.push(part);
    }

    let joined = out.join("/");
    match unescape_path(&joined) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, prefix = %joined, "failed to convert prefix to path");
            String::new()
        }
    }
}

/// Symbol-name to import-path mapping for one toolchain era.
pub struct PathHeuristic<'a> {
    policy: PrefixPolicy,
    suffixes: &'a dyn PublicSuffix,
}

impl<'a> PathHeuristic<'a> {
    pub fn new(policy: PrefixPolicy, suffixes: &'a dyn PublicSuffix) -> Self {
        Self { policy, suffixes }
    }

    pub fn policy(&self) -> PrefixPolicy {
        self.policy
    }

    pub fn package_of(&self, symbol: &str) -> String {
        clean_package_path(&symbol_package(symbol, self.policy), self.suffixes)
    }
}
