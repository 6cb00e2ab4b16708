//! Netscape-format cookie file used by the TCP transport

use std::{
    fs, io,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

const HEADER: &str = "# Netscape HTTP Cookie File\n# Written by maker_http. Edit at your own risk.\n\n";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JarCookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix seconds; `0` for a session cookie.
    pub expires: u64,
    pub name: String,
    pub value: String,
}

impl JarCookie {
    fn matches(&self, host: &str, path: &str, secure: bool, now: u64) -> bool {
        let domain_ok = host.eq_ignore_ascii_case(&self.domain)
            || (self.include_subdomains && domain_matches(&host.to_ascii_lowercase(), &self.domain));

        let path_ok = path == self.path
            || (path.starts_with(&self.path)
                && (self.path.ends_with('/') || path[self.path.len()..].starts_with('/')));

        domain_ok && path_ok && (secure || !self.secure) && !self.is_expired(now)
    }

    #[inline]
    fn is_expired(&self, now: u64) -> bool {
        self.expires != 0 && self.expires <= now
    }
}

/// Cookies loaded from, and saved back to, one cookie file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CookieJar {
    cookies: Vec<JarCookie>,
}

impl CookieJar {
    /// Loads `path`; a missing file is an empty jar, malformed lines are skipped.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cannot read cookie file");
                return Self::default();
            }
        };

        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Self {
        let mut jar = Self::default();

        for line in text.lines() {
            let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                Some(rest) => (rest, true),
                None => (line, false),
            };
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            let [domain, subdomains, path, secure, expires, name, value] = fields[..] else {
                tracing::warn!(line, "skipping malformed cookie file line");
                continue;
            };

            jar.cookies.push(JarCookie {
                domain: domain.trim_start_matches('.').to_ascii_lowercase(),
                include_subdomains: subdomains.eq_ignore_ascii_case("TRUE"),
                path: path.to_owned(),
                secure: secure.eq_ignore_ascii_case("TRUE"),
                http_only,
                expires: expires.parse().unwrap_or(0),
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }

        jar
    }

    /// Saves the jar, dropping expired cookies.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.serialize(now()))
    }

    fn serialize(&self, now: u64) -> String {
        let mut text = String::from(HEADER);

        for cookie in self.cookies.iter().filter(|cookie| !cookie.is_expired(now)) {
            let bool_str = |flag: bool| if flag { "TRUE" } else { "FALSE" };
            let domain = match cookie.include_subdomains {
                true => format!(".{}", cookie.domain),
                false => cookie.domain.clone(),
            };

            text.push_str(&format!(
                "{}{domain}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                if cookie.http_only { HTTP_ONLY_PREFIX } else { "" },
                bool_str(cookie.include_subdomains),
                cookie.path,
                bool_str(cookie.secure),
                cookie.expires,
                cookie.name,
                cookie.value,
            ));
        }

        text
    }

    /// `Cookie` header value for a request, if any cookie applies.
    pub fn header_for(&self, host: &str, path: &str, secure: bool) -> Option<String> {
        let now = now();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|cookie| cookie.matches(host, path, secure, now))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();

        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Stores a `Set-Cookie` header received from `host` for `request_path`.
    ///
    /// `Domain`, `Path`, `Max-Age`, `Secure` and `HttpOnly` are honoured.
    /// `Expires` dates are not parsed, so such cookies are kept for the
    /// session unless `Max-Age` is also given.
    pub fn store(&mut self, set_cookie: &str, host: &str, request_path: &str) {
        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let default_path = match request_path.rfind('/') {
            Some(0) | None => "/".to_owned(),
            Some(slash) => request_path[..slash].to_owned(),
        };

        let mut cookie = JarCookie {
            domain: host.to_ascii_lowercase(),
            include_subdomains: false,
            path: default_path,
            secure: false,
            http_only: false,
            expires: 0,
            name: name.to_owned(),
            value: value.trim().to_owned(),
        };

        for attribute in parts {
            let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
            let val = val.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if !domain_matches(&host.to_ascii_lowercase(), &domain) {
                        tracing::debug!(%host, %domain, cookie = name, "rejected cookie for foreign domain");
                        return;
                    }
                    cookie.domain = domain;
                    cookie.include_subdomains = true;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_owned(),
                "max-age" => match val.parse::<i64>() {
                    Ok(secs) if secs <= 0 => cookie.expires = 1,
                    Ok(secs) => cookie.expires = now().saturating_add(secs as u64),
                    Err(_) => {}
                },
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        self.cookies.retain(|existing| {
            !(existing.name == cookie.name
                && existing.domain == cookie.domain
                && existing.path == cookie.path)
        });
        self.cookies.push(cookie);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }
}

/// `host` is `domain` itself or one of its subdomains.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[inline]
fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_secs())
}
