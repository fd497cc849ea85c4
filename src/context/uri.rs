//! Connection URI helpers.
//!
//! Parent stacks export connection URIs without credentials. Consumers splice
//! in their own username, password and database, keeping the hosts and query
//! options of the exported URI.
//!
//! URIs are split by hand rather than through a generic URL parser: MongoDB
//! seed lists put several `host:port` entries in one authority
//! (`mongodb://a:27017,b:27017/?replicaSet=rs0`), which is not a valid URL host.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::fmt;

use crate::core::BindError;

/// Characters escaped in the user and password of a URI.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

const PASSWORD_MASK: &str = "****";

/// The pieces of a connection URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParts {
    pub scheme: String,
    /// `host[:port]` entries, in seed list order
    pub hosts: Vec<String>,
    /// Decoded user name; empty when the URI carries none
    pub username: String,
    /// Decoded password
    pub password: Option<String>,
    pub database: Option<String>,
    pub query: Option<String>,
}

impl ConnectionParts {
    /// Port of the first host, if it names one.
    pub fn port(&self) -> Option<u16> {
        self.hosts.first().and_then(|host| split_port(host).ok().flatten())
    }

    fn render(&self, mask_password: bool) -> String {
        let mut uri = format!("{}://", self.scheme);
        if !self.username.is_empty() || self.password.is_some() {
            uri.extend(utf8_percent_encode(&self.username, USERINFO));
            if let Some(password) = &self.password {
                uri.push(':');
                if mask_password {
                    uri.push_str(PASSWORD_MASK);
                } else {
                    uri.extend(utf8_percent_encode(password, USERINFO));
                }
            }
            uri.push('@');
        }
        uri.push_str(&self.hosts.join(","));

        if let Some(database) = &self.database {
            uri.push('/');
            uri.push_str(database);
        }
        if let Some(query) = &self.query {
            if self.database.is_none() {
                uri.push('/');
            }
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }
}

impl fmt::Display for ConnectionParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// `uri` with any user information blanked, for error messages.
fn scrub(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(start), Some(at)) if at > start => {
            format!("{}://{PASSWORD_MASK}@{}", &uri[..start], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}

fn invalid(uri: &str, problem: impl fmt::Display) -> BindError {
    BindError::InvalidUri {
        reason: format!("'{}' {problem}", scrub(uri)),
    }
}

fn decode(uri: &str, raw: &str) -> Result<String, BindError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| invalid(uri, "has user information that is not valid UTF-8"))
}

/// Split `host[:port]`, validating the port.
fn split_port(host: &str) -> Result<Option<u16>, String> {
    // `[v6]:port`
    let (name, port) = match host.strip_prefix('[') {
        Some(bracketed) => match bracketed.split_once(']') {
            Some((address, rest)) => (address, rest.strip_prefix(':')),
            None => return Err(format!("has an unterminated IPv6 host '{host}'")),
        },
        None => match host.rsplit_once(':') {
            Some((name, port)) => (name, Some(port)),
            None => (host, None),
        },
    };
    if name.is_empty() {
        return Err(format!("has a host entry '{host}' without a name"));
    }
    port.map(|port| port.parse::<u16>().map_err(|_| format!("has an invalid port in '{host}'")))
        .transpose()
}

/// Split a connection URI into its parts.
///
/// # Errors
///
/// Returns [`BindError::InvalidUri`] when `uri` has no scheme, no host, or a
/// malformed host entry.
pub fn parse_connection_uri(uri: &str) -> Result<ConnectionParts, BindError> {
    let (scheme, rest) = uri
        .trim()
        .split_once("://")
        .ok_or_else(|| invalid(uri, "is missing '<scheme>://'"))?;
    if scheme.is_empty()
        || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return Err(invalid(uri, format!("has an invalid scheme '{scheme}'")));
    }

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let (userinfo, host_list) = match authority.rsplit_once('@') {
        Some((userinfo, hosts)) => (Some(userinfo), hosts),
        None => (None, authority),
    };
    let (username, password) = match userinfo {
        Some(userinfo) => match userinfo.split_once(':') {
            Some((user, password)) => (decode(uri, user)?, Some(decode(uri, password)?)),
            None => (decode(uri, userinfo)?, None),
        },
        None => (String::new(), None),
    };

    let hosts: Vec<String> = host_list.split(',').map(str::trim).map(str::to_string).collect();
    if hosts.iter().all(String::is_empty) {
        return Err(invalid(uri, "has no host"));
    }
    for host in &hosts {
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid(uri, format!("has an invalid host list '{host_list}'")));
        }
        split_port(host).map_err(|problem| invalid(uri, problem))?;
    }

    let (path, query) = match tail.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (tail, None),
    };
    let database = path.trim_start_matches('/');

    Ok(ConnectionParts {
        scheme: scheme.to_string(),
        hosts,
        username,
        password,
        database: (!database.is_empty()).then(|| database.to_string()),
        query: query.filter(|query| !query.is_empty()).map(str::to_string),
    })
}

/// Add credentials and a database path to a base connection URI.
///
/// # Errors
///
/// Returns [`BindError::InvalidUri`] when `uri` is not a URI with a host.
pub fn append_user_password_and_db(
    uri: &str,
    user: &str,
    password: &str,
    database: &str,
) -> Result<String, BindError> {
    let mut parts = parse_connection_uri(uri)?;
    parts.username = user.to_string();
    parts.password = Some(password.to_string());
    parts.database = Some(database.to_string());
    Ok(parts.to_string())
}

/// Merge extra query options (`a=b&c=d`) into `uri`.
///
/// Options already present in `uri` keep their value.
pub fn append_options(uri: &str, options: &str) -> Result<String, BindError> {
    let options = options.trim().trim_start_matches(['?', '&']);
    if options.is_empty() {
        return Ok(uri.to_string());
    }

    let mut parts = parse_connection_uri(uri)?;
    let query = parts.query.take().unwrap_or_default();
    let existing: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, _)| key.into_owned())
        .collect();
    let additions: Vec<(String, String)> = url::form_urlencoded::parse(options.as_bytes())
        .filter(|(key, _)| !existing.iter().any(|e| e == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let merged = url::form_urlencoded::Serializer::for_suffix(query, 0)
        .extend_pairs(additions)
        .finish();
    parts.query = (!merged.is_empty()).then_some(merged);
    Ok(parts.to_string())
}

/// Mask the password of a URI for logs and error messages.
pub fn redact(uri: &str) -> String {
    match parse_connection_uri(uri) {
        Ok(parts) if parts.password.is_some() => parts.render(true),
        Ok(_) => uri.to_string(),
        Err(_) => "<unparseable uri>".to_string(),
    }
}
