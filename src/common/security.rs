use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

pub const MAX_URL_LEN: usize = 2048;
const MAX_FILENAME_LEN: usize = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlRejection {
    #[error("{0}")]
    Malformed(String),
    #[error("hostname could not be resolved")]
    Unresolvable,
    #[error("access to private network resource ({0}) is forbidden")]
    Blocked(IpAddr),
}

/// Shape check only; no network access.
pub fn parse_media_url(raw: &str) -> Result<Url, UrlRejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlRejection::Malformed("URL is empty".into()));
    }
    if raw.len() > MAX_URL_LEN {
        return Err(UrlRejection::Malformed("URL is too long".into()));
    }

    let url = Url::parse(raw).map_err(|e| UrlRejection::Malformed(format!("URL is malformed: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlRejection::Malformed(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlRejection::Malformed("URL has no hostname".into())),
    }
}

/// Rejects URLs whose host is, or resolves to, a loopback/private/link-local address.
pub async fn check_destination(url: &Url) -> Result<(), UrlRejection> {
    let addrs: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(443);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|_| UrlRejection::Unresolvable)?
                .map(|sock| sock.ip())
                .collect()
        }
        None => return Err(UrlRejection::Malformed("URL has no hostname".into())),
    };

    if addrs.is_empty() {
        return Err(UrlRejection::Unresolvable);
    }
    match addrs.into_iter().find(|ip| is_forbidden_ip(*ip)) {
        Some(ip) => Err(UrlRejection::Blocked(ip)),
        None => Ok(()),
    }
}

pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_forbidden_ip(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // fc00::/7
                || (first & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// Makes a title safe for a `Content-Disposition` filename: directory parts are
/// stripped and anything outside `[A-Za-z0-9_.-]` becomes `_`.
pub fn sanitize_filename(name: &str, ext: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    safe.truncate(MAX_FILENAME_LEN);
    let safe = safe.trim_matches(|c| c == '.' || c == '_').to_string();

    let ext: String = ext.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };

    if safe.is_empty() {
        format!("download.{ext}")
    } else {
        format!("{safe}.{ext}")
    }
}
