/// DNS-SD meta query used to enumerate the service types present on a link
pub const META_QUERY_TYPE: &str = "_services._dns-sd._udp.local.";

/// Domain browsed explicitly at startup
pub const DEFAULT_DOMAIN: &str = "local";

/// Interface id used when browsing is not bound to a single interface
pub const ANY_INTERFACE: &str = "*";

/// API path prefix
pub const API_PREFIX: &str = "/v1";

/// Split a fully qualified service type such as `"_http._tcp.local."` into
/// the bare type (`"_http._tcp"`) and its domain (`"local"`).
///
/// A type without a domain part is returned with an empty domain.
pub fn split_service_type(full_type: &str) -> (String, String) {
    let trimmed = full_type.trim_end_matches('.');
    let labels: Vec<&str> = trimmed.split('.').collect();

    // The type is the leading `_service._proto` pair
    if labels.len() >= 2 && labels[0].starts_with('_') && labels[1].starts_with('_') {
        let service_type = format!("{}.{}", labels[0], labels[1]);
        let domain = labels[2..].join(".");
        return (service_type, domain);
    }

    (trimmed.to_string(), String::new())
}

/// Extract the instance name from a DNS-SD full name, e.g.
/// `"printer._http._tcp.local."` with type `"_http._tcp.local."` yields `"printer"`.
pub fn instance_name(fullname: &str, full_type: &str) -> String {
    let suffix = format!(".{}", full_type.trim_start_matches('.'));
    match fullname.strip_suffix(suffix.as_str()) {
        Some(name) => name.to_string(),
        None => {
            // Fall back to comparing without trailing dots
            let fullname = fullname.trim_end_matches('.');
            let suffix = suffix.trim_end_matches('.');
            fullname
                .strip_suffix(suffix)
                .unwrap_or(fullname)
                .to_string()
        }
    }
}

/// Host names arrive rooted (`"printer.local."`); the index keys them unrooted.
pub fn normalize_host(hostname: &str) -> String {
    hostname.trim_end_matches('.').to_string()
}

/// Human-facing label for a service type: `"_http._tcp"` becomes `"http (tcp)"`.
pub fn type_label(service_type: &str) -> String {
    match service_type.split_once('.') {
        Some((service, proto)) if service.starts_with('_') && proto.starts_with('_') => {
            format!("{} ({})", &service[1..], &proto[1..])
        }
        _ => service_type.to_string(),
    }
}

/// Compact label used next to an instance name: `"_http._tcp"` becomes `"http,tcp"`.
pub fn type_tag(service_type: &str) -> String {
    match service_type.split_once('.') {
        Some((service, proto)) if service.starts_with('_') && proto.starts_with('_') => {
            format!("{},{}", &service[1..], &proto[1..])
        }
        _ => service_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_service_type() {
        assert_eq!(
            split_service_type("_http._tcp.local."),
            ("_http._tcp".to_string(), "local".to_string())
        );
        assert_eq!(
            split_service_type("_ipp._tcp.example.org"),
            ("_ipp._tcp".to_string(), "example.org".to_string())
        );
        assert_eq!(
            split_service_type("_ssh._tcp"),
            ("_ssh._tcp".to_string(), String::new())
        );
    }

    #[test]
    fn test_instance_name() {
        assert_eq!(
            instance_name("printer._http._tcp.local.", "_http._tcp.local."),
            "printer"
        );
        // Instance names may contain dots and spaces
        assert_eq!(
            instance_name("Living Room v2.1._airplay._tcp.local.", "_airplay._tcp.local."),
            "Living Room v2.1"
        );
        assert_eq!(
            instance_name("nas._smb._tcp.local", "_smb._tcp.local."),
            "nas"
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(normalize_host("printer.local."), "printer.local");
        assert_eq!(type_label("_http._tcp"), "http (tcp)");
        assert_eq!(type_tag("_http._tcp"), "http,tcp");
        assert_eq!(type_label("weird"), "weird");
    }
}
