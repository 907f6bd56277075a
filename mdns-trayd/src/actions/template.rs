use crate::index::{Host, ServiceInstance};

/// Expand a command template for a service.
///
/// `$d` domain, `$h` host FQDN, `$n` instance name, `$u` TXT record count,
/// `$t` TXT records joined by spaces, `$s` service type, `$p` port.
/// Substituted values are never expanded again; unknown `$x` stays literal.
pub fn expand_service(template: &str, service: &ServiceInstance) -> String {
    expand(template, |key| match key {
        'd' => Some(service.domain().to_string()),
        'h' => Some(service.host_fqdn().to_string()),
        'n' => Some(service.name().to_string()),
        'u' => Some(service.txt().len().to_string()),
        't' => Some(service.txt_records().join(" ")),
        's' => Some(service.service_type().to_string()),
        'p' => Some(service.port().to_string()),
        _ => None,
    })
}

/// Expand a command template for a host; only `$d` and `$h` apply.
pub fn expand_host(template: &str, host: &Host) -> String {
    expand(template, |key| match key {
        'd' => Some(host.domain().to_string()),
        'h' => Some(host.fqdn().to_string()),
        _ => None,
    })
}

fn expand(template: &str, lookup: impl Fn(char) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied().and_then(&lookup) {
            Some(value) => {
                chars.next();
                out.push_str(&value);
            }
            None => out.push('$'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{details, local, RecordingTransport, Recorder};
    use crate::index::DiscoveryIndex;

    fn index_with_printer() -> DiscoveryIndex {
        let mut index = DiscoveryIndex::new(Box::new(RecordingTransport::default()));
        let mut rec = Recorder::default();
        let mut d = details("printer.local", 631);
        d.txt = vec![
            ("rp".to_string(), "printers/lobby".to_string()),
            ("color".to_string(), "T".to_string()),
        ];
        index.on_service_added(local(), "Lobby $p".to_string(), "_ipp._tcp".to_string(), d, &mut rec);
        index
    }

    #[test]
    fn test_expand_service_placeholders() {
        let index = index_with_printer();
        let service = index.service(&local(), "Lobby $p", "_ipp._tcp").unwrap();

        assert_eq!(
            expand_service("open ipp://$h:$p/ [$s in $d] $u: $t", service),
            "open ipp://printer.local:631/ [_ipp._tcp in local] 2: color=T rp=printers/lobby"
        );
    }

    #[test]
    fn test_substituted_values_are_not_reexpanded() {
        let index = index_with_printer();
        let service = index.service(&local(), "Lobby $p", "_ipp._tcp").unwrap();

        assert_eq!(expand_service("echo '$n'", service), "echo 'Lobby $p'");
    }

    #[test]
    fn test_expand_host_only_knows_domain_and_fqdn() {
        let index = index_with_printer();
        let host = index.host(&local(), "printer.local").unwrap();

        assert_eq!(expand_host("ping $h.$d $p $x", host), "ping printer.local.local $p $x");
        assert_eq!(expand_host("cost $", host), "cost $");
    }
}
