//! Queue address normalization
//!
//! Queue URLs reported by the service carry the host the service believes it
//! is reachable at (often a container hostname). Before this process
//! dereferences one itself, the authority is swapped for a locally reachable
//! `host[:port]` while the scheme and the path-encoded account/queue name are
//! kept verbatim.

use once_cell::sync::Lazy;
use regex::Regex;

static AUTHORITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*://)[^/?#]+").expect("valid authority regex")
});

/// Replace the `host[:port]` segment of `address` with `local_host`
///
/// The authority ends at the first `/`, `?` or `#`. Addresses without a
/// `scheme://` prefix are returned unchanged. Idempotent as long as
/// `local_host` is itself a bare authority (see
/// [`validate_local_host`](crate::validation::validate_local_host)).
pub fn normalize(address: &str, local_host: &str) -> String {
    match AUTHORITY.captures(address) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            format!("{}{}{}", &caps[1], local_host, &address[whole..])
        }
        None => address.to_string(),
    }
}

/// Queue name encoded as the last path segment of a queue address
pub fn queue_name_from_address(address: &str) -> &str {
    address
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: &str = "localhost:4566";

    #[test]
    fn test_rewrites_host_and_port() {
        assert_eq!(
            normalize("http://sqs.us-east-1.localstack:4566/000000000000/orders", LOCAL),
            "http://localhost:4566/000000000000/orders"
        );
        assert_eq!(
            normalize("https://queue.internal/000000000000/orders", LOCAL),
            "https://localhost:4566/000000000000/orders"
        );
    }

    #[test]
    fn test_idempotent() {
        for address in [
            "http://sqs.internal:4566/000000000000/orders",
            "http://localhost:4566/000000000000/orders",
            "https://a.b.c/123/q.fifo",
            "http://host-only",
            "not a url",
        ] {
            let once = normalize(address, LOCAL);
            assert_eq!(normalize(&once, LOCAL), once, "address: {address}");
        }
    }

    #[test]
    fn test_path_preserved() {
        let address = "http://sqs.internal:4566/000000000000/orders%20eu?x=1";
        let normalized = normalize(address, LOCAL);
        assert!(normalized.ends_with("/000000000000/orders%20eu?x=1"));
    }

    #[test]
    fn test_without_path() {
        assert_eq!(normalize("http://sqs.internal:4566", LOCAL), "http://localhost:4566");
        assert_eq!(
            normalize("http://sqs.internal:4566?Action=List", LOCAL),
            "http://localhost:4566?Action=List"
        );
    }

    #[test]
    fn test_non_url_unchanged() {
        assert_eq!(normalize("orders", LOCAL), "orders");
        assert_eq!(normalize("", LOCAL), "");
    }

    #[test]
    fn test_queue_name_from_address() {
        assert_eq!(
            queue_name_from_address("http://localhost:4566/000000000000/orders"),
            "orders"
        );
        assert_eq!(
            queue_name_from_address("http://localhost:4566/000000000000/orders/"),
            "orders"
        );
        assert_eq!(queue_name_from_address("orders"), "orders");
    }

    mod properties {
        use super::super::*;
        use crate::validation::validate_local_host;
        use proptest::prelude::*;

        fn scheme() -> impl Strategy<Value = String> {
            "(https?|[a-z][a-z0-9+.-]{0,8})"
        }

        /// Hostnames whose labels start with a letter, so none reads as an IP
        fn host() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9]{0,12}(-[a-z0-9]{1,6})?(\\.[a-z][a-z0-9]{0,8}){0,3}"
        }

        /// `host[:port]` values a local host can take
        fn authority() -> impl Strategy<Value = String> {
            (host(), proptest::option::of(1u16..)).prop_map(|(host, port)| match port {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        }

        /// Path, query and fragment following the authority
        fn rest() -> impl Strategy<Value = String> {
            "(/[A-Za-z0-9._~%-]{0,12}){0,4}(\\?[a-z0-9=&]{0,10})?(#[a-z]{0,5})?"
        }

        proptest! {
            #[test]
            fn generated_hosts_are_valid_local_hosts(h in authority()) {
                prop_assert!(validate_local_host(&h).is_ok(), "rejected {}", h);
            }

            #[test]
            fn normalize_swaps_only_the_authority(
                scheme in scheme(),
                remote in authority(),
                rest in rest(),
                h in authority(),
            ) {
                let address = format!("{scheme}://{remote}{rest}");
                let once = normalize(&address, &h);
                prop_assert_eq!(&once, &format!("{scheme}://{h}{rest}"));
                prop_assert_eq!(normalize(&once, &h), once);
            }

            #[test]
            fn normalize_is_idempotent_for_any_input(address in "\\PC{0,48}", h in authority()) {
                let once = normalize(&address, &h);
                prop_assert_eq!(normalize(&once, &h), once);
            }

            #[test]
            fn accepted_local_hosts_keep_normalize_idempotent(
                h in "[a-z0-9.:/?#@-]{1,16}",
                remote in authority(),
                rest in rest(),
            ) {
                let address = format!("http://{remote}{rest}");
                if validate_local_host(&h).is_ok() {
                    let once = normalize(&address, &h);
                    prop_assert_eq!(normalize(&once, &h), once);
                }
            }

            #[test]
            fn local_hosts_with_scheme_or_path_are_rejected(
                prefix in "(https?://)?",
                h in authority(),
                suffix in "(/[a-z0-9]{0,6}|\\?[a-z]{0,4}|#[a-z]{0,4})",
            ) {
                let candidate = format!("{prefix}{h}{suffix}");
                prop_assert!(validate_local_host(&candidate).is_err(), "accepted {}", candidate);
            }

            #[test]
            fn local_hosts_with_scheme_are_rejected(h in authority()) {
                let candidate = format!("http://{h}");
                prop_assert!(validate_local_host(&candidate).is_err(), "accepted {}", candidate);
            }
        }
    }
}
