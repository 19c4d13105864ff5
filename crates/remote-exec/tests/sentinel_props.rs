//! Property-based tests for the sentinel codec and control path ladder

use proptest::prelude::*;
use remote_exec::control_path::{MAX_CONTROL_PATH_LEN, expanded_len};
use remote_exec::sentinel::{self, SENTINEL_PREFIX, TRANSPORT_FAILURE};
use remote_exec::{ControlPathResolver, Host};

proptest! {
    #[test]
    fn test_status_round_trips(
        output in "[a-zA-Z0-9 .,:\n-]{0,200}",
        status in 0i32..=255,
    ) {
        let stdout = format!("{output}{}", sentinel::encode(status));
        let decoded = sentinel::decode(&stdout);
        prop_assert_eq!(decoded.exit_status, status);
        prop_assert_eq!(decoded.output, output);
    }

    #[test]
    fn test_output_without_sentinel_is_transport_failure(output in "[a-zA-Z0-9 .,:\n-]{0,200}") {
        let decoded = sentinel::decode(&output);
        prop_assert_eq!(decoded.exit_status, TRANSPORT_FAILURE);
        prop_assert_eq!(decoded.output, output);
    }

    #[test]
    fn test_strip_removes_every_sentinel(
        fragments in prop::collection::vec("[a-z ]{0,12}", 1..6),
        status in -1i32..=255,
    ) {
        let text = fragments.join(sentinel::encode(status).as_str());
        let stripped = sentinel::strip(&text);
        prop_assert!(!stripped.contains(SENTINEL_PREFIX));
        prop_assert_eq!(stripped.into_owned(), fragments.concat());
    }

    #[test]
    fn test_control_path_fits_and_is_deterministic(
        hostname in "[a-z0-9][a-z0-9.-]{0,150}",
        user in prop::option::of("[a-z_][a-z0-9_]{0,40}"),
        port in prop::option::of(1u16..),
    ) {
        let mut host = Host::new(hostname).unwrap();
        if let Some(user) = user {
            host = host.with_user(user);
        }
        if let Some(port) = port {
            host = host.with_port(port);
        }

        let resolver = ControlPathResolver::new("/home/deploy");
        let path = resolver.resolve(&host).unwrap();
        prop_assert!(expanded_len(&path) <= MAX_CONTROL_PATH_LEN);
        prop_assert_eq!(&path, &resolver.resolve(&host).unwrap());

        // Earlier candidates are only skipped when they do not fit
        let candidates = resolver.candidates(&host);
        let index = candidates.iter().position(|candidate| *candidate == path).unwrap();
        for skipped in &candidates[..index] {
            prop_assert!(expanded_len(skipped) > MAX_CONTROL_PATH_LEN);
        }
    }
}
