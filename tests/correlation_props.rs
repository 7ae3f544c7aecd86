//! Property tests for the correlation descriptor builder.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use waitpoint::CorrelationDescriptor;

const BASE: &str = "https://host.example.com/resume";

/// Tokens minted across 10,000 submissions are pairwise distinct.
#[test]
fn generated_tokens_are_pairwise_distinct() {
    let mut seen = HashSet::with_capacity(10_000);
    for _ in 0..10_000 {
        let descriptor = CorrelationDescriptor::build(None, BASE, None);
        assert!(
            seen.insert(descriptor.routing_key().to_string()),
            "token collision: {}",
            descriptor.routing_key()
        );
    }
}

/// The same holds when submissions race across threads.
#[test]
fn concurrent_mints_are_pairwise_distinct() {
    let seen = Arc::new(Mutex::new(HashSet::with_capacity(10_000)));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let seen = seen.clone();
            std::thread::spawn(move || {
                for _ in 0..1_250 {
                    let descriptor = CorrelationDescriptor::build(None, BASE, None);
                    let fresh = seen
                        .lock()
                        .unwrap()
                        .insert(descriptor.routing_key().to_string());
                    assert!(fresh, "token collision under concurrency");
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
    assert_eq!(seen.lock().unwrap().len(), 10_000);
}

proptest! {
    /// Any non-blank supplied address is used verbatim (after trimming).
    #[test]
    fn supplied_address_is_used_verbatim(address in "[a-zA-Z0-9:/._-]{1,60}") {
        prop_assume!(!address.trim().is_empty());
        let descriptor = CorrelationDescriptor::build(Some(&address), BASE, None);
        prop_assert_eq!(descriptor.resume_address(), address.trim());
        prop_assert!(!descriptor.is_generated());
    }

    /// Blank input always falls back to a generated descriptor under the
    /// callback base.
    #[test]
    fn blank_address_generates(blank in "[ \t]{0,10}") {
        let descriptor = CorrelationDescriptor::build(Some(&blank), BASE, None);
        prop_assert!(descriptor.is_generated());
        prop_assert!(descriptor.resume_address().starts_with(BASE));
        // The routing key is the trailing path segment of the resume URL
        let url = descriptor.resume_address();
        prop_assert!(url.ends_with(descriptor.routing_key()));
    }

    /// A suffix lands after the token, so distinct waits stay distinct even
    /// with the same suffix.
    #[test]
    fn suffix_is_appended_after_token(suffix in "[a-z]{1,12}") {
        let descriptor = CorrelationDescriptor::build(None, BASE, Some(&suffix));
        let url = descriptor.resume_address().to_string();
        let expected_suffix = format!("/{}", suffix);
        prop_assert!(url.ends_with(&expected_suffix));
        prop_assert!(url.contains(descriptor.routing_key()));
    }
}
