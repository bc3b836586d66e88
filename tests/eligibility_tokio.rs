#![cfg(all(test, feature = "future"))]

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use coalescing_cache::future::CacheBuilder;
use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IntroEligibility {
    Eligible,
    Ineligible,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
#[error("eligibility check failed")]
struct CheckFailed;

#[tokio::test]
async fn unknown_verdicts_are_checked_again() {
    let calls = Arc::new(Mutex::new(Vec::<HashSet<&'static str>>::new()));

    let cache = {
        let my_calls = Arc::clone(&calls);
        CacheBuilder::new(move |ids: HashSet<&'static str>| {
            my_calls.lock().push(ids.clone());
            async move {
                let verdicts = ids
                    .into_iter()
                    .map(|id| {
                        let verdict = match id {
                            "p1" => IntroEligibility::Unknown,
                            "p2" => IntroEligibility::Eligible,
                            _ => IntroEligibility::Ineligible,
                        };
                        (id, verdict)
                    })
                    .collect::<HashMap<_, _>>();
                Ok::<_, CheckFailed>(verdicts)
            }
        })
        .name("intro-eligibility")
        .cache_if(|e: &IntroEligibility| *e != IntroEligibility::Unknown)
        .record_stats()
        .build()
    };

    let first = cache.fetch(["p1", "p2"]).await.unwrap();
    assert_eq!(first.get("p1"), Some(&IntroEligibility::Unknown));
    assert_eq!(first.get("p2"), Some(&IntroEligibility::Eligible));

    // The unknown verdict was returned but not cached.
    assert!(!cache.contains_key("p1"));
    assert_eq!(cache.get("p2"), Some(IntroEligibility::Eligible));

    let second = cache.fetch(["p1", "p2"]).await.unwrap();
    assert_eq!(second, first);

    let expected: Vec<HashSet<_>> = vec![
        ["p1", "p2"].into_iter().collect(),
        ["p1"].into_iter().collect(),
    ];
    assert_eq!(*calls.lock(), expected);

    let stats = cache.stats();
    assert_eq!(stats.fetch_count(), 2);
    assert_eq!(stats.rejected_count(), 2);
    assert_eq!(stats.hit_count(), 1);
}

#[tokio::test]
async fn seeded_verdicts_skip_the_check() {
    let cache = CacheBuilder::new(|ids: HashSet<&'static str>| async move {
        Ok::<_, CheckFailed>(
            ids.into_iter()
                .map(|id| (id, IntroEligibility::Ineligible))
                .collect::<HashMap<_, _>>(),
        )
    })
    .cache_if(|e: &IntroEligibility| *e != IntroEligibility::Unknown)
    .build();

    assert!(cache.insert("p1", IntroEligibility::Eligible));
    assert!(!cache.insert("p2", IntroEligibility::Unknown));

    let verdicts = cache.fetch(["p1", "p2"]).await.unwrap();
    assert_eq!(verdicts.get("p1"), Some(&IntroEligibility::Eligible));
    assert_eq!(verdicts.get("p2"), Some(&IntroEligibility::Ineligible));
    assert_eq!(cache.entry_count(), 2);
}
