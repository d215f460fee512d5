// Tests for the exploration policy

mod common;

use common::{JudgeBehavior, StubJudge, page};
use sitemapper_core::policy::ExplorationPolicy;
use sitemapper_core::registry::{LinkRecord, LinkRegistry};
use sitemapper_scanner::{NormalizedUrl, PageRecord, RawLink, normalize_url};
use std::collections::HashSet;
use std::sync::Arc;

fn registered(page: &PageRecord) -> Vec<LinkRecord> {
    LinkRegistry::with_homepage(&page.url).register(&page.url, &page.links)
}

fn ten_link_page() -> PageRecord {
    let links: Vec<(String, String)> = (1..=10)
        .map(|i| (format!("Section {}", i), format!("https://acme.test/section-{}", i)))
        .collect();
    PageRecord::new(
        "https://acme.test".to_string(),
        "Acme".to_string(),
        links.into_iter().map(|(t, u)| RawLink::new(t, u)).collect(),
    )
}

#[tokio::test]
async fn test_cap_is_enforced_locally() {
    let judge = Arc::new(StubJudge::new(JudgeBehavior::FirstN(8)));
    let policy = ExplorationPolicy::new(judge.clone());
    let home = ten_link_page();
    let links = registered(&home);

    let decision = policy.select(&home, &links, &HashSet::new()).await;

    assert_eq!(judge.call_count(), 1);
    assert_eq!(decision.selections.len(), 5);
    let indices: Vec<usize> = decision.selections.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert!(decision.error.is_none());
}

#[tokio::test]
async fn test_custom_limit() {
    let judge = Arc::new(StubJudge::new(JudgeBehavior::FirstN(8)));
    let policy = ExplorationPolicy::new(judge.clone()).with_limit(2);
    let home = ten_link_page();

    let decision = policy.select(&home, &registered(&home), &HashSet::new()).await;

    assert_eq!(policy.limit(), 2);
    assert_eq!(judge.requests()[0].limit, 2);
    assert_eq!(decision.selections.len(), 2);
}

#[tokio::test]
async fn test_unoffered_and_repeated_indices_are_dropped() {
    let judge = Arc::new(StubJudge::new(JudgeBehavior::Indices(vec![1, 99, 1, 0])));
    let policy = ExplorationPolicy::new(judge);
    let home = page(
        "https://acme.test",
        "Acme",
        &[
            ("About", "https://acme.test/about"),
            ("Work", "https://acme.test/work"),
        ],
    );

    let decision = policy.select(&home, &registered(&home), &HashSet::new()).await;

    let urls: Vec<&str> = decision.selections.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(urls, vec!["https://acme.test/work", "https://acme.test/about"]);
    assert_eq!(decision.selections[0].reason.as_deref(), Some("looks structural"));
}

#[tokio::test]
async fn test_filtered_index_counts_as_unoffered() {
    // Index 1 is the mailto link: registered, but never offered.
    let judge = Arc::new(StubJudge::new(JudgeBehavior::Indices(vec![1])));
    let policy = ExplorationPolicy::new(judge.clone());
    let home = page(
        "https://acme.test",
        "Acme",
        &[("About", "https://acme.test/about"), ("Mail", "mailto:hi@acme.test")],
    );

    let decision = policy.select(&home, &registered(&home), &HashSet::new()).await;

    assert!(decision.selections.is_empty());
    let offered: Vec<usize> = judge.requests()[0].candidates.iter().map(|c| c.index).collect();
    assert_eq!(offered, vec![0]);
}

#[tokio::test]
async fn test_judge_failure_yields_empty_selection() {
    let judge = Arc::new(StubJudge::new(JudgeBehavior::Fail));
    let policy = ExplorationPolicy::new(judge);
    let home = ten_link_page();

    let decision = policy.select(&home, &registered(&home), &HashSet::new()).await;

    assert!(decision.selections.is_empty());
    assert!(decision.judged);
    assert!(decision.error.unwrap().contains("stub judge is down"));
}

#[tokio::test]
async fn test_nothing_to_offer_makes_no_call() {
    let judge = Arc::new(StubJudge::new(JudgeBehavior::FirstN(5)));
    let policy = ExplorationPolicy::new(judge.clone());
    let home = page(
        "https://acme.test",
        "Acme",
        &[
            ("Contact", "mailto:x@acme.test"),
            ("fb", "https://facebook.com/acme"),
            ("2", "https://acme.test/page/2"),
            ("Seen", "https://acme.test/seen"),
        ],
    );
    let explored: HashSet<NormalizedUrl> = [normalize_url("https://acme.test/seen")].into_iter().collect();

    let decision = policy.select(&home, &registered(&home), &explored).await;

    assert!(decision.selections.is_empty());
    assert!(!decision.judged);
    assert_eq!(judge.call_count(), 0);
}

#[tokio::test]
async fn test_request_carries_page_context() {
    let judge = Arc::new(StubJudge::new(JudgeBehavior::FirstN(0)));
    let policy = ExplorationPolicy::new(judge.clone());
    let home = page("https://acme.test", "Acme Inc", &[("About", "https://acme.test/about")]);
    let explored: HashSet<NormalizedUrl> = [normalize_url("https://acme.test")].into_iter().collect();

    policy.select(&home, &registered(&home), &explored).await;

    let request = &judge.requests()[0];
    assert_eq!(request.page_title, "Acme Inc");
    assert_eq!(request.page_url, "https://acme.test");
    assert_eq!(request.explored, vec!["acme.test".to_string()]);
}
