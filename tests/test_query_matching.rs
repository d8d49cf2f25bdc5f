use cloudmon::query::{QueryError, compile, parse};
use cloudmon::{Filter, LogEntry};
use serde_json::json;

const LIVEKIT_QUERY: &str = "service:(linode-livekit-cloud-media-production-v1 OR livekit-cloud-media-production-v1 OR cloud-media) env:production 'no stream matches subject'";

fn entry(value: serde_json::Value) -> LogEntry {
    LogEntry::from_json(value).expect("object event")
}

fn filter(query: &str) -> Filter {
    compile(query).expect("valid query")
}

#[test]
fn test_livekit_monitor_query_matches() {
    let f = filter(LIVEKIT_QUERY);
    assert!(f.matches(&entry(json!({
        "service": "linode-livekit-cloud-media-production-v1",
        "env": "production",
        "message": "no stream matches subject"
    }))));
}

#[test]
fn test_livekit_monitor_query_requires_env() {
    let f = filter(LIVEKIT_QUERY);
    assert!(!f.matches(&entry(json!({
        "service": "linode-livekit-cloud-media-production-v1",
        "message": "no stream matches subject"
    }))));
}

#[test]
fn test_excluded_message_condition() {
    let f = filter(r#"service:(a OR b) env:production -message:"no stream matches subject""#);
    let base = json!({"service": "b", "env": "production", "message": "all good"});
    assert!(f.matches(&entry(base)));
    assert!(!f.matches(&entry(json!({
        "service": "a",
        "env": "production",
        "message": "No Stream Matches Subject"
    }))));
    assert!(!f.matches(&entry(json!({
        "service": "c",
        "env": "production",
        "message": "all good"
    }))));
}

#[test]
fn test_negation_is_complement() {
    let events = [
        json!({"env": "production"}),
        json!({"env": "staging"}),
        json!({"env": 5}),
        json!({"other": "x"}),
        json!({"env": {"nested": "production"}}),
    ];
    for cond in ["env:production", "env:prod*", "env:\"PRODUCTION\"", "env:>3", "env:[1 TO 9]"] {
        let positive = filter(cond);
        let negative = filter(&format!("-{cond}"));
        for event in &events {
            let e = entry(event.clone());
            assert_eq!(
                negative.matches(&e),
                !positive.matches(&e),
                "negation of {cond} on {event}"
            );
        }
    }
}

#[test]
fn test_and_or_agree_with_operands() {
    let events = [
        json!({"a": "1", "b": "1"}),
        json!({"a": "1", "b": "0"}),
        json!({"a": "0", "b": "1"}),
        json!({"a": "0", "b": "0"}),
    ];
    let a = filter("a:1");
    let b = filter("b:1");
    let and = filter("a:1 AND b:1");
    let juxtaposed = filter("a:1 b:1");
    let or = filter("a:1 OR b:1");
    for event in events {
        let e = entry(event);
        assert_eq!(and.matches(&e), a.matches(&e) && b.matches(&e));
        assert_eq!(juxtaposed.matches(&e), and.matches(&e));
        assert_eq!(or.matches(&e), a.matches(&e) || b.matches(&e));
    }
}

#[test]
fn test_operators_are_case_insensitive() {
    let e = entry(json!({"a": "0", "b": "1"}));
    assert!(filter("a:1 or b:1").matches(&e));
    assert!(!filter("a:1 and b:1").matches(&e));
}

#[test]
fn test_wildcard_prefix_is_case_sensitive() {
    let f = filter("service:cloud-media*");
    assert!(f.matches(&entry(json!({"service": "cloud-media"}))));
    assert!(f.matches(&entry(json!({"service": "cloud-media-production-v1"}))));
    assert!(!f.matches(&entry(json!({"service": "Cloud-Media-production"}))));
    assert!(!f.matches(&entry(json!({"service": "livekit-cloud-media"}))));
}

#[test]
fn test_closed_range_bounds() {
    let f = filter("duration:[1.5 TO 3]");
    for (value, expected) in [(1.4, false), (1.5, true), (2.0, true), (3.0, true), (3.01, false)] {
        assert_eq!(
            f.matches(&entry(json!({ "duration": value }))),
            expected,
            "duration {value}"
        );
    }
    assert!(!f.matches(&entry(json!({"duration": "slow"}))));
}

#[test]
fn test_free_text_case_insensitivity() {
    let e = entry(json!({"message": "Worker FOO stopped"}));
    assert!(filter("foo").matches(&e));
    assert!(filter("FOO").matches(&e));
    assert!(filter("'worker foo'").matches(&e));
    assert!(!filter("bar").matches(&e));
}

#[test]
fn test_missing_field_never_matches() {
    let e = entry(json!({"message": "hello"}));
    for query in [
        "svc:x",
        "svc:x*",
        "svc:\"x\"",
        "svc:>1",
        "svc:[1 TO 2]",
        "svc:(x OR y)",
        "a.b.c:x",
    ] {
        assert!(!filter(query).matches(&e), "{query}");
        assert!(filter(&format!("-{query}")).matches(&e), "-{query}");
    }
}

#[test]
fn test_field_prefixes_do_not_change_meaning() {
    let e = entry(json!({"host": "web-1"}));
    assert!(filter("@host:web-1").matches(&e));
    assert!(filter("#host:web-1").matches(&e));
}

#[test]
fn test_malformed_queries_are_rejected() {
    assert!(matches!(
        parse("message:'no stream"),
        Err(QueryError::UnterminatedString { .. })
    ));
    assert!(matches!(
        parse(":production"),
        Err(QueryError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse("latency:[1 TO fast]"),
        Err(QueryError::InvalidNumber { .. })
    ));
    assert!(matches!(
        parse("latency:[1 2]"),
        Err(QueryError::UnexpectedToken { .. })
    ));
    assert!(parse("").is_err());
}
