//! End-to-end behavior of the cache and session registry built from config.

mod common;

use std::time::Duration;

use anyhow::Result;
use common::{OTHER_UA, TestStratum, UA};
use stratum::{InvalidationReason, Tier};

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_session_key_lands_in_hot() -> Result<()> {
    let t = TestStratum::start()?;
    let cache = t.stratum.cache();

    cache.put("session:abc", "payload".to_string(), None);
    assert_eq!(cache.get::<String>("session:abc").as_deref(), Some("payload"));
    assert_eq!(cache.tier_of("session:abc"), Some(Tier::Hot));

    let stats = cache.stats();
    assert_eq!(stats.hot_size, 1);
    assert_eq!(stats.hits, 1);
    Ok(())
}

#[test]
fn test_hot_overflow_demotes_only_reused_entries() -> Result<()> {
    let t = TestStratum::from_toml(
        r#"
[cache]
hot_capacity = 3
"#,
    )?;
    let cache = t.stratum.cache();

    cache.put("user:a", 1u32, None);
    assert_eq!(cache.get::<u32>("user:a"), Some(1));
    assert_eq!(cache.get::<u32>("user:a"), Some(1));
    cache.put("user:b", 2u32, None);
    cache.put("user:c", 3u32, None);

    // `user:a` is least recently used but was read twice.
    cache.put("user:d", 4u32, None);
    assert_eq!(cache.tier_of("user:a"), Some(Tier::Warm));
    let stats = cache.stats();
    assert_eq!((stats.evictions, stats.demotions), (1, 1));
    assert_eq!(stats.hot_size, 3);

    // `user:b` was never read.
    cache.put("user:e", 5u32, None);
    assert_eq!(cache.tier_of("user:b"), None);
    let stats = cache.stats();
    assert_eq!((stats.evictions, stats.demotions), (2, 1));
    assert_eq!((stats.hot_size, stats.warm_size), (3, 1));
    Ok(())
}

#[test]
fn test_fresh_cache_reports_absent() -> Result<()> {
    let t = TestStratum::start()?;
    let cache = t.stratum.cache();

    assert_eq!(cache.get::<u32>("catalog:missing"), None);
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert!(stats.filter_false_positive_rate < f64::EPSILON);
    Ok(())
}

#[test]
fn test_custom_routes_and_ttl() -> Result<()> {
    let t = TestStratum::from_toml(
        r#"
[cache]
warm_ttl_secs = 60
fallback_tier = "warm"

[[cache.routes]]
prefix = "menu:"
tier = "hot"
"#,
    )?;
    let cache = t.stratum.cache();

    cache.put("menu:today", 1u8, None);
    cache.put("order:7", 2u8, None);
    assert_eq!(cache.tier_of("menu:today"), Some(Tier::Hot));
    assert_eq!(cache.tier_of("order:7"), Some(Tier::Warm));

    t.advance(Duration::from_secs(61));
    assert_eq!(cache.get::<u8>("order:7"), None);
    assert_eq!(cache.get::<u8>("menu:today"), Some(1));
    assert_eq!(cache.cleanup_expired(), 1);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sixth_login_drops_the_first() -> Result<()> {
    let t = TestStratum::start()?;
    let sessions = t.stratum.sessions();

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(t.login("u1"));
        t.advance(Duration::from_secs(1));
    }

    let active = sessions.user_active_sessions("u1");
    assert_eq!(active.len(), 5);
    assert!(active.iter().all(|s| s.session_id != ids[0]));
    assert!(sessions.validate_session(&ids[0], "10.0.0.1", UA).is_none());
    assert!(sessions.validate_session(&ids[5], "10.0.0.1", UA).is_some());

    let stats = sessions.stats();
    assert_eq!(stats.total_created, 6);
    assert_eq!(stats.total_invalidated, 1);
    assert_eq!(sessions.user_session_count("u1"), 5);
    Ok(())
}

#[test]
fn test_idle_session_fails_validation() -> Result<()> {
    let t = TestStratum::start()?;
    let sessions = t.stratum.sessions();
    let id = t.login("u1");

    t.advance(Duration::from_secs(3 * 60 * 60));
    assert!(sessions.validate_session(&id, "10.0.0.1", UA).is_none());
    assert!(sessions.session(&id).is_none());
    assert_eq!(sessions.stats().total_expired, 1);
    Ok(())
}

#[test]
fn test_activity_keeps_session_alive_until_absolute_timeout() -> Result<()> {
    let t = TestStratum::from_toml(
        r#"
[session]
absolute_timeout_secs = 14400
idle_timeout_secs = 3600
"#,
    )?;
    let sessions = t.stratum.sessions();
    let id = t.login("u1");

    for _ in 0..3 {
        t.advance(Duration::from_secs(50 * 60));
        assert!(sessions.validate_session(&id, "10.0.0.1", UA).is_some());
    }
    t.advance(Duration::from_secs(91 * 60));
    assert!(sessions.validate_session(&id, "10.0.0.1", UA).is_none());
    Ok(())
}

#[test]
fn test_user_agent_change_invalidates() -> Result<()> {
    let t = TestStratum::start()?;
    let sessions = t.stratum.sessions();
    let id = t.login("u1");

    assert!(sessions.validate_session(&id, "10.0.0.1", OTHER_UA).is_none());
    assert!(sessions.validate_session(&id, "10.0.0.1", UA).is_none());
    assert!(t.stratum.cache().tier_of(&format!("session:{id}")).is_none());
    Ok(())
}

#[test]
fn test_ip_churn_policy() -> Result<()> {
    let t = TestStratum::from_toml(
        r#"
[session]
max_ip_changes = 2
"#,
    )?;
    let sessions = t.stratum.sessions();
    let id = t.login("u1");

    assert!(sessions.validate_session(&id, "10.0.0.2", UA).is_some());
    assert!(sessions.validate_session(&id, "10.0.0.3", UA).is_some());
    assert!(sessions.validate_session(&id, "10.0.0.4", UA).is_none());
    assert_eq!(sessions.stats().total_invalidated, 1);
    assert_eq!(InvalidationReason::IpChurn.as_str(), "ip_churn");
    Ok(())
}

#[test]
fn test_logout_everywhere() -> Result<()> {
    let t = TestStratum::start()?;
    let sessions = t.stratum.sessions();
    let ids: Vec<String> = (0..3).map(|_| t.login("u1")).collect();
    let other = t.login("u2");

    assert_eq!(sessions.invalidate_all_user_sessions("u1"), 3);
    assert!(ids.iter().all(|id| sessions.session(id).is_none()));
    assert!(sessions.session(&other).is_some());
    assert!(sessions.device("fp-1").is_some());

    let stats = sessions.stats();
    assert_eq!(stats.total_active_sessions, 1);
    assert_eq!(stats.total_active_users, 1);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Maintenance
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_maintenance_sweeps_on_schedule() -> Result<()> {
    let t = TestStratum::from_toml(
        r#"
[maintenance]
cache_cleanup_interval_secs = 10
session_cleanup_interval_secs = 10
security_scan_interval_secs = 10
"#,
    )?;
    let id = t.login("u1");
    t.stratum.cache().put("catalog:1", 1u32, Some(Duration::from_secs(5)));

    let handle = t
        .stratum
        .start_maintenance()
        .ok_or_else(|| anyhow::anyhow!("maintenance disabled"))?;

    t.advance(Duration::from_secs(3 * 60 * 60));
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert!(t.stratum.sessions().session(&id).is_none());
    assert!(t.stratum.cache().is_empty());

    handle.shutdown().await;
    Ok(())
}
