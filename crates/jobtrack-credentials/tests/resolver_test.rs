use async_trait::async_trait;
use jobtrack_core::{CredentialRef, TenantId};
use jobtrack_credentials::{
    CredentialCacheStore, CredentialError, CredentialResolver, LoginAttempt, MemoryCacheStore,
    TenantCredentialCacheEntry,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted login: records every attempt, accepts a fixed set per tenant.
#[derive(Default)]
struct ScriptedLogin {
    accepted: Mutex<HashMap<String, HashSet<String>>>,
    attempts: Mutex<Vec<(String, String)>>,
    delay: HashMap<String, Duration>,
}

impl ScriptedLogin {
    fn accepting(tenant: &str, credentials: &[&str]) -> Self {
        let login = Self::default();
        login.set_accepted(tenant, credentials);
        login
    }

    fn set_accepted(&self, tenant: &str, credentials: &[&str]) {
        self.accepted.lock().unwrap().insert(
            tenant.to_string(),
            credentials.iter().map(|c| (*c).to_string()).collect(),
        );
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn clear(&self) {
        self.attempts.lock().unwrap().clear();
    }
}

#[async_trait]
impl LoginAttempt for ScriptedLogin {
    async fn attempt(&self, tenant: &TenantId, credential: &CredentialRef) -> bool {
        self.attempts
            .lock()
            .unwrap()
            .push((tenant.to_string(), credential.to_string()));
        if let Some(delay) = self.delay.get(tenant.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        self.accepted
            .lock()
            .unwrap()
            .get(tenant.as_str())
            .is_some_and(|ok| ok.contains(credential.as_str()))
    }
}

/// Store whose writes always fail.
struct BrokenStore;

#[async_trait]
impl CredentialCacheStore for BrokenStore {
    async fn load(
        &self,
        _tenant: &TenantId,
    ) -> jobtrack_credentials::Result<Option<TenantCredentialCacheEntry>> {
        Err(CredentialError::Store("disk on fire".into()))
    }

    async fn upsert(&self, _entry: &TenantCredentialCacheEntry) -> jobtrack_credentials::Result<()> {
        Err(CredentialError::Store("disk on fire".into()))
    }

    async fn remove(&self, _tenant: &TenantId) -> jobtrack_credentials::Result<()> {
        Err(CredentialError::Store("disk on fire".into()))
    }

    async fn list(&self) -> jobtrack_credentials::Result<Vec<TenantCredentialCacheEntry>> {
        Ok(vec![])
    }
}

fn tenant(name: &str) -> TenantId {
    TenantId::new(name).expect("valid tenant")
}

fn refs(names: &[&str]) -> Vec<CredentialRef> {
    names
        .iter()
        .map(|n| CredentialRef::new(*n).expect("valid ref"))
        .collect()
}

#[tokio::test]
async fn test_second_password_is_remembered() {
    let store = Arc::new(MemoryCacheStore::new());
    let resolver = CredentialResolver::new(store.clone());
    let acme = tenant("acme");
    let login = ScriptedLogin::accepting("acme", &["p2"]);

    let first = resolver
        .resolve(&acme, &refs(&["p1", "p2"]), &login)
        .await
        .expect("resolve");
    assert_eq!(first.as_str(), "p2");
    assert_eq!(login.attempts(), vec!["p1", "p2"]);

    login.clear();
    let second = resolver
        .resolve(&acme, &refs(&["p1", "p2"]), &login)
        .await
        .expect("resolve");
    assert_eq!(second.as_str(), "p2");
    assert_eq!(login.attempts(), vec!["p2"], "p1 must not be retried");
}

#[tokio::test]
async fn test_cached_winner_is_tried_first() {
    let resolver = CredentialResolver::new(Arc::new(MemoryCacheStore::new()));
    let acme = tenant("acme");
    let login = ScriptedLogin::accepting("acme", &["c2"]);
    let candidates = refs(&["c1", "c2", "c3"]);

    resolver.resolve(&acme, &candidates, &login).await.expect("resolve");
    login.clear();
    resolver.resolve(&acme, &candidates, &login).await.expect("resolve");

    assert_eq!(login.attempts().first().map(String::as_str), Some("c2"));
}

#[tokio::test]
async fn test_cached_failure_falls_back_without_retrying_it() {
    let store = Arc::new(MemoryCacheStore::new());
    let resolver = CredentialResolver::new(store.clone());
    let acme = tenant("acme");
    let login = ScriptedLogin::accepting("acme", &["p1"]);

    resolver
        .resolve(&acme, &refs(&["p1", "p2"]), &login)
        .await
        .expect("resolve");

    // The tenant rotates its password: p1 stops working, p2 starts.
    login.set_accepted("acme", &["p2"]);
    login.clear();

    let winner = resolver
        .resolve(&acme, &refs(&["p1", "p2"]), &login)
        .await
        .expect("resolve");
    assert_eq!(winner.as_str(), "p2");
    assert_eq!(login.attempts(), vec!["p1", "p2"], "p1 tried once, as the cached entry");

    let entry = store.load(&acme).await.expect("load").expect("entry");
    assert_eq!(entry.credential_ref.as_str(), "p2");
    assert_eq!(entry.consecutive_failures, 0);
}

#[tokio::test]
async fn test_eviction_after_threshold() {
    let store = Arc::new(MemoryCacheStore::new());
    let resolver = CredentialResolver::new(store.clone()).with_failure_threshold(2);
    let acme = tenant("acme");
    let candidates = refs(&["p1", "p2"]);
    let login = ScriptedLogin::accepting("acme", &["p2"]);

    resolver.resolve(&acme, &candidates, &login).await.expect("resolve");

    // Nothing works for a while; the cached entry accumulates failures.
    login.set_accepted("acme", &[]);
    for expected_failures in 1..=2 {
        let result = resolver.resolve(&acme, &candidates, &login).await;
        assert!(matches!(result, Err(CredentialError::AuthExhausted { .. })));
        let entry = store.load(&acme).await.expect("load").expect("entry kept");
        assert_eq!(entry.consecutive_failures, expected_failures);
    }

    // Third failure exceeds the threshold and evicts.
    let result = resolver.resolve(&acme, &candidates, &login).await;
    assert!(result.is_err());
    assert!(store.load(&acme).await.expect("load").is_none());

    // With the entry gone the full list runs in order.
    login.set_accepted("acme", &["p2"]);
    login.clear();
    resolver.resolve(&acme, &candidates, &login).await.expect("resolve");
    assert_eq!(login.attempts(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_invalidated_entry_on_load_is_skipped() {
    let store = Arc::new(MemoryCacheStore::new());
    let acme = tenant("acme");
    let mut stale = TenantCredentialCacheEntry::verified(acme.clone(), refs(&["p9"]).remove(0));
    stale.consecutive_failures = 10;
    store.upsert(&stale).await.expect("seed");

    let resolver = CredentialResolver::new(store.clone()).with_failure_threshold(3);
    let login = ScriptedLogin::accepting("acme", &["p1", "p9"]);

    let winner = resolver
        .resolve(&acme, &refs(&["p1", "p2"]), &login)
        .await
        .expect("resolve");
    assert_eq!(winner.as_str(), "p1");
    assert_eq!(login.attempts(), vec!["p1"], "stale p9 never attempted");
}

#[tokio::test]
async fn test_store_failures_do_not_fail_resolution() {
    let resolver = CredentialResolver::new(Arc::new(BrokenStore));
    let acme = tenant("acme");
    let login = ScriptedLogin::accepting("acme", &["p1"]);

    let winner = resolver
        .resolve(&acme, &refs(&["p1"]), &login)
        .await
        .expect("resolution survives store errors");
    assert_eq!(winner.as_str(), "p1");
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_login_counts_as_failure() {
    let mut login = ScriptedLogin::accepting("slow", &["p1", "p2"]);
    login.delay.insert("slow".into(), Duration::from_secs(120));

    let resolver = CredentialResolver::new(Arc::new(MemoryCacheStore::new()))
        .with_login_timeout(Duration::from_secs(5));

    let result = resolver.resolve(&tenant("slow"), &refs(&["p1", "p2"]), &login).await;
    assert!(matches!(result, Err(CredentialError::AuthExhausted { .. })));
    assert_eq!(login.attempts(), vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_same_tenant_is_single_flight() {
    let resolver = CredentialResolver::new(Arc::new(MemoryCacheStore::new()));
    let acme = tenant("acme");
    let login = ScriptedLogin::accepting("acme", &["p2"]);
    let candidates = refs(&["p1", "p2"]);

    let (a, b) = tokio::join!(
        resolver.resolve(&acme, &candidates, &login),
        resolver.resolve(&acme, &candidates, &login),
    );
    assert_eq!(a.expect("first").as_str(), "p2");
    assert_eq!(b.expect("second").as_str(), "p2");

    // The second call waits for the first and then reuses its result.
    assert_eq!(login.attempts(), vec!["p1", "p2", "p2"]);
}

#[tokio::test(start_paused = true)]
async fn test_tenants_resolve_independently() {
    let mut login = ScriptedLogin::accepting("slow", &["p1"]);
    login.set_accepted("fast", &["p1"]);
    login.delay.insert("slow".into(), Duration::from_secs(10));

    let resolver = CredentialResolver::new(Arc::new(MemoryCacheStore::new()));
    let finished = Mutex::new(Vec::new());
    let candidates = refs(&["p1"]);

    let run = |name: &'static str| {
        let resolver = &resolver;
        let login = &login;
        let finished = &finished;
        let candidates = &candidates;
        async move {
            resolver
                .resolve(&tenant(name), candidates, login)
                .await
                .expect("resolve");
            finished.lock().unwrap().push(name);
        }
    };

    tokio::join!(run("slow"), run("fast"));
    assert_eq!(*finished.lock().unwrap(), vec!["fast", "slow"]);
}
