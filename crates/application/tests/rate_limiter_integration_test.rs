use std::sync::{Arc, Mutex};
use std::time::Duration;

use application::{
    LimiterDirectory, LimiterError, LimiterRegistry, RateLimitSettings, RateLimiterClient,
    SystemClock,
};
use domain::Identity;

fn registry(cooldown_period: f64, grace_period: f64) -> Arc<LimiterRegistry> {
    Arc::new(LimiterRegistry::new(
        RateLimitSettings {
            cooldown_period,
            grace_period,
            ..RateLimitSettings::default()
        },
        Arc::new(SystemClock),
    ))
}

fn client(
    directory: Arc<dyn LimiterDirectory>,
    identity: &str,
) -> (RateLimiterClient, Arc<Mutex<Vec<LimiterError>>>) {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    let client = RateLimiterClient::new(
        Identity::parse(identity).unwrap(),
        directory,
        Arc::new(move |err: LimiterError| sink.lock().unwrap().push(err)),
    );
    (client, reported)
}

#[tokio::test]
async fn client_against_local_registry_recovers_after_cooldown() {
    let registry = registry(0.05, 0.0);
    let (client, reported) = client(registry.clone(), "203.0.113.50");

    assert!(client.check_limit());
    assert!(!client.check_limit());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(client.check_limit());
    assert!(reported.lock().unwrap().is_empty());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn clients_of_one_identity_share_a_counter() {
    let registry = registry(5.0, 20.0);
    let identity = Identity::parse("203.0.113.51").unwrap();

    for _ in 0..3 {
        let (client, _) = client(registry.clone(), identity.as_str());
        assert!(client.check_limit());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // 三次检查消耗了 15 秒宽限中的额度，第五次开始超出
    assert_eq!(registry.check(&identity).await.unwrap(), 0.0);
    assert!(registry.check(&identity).await.unwrap() > 0.0);
}
