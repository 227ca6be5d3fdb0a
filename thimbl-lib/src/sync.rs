use crate::cache::Cache;
use crate::error::Error;
use crate::plan::Plan;
use async_trait::async_trait;

/// Something that can finger an address and hand back the raw response
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<String, Error>;
}

/// What happened during a fetch pass
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Followees whose plan was replaced, in follow list order
    pub fetched: Vec<String>,

    /// Followees that could not be fetched, and why
    pub skipped: Vec<(String, Error)>,

    /// How many times our own address turned up in our follow list
    pub self_skips: usize,
}

/// Finger one address and pull the plan out of the response
pub async fn fetch_plan<S>(
    source: &S,
    address: &str,
    max_plan_bytes: usize,
) -> Result<Plan, Error>
where
    S: PlanSource + ?Sized,
{
    let response = source.fetch(address).await?;
    Plan::from_finger_response(&response, max_plan_bytes)
}

/// Refresh the cached plan of everyone we follow.
///
/// Followees are fingered one at a time in follow list order. A failure for
/// one of them is recorded in the report and the pass moves on.
pub async fn fetch_all<S>(cache: &mut Cache, source: &S, max_plan_bytes: usize) -> FetchReport
where
    S: PlanSource + ?Sized,
{
    let mut report = FetchReport::default();

    let followees: Vec<String> = cache
        .local_plan()
        .following
        .iter()
        .map(|f| f.address.clone())
        .collect();

    for address in followees {
        if address == cache.me() {
            tracing::info!("Not fingering own address {}", address);
            report.self_skips += 1;
            continue;
        }

        tracing::info!("Fingering {}", address);
        match fetch_plan(source, &address, max_plan_bytes).await {
            Ok(plan) => {
                tracing::debug!("{} has {} messages", address, plan.messages.len());
                cache.replace_plan(&address, plan);
                report.fetched.push(address);
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}, skipping: {}", address, e);
                report.skipped.push((address, e));
            }
        }
    }

    report
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::plan::Identity;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned finger responses, keyed by address. Addresses without a
    /// response fail as if the host refused the connection.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub responses: HashMap<String, String>,
        pub requested: Mutex<Vec<String>>,
    }

    impl StubSource {
        pub fn with(mut self, address: &str, response: &str) -> StubSource {
            self.responses
                .insert(address.to_owned(), response.to_owned());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlanSource for StubSource {
        async fn fetch(&self, address: &str) -> Result<String, Error> {
            self.requested.lock().unwrap().push(address.to_owned());
            match self.responses.get(address) {
                Some(response) => Ok(response.clone()),
                None => Err(ErrorKind::Connect(
                    address.to_owned(),
                    std::io::ErrorKind::ConnectionRefused.into(),
                )
                .into()),
            }
        }
    }

    pub(crate) const BOB_RESPONSE: &str = "You fingered the user 'bob'\nPlan:\n{\"address\":\"bob@host2\",\"name\":\"Bob\",\"messages\":[{\"time\":\"20230101120000\",\"text\":\"hi\"}],\"replies\":{},\"following\":[],\"properties\":{}}";

    pub(crate) fn alice() -> Cache {
        Cache::new(Identity {
            address: "alice@host1".to_owned(),
            name: "Alice".to_owned(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_fetch_follows_and_prints() {
        let mut cache = alice();
        cache.follow("bob", "bob@host2", true);
        let source = StubSource::default().with("bob@host2", BOB_RESPONSE);

        let report = fetch_all(&mut cache, &source, 4096).await;
        assert_eq!(report.fetched, vec!["bob@host2".to_owned()]);
        assert!(report.skipped.is_empty());

        let bob = cache.plan("bob@host2").unwrap();
        assert_eq!(bob.messages.len(), 1);
        assert_eq!(bob.messages[0].text, "hi");

        let timeline = cache.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(
            timeline[0].to_string(),
            "2023-01-01 12:00:00  bob@host2\nhi\n"
        );
    }

    #[tokio::test]
    async fn test_own_address_is_not_fingered() {
        let mut cache = alice();
        cache.follow("me", "alice@host1", true);
        let before = cache.clone();
        let source = StubSource::default();

        let report = fetch_all(&mut cache, &source, 4096).await;
        assert_eq!(report.self_skips, 1);
        assert!(source.requested().is_empty());
        assert_eq!(cache, before);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_pass() {
        let mut cache = alice();
        cache.follow("down", "down@nowhere", true);
        cache.follow("junk", "junk@host5", true);
        cache.follow("nomarker", "plain@host6", true);
        cache.follow("bob", "bob@host2", true);
        let source = StubSource::default()
            .with("junk@host5", "Plan:\n{not json")
            .with("plain@host6", "Login: plain\nNo Plan.\n")
            .with("bob@host2", BOB_RESPONSE);

        let report = fetch_all(&mut cache, &source, 4096).await;
        assert_eq!(
            source.requested(),
            vec!["down@nowhere", "junk@host5", "plain@host6", "bob@host2"]
        );
        assert_eq!(report.fetched, vec!["bob@host2".to_owned()]);
        assert_eq!(report.skipped.len(), 3);
        assert!(report.skipped[0].1.is_transport());
        assert!(report.skipped[1].1.is_malformed_plan());
        assert!(report.skipped[2].1.is_malformed_plan());
        assert!(cache.plan("junk@host5").is_none());
        assert!(cache.plan("bob@host2").is_some());
    }

    #[tokio::test]
    async fn test_fetch_replaces_wholesale() {
        let mut cache = alice();
        cache.follow("bob", "bob@host2", true);
        let mut stale = Plan::default();
        stale.bio = "old bio".to_owned();
        stale.properties.insert("email".to_owned(), "bob@old".to_owned());
        cache.replace_plan("bob@host2", stale);

        let source = StubSource::default().with("bob@host2", BOB_RESPONSE);
        fetch_all(&mut cache, &source, 4096).await;

        let bob = cache.plan("bob@host2").unwrap();
        assert_eq!(bob.bio, "");
        assert!(bob.properties.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_plan_respects_size_bound() {
        let source = StubSource::default().with("bob@host2", BOB_RESPONSE);
        let e = fetch_plan(&source, "bob@host2", 10).await.unwrap_err();
        assert!(matches!(e.kind, ErrorKind::PlanTooLarge(_)));
    }
}
