use crate::error::{Error, ErrorKind};
use crate::plan::{Follow, Identity, Message, Plan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Every plan we know about: our own, plus the last fetched copy of each
/// followee's.
///
/// Our own plan is held apart from the others so it always exists. Only it
/// is changed by local actions; the others are replaced whole by fetches.
#[derive(Clone, Debug, PartialEq)]
pub struct Cache {
    me: String,
    local: Plan,
    remote: BTreeMap<String, Plan>,
}

// On-disk layout: `{ "me": ..., "plans": { address: plan, ... } }`
#[derive(Deserialize)]
struct CacheFile {
    me: String,
    plans: BTreeMap<String, Plan>,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    me: &'a str,
    plans: BTreeMap<&'a str, &'a Plan>,
}

impl Cache {
    /// A fresh cache holding only the new local identity
    pub fn new(identity: Identity) -> Cache {
        Cache {
            me: identity.address.clone(),
            local: Plan::new(identity),
            remote: BTreeMap::new(),
        }
    }

    /// Load the cache file. Returns None if there is no cache file yet.
    pub fn load(path: &Path) -> Result<Option<Cache>, Error> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let file: CacheFile = serde_json::from_str(&contents)?;
        Ok(Some(Cache::try_from(file)?))
    }

    /// Overwrite the cache file with the whole cache. The new contents are
    /// written beside it and renamed into place.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        write_json(path, &self.as_file())
    }

    /// Write the local plan alone, where the finger daemon will find it
    pub fn publish(&self, path: &Path) -> Result<(), Error> {
        write_json(path, &self.local)
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    pub fn local_plan(&self) -> &Plan {
        &self.local
    }

    pub fn plan(&self, address: &str) -> Option<&Plan> {
        if address == self.me {
            Some(&self.local)
        } else {
            self.remote.get(address)
        }
    }

    /// All plans, ours included, in address order
    pub fn plans(&self) -> BTreeMap<&str, &Plan> {
        let mut plans: BTreeMap<&str, &Plan> =
            self.remote.iter().map(|(a, p)| (a.as_str(), p)).collect();
        plans.insert(self.me.as_str(), &self.local);
        plans
    }

    /// Store a freshly fetched plan, replacing whatever we had for that
    /// address. Our own entry is never replaced this way.
    pub fn replace_plan(&mut self, address: &str, plan: Plan) -> bool {
        if address == self.me {
            tracing::warn!("Refusing to overwrite own plan with a fetched copy");
            return false;
        }
        self.remote.insert(address.to_owned(), plan);
        true
    }

    /// Add someone to our follow list. With `allow_duplicates` an address
    /// may appear more than once; without it an existing entry just gets
    /// the new nick.
    pub fn follow(&mut self, nick: &str, address: &str, allow_duplicates: bool) {
        if !allow_duplicates {
            if let Some(existing) = self
                .local
                .following
                .iter_mut()
                .find(|f| f.address == address)
            {
                existing.nick = Some(nick.to_owned());
                return;
            }
        }
        self.local.following.push(Follow::new(nick, address));
    }

    /// Remove every follow entry for the address. Returns how many went.
    pub fn unfollow(&mut self, address: &str) -> usize {
        let before = self.local.following.len();
        self.local.following.retain(|f| f.address != address);
        before - self.local.following.len()
    }

    pub fn post(&mut self, message: Message) {
        self.local.messages.push(message);
    }

    /// Every message from every plan, oldest first
    pub fn timeline(&self) -> Vec<TimelineEntry<'_>> {
        let mut entries: Vec<TimelineEntry<'_>> = self
            .plans()
            .into_iter()
            .flat_map(|(address, plan)| {
                plan.messages
                    .iter()
                    .map(move |message| TimelineEntry { address, message })
            })
            .collect();

        // stable, so equal times keep address then posting order
        entries.sort_by(|a, b| a.message.time.cmp(&b.message.time));
        entries
    }

    fn as_file(&self) -> CacheFileRef<'_> {
        CacheFileRef {
            me: &self.me,
            plans: self.plans(),
        }
    }
}

impl TryFrom<CacheFile> for Cache {
    type Error = Error;

    fn try_from(mut file: CacheFile) -> Result<Cache, Error> {
        let local = match file.plans.remove(&file.me) {
            Some(plan) => plan,
            None => return Err(ErrorKind::CacheMissingIdentity(file.me).into()),
        };
        Ok(Cache {
            me: file.me,
            local,
            remote: file.plans,
        })
    }
}

/// A message along with the address it came from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineEntry<'a> {
    pub address: &'a str,
    pub message: &'a Message,
}

impl fmt::Display for TimelineEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}\n{}\n",
            self.message.display_time(),
            self.address,
            self.message.text
        )
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Cache {
        Cache::new(Identity {
            address: "alice@host1".to_owned(),
            name: "Alice".to_owned(),
            bio: "Just alice".to_owned(),
            website: "https://host1".to_owned(),
            mobile: String::new(),
            email: "alice@host1".to_owned(),
        })
    }

    fn message(time: &str, text: &str) -> Message {
        Message {
            time: time.to_owned(),
            text: text.to_owned(),
        }
    }

    #[test]
    fn test_new_cache_has_identity() {
        let cache = alice();
        assert_eq!(cache.me(), "alice@host1");
        assert_eq!(cache.local_plan().name, "Alice");
        assert_eq!(cache.plans().len(), 1);
        assert!(cache.plan("alice@host1").is_some());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data1.jsn");

        let mut cache = alice();
        cache.follow("bob", "bob@host2", true);
        cache.post(message("20230101000000", "first"));
        let mut bob = Plan::default();
        bob.address = "bob@host2".to_owned();
        bob.messages.push(message("20230102000000", "hi"));
        cache.replace_plan("bob@host2", bob);
        cache.save(&path).unwrap();

        let loaded = Cache::load(&path).unwrap().unwrap();
        assert_eq!(loaded, cache);
        assert!(!dir.path().join("data1.jsn.tmp").exists());
    }

    #[test]
    fn test_saved_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data1.jsn");
        alice().save(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n  \"me\": \"alice@host1\""));
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["plans"]["alice@host1"]["properties"]["website"], "https://host1");
        assert!(value["plans"]["alice@host1"]["messages"].is_array());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Cache::load(&dir.path().join("nope.jsn")).unwrap().is_none());
    }

    #[test]
    fn test_load_without_own_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data1.jsn");
        fs::write(&path, r#"{"me": "alice@host1", "plans": {"bob@host2": {}}}"#).unwrap();
        let e = Cache::load(&path).unwrap_err();
        assert!(matches!(e.kind, ErrorKind::CacheMissingIdentity(_)));
    }

    #[test]
    fn test_publish_writes_local_plan_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".plan");
        let mut cache = alice();
        cache.replace_plan("bob@host2", Plan::default());
        cache.publish(&path).unwrap();

        let plan: Plan = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(&plan, cache.local_plan());
    }

    #[test]
    fn test_follow_unfollow_round_trip() {
        let mut cache = alice();
        cache.follow("carol", "carol@host3", true);
        let before = cache.local_plan().following.clone();

        cache.follow("bob", "bob@host2", true);
        assert_eq!(cache.local_plan().following.len(), 2);
        assert_eq!(cache.unfollow("bob@host2"), 1);
        assert_eq!(cache.local_plan().following, before);
    }

    #[test]
    fn test_duplicate_follows() {
        let mut cache = alice();
        cache.follow("bob", "bob@host2", true);
        cache.follow("bobby", "bob@host2", true);
        assert_eq!(cache.local_plan().following.len(), 2);
        assert_eq!(cache.unfollow("bob@host2"), 2);
        assert!(cache.local_plan().following.is_empty());

        cache.follow("bob", "bob@host2", false);
        cache.follow("bobby", "bob@host2", false);
        assert_eq!(
            cache.local_plan().following,
            vec![Follow::new("bobby", "bob@host2")]
        );
    }

    #[test]
    fn test_replace_never_touches_own_plan() {
        let mut cache = alice();
        assert!(!cache.replace_plan("alice@host1", Plan::default()));
        assert_eq!(cache.local_plan().name, "Alice");
    }

    #[test]
    fn test_timeline_ordering() {
        let mut cache = alice();
        let mut zed = Plan::default();
        zed.messages.push(message("20230101000000", "earlier"));
        let mut bob = Plan::default();
        bob.messages.push(message("20230102000000", "later"));
        // zed sorts after bob by address, but posted earlier
        cache.replace_plan("zed@host9", zed);
        cache.replace_plan("bob@host2", bob);
        cache.post(message("20221231235959", "mine"));

        let timeline = cache.timeline();
        let texts: Vec<&str> = timeline.iter().map(|e| e.message.text.as_str()).collect();
        assert_eq!(texts, vec!["mine", "earlier", "later"]);
        assert_eq!(timeline[1].address, "zed@host9");
        assert_eq!(timeline[2].address, "bob@host2");

        // reading it again changes nothing
        assert_eq!(cache.timeline(), timeline);
    }

    #[test]
    fn test_timeline_entry_display() {
        let m = message("20230101120000", "hi");
        let entry = TimelineEntry {
            address: "bob@host2",
            message: &m,
        };
        assert_eq!(entry.to_string(), "2023-01-01 12:00:00  bob@host2\nhi\n");
    }
}
