use crate::address::Address;
use crate::cache::Cache;
use crate::error::Error;
use crate::plan::{Identity, Message};
use crate::profile::Profile;
use crate::settings::Settings;
use crate::sync::{self, FetchReport, PlanSource};

/// The local user's cache, open for the duration of one command.
///
/// Every change is written to disk as it happens. `close()` saves once more
/// and publishes our plan for the finger daemon. If a session is dropped
/// without being closed (an early return on error) the same is done on drop.
pub struct Session {
    profile: Profile,
    settings: Settings,
    cache: Cache,
    closed: bool,
}

impl Session {
    /// Open the saved cache. Returns None if setup has never been run.
    pub fn open(profile: Profile, settings: Settings) -> Result<Option<Session>, Error> {
        let cache = match Cache::load(&profile.cache_file)? {
            Some(cache) => cache,
            None => return Ok(None),
        };
        Ok(Some(Session {
            profile,
            settings,
            cache,
            closed: false,
        }))
    }

    /// Start over with a new identity, replacing any saved cache
    pub fn create(
        profile: Profile,
        settings: Settings,
        identity: Identity,
    ) -> Result<Session, Error> {
        let _: Address = identity.address.parse()?;
        let session = Session {
            profile,
            settings,
            cache: Cache::new(identity),
            closed: false,
        };
        session.save()?;
        tracing::info!("Created cache for {}", session.cache.me());
        Ok(session)
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn post(&mut self, text: String) -> Result<(), Error> {
        let message = Message::now(text)?;
        self.cache.post(message);
        self.save()
    }

    pub fn follow(&mut self, nick: &str, address: &str) -> Result<(), Error> {
        let _: Address = address.parse()?;
        self.cache.follow(nick, address, self.settings.allow_duplicate_follows);
        self.save()
    }

    /// Returns how many follow entries were removed
    pub fn unfollow(&mut self, address: &str) -> Result<usize, Error> {
        let removed = self.cache.unfollow(address);
        self.save()?;
        Ok(removed)
    }

    /// Refresh every followee's plan, then save
    pub async fn fetch<S>(&mut self, source: &S) -> Result<FetchReport, Error>
    where
        S: PlanSource + ?Sized,
    {
        let report = sync::fetch_all(&mut self.cache, source, self.settings.max_plan_bytes).await;
        self.save()?;
        Ok(report)
    }

    pub fn save(&self) -> Result<(), Error> {
        self.cache.save(&self.profile.cache_file)
    }

    pub fn publish(&self) -> Result<(), Error> {
        self.cache.publish(&self.profile.plan_file)?;
        tracing::debug!("Published plan to {}", self.profile.plan_file.display());
        Ok(())
    }

    /// Save and publish. Call on every normal way out.
    pub fn close(mut self) -> Result<(), Error> {
        self.closed = true;
        self.save()?;
        self.publish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.save().and_then(|_| self.publish()) {
            tracing::error!("Could not save on exit: {}", e);
        }
    }
}
