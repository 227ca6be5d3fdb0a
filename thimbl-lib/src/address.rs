use crate::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

/// A finger address, `user@host`. The user part may be empty, in which case
/// the host alone is queried (RFC 742).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub user: String,
    pub host: String,
}

impl Address {
    pub fn new(user: &str, host: &str) -> Address {
        Address {
            user: user.to_owned(),
            host: host.to_owned(),
        }
    }

    /// Split a finger query that names several hosts (`user@host1@host2`)
    /// into one query per host. Queries with at most one `@` come back as-is.
    pub fn expand_hosts(query: &str) -> Vec<String> {
        let mut parts = query.split('@');
        let user = parts.next().unwrap_or("");
        let hosts: Vec<&str> = parts.collect();
        if hosts.len() < 2 {
            return vec![query.to_owned()];
        }
        hosts
            .iter()
            .map(|host| format!("{}@{}", user, host))
            .collect()
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Address, Error> {
        let parts: Vec<&str> = s.split('@').collect();
        let (user, host) = match parts.as_slice() {
            [host] => ("", *host),
            [user, host] => (*user, *host),
            _ => return Err(ErrorKind::InvalidAddress(s.to_owned()).into()),
        };
        if host.is_empty() {
            return Err(ErrorKind::InvalidAddress(s.to_owned()).into());
        }
        Ok(Address::new(user, host))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{}@{}", self.user, self.host)
        }
    }
}
