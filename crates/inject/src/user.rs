//! Host user resolution
//!
//! Resolves a configured user (name, uid, or `uid:gid`) against the
//! host's passwd database so the injector can rewrite the container's
//! user to a concrete `uid:gid` and optionally set `HOME`.

use devlease_errors::{Error, InjectError};
use std::path::Path;
use tracing::debug;

const PASSWD_PATH: &str = "/etc/passwd";

/// A user resolved against the passwd database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
}

impl ResolvedUser {
    /// The `uid:gid` form used in container user fields.
    #[must_use]
    pub fn as_user_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

/// Strip a `:gid` suffix, leaving the name-or-uid part.
#[must_use]
pub fn split_uid(user: &str) -> &str {
    match user.split_once(':') {
        Some((uid, _)) => uid,
        None => user,
    }
}

/// Resolve `user` (name, uid, or `uid:gid`) against `/etc/passwd`.
///
/// # Errors
///
/// Returns `InjectError::UnknownUser` when the user does not exist and
/// an internal error when the passwd database cannot be read.
pub fn resolve_user(user: &str) -> Result<ResolvedUser, Error> {
    resolve_user_in(Path::new(PASSWD_PATH), user)
}

/// Resolve against an explicit passwd file. Split out for tests and
/// embedders with a non-standard database path.
///
/// # Errors
///
/// Same conditions as [`resolve_user`].
pub fn resolve_user_in(passwd: &Path, user: &str) -> Result<ResolvedUser, Error> {
    let wanted = split_uid(user);
    let wanted_uid: Option<u32> = wanted.parse().ok();

    let content = std::fs::read_to_string(passwd)
        .map_err(|e| Error::internal(format!("cannot read {}: {e}", passwd.display())))?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // name:password:uid:gid:gecos:home:shell
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            continue;
        }
        let (Ok(uid), Ok(gid)) = (fields[2].parse::<u32>(), fields[3].parse::<u32>()) else {
            continue;
        };
        let matched = match wanted_uid {
            Some(wanted_uid) => uid == wanted_uid,
            None => fields[0] == wanted,
        };
        if matched {
            debug!(user = wanted, uid, gid, home = fields[5], "resolved user");
            return Ok(ResolvedUser {
                name: fields[0].to_string(),
                uid,
                gid,
                home: fields[5].to_string(),
            });
        }
    }

    Err(InjectError::UnknownUser {
        user: user.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn passwd_fixture() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "root:x:0:0:root:/root:/bin/bash").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "svc:x:1042:1042:service user:/home/svc:/bin/sh").unwrap();
        writeln!(file, "broken:line").unwrap();
        file
    }

    #[test]
    fn split_uid_strips_gid() {
        assert_eq!(split_uid("1000:1000"), "1000");
        assert_eq!(split_uid("alice"), "alice");
        assert_eq!(split_uid("alice:staff"), "alice");
    }

    #[test]
    fn resolve_by_name() {
        let file = passwd_fixture();
        let user = resolve_user_in(file.path(), "svc").unwrap();
        assert_eq!(user.uid, 1042);
        assert_eq!(user.gid, 1042);
        assert_eq!(user.home, "/home/svc");
        assert_eq!(user.as_user_spec(), "1042:1042");
    }

    #[test]
    fn resolve_by_uid_with_gid_suffix() {
        let file = passwd_fixture();
        let user = resolve_user_in(file.path(), "1042:1042").unwrap();
        assert_eq!(user.name, "svc");
    }

    #[test]
    fn unknown_user_errors() {
        let file = passwd_fixture();
        let err = resolve_user_in(file.path(), "nobody-here").unwrap_err();
        assert!(matches!(
            err,
            Error::Inject(InjectError::UnknownUser { .. })
        ));
    }
}
