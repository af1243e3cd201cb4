//! Cookie persistence for the logged-in KPI session.

use std::path::{Path, PathBuf};

use crate::types::{Cookie, ReportResult};

/// Reads and writes `cookies.json` and owns the browser profile next to it.
#[derive(Debug, Clone)]
pub struct CookieStore {
    cookie_file: PathBuf,
    profile_dir: PathBuf,
}

impl CookieStore {
    pub fn new(cookie_file: impl Into<PathBuf>, profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            cookie_file: cookie_file.into(),
            profile_dir: profile_dir.into(),
        }
    }

    pub fn cookie_file(&self) -> &Path {
        &self.cookie_file
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Whether a cookie file exists.
    pub fn has_cookies(&self) -> bool {
        self.cookie_file.is_file()
    }

    /// Write cookies as pretty JSON, owner-readable only on unix.
    pub fn save(&self, cookies: &[Cookie]) -> ReportResult<()> {
        if let Some(parent) = self.cookie_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(cookies)?;
        std::fs::write(&self.cookie_file, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.cookie_file, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(
            "Saved {} cookies to {}",
            cookies.len(),
            self.cookie_file.display()
        );
        Ok(())
    }

    /// Load saved cookies. A missing file is an empty list.
    pub fn load(&self) -> ReportResult<Vec<Cookie>> {
        match std::fs::read(&self.cookie_file) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the cookie file and the browser profile directory.
    pub fn clear(&self) -> ReportResult<()> {
        if self.has_cookies() {
            std::fs::remove_file(&self.cookie_file)?;
        }

        if self.profile_dir.is_dir() {
            std::fs::remove_dir_all(&self.profile_dir)?;
        }

        tracing::info!("Cleared saved cookies and browser profile");
        Ok(())
    }
}

/// Render cookies as a `Cookie` request header value.
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: "kpi.drojian.dev".to_string(),
            path: "/".to_string(),
        }
    }

    fn store(dir: &tempfile::TempDir) -> CookieStore {
        CookieStore::new(
            dir.path().join("data/cookies.json"),
            dir.path().join("data/browser_profile"),
        )
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(!store.has_cookies());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let cookies = vec![cookie("_identity", "abc"), cookie("PHPSESSID", "xyz")];

        store.save(&cookies).unwrap();
        assert!(store.has_cookies());
        assert_eq!(store.load().unwrap(), cookies);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.cookie_file()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_clear_removes_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save(&[cookie("a", "1")]).unwrap();
        std::fs::create_dir_all(store.profile_dir().join("Default")).unwrap();

        store.clear().unwrap();
        assert!(!store.has_cookies());
        assert!(!store.profile_dir().exists());

        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.cookie_file().parent().unwrap()).unwrap();
        std::fs::write(store.cookie_file(), b"not json").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_cookie_header() {
        let header = cookie_header(&[cookie("a", "1"), cookie("b", "2")]);
        assert_eq!(header, "a=1; b=2");
        assert_eq!(cookie_header(&[]), "");
    }
}
