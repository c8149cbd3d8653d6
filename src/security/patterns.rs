//! Pattern tables used by the command validator.
//!
//! A [`PatternSet`] is compiled once and shared (behind an `Arc`) between any
//! number of validators, so validators with different security levels can
//! coexist without touching process-wide state.
//!
//! # Classes
//!
//! - **essential**: rejected under every security level (delete root, raw disk
//!   overwrite, filesystem format, fork bomb)
//! - **safe**: known-good idioms, anchored to the whole command; a match skips
//!   every class below
//! - **dangerous**: destructive or sensitive operations (strict + moderate)
//! - **escape**: shell-escape tricks, the looser list used by moderate
//! - **subcommand**: nested command execution, rejected only by strict

use regex::Regex;

/// How a rule decides whether it matches.
#[derive(Debug)]
enum Matcher {
    Regex(Regex),
    /// `f(){ f|f& }` where all three names must be identical.
    ForkBomb(Regex),
}

/// A single named pattern.
#[derive(Debug)]
pub struct PatternRule {
    id: &'static str,
    reason: &'static str,
    matcher: Matcher,
}

impl PatternRule {
    pub fn new(id: &'static str, pattern: &str, reason: &'static str) -> Result<Self, regex::Error> {
        Ok(Self {
            id,
            reason,
            matcher: Matcher::Regex(Regex::new(pattern)?),
        })
    }

    fn fork_bomb() -> Result<Self, regex::Error> {
        Ok(Self {
            id: "fork-bomb",
            reason: "self-replicating function exhausts the process table",
            matcher: Matcher::ForkBomb(Regex::new(
                r"([\w:]+)\s*\(\s*\)\s*\{\s*([\w:]+)\s*\|\s*([\w:]+)\s*&",
            )?),
        })
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(re) => re.is_match(text),
            Matcher::ForkBomb(re) => re.captures_iter(text).any(|caps| {
                let name = caps.get(1).map(|m| m.as_str());
                name == caps.get(2).map(|m| m.as_str()) && name == caps.get(3).map(|m| m.as_str())
            }),
        }
    }
}

// Block devices that must never be written to directly.
const DISK_DEVICE: &str = r"/dev/(?:sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)";

// Option flags such as `-rf`, `--recursive`, `--no-preserve-root`.
const FLAGS: &str = r"(?:-{1,2}[\w-]+\s+)*";

// Tokens that end a path argument.
const PATH_END: &str = r"(?:\s|$|[;&|)])";

// A URL or path that cannot smuggle substitutions or chained commands.
const PLAIN_ARG: &str = r#"[^\s|;&$`()'"]+"#;

const SYSTEM_DIRS: &str =
    "bin|boot|dev|etc|home|lib|lib32|lib64|opt|proc|root|sbin|srv|sys|usr|var";

/// The full set of pattern classes consulted by a validator.
#[derive(Debug)]
pub struct PatternSet {
    essential: Vec<PatternRule>,
    safe: Vec<PatternRule>,
    dangerous: Vec<PatternRule>,
    escape: Vec<PatternRule>,
    subcommand: Vec<PatternRule>,
}

impl PatternSet {
    /// The built-in tables.
    pub fn builtin() -> Result<Self, regex::Error> {
        Ok(Self {
            essential: essential_rules()?,
            safe: safe_rules()?,
            dangerous: dangerous_rules()?,
            escape: escape_rules()?,
            subcommand: subcommand_rules()?,
        })
    }

    /// Add a site-specific idiom that bypasses the dangerous/escape/subcommand
    /// classes. The pattern should be anchored with `^...$`.
    pub fn with_safe_idiom(
        mut self,
        id: &'static str,
        pattern: &str,
        reason: &'static str,
    ) -> Result<Self, regex::Error> {
        self.safe.push(PatternRule::new(id, pattern, reason)?);
        Ok(self)
    }

    pub fn with_dangerous(
        mut self,
        id: &'static str,
        pattern: &str,
        reason: &'static str,
    ) -> Result<Self, regex::Error> {
        self.dangerous.push(PatternRule::new(id, pattern, reason)?);
        Ok(self)
    }

    pub fn essential_match(&self, command: &str) -> Option<&PatternRule> {
        first_match(&self.essential, command)
    }

    pub fn safe_match(&self, command: &str) -> Option<&PatternRule> {
        first_match(&self.safe, command)
    }

    pub fn dangerous_match(&self, command: &str) -> Option<&PatternRule> {
        first_match(&self.dangerous, command)
    }

    pub fn escape_match(&self, command: &str) -> Option<&PatternRule> {
        first_match(&self.escape, command)
    }

    pub fn subcommand_match(&self, command: &str) -> Option<&PatternRule> {
        first_match(&self.subcommand, command)
    }
}

fn first_match<'a>(rules: &'a [PatternRule], command: &str) -> Option<&'a PatternRule> {
    rules.iter().find(|rule| rule.is_match(command))
}

fn essential_rules() -> Result<Vec<PatternRule>, regex::Error> {
    Ok(vec![
        PatternRule::new(
            "delete-root",
            &format!(
                r#"(?i)\brm\s+{FLAGS}["']?(?:/(?:\.?/?|\*)|/(?:{SYSTEM_DIRS})/?\*?)["']?{PATH_END}"#
            ),
            "deletes the filesystem root or a system directory",
        )?,
        PatternRule::new(
            "disk-overwrite",
            &format!(r"(?i)\bdd\b[^|;&]*\bof=\s*{DISK_DEVICE}"),
            "dd writes directly to a block device",
        )?,
        PatternRule::new(
            "filesystem-format",
            r"(?i)\b(?:mkfs(?:\.[a-z0-9]+)?|mke2fs|mkswap)\b",
            "formats a filesystem",
        )?,
        PatternRule::fork_bomb()?,
    ])
}

fn safe_rules() -> Result<Vec<PatternRule>, regex::Error> {
    Ok(vec![
        PatternRule::new(
            "curl-apt-key",
            &format!(r"^curl\s+{FLAGS}https://{PLAIN_ARG}\s*\|\s*(?:sudo\s+)?apt-key\s+add\s+-$"),
            "imports a repository signing key",
        )?,
        PatternRule::new(
            "curl-gpg-dearmor",
            &format!(
                r"^curl\s+{FLAGS}https://{PLAIN_ARG}\s*\|\s*(?:sudo\s+)?gpg\s+--dearmor\s+(?:--yes\s+)?-o\s+{PLAIN_ARG}$"
            ),
            "dearmors a repository signing key into a keyring",
        )?,
        PatternRule::new(
            "os-release",
            r#"^bash\s+-c\s+'\.\s+/etc/os-release\s*&&\s*echo\s+"?\$\{?[A-Za-z_]+\}?"?'$"#,
            "reads a field from /etc/os-release",
        )?,
        PatternRule::new(
            "dev-null-redirect",
            r"^(?:command\s+-v|which|type|hash)\s+[\w.+-]+\s*[12]?>>?\s*/dev/null(?:\s+2>&1|\s+2>\s*/dev/null)?$",
            "looks up an installed command quietly",
        )?,
        PatternRule::new(
            "mise-activate",
            r#"^echo\s+'eval "\$\((?:~/\.local/bin/)?mise activate (?:bash|zsh|fish)\)"'\s*>>\s*~/\.(?:bashrc|zshrc|config/fish/config\.fish)$"#,
            "adds mise activation to the shell rc file",
        )?,
        PatternRule::new(
            "mise-path",
            r#"^echo\s+'export PATH="\$HOME/\.local/(?:share/mise/shims|bin):\$PATH"'\s*>>\s*~/\.(?:bashrc|zshrc|profile)$"#,
            "adds mise shims to PATH",
        )?,
        PatternRule::new(
            "apt-source-tee",
            r#"^echo\s+(?:"[^"$`]*"|'[^']*')\s*\|\s*sudo\s+tee\s+(?:-a\s+)?/etc/apt/sources\.list\.d/[\w.-]+\.list(?:\s*>\s*/dev/null)?$"#,
            "writes an apt source list entry",
        )?,
    ])
}

fn dangerous_rules() -> Result<Vec<PatternRule>, regex::Error> {
    Ok(vec![
        PatternRule::new(
            "delete-home",
            &format!(r"\brm\s+{FLAGS}(?:~|\$HOME|\$\{{HOME\}})/?\*?{PATH_END}"),
            "deletes the home directory",
        )?,
        PatternRule::new(
            "chmod-system",
            &format!(
                r"\bchmod\s+{FLAGS}(?:[0-7]?777|a\+rwx|[ug]?\+s)\s+/(?:$|\s|(?:bin|boot|etc|lib|sbin|usr)\b)"
            ),
            "opens up permissions on a system path",
        )?,
        PatternRule::new(
            "chown-root",
            &format!(r"\bchown\s+{FLAGS}-[a-zA-Z]*R[a-zA-Z]*\s+{FLAGS}\S+\s+/{PATH_END}"),
            "recursively changes ownership of the filesystem root",
        )?,
        PatternRule::new(
            "device-write",
            &format!(r">\s*{DISK_DEVICE}"),
            "redirects output onto a block device",
        )?,
        PatternRule::new(
            "device-wipe",
            r"\b(?:shred|wipefs|blkdiscard)\b[^|;&]*/dev/",
            "wipes a block device",
        )?,
        PatternRule::new(
            "sensitive-read",
            r"/etc/(?:shadow|gshadow|sudoers)\b|~/\.ssh/id_[\w-]+|\.aws/credentials|\.gnupg/private-keys",
            "touches credential or privilege files",
        )?,
        PatternRule::new(
            "sensitive-write",
            r"(?:>\s*|\btee\s+(?:-a\s+)?)(?:/etc/(?:passwd|group|hosts|profile|environment|ld\.so\.preload)\b|~/\.ssh/authorized_keys)",
            "overwrites a system account or login file",
        )?,
        PatternRule::new(
            "download-pipe-shell",
            r"\b(?:curl|wget)\b[^|;&]*\|\s*(?:sudo\s+(?:-{1,2}[\w-]+\s+)*)?(?:env\s+\S+\s+)?(?:ba|z|da|k)?sh\b",
            "pipes a download straight into a shell",
        )?,
        PatternRule::new(
            "download-substitution",
            r"(?:\$\(|<\(|`)\s*(?:curl|wget)\b",
            "executes downloaded content through substitution",
        )?,
    ])
}

fn escape_rules() -> Result<Vec<PatternRule>, regex::Error> {
    Ok(vec![
        PatternRule::new(
            "eval-substitution",
            r#"\beval\s+["']?\$\("#,
            "evaluates the output of a command",
        )?,
        PatternRule::new(
            "ifs-obfuscation",
            r"\$\{?IFS\b",
            "hides whitespace behind $IFS",
        )?,
        PatternRule::new(
            "ansi-c-hex",
            r"\$'(?:\\x[0-9a-fA-F]{2})+",
            "hides text behind hex escapes",
        )?,
        PatternRule::new(
            "base64-exec",
            r"\bbase64\s+(?:-d|--decode)\b[^;&]*\|\s*(?:ba|z|da)?sh\b",
            "decodes and executes an encoded payload",
        )?,
    ])
}

fn subcommand_rules() -> Result<Vec<PatternRule>, regex::Error> {
    Ok(vec![
        PatternRule::new("command-substitution", r"\$\(", "runs a nested command")?,
        PatternRule::new("backtick", r"`", "runs a nested command")?,
        PatternRule::new("eval", r"\beval\b", "evaluates arbitrary text")?,
        PatternRule::new("exec", r"\bexec\b", "replaces or spawns a process")?,
        PatternRule::new(
            "nested-shell",
            r"\b(?:ba|z|da|k)?sh\s+-c\b",
            "starts a nested shell",
        )?,
        PatternRule::new(
            "interpreter-eval",
            r"\b(?:python3?|perl|ruby|node)\s+-[ce]\b",
            "evaluates inline interpreter code",
        )?,
        PatternRule::new("process-substitution", r"<\(", "runs a nested command")?,
        PatternRule::new(
            "xargs-shell",
            r"\bxargs\b[^|;&]*\b(?:ba|z)?sh\b",
            "feeds input into a shell",
        )?,
    ])
}
