//! Command allowlist for the shell tool.
//!
//! Commands are tokenized with `shell-words` (so quoting is honored and no
//! shell is ever involved) and the leading tokens must match an allowlist
//! entry. Entries may span several words (`"pip list"`), in which case every
//! word must match.

use std::collections::BTreeSet;

/// Read-mostly commands allowed when the configuration names none.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    // Files and directories
    "ls", "dir", "pwd", "cat", "head", "tail", "wc", "tree", "stat", "basename", "dirname",
    "find",
    // System information
    "date", "uptime", "whoami", "hostname", "uname", "env", "arch", "sw_vers", "sysctl", "id",
    // Network
    "ping", "curl", "wget", "netstat", "ip", "dig", "host", "nslookup", "traceroute",
    "ifconfig", "whois",
    // Processes
    "ps", "top", "htop", "vm_stat",
    // Text processing
    "grep", "egrep", "fgrep", "sed", "awk", "sort", "uniq", "cut", "tr", "diff", "cmp",
    "strings",
    // File systems
    "df", "du", "mount", "diskutil info", "lsblk",
    // Package managers, read-only
    "apt list", "dpkg -l", "pip list", "pip show", "npm list", "brew list",
    // Developer tools, read-only
    "which", "whereis", "man", "xcode-select -p",
    // Misc
    "yes", "cal", "bc", "echo", "printf",
];

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejected {
    #[error("Command is empty")]
    Empty,

    #[error("Command could not be parsed: {0}")]
    Unparseable(String),

    #[error("Command '{command}' not allowed")]
    NotAllowed { command: String },
}

/// A set of allowed command prefixes.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed: BTreeSet<String>,
}

impl CommandPolicy {
    /// Build a policy from configured entries; an empty list means the defaults.
    pub fn new(allowed: &[String]) -> Self {
        if allowed.is_empty() {
            return Self::default();
        }
        Self {
            allowed: allowed.iter().map(|c| c.trim().to_string()).collect(),
        }
    }

    /// Allowed entries in sorted order.
    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(|s| s.as_str())
    }

    /// Tokenize `command` and check it against the allowlist.
    ///
    /// Returns the argv on success.
    pub fn check(&self, command: &str) -> Result<Vec<String>, CommandRejected> {
        let argv = shell_words::split(command)
            .map_err(|e| CommandRejected::Unparseable(e.to_string()))?;
        if argv.is_empty() {
            return Err(CommandRejected::Empty);
        }

        let permitted = self.allowed.iter().any(|entry| {
            let words: Vec<&str> = entry.split_whitespace().collect();
            !words.is_empty()
                && words.len() <= argv.len()
                && words.iter().zip(&argv).all(|(w, a)| *w == a)
        });

        if permitted {
            Ok(argv)
        } else {
            tracing::debug!(command = %command, "Command rejected by allowlist");
            Err(CommandRejected::NotAllowed {
                command: command.to_string(),
            })
        }
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_ALLOWED_COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_read_only_commands() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.check("ls -la /tmp").unwrap(), vec!["ls", "-la", "/tmp"]);
        assert!(policy.check("uname -a").is_ok());
        assert!(policy.check("rm -rf /").is_err());
        assert!(policy.check("sudo ls").is_err());
    }

    #[test]
    fn multi_word_entries_need_every_word() {
        let policy = CommandPolicy::default();
        assert!(policy.check("pip list --outdated").is_ok());
        assert!(policy.check("pip install requests").is_err());
        assert!(policy.check("pip").is_err());
    }

    #[test]
    fn quoting_is_honored() {
        let policy = CommandPolicy::default();
        let argv = policy.check(r#"grep "two words" notes.txt"#).unwrap();
        assert_eq!(argv, vec!["grep", "two words", "notes.txt"]);
    }

    #[test]
    fn unbalanced_quotes_rejected() {
        let policy = CommandPolicy::default();
        assert!(matches!(
            policy.check("echo \"oops"),
            Err(CommandRejected::Unparseable(_))
        ));
    }

    #[test]
    fn blank_command_rejected() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.check("   "), Err(CommandRejected::Empty));
    }

    #[test]
    fn configured_list_replaces_defaults() {
        let policy = CommandPolicy::new(&["git status".into(), "cargo".into()]);
        assert!(policy.check("git status --short").is_ok());
        assert!(policy.check("git push").is_err());
        assert!(policy.check("cargo build").is_ok());
        assert!(policy.check("ls").is_err());
        assert_eq!(policy.allowed().collect::<Vec<_>>(), vec!["cargo", "git status"]);
    }
}
