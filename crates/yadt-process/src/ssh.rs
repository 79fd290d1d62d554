//! Wrapping a remote argv for `ssh <host> <command>` invocation.

/// Escape a string for safe inclusion in a remote shell command line.
///
/// Kept nearly verbatim from the teacher's `backends/ssh.rs::shell_escape`
/// — it already handles the common cases well.
pub fn shell_escape(s: &str) -> String {
    if s.contains(|c: char| c.is_whitespace() || "\"'\\$`!*?<>|&;()[]{}".contains(c)) {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    } else {
        s.to_string()
    }
}

/// Join a remote argv into the single command-line string `ssh` expects
/// as its trailing argument.
pub fn format_remote_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_escape(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the full `ssh` argv that runs `remote_argv` on `host`.
pub fn ssh_argv(host: &str, remote_argv: &[String]) -> Vec<String> {
    vec![
        "ssh".to_string(),
        host.to_string(),
        format_remote_command(remote_argv),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_whitespace_and_metacharacters() {
        assert_eq!(shell_escape("simple"), "simple");
        assert_eq!(shell_escape("with space"), "'with space'");
        assert_eq!(shell_escape("with'quote"), "'with'\"'\"'quote'");
        assert_eq!(shell_escape("$variable"), "'$variable'");
    }

    #[test]
    fn builds_ssh_argv() {
        let argv = ssh_argv(
            "web01",
            &["yadt-host-lock".to_string(), "under maintenance".to_string()],
        );
        assert_eq!(
            argv,
            vec![
                "ssh".to_string(),
                "web01".to_string(),
                "yadt-host-lock 'under maintenance'".to_string(),
            ]
        );
    }
}
