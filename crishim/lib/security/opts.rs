use std::fmt;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The security option key selecting a seccomp profile.
pub const SECURITY_OPT_SECCOMP: &str = "seccomp";

/// The security option key selecting an AppArmor profile.
pub const SECURITY_OPT_APPARMOR: &str = "apparmor";

/// The security option key carrying an SELinux label field.
pub const SECURITY_OPT_LABEL: &str = "label";

/// The security option preventing the process from gaining new privileges.
pub const SECURITY_OPT_NO_NEW_PRIVILEGES: &str = "no-new-privileges";

/// The value disabling a confinement mechanism.
pub const SECURITY_OPT_UNCONFINED: &str = "unconfined";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single engine security option, rendered as `key<separator>value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityOpt {
    /// The option key.
    pub key: String,

    /// The option value.
    pub value: String,

    /// A short description for logs, used in place of a bulky value.
    pub msg: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SecurityOpt {
    /// Creates an option without a log description.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            msg: String::new(),
        }
    }

    /// Attaches a log description.
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    /// Renders the option with the given key/value separator.
    pub fn format(&self, separator: char) -> String {
        format!("{}{}{}", self.key, separator, self.value)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Renders options for the engine.
pub fn format_security_opts(opts: &[SecurityOpt], separator: char) -> Vec<String> {
    opts.iter().map(|opt| opt.format(separator)).collect()
}

/// Renders options for logs, substituting the description when one is set.
pub fn describe_security_opts(opts: &[SecurityOpt], separator: char) -> Vec<String> {
    opts.iter()
        .map(|opt| match opt.msg.as_str() {
            "" => opt.format(separator),
            msg => format!("{}{}{}", opt.key, separator, msg),
        })
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for SecurityOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format('='))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_security_opts() {
        let opts = vec![
            SecurityOpt::new("seccomp", "unconfined"),
            SecurityOpt::new("label", "user:system_u"),
        ];

        assert_eq!(
            format_security_opts(&opts, '='),
            vec!["seccomp=unconfined", "label=user:system_u"]
        );
        assert_eq!(
            format_security_opts(&opts, ':'),
            vec!["seccomp:unconfined", "label:user:system_u"]
        );
    }

    #[test]
    fn test_describe_security_opts_prefers_msg() {
        let opts = vec![SecurityOpt::new("seccomp", "{\"defaultAction\":\"SCMP_ACT_ERRNO\"}")
            .with_msg("/profiles/audit.json(md5:abc)")];

        assert_eq!(
            describe_security_opts(&opts, '='),
            vec!["seccomp=/profiles/audit.json(md5:abc)"]
        );
    }
}
