use crate::cri::SELinuxOption;

use super::{SecurityOpt, SECURITY_OPT_LABEL};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Turns each non-empty SELinux field into its own `label` option, e.g. `label=user:system_u`.
pub fn selinux_label_opts(options: Option<&SELinuxOption>) -> Vec<SecurityOpt> {
    let Some(options) = options else {
        return Vec::new();
    };

    [
        ("user", &options.user),
        ("role", &options.role),
        ("type", &options.type_),
        ("level", &options.level),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(field, value)| SecurityOpt::new(SECURITY_OPT_LABEL, format!("{}:{}", field, value)))
    .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::format_security_opts;

    #[test]
    fn test_selinux_label_opts() {
        let options = SELinuxOption::builder()
            .user("system_u")
            .type_("svirt_lxc_net_t")
            .level("s0:c1,c2")
            .build();

        let opts = selinux_label_opts(Some(&options));
        assert_eq!(
            format_security_opts(&opts, '='),
            vec![
                "label=user:system_u",
                "label=type:svirt_lxc_net_t",
                "label=level:s0:c1,c2"
            ]
        );
        assert_eq!(
            format_security_opts(&opts, ':')[0],
            "label:user:system_u".to_string()
        );
    }

    #[test]
    fn test_selinux_label_opts_empty() {
        assert!(selinux_label_opts(None).is_empty());
        assert!(selinux_label_opts(Some(&SELinuxOption::default())).is_empty());
    }
}
