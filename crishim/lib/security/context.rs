use crate::{
    cri::{LinuxContainerSecurityContext, LinuxSandboxSecurityContext, SecurityProfile},
    engine::{ContainerCreateConfig, HostConfig},
    ShimError, ShimResult,
};

use super::{
    apparmor_security_opts, format_security_opts, selinux_label_opts,
    SECURITY_OPT_NO_NEW_PRIVILEGES,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Sets the user of the container process from the security context.
///
/// A user name wins over a UID. A group is appended as `user:gid` and requires a user.
pub fn apply_user(
    context: &LinuxContainerSecurityContext,
    config: &mut ContainerCreateConfig,
) -> ShimResult<()> {
    if let Some(uid) = context.run_as_user {
        config.user = uid.to_string();
    }
    if !context.run_as_username.is_empty() {
        config.user = context.run_as_username.clone();
    }

    if let Some(gid) = context.run_as_group {
        if config.user.is_empty() {
            return Err(ShimError::InvalidArgument(
                "runAsGroup is specified without a runAsUser".to_string(),
            ));
        }
        config.user = format!("{}:{}", config.user, gid);
    }

    Ok(())
}

/// Applies a container security context to the engine configuration.
///
/// Covers the user, groups, privileges, capabilities, SELinux and AppArmor labels and
/// `no-new-privileges`. Masked and read only paths only apply to unprivileged containers.
/// Seccomp is resolved separately by [`load_seccomp_security_opts`](super::load_seccomp_security_opts)
/// because node local profiles are read from disk.
pub fn apply_container_security_context(
    context: Option<&LinuxContainerSecurityContext>,
    config: &mut ContainerCreateConfig,
    host_config: &mut HostConfig,
    separator: char,
) -> ShimResult<()> {
    let Some(context) = context else {
        return Ok(());
    };

    apply_user(context, config)?;

    host_config.group_add.extend(
        context
            .supplemental_groups
            .iter()
            .map(|gid| gid.to_string()),
    );
    host_config.privileged = context.privileged;
    host_config.readonly_rootfs = context.readonly_rootfs;

    if let Some(capabilities) = &context.capabilities {
        host_config.cap_add = capabilities.add_capabilities.clone();
        host_config.cap_drop = capabilities.drop_capabilities.clone();
    }

    let mut opts = selinux_label_opts(context.selinux_options.as_ref());
    let apparmor =
        SecurityProfile::resolve(context.apparmor.as_ref(), &context.apparmor_profile)?;
    opts.extend(apparmor_security_opts(apparmor.as_ref())?);
    host_config
        .security_opt
        .extend(format_security_opts(&opts, separator));

    if context.no_new_privs {
        host_config
            .security_opt
            .push(SECURITY_OPT_NO_NEW_PRIVILEGES.to_string());
    }

    if !host_config.privileged {
        host_config.masked_paths = context.masked_paths.clone();
        host_config.readonly_paths = context.readonly_paths.clone();
    }

    Ok(())
}

/// Projects a sandbox security context onto the container context its infra container runs with.
pub fn sandbox_container_context(
    context: &LinuxSandboxSecurityContext,
) -> LinuxContainerSecurityContext {
    LinuxContainerSecurityContext {
        privileged: context.privileged,
        namespace_options: context.namespace_options.clone(),
        selinux_options: context.selinux_options.clone(),
        run_as_user: context.run_as_user,
        run_as_group: context.run_as_group,
        readonly_rootfs: context.readonly_rootfs,
        supplemental_groups: context.supplemental_groups.clone(),
        ..Default::default()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cri::{Capability, SELinuxOption};

    #[test]
    fn test_apply_user() -> anyhow::Result<()> {
        let mut config = ContainerCreateConfig::default();
        let context = LinuxContainerSecurityContext::builder()
            .run_as_user(1000)
            .run_as_group(2000)
            .build();
        apply_user(&context, &mut config)?;
        assert_eq!(config.user, "1000:2000");

        let mut config = ContainerCreateConfig::default();
        let context = LinuxContainerSecurityContext::builder()
            .run_as_user(1000)
            .run_as_username("nginx")
            .build();
        apply_user(&context, &mut config)?;
        assert_eq!(config.user, "nginx");

        Ok(())
    }

    #[test]
    fn test_apply_user_rejects_group_without_user() {
        let mut config = ContainerCreateConfig::default();
        let context = LinuxContainerSecurityContext::builder()
            .run_as_group(2000)
            .build();
        assert!(matches!(
            apply_user(&context, &mut config),
            Err(ShimError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_apply_container_security_context() -> anyhow::Result<()> {
        let context = LinuxContainerSecurityContext::builder()
            .capabilities(
                Capability::builder()
                    .add_capabilities(vec!["NET_ADMIN".into()])
                    .drop_capabilities(vec!["ALL".into()])
                    .build(),
            )
            .selinux_options(SELinuxOption::builder().level("s0:c1").build())
            .apparmor(SecurityProfile::localhost("k8s-nginx"))
            .supplemental_groups(vec![10, 20])
            .readonly_rootfs(true)
            .no_new_privs(true)
            .masked_paths(vec!["/proc/kcore".into()])
            .readonly_paths(vec!["/proc/sys".into()])
            .build();

        let mut config = ContainerCreateConfig::default();
        let mut host_config = HostConfig::default();
        apply_container_security_context(Some(&context), &mut config, &mut host_config, '=')?;

        assert_eq!(host_config.group_add, vec!["10", "20"]);
        assert!(host_config.readonly_rootfs);
        assert_eq!(host_config.cap_add, vec!["NET_ADMIN"]);
        assert_eq!(host_config.cap_drop, vec!["ALL"]);
        assert_eq!(
            host_config.security_opt,
            vec!["label=level:s0:c1", "apparmor=k8s-nginx", "no-new-privileges"]
        );
        assert_eq!(host_config.masked_paths, vec!["/proc/kcore"]);
        assert_eq!(host_config.readonly_paths, vec!["/proc/sys"]);

        Ok(())
    }

    #[test]
    fn test_privileged_ignores_masked_paths() -> anyhow::Result<()> {
        let context = LinuxContainerSecurityContext::builder()
            .privileged(true)
            .masked_paths(vec!["/proc/kcore".into()])
            .readonly_paths(vec!["/proc/sys".into()])
            .build();

        let mut config = ContainerCreateConfig::default();
        let mut host_config = HostConfig::default();
        apply_container_security_context(Some(&context), &mut config, &mut host_config, ':')?;

        assert!(host_config.privileged);
        assert!(host_config.masked_paths.is_empty());
        assert!(host_config.readonly_paths.is_empty());

        Ok(())
    }

    #[test]
    fn test_sandbox_container_context() {
        let sandbox = LinuxSandboxSecurityContext::builder()
            .run_as_user(0)
            .privileged(true)
            .supplemental_groups(vec![5])
            .build();

        let context = sandbox_container_context(&sandbox);
        assert_eq!(context.run_as_user, Some(0));
        assert!(context.privileged);
        assert_eq!(context.supplemental_groups, vec![5]);
        assert!(context.apparmor.is_none());
    }
}
