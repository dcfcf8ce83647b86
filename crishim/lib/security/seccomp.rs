use std::path::Path;

use md5::{Digest, Md5};
use oci_spec::runtime::{LinuxSeccomp, LinuxSeccompAction, LinuxSyscall};

use crate::{
    cri::{ProfileType, SecurityProfile},
    ShimError, ShimResult,
};

use super::{SecurityOpt, SECURITY_OPT_SECCOMP, SECURITY_OPT_UNCONFINED};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The syscall privileged containers must be able to make.
const SETHOSTNAME_SYSCALL: &str = "sethostname";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves a seccomp profile into engine security options, reading node local profiles from disk.
///
/// - No profile or an unconfined one yields `seccomp=unconfined`.
/// - The runtime default yields nothing so the engine applies its own default.
/// - A node local profile must be an absolute path to an OCI seccomp document.
pub async fn load_seccomp_security_opts(
    profile: Option<&SecurityProfile>,
    privileged: bool,
) -> ShimResult<Vec<SecurityOpt>> {
    let Some(profile) = profile else {
        return Ok(vec![unconfined_opt()]);
    };

    match profile.profile_type {
        ProfileType::Unconfined => Ok(vec![unconfined_opt()]),
        ProfileType::RuntimeDefault => Ok(Vec::new()),
        ProfileType::Localhost => {
            let path = Path::new(&profile.localhost_ref);
            if !path.is_absolute() {
                return Err(ShimError::InvalidSecurityProfile(format!(
                    "seccomp profile path must be absolute: {:?}",
                    profile.localhost_ref
                )));
            }

            let contents = tokio::fs::read(path).await.map_err(|e| {
                ShimError::InvalidSecurityProfile(format!(
                    "failed to read seccomp profile {:?}: {}",
                    profile.localhost_ref, e
                ))
            })?;

            Ok(vec![localhost_seccomp_opt(
                &profile.localhost_ref,
                &contents,
                privileged,
            )?])
        }
    }
}

/// Compiles the contents of a node local seccomp profile into a single engine option.
///
/// The document is validated as an OCI seccomp profile and emitted as compact JSON. For
/// privileged containers `sethostname` is removed from every rule that does not allow it and
/// rules left without syscalls are dropped. Fields the OCI schema does not know are kept. The
/// option description is `<path>(md5:<digest of the file>)`.
pub fn localhost_seccomp_opt(
    path: &str,
    contents: &[u8],
    privileged: bool,
) -> ShimResult<SecurityOpt> {
    let mut document: serde_json::Value = serde_json::from_slice(contents).map_err(|e| {
        ShimError::InvalidSecurityProfile(format!("failed to decode seccomp profile {:?}: {}", path, e))
    })?;

    let profile: LinuxSeccomp = serde_json::from_value(document.clone()).map_err(|e| {
        ShimError::InvalidSecurityProfile(format!("invalid seccomp profile {:?}: {}", path, e))
    })?;

    if privileged {
        if let (Some(syscalls), Some(object)) = (profile.syscalls(), document.as_object_mut()) {
            let filtered = strip_syscall(syscalls, SETHOSTNAME_SYSCALL);
            object.insert("syscalls".to_string(), serde_json::to_value(filtered)?);
        }
    }

    let compact = serde_json::to_string(&document)?;
    let digest = hex::encode(Md5::digest(contents));

    Ok(SecurityOpt::new(SECURITY_OPT_SECCOMP, compact).with_msg(format!("{}(md5:{})", path, digest)))
}

fn unconfined_opt() -> SecurityOpt {
    SecurityOpt::new(SECURITY_OPT_SECCOMP, SECURITY_OPT_UNCONFINED)
}

/// Removes `name` from every rule whose action is not allow.
fn strip_syscall(rules: &[LinuxSyscall], name: &str) -> Vec<LinuxSyscall> {
    rules
        .iter()
        .filter_map(|rule| {
            if matches!(rule.action(), LinuxSeccompAction::ScmpActAllow)
                || !rule.names().iter().any(|n| n == name)
            {
                return Some(rule.clone());
            }

            let names: Vec<String> = rule
                .names()
                .iter()
                .filter(|n| n.as_str() != name)
                .cloned()
                .collect();
            if names.is_empty() {
                return None;
            }

            let mut rule = rule.clone();
            rule.set_names(names);
            Some(rule)
        })
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"{
        "defaultAction": "SCMP_ACT_ERRNO",
        "architectures": ["SCMP_ARCH_X86_64"],
        "syscalls": [
            { "names": ["read", "write"], "action": "SCMP_ACT_ALLOW" },
            { "names": ["sethostname"], "action": "SCMP_ACT_ERRNO" },
            { "names": ["sethostname", "setdomainname"], "action": "SCMP_ACT_KILL" }
        ]
    }"#;

    fn syscall_names(opt: &SecurityOpt) -> anyhow::Result<Vec<Vec<String>>> {
        let profile: LinuxSeccomp = serde_json::from_str(&opt.value)?;
        Ok(profile
            .syscalls()
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|rule| rule.names().clone())
            .collect())
    }

    #[tokio::test]
    async fn test_seccomp_builtin_profiles() -> anyhow::Result<()> {
        let unconfined = load_seccomp_security_opts(None, false).await?;
        assert_eq!(unconfined, vec![SecurityOpt::new("seccomp", "unconfined")]);

        let explicit = load_seccomp_security_opts(Some(&SecurityProfile::unconfined()), false).await?;
        assert_eq!(explicit, unconfined);

        let default =
            load_seccomp_security_opts(Some(&SecurityProfile::runtime_default()), true).await?;
        assert!(default.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_seccomp_localhost_profile_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("audit.json");
        tokio::fs::write(&path, PROFILE).await?;

        let profile = SecurityProfile::localhost(path.to_string_lossy());
        let opts = load_seccomp_security_opts(Some(&profile), false).await?;
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].key, "seccomp");
        assert!(!opts[0].value.contains('\n'));

        let digest = hex::encode(Md5::digest(PROFILE.as_bytes()));
        assert_eq!(
            opts[0].msg,
            format!("{}(md5:{})", path.to_string_lossy(), digest)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_seccomp_localhost_errors() {
        let relative = SecurityProfile::localhost("profiles/audit.json");
        assert!(matches!(
            load_seccomp_security_opts(Some(&relative), false).await,
            Err(ShimError::InvalidSecurityProfile(_))
        ));

        let missing = SecurityProfile::localhost("/nonexistent/crishim/audit.json");
        assert!(matches!(
            load_seccomp_security_opts(Some(&missing), false).await,
            Err(ShimError::InvalidSecurityProfile(_))
        ));

        assert!(matches!(
            localhost_seccomp_opt("/p.json", b"not json", false),
            Err(ShimError::InvalidSecurityProfile(_))
        ));
    }

    #[test]
    fn test_seccomp_keeps_sethostname_when_unprivileged() -> anyhow::Result<()> {
        let opt = localhost_seccomp_opt("/p.json", PROFILE.as_bytes(), false)?;
        let names = syscall_names(&opt)?;

        assert_eq!(names.len(), 3);
        assert_eq!(names[1], vec!["sethostname"]);
        assert_eq!(names[2], vec!["sethostname", "setdomainname"]);

        Ok(())
    }

    #[test]
    fn test_seccomp_strips_sethostname_when_privileged() -> anyhow::Result<()> {
        let opt = localhost_seccomp_opt("/p.json", PROFILE.as_bytes(), true)?;
        let names = syscall_names(&opt)?;

        assert_eq!(names, vec![vec!["read", "write"], vec!["setdomainname"]]);
        assert!(!opt.value.contains("sethostname"));

        Ok(())
    }

    #[test]
    fn test_seccomp_reencoding_is_stable() -> anyhow::Result<()> {
        let first = localhost_seccomp_opt("/p.json", PROFILE.as_bytes(), true)?;
        let second = localhost_seccomp_opt("/p.json", first.value.as_bytes(), true)?;
        assert_eq!(first.value, second.value);

        let value: serde_json::Value = serde_json::from_str(&first.value)?;
        assert_eq!(serde_json::to_string(&value)?, first.value);

        Ok(())
    }

    #[test]
    fn test_seccomp_keeps_unknown_fields() -> anyhow::Result<()> {
        let profile = r#"{"defaultAction":"SCMP_ACT_ERRNO","archMap":[{"architecture":"SCMP_ARCH_X86_64","subArchitectures":["SCMP_ARCH_X86"]}],"syscalls":[]}"#;
        let opt = localhost_seccomp_opt("/p.json", profile.as_bytes(), true)?;
        assert!(opt.value.contains("archMap"));

        Ok(())
    }
}
