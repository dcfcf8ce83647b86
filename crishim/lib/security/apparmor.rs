use crate::{
    cri::{ProfileType, SecurityProfile, PROFILE_LOCALHOST_PREFIX},
    ShimError, ShimResult,
};

use super::{SecurityOpt, SECURITY_OPT_APPARMOR, SECURITY_OPT_UNCONFINED};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves an AppArmor profile into engine security options.
///
/// No profile and the runtime default yield nothing. A node local profile is passed by its bare
/// name, with any `localhost/` prefix removed.
pub fn apparmor_security_opts(profile: Option<&SecurityProfile>) -> ShimResult<Vec<SecurityOpt>> {
    let Some(profile) = profile else {
        return Ok(Vec::new());
    };

    match profile.profile_type {
        ProfileType::RuntimeDefault => Ok(Vec::new()),
        ProfileType::Unconfined => Ok(vec![SecurityOpt::new(
            SECURITY_OPT_APPARMOR,
            SECURITY_OPT_UNCONFINED,
        )]),
        ProfileType::Localhost => {
            let name = profile
                .localhost_ref
                .strip_prefix(PROFILE_LOCALHOST_PREFIX)
                .unwrap_or(&profile.localhost_ref);
            if name.is_empty() {
                return Err(ShimError::InvalidSecurityProfile(
                    "apparmor localhost profile requires a name".to_string(),
                ));
            }

            Ok(vec![SecurityOpt::new(SECURITY_OPT_APPARMOR, name)])
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apparmor_security_opts() -> anyhow::Result<()> {
        assert!(apparmor_security_opts(None)?.is_empty());
        assert!(apparmor_security_opts(Some(&SecurityProfile::runtime_default()))?.is_empty());
        assert_eq!(
            apparmor_security_opts(Some(&SecurityProfile::unconfined()))?,
            vec![SecurityOpt::new("apparmor", "unconfined")]
        );
        assert_eq!(
            apparmor_security_opts(Some(&SecurityProfile::localhost("k8s-nginx")))?,
            vec![SecurityOpt::new("apparmor", "k8s-nginx")]
        );
        assert_eq!(
            apparmor_security_opts(Some(&SecurityProfile::localhost("localhost/k8s-nginx")))?,
            vec![SecurityOpt::new("apparmor", "k8s-nginx")]
        );
        Ok(())
    }

    #[test]
    fn test_apparmor_rejects_empty_localhost() {
        assert!(matches!(
            apparmor_security_opts(Some(&SecurityProfile::localhost(""))),
            Err(ShimError::InvalidSecurityProfile(_))
        ));
    }
}
