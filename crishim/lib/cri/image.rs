use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::ImageSpec;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Criteria for listing images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ImageFilter {
    /// Only images matching this reference are listed.
    #[builder(default, setter(strip_option))]
    pub image: Option<ImageSpec>,
}

/// An image known to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// The image id.
    pub id: String,

    /// Tags referring to the image.
    pub repo_tags: Vec<String>,

    /// Digests referring to the image.
    pub repo_digests: Vec<String>,

    /// The image size in bytes.
    pub size: u64,

    /// The UID the image runs as, when it is numeric.
    pub uid: Option<i64>,

    /// The user name the image runs as, when it is not numeric.
    pub username: String,

    /// The image reference.
    pub spec: Option<ImageSpec>,
}

/// Registry credentials for a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct AuthConfig {
    /// The user name.
    #[builder(default, setter(into))]
    pub username: String,

    /// The password.
    #[builder(default, setter(into))]
    pub password: String,

    /// Base64 encoded `user:password`.
    #[builder(default, setter(into))]
    pub auth: String,

    /// The registry address.
    #[builder(default, setter(into))]
    pub server_address: String,

    /// An identity token.
    #[builder(default, setter(into))]
    pub identity_token: String,

    /// A registry bearer token.
    #[builder(default, setter(into))]
    pub registry_token: String,
}
