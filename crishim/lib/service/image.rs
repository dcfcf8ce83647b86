use crate::{
    cri::{AuthConfig, Image, ImageFilter, ImageSpec},
    engine::{
        ImageInspect, ImageSummary, ListFilters, ListImagesOptions, RegistryAuth,
        RemoveImageOptions,
    },
    ShimError, ShimResult,
};

use super::ShimService;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimService {
    /// Lists the images, optionally only those matching the filter reference.
    pub async fn list_images(&self, filter: Option<&ImageFilter>) -> ShimResult<Vec<Image>> {
        let mut filters = ListFilters::new();
        if let Some(spec) = filter.and_then(|f| f.image.as_ref()) {
            if !spec.image.is_empty() {
                filters.add("reference", spec.image.as_str());
            }
        }

        let images = self
            .engine
            .list_images(&ListImagesOptions {
                all: false,
                filters,
            })
            .await?;

        Ok(images.into_iter().map(image_from_summary).collect())
    }

    /// Returns an image, or `None` if it is not present.
    pub async fn image_status(&self, spec: &ImageSpec) -> ShimResult<Option<Image>> {
        match self.engine.inspect_image_by_ref(&spec.image).await {
            Ok(image) => Ok(Some(image_from_inspect(image))),
            Err(e) if e.is_image_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Pulls an image and returns its reference, the first repo digest if there is one.
    pub async fn pull_image(
        &self,
        spec: &ImageSpec,
        auth: Option<&AuthConfig>,
    ) -> ShimResult<String> {
        if spec.image.is_empty() {
            return Err(ShimError::InvalidArgument("image reference is empty".to_string()));
        }

        tracing::info!("pulling image {}", spec.image);
        let auth = auth.map(registry_auth);
        self.engine.pull_image(&spec.image, auth.as_ref()).await?;

        let image = self.engine.inspect_image_by_ref(&spec.image).await?;
        Ok(image
            .repo_digests
            .into_iter()
            .next()
            .unwrap_or(image.id))
    }

    /// Removes an image. An image that is already gone counts as removed.
    ///
    /// An image referenced by id that carries several tags is removed tag by tag, since the
    /// engine refuses to remove it by id.
    pub async fn remove_image(&self, spec: &ImageSpec) -> ShimResult<()> {
        let options = RemoveImageOptions {
            force: false,
            prune_children: true,
        };

        match self.engine.inspect_image_by_id(&spec.image).await {
            Ok(image) if image.repo_tags.len() > 1 => {
                for tag in &image.repo_tags {
                    tracing::info!("removing tag {} of image {}", tag, image.id);
                    match self.engine.remove_image(tag, &options).await {
                        Ok(_) => {}
                        Err(e) if e.is_image_not_found() => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.is_image_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!("removing image {}", spec.image);
        match self.engine.remove_image(&spec.image, &options).await {
            Ok(deleted) => {
                for item in deleted {
                    tracing::debug!("untagged {:?}, deleted {:?}", item.untagged, item.deleted);
                }
                Ok(())
            }
            Err(e) if e.is_image_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn image_from_summary(image: ImageSummary) -> Image {
    Image {
        id: image.id,
        repo_tags: image.repo_tags,
        repo_digests: image.repo_digests,
        size: image.size.max(0) as u64,
        ..Default::default()
    }
}

fn image_from_inspect(image: ImageInspect) -> Image {
    let (uid, username) = image_user(&image.config.user);
    Image {
        id: image.id,
        repo_tags: image.repo_tags,
        repo_digests: image.repo_digests,
        size: image.size.max(0) as u64,
        uid,
        username,
        spec: None,
    }
}

/// Splits the user of an image into a numeric uid or a user name. Any group is ignored.
fn image_user(user: &str) -> (Option<i64>, String) {
    let user = user.split(':').next().unwrap_or_default();
    if user.is_empty() {
        return (None, String::new());
    }

    match user.parse::<i64>() {
        Ok(uid) => (Some(uid), String::new()),
        Err(_) => (None, user.to_string()),
    }
}

fn registry_auth(auth: &AuthConfig) -> RegistryAuth {
    RegistryAuth {
        username: auth.username.clone(),
        password: auth.password.clone(),
        auth: auth.auth.clone(),
        server_address: auth.server_address.clone(),
        identity_token: auth.identity_token.clone(),
        registry_token: auth.registry_token.clone(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ShimConfig,
        engine::{ImageConfig, MemoryEngine, Operation},
    };

    async fn service(dir: &std::path::Path, engine: &MemoryEngine) -> anyhow::Result<ShimService> {
        let config = ShimConfig::builder().root_dir(dir).build();
        Ok(ShimService::builder(config)
            .engine(Arc::new(engine.clone()))
            .build()
            .await?)
    }

    fn spec(image: &str) -> ImageSpec {
        ImageSpec::builder().image(image).build()
    }

    #[test]
    fn test_image_user() {
        assert_eq!(image_user(""), (None, String::new()));
        assert_eq!(image_user("1000"), (Some(1000), String::new()));
        assert_eq!(image_user("1000:1000"), (Some(1000), String::new()));
        assert_eq!(image_user("nginx:nginx"), (None, "nginx".to_string()));
    }

    #[test_log::test(tokio::test)]
    async fn test_pull_and_status() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        let service = service(dir.path(), &engine).await?;

        assert!(service.image_status(&spec("nginx")).await?.is_none());

        let auth = AuthConfig::builder().username("user").password("secret").build();
        let reference = service.pull_image(&spec("nginx"), Some(&auth)).await?;
        assert!(reference.starts_with("sha256:"));

        let image = service.image_status(&spec("nginx")).await?.expect("image");
        assert_eq!(image.id, reference);
        assert_eq!(image.repo_tags, vec!["nginx:latest"]);

        let listed = service.list_images(None).await?;
        assert_eq!(listed.len(), 1);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_pull_returns_digest() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        engine
            .insert_image(ImageInspect {
                id: "sha256:abc".to_string(),
                repo_tags: vec!["redis:7".to_string()],
                repo_digests: vec!["redis@sha256:def".to_string()],
                config: ImageConfig {
                    user: "999".to_string(),
                },
                ..Default::default()
            })
            .await;
        let service = service(dir.path(), &engine).await?;

        assert_eq!(service.pull_image(&spec("redis:7"), None).await?, "redis@sha256:def");
        let image = service.image_status(&spec("redis:7")).await?.expect("image");
        assert_eq!(image.uid, Some(999));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_remove_image_by_id_removes_every_tag() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        engine
            .insert_image(ImageInspect {
                id: "sha256:abc".to_string(),
                repo_tags: vec!["app:1".to_string(), "app:latest".to_string()],
                ..Default::default()
            })
            .await;
        let service = service(dir.path(), &engine).await?;

        service.remove_image(&spec("sha256:abc")).await?;
        assert_eq!(
            engine.call_targets(Operation::RemoveImage).await,
            vec!["app:1", "app:latest"]
        );
        assert!(service.list_images(None).await?.is_empty());

        service.remove_image(&spec("sha256:abc")).await?;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_list_images_by_reference() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        engine.add_image("nginx").await;
        engine.add_image("redis").await;
        let service = service(dir.path(), &engine).await?;

        let filter = ImageFilter::builder().image(spec("redis")).build();
        let listed = service.list_images(Some(&filter)).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].repo_tags, vec!["redis:latest"]);

        Ok(())
    }
}
