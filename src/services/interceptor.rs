use crate::models::NormalizedFileEntry;
use anyhow::{Result, bail};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Registration name of [`ImageOnlyInterceptor`].
pub const IMAGE_ONLY_INTERCEPTOR: &str = "profile_image_only";

pub const IMAGE_ONLY_MESSAGE: &str =
    "Sorry, you can only upload a .GIF, a .JPG, or a .PNG image file.";

/// Prefilter run by host storage before a file is accepted. It may rewrite the
/// entry or reject it with a user-facing message.
pub trait UploadInterceptor: Send + Sync {
    fn prefilter(&self, file: &mut NormalizedFileEntry) -> Result<()>;
}

#[derive(Clone)]
struct Registration {
    priority: i32,
    interceptor: Arc<dyn UploadInterceptor>,
}

/// Process-wide set of upload prefilters, keyed by name.
#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    entries: Arc<DashMap<String, Registration>>,
    /// Live suspension guards per name; a suspended prefilter stays
    /// registered but does not run
    suspended: Arc<DashMap<String, usize>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a prefilter. Lower priorities run first.
    pub fn register(&self, name: &str, priority: i32, interceptor: Arc<dyn UploadInterceptor>) {
        self.entries.insert(
            name.to_string(),
            Registration {
                priority,
                interceptor,
            },
        );
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Whether the prefilter is registered and not currently suspended.
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name) && !self.is_suspended(name)
    }

    pub fn is_suspended(&self, name: &str) -> bool {
        self.suspended.contains_key(name)
    }

    /// Disables a prefilter until the returned guard is dropped. Guards nest:
    /// the prefilter runs again only once every guard for `name` is gone.
    pub fn suspend(&self, name: &str) -> SuspendedInterceptor {
        let mut depth = self.suspended.entry(name.to_string()).or_insert(0);
        *depth += 1;
        if *depth == 1 {
            tracing::debug!("Suspended upload interceptor '{}'", name);
        }
        drop(depth);

        SuspendedInterceptor {
            registry: self.clone(),
            name: name.to_string(),
        }
    }

    /// Runs every active prefilter in priority order, stopping at the first
    /// rejection.
    pub fn run(&self, file: &mut NormalizedFileEntry) -> Result<()> {
        // Snapshot first so no map shard stays locked while a prefilter runs
        let mut active: Vec<(String, Registration)> = self
            .entries
            .iter()
            .filter(|entry| !self.is_suspended(entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        active.sort_by(|a, b| a.1.priority.cmp(&b.1.priority).then_with(|| a.0.cmp(&b.0)));

        for (name, registration) in active {
            if let Err(e) = registration.interceptor.prefilter(file) {
                tracing::info!("Upload of '{}' rejected by '{}': {}", file.name, name, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Guard returned by [`InterceptorRegistry::suspend`].
pub struct SuspendedInterceptor {
    registry: InterceptorRegistry,
    name: String,
}

impl Drop for SuspendedInterceptor {
    fn drop(&mut self) {
        if let Entry::Occupied(mut depth) = self.registry.suspended.entry(self.name.clone()) {
            *depth.get_mut() -= 1;
            if *depth.get() == 0 {
                depth.remove();
                tracing::debug!("Resumed upload interceptor '{}'", self.name);
            }
        }
    }
}

/// Restricts uploads to GIF, JPEG and PNG images. Generic binary uploads are
/// sniffed from their temporary file first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageOnlyInterceptor;

const IMAGE_SUBTYPES: &[&str] = &["jpg", "jpeg", "gif", "png"];

impl UploadInterceptor for ImageOnlyInterceptor {
    fn prefilter(&self, file: &mut NormalizedFileEntry) -> Result<()> {
        if file.mime_type == "application/octet-stream" && !file.tmp_name.as_os_str().is_empty() {
            match infer::get_from_path(&file.tmp_name) {
                Ok(Some(kind)) => file.mime_type = kind.mime_type().to_string(),
                Ok(None) => {}
                Err(e) => bail!("Unexpected Error: {}", e),
            }
        }

        let is_image = file
            .mime_type
            .parse::<mime::Mime>()
            .map(|m| m.type_() == mime::IMAGE && IMAGE_SUBTYPES.contains(&m.subtype().as_str()))
            .unwrap_or(false);

        if !is_image {
            bail!(IMAGE_ONLY_MESSAGE);
        }
        Ok(())
    }
}

/// Registers the image-only prefilter when the current request is a profile
/// image upload. Returns whether it was registered.
pub fn register_profile_interceptor(registry: &InterceptorRegistry, doing_upload: bool) -> bool {
    if doing_upload {
        registry.register(IMAGE_ONLY_INTERCEPTOR, 10, Arc::new(ImageOnlyInterceptor));
    }
    doing_upload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(name: &str, mime_type: &str) -> NormalizedFileEntry {
        NormalizedFileEntry {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_only_interceptor() {
        let interceptor = ImageOnlyInterceptor;
        assert!(interceptor.prefilter(&mut entry("a.png", "image/png")).is_ok());
        assert!(interceptor.prefilter(&mut entry("a.jpg", "image/jpeg")).is_ok());
        assert!(interceptor.prefilter(&mut entry("a.gif", "image/gif")).is_ok());

        let err = interceptor
            .prefilter(&mut entry("cv.pdf", "application/pdf"))
            .unwrap_err();
        assert_eq!(err.to_string(), IMAGE_ONLY_MESSAGE);
        assert!(interceptor.prefilter(&mut entry("a.webp", "image/webp")).is_err());
        assert!(interceptor.prefilter(&mut entry("a", "")).is_err());
    }

    #[test]
    fn test_octet_stream_is_sniffed() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0])
            .unwrap();

        let mut file = NormalizedFileEntry {
            name: "blob".to_string(),
            mime_type: "application/octet-stream".to_string(),
            tmp_name: tmp.path().to_path_buf(),
            ..Default::default()
        };
        ImageOnlyInterceptor.prefilter(&mut file).unwrap();
        assert_eq!(file.mime_type, "image/png");

        let mut missing = NormalizedFileEntry {
            name: "gone".to_string(),
            mime_type: "application/octet-stream".to_string(),
            tmp_name: "/nonexistent/upload/tmp".into(),
            ..Default::default()
        };
        let err = ImageOnlyInterceptor.prefilter(&mut missing).unwrap_err();
        assert!(err.to_string().starts_with("Unexpected Error"));
    }

    #[test]
    fn test_suspend_restores_on_drop() {
        let registry = InterceptorRegistry::new();
        assert!(register_profile_interceptor(&registry, true));

        {
            let _guard = registry.suspend(IMAGE_ONLY_INTERCEPTOR);
            assert!(!registry.is_registered(IMAGE_ONLY_INTERCEPTOR));
            assert!(registry.run(&mut entry("cv.pdf", "application/pdf")).is_ok());
        }

        assert!(registry.is_registered(IMAGE_ONLY_INTERCEPTOR));
        assert!(registry.run(&mut entry("cv.pdf", "application/pdf")).is_err());
    }

    #[test]
    fn test_overlapping_suspensions_resume_after_last_guard() {
        let registry = InterceptorRegistry::new();
        register_profile_interceptor(&registry, true);

        let first = registry.suspend(IMAGE_ONLY_INTERCEPTOR);
        let second = registry.suspend(IMAGE_ONLY_INTERCEPTOR);

        drop(first);
        assert!(!registry.is_registered(IMAGE_ONLY_INTERCEPTOR));
        assert!(registry.run(&mut entry("cv.pdf", "application/pdf")).is_ok());

        drop(second);
        assert!(registry.is_registered(IMAGE_ONLY_INTERCEPTOR));
        assert!(!registry.is_suspended(IMAGE_ONLY_INTERCEPTOR));
        assert!(registry.run(&mut entry("cv.pdf", "application/pdf")).is_err());
    }

    #[test]
    fn test_registration_during_suspension_is_kept() {
        let registry = InterceptorRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        register_profile_interceptor(&registry, true);

        {
            let _guard = registry.suspend(IMAGE_ONLY_INTERCEPTOR);
            registry.register(
                IMAGE_ONLY_INTERCEPTOR,
                1,
                Arc::new(Counting(calls.clone(), "-replaced")),
            );
        }

        let mut file = entry("cv.pdf", "application/pdf");
        registry.run(&mut file).unwrap();
        assert_eq!(file.name, "cv.pdf-replaced");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suspend_does_not_register_absent_interceptor() {
        let registry = InterceptorRegistry::new();
        assert!(!register_profile_interceptor(&registry, false));

        drop(registry.suspend(IMAGE_ONLY_INTERCEPTOR));
        assert!(!registry.is_registered(IMAGE_ONLY_INTERCEPTOR));
        assert!(!registry.is_suspended(IMAGE_ONLY_INTERCEPTOR));
    }

    #[test]
    fn test_suspend_restores_after_panic() {
        let registry = InterceptorRegistry::new();
        register_profile_interceptor(&registry, true);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = registry.suspend(IMAGE_ONLY_INTERCEPTOR);
            panic!("storage blew up");
        }));

        assert!(result.is_err());
        assert!(registry.is_registered(IMAGE_ONLY_INTERCEPTOR));
    }

    struct Counting(Arc<AtomicUsize>, &'static str);

    impl UploadInterceptor for Counting {
        fn prefilter(&self, file: &mut NormalizedFileEntry) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            file.name = format!("{}{}", file.name, self.1);
            Ok(())
        }
    }

    #[test]
    fn test_run_in_priority_order() {
        let registry = InterceptorRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register("late", 20, Arc::new(Counting(calls.clone(), "-late")));
        registry.register("early", 5, Arc::new(Counting(calls.clone(), "-early")));

        let mut file = entry("x", "text/plain");
        registry.run(&mut file).unwrap();
        assert_eq!(file.name, "x-early-late");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(registry.unregister("late"));
        assert!(!registry.unregister("late"));
    }
}
