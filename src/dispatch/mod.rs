use crate::{
    config::{FilenameSetting, SettingsSource},
    download::{build_config, BackendKind, Downloader},
    media::{make_file_name, MediaDescriptor, MediaSource, PostReference},
    session::{CookieProvider, CookieQuery},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The two places a download can be sent to.
pub struct Backends {
    browser: Arc<dyn Downloader>,
    aria2: Arc<dyn Downloader>,
}

impl Backends {
    pub fn new(browser: Arc<dyn Downloader>, aria2: Arc<dyn Downloader>) -> Self {
        Self { browser, aria2 }
    }

    pub fn get(&self, kind: BackendKind) -> &dyn Downloader {
        match kind {
            BackendKind::Browser => self.browser.as_ref(),
            BackendKind::Aria2 => self.aria2.as_ref(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Backend ids of the accepted downloads, in post order.
    pub submitted: Vec<String>,
    pub failed: usize,
}

/// Turns a post reference into one download per attached media item.
pub struct Dispatcher {
    cookies: Arc<dyn CookieProvider>,
    media: Arc<dyn MediaSource>,
    settings: Arc<dyn SettingsSource>,
    backends: Backends,
    cookie_domain: String,
}

impl Dispatcher {
    pub fn new(
        cookies: Arc<dyn CookieProvider>,
        media: Arc<dyn MediaSource>,
        settings: Arc<dyn SettingsSource>,
        backends: Backends,
        cookie_domain: &str,
    ) -> Self {
        Self {
            cookies,
            media,
            settings,
            backends,
            cookie_domain: cookie_domain.to_string(),
        }
    }

    /// Any failure before the per-item loop aborts the whole post. Inside the
    /// loop a bad item is logged and skipped.
    pub async fn handle(
        &self,
        post: &PostReference,
        external_manager_enabled: bool,
    ) -> Result<DispatchReport> {
        info!("Dispatching downloads for {}", post);

        let query = CookieQuery::session(&self.cookie_domain);
        let session = self
            .cookies
            .fetch_cookie(&query)
            .await
            .with_context(|| format!("Failed to get session cookie from {}", self.cookies.name()))?;

        let media_list = self
            .media
            .fetch_media_list(&post.post_id, &session)
            .await
            .with_context(|| format!("Failed to list media of {} via {}", post, self.media.name()))?;
        if media_list.is_empty() {
            return Err(anyhow::anyhow!("Post {} has no media", post));
        }

        let setting = self
            .settings
            .fetch_file_name_setting()
            .await
            .context("Failed to load filename setting")?;

        let kind = BackendKind::from_external_manager(external_manager_enabled);
        let backend = self.backends.get(kind);
        debug!("Using {} backend for {} items", backend.name(), media_list.len());

        let mut report = DispatchReport::default();
        for (index, raw_url) in media_list.iter().enumerate() {
            match self
                .dispatch_item(post, raw_url, index, &setting, kind, backend)
                .await
            {
                Ok(id) => report.submitted.push(id),
                Err(e) => {
                    warn!("Skipping media {} of {}: {:#}", index + 1, post, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Finished {}: {} submitted, {} failed",
            post,
            report.submitted.len(),
            report.failed
        );
        Ok(report)
    }

    async fn dispatch_item(
        &self,
        post: &PostReference,
        raw_url: &str,
        index: usize,
        setting: &FilenameSetting,
        kind: BackendKind,
        backend: &dyn Downloader,
    ) -> Result<String> {
        let media = MediaDescriptor::new(post, raw_url, index)?;
        let path = make_file_name(&media, setting);
        let config = build_config(media.source_url(), &path, kind);

        debug!("{} -> {}", config.url(), config.destination());
        backend
            .submit(&config)
            .await
            .with_context(|| format!("{} rejected {}", backend.name(), config.url()))
    }

    /// Runs one dispatch as its own task. The outcome is only logged.
    pub fn spawn(
        self: &Arc<Self>,
        post: PostReference,
        external_manager_enabled: bool,
    ) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.handle(&post, external_manager_enabled).await {
                error!("Download of {} failed: {:#}", post, e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{FilenamePattern, SerialMode},
        download::DownloadConfig,
        session::Cookie,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeCookies(Option<&'static str>);

    #[async_trait]
    impl CookieProvider for FakeCookies {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_cookie(&self, query: &CookieQuery) -> Result<Cookie> {
            assert_eq!(query.name, "ct0");
            assert_eq!(query.domain, "twitter.com");
            let value = self.0.ok_or_else(|| anyhow::anyhow!("logged out"))?;
            Ok(Cookie {
                name: query.name.clone(),
                value: value.to_string(),
            })
        }
    }

    struct FakeMedia(Vec<&'static str>);

    #[async_trait]
    impl MediaSource for FakeMedia {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_media_list(&self, post_id: &str, session: &Cookie) -> Result<Vec<String>> {
            assert_eq!(post_id, "123");
            assert_eq!(session.value, "csrf");
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FakeSettings(SerialMode);

    #[async_trait]
    impl SettingsSource for FakeSettings {
        async fn fetch_file_name_setting(&self) -> Result<FilenameSetting> {
            Ok(FilenameSetting {
                directory: "dl".to_string(),
                filename_pattern: FilenamePattern {
                    account: true,
                    serial: self.0,
                },
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        seen: Mutex<Vec<DownloadConfig>>,
        reject: Option<&'static str>,
    }

    #[async_trait]
    impl Downloader for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn submit(&self, config: &DownloadConfig) -> Result<String> {
            if self.reject == Some(config.url()) {
                return Err(anyhow::anyhow!("rejected"));
            }
            let mut seen = self.seen.lock().unwrap();
            seen.push(config.clone());
            Ok(format!("{}-{}", self.name, seen.len()))
        }

        async fn test_availability(&self) -> bool {
            true
        }
    }

    struct Harness {
        dispatcher: Arc<Dispatcher>,
        browser: Arc<Recorder>,
        aria2: Arc<Recorder>,
    }

    fn harness(cookie: Option<&'static str>, media: Vec<&'static str>, serial: SerialMode) -> Harness {
        harness_with(cookie, media, serial, None)
    }

    fn harness_with(
        cookie: Option<&'static str>,
        media: Vec<&'static str>,
        serial: SerialMode,
        reject: Option<&'static str>,
    ) -> Harness {
        let browser = Arc::new(Recorder {
            name: "browser",
            reject,
            ..Default::default()
        });
        let aria2 = Arc::new(Recorder {
            name: "aria2",
            reject,
            ..Default::default()
        });
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(FakeCookies(cookie)),
            Arc::new(FakeMedia(media)),
            Arc::new(FakeSettings(serial)),
            Backends::new(browser.clone(), aria2.clone()),
            "twitter.com",
        ));
        Harness {
            dispatcher,
            browser,
            aria2,
        }
    }

    fn alice() -> PostReference {
        PostReference::new("alice", "123").unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_to_browser() {
        let h = harness(
            Some("csrf"),
            vec![
                "https://pbs.example/img.jpg?tag=x",
                "https://video.example/clip.mp4?tag=12",
            ],
            SerialMode::Order,
        );

        let report = h.dispatcher.handle(&alice(), false).await.unwrap();
        assert_eq!(report.submitted, vec!["browser-1", "browser-2"]);
        assert_eq!(report.failed, 0);

        let seen = h.browser.seen.lock().unwrap();
        assert_eq!(seen[0].url(), "https://pbs.example/img.jpg:orig");
        assert_eq!(seen[0].destination(), "dl/alice-123-01.jpg");
        assert_eq!(seen[1].url(), "https://video.example/clip.mp4");
        assert_eq!(seen[1].destination(), "dl/alice-123-02.mp4");
        assert!(h.aria2.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_to_aria2_with_file_names() {
        let h = harness(
            Some("csrf"),
            vec!["https://pbs.example/img.jpg?tag=x"],
            SerialMode::FileName,
        );

        let report = h.dispatcher.handle(&alice(), true).await.unwrap();
        assert_eq!(report.submitted, vec!["aria2-1"]);

        let seen = h.aria2.seen.lock().unwrap();
        assert_eq!(seen[0].kind(), BackendKind::Aria2);
        assert_eq!(seen[0].destination(), "dl/alice-123-img.jpg");
        assert!(h.browser.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_cookie_aborts() {
        let h = harness(None, vec!["https://pbs.example/img.jpg"], SerialMode::Order);
        let err = h.dispatcher.handle(&alice(), false).await.unwrap_err();
        assert!(format!("{err:#}").contains("logged out"), "{err:#}");
        assert!(h.browser.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_media_list_aborts() {
        let h = harness(Some("csrf"), vec![], SerialMode::Order);
        let err = h.dispatcher.handle(&alice(), false).await.unwrap_err();
        assert!(err.to_string().contains("no media"), "{err}");
    }

    #[tokio::test]
    async fn test_bad_items_are_skipped() {
        let h = harness_with(
            Some("csrf"),
            vec![
                "not a url",
                "https://pbs.example/a.jpg",
                "https://pbs.example/b.jpg",
            ],
            SerialMode::Order,
            Some("https://pbs.example/a.jpg:orig"),
        );

        let report = h.dispatcher.handle(&alice(), false).await.unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.submitted, vec!["browser-1"]);

        let seen = h.browser.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        // Ordinals follow the position in the post, not the number of successes.
        assert_eq!(seen[0].destination(), "dl/alice-123-03.jpg");
    }

    #[tokio::test]
    async fn test_spawned_dispatches_run_independently() {
        let h = harness(Some("csrf"), vec!["https://pbs.example/img.jpg"], SerialMode::Order);

        let tasks: Vec<_> = (0..3)
            .map(|_| h.dispatcher.spawn(alice(), false))
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(h.browser.seen.lock().unwrap().len(), 3);

        let failing = harness(None, vec![], SerialMode::Order);
        failing.dispatcher.spawn(alice(), false).await.unwrap();
    }
}
