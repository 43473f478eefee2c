use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ChromiumSection, FlagsSection, SweepConfig};

use super::error::{BrowserError, BrowserResult};
use super::page::ChromiumPage;

/// Chromium drops this symlink into a profile it currently owns.
const PROFILE_LOCK: &str = "SingletonLock";

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

/// Starts Chromium on an already logged-in profile directory. Session
/// acquisition happens elsewhere; this only reuses what is on disk.
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<SweepConfig>,
}

impl BrowserLauncher {
    pub fn new(config: Arc<SweepConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        self.launch_with_overrides(LaunchOverrides::default()).await
    }

    pub async fn launch_with_overrides(
        &self,
        overrides: LaunchOverrides,
    ) -> BrowserResult<BrowserAutomation> {
        let profile_dir = Path::new(&self.config.chromium.user_data_dir);
        check_profile(profile_dir)?;
        let headless = overrides.headless.unwrap_or(self.config.chromium.headless);
        let chromium_config = self.chromium_config(headless)?;
        info!(
            profile = %profile_dir.display(),
            headless,
            "launching chromium on signed-in profile"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler event failed");
                }
            }
        });

        Ok(BrowserAutomation {
            browser,
            handler_task: Some(handler_task),
            config: Arc::clone(&self.config),
        })
    }

    fn chromium_config(&self, headless: bool) -> BrowserResult<ChromiumConfig> {
        let chromium = &self.config.chromium;
        let [width, height] = chromium.window_size;
        let mut builder = ChromiumConfig::builder()
            .user_data_dir(&chromium.user_data_dir)
            .viewport(ChromiumViewport {
                width,
                height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: width >= height,
                has_touch: false,
            })
            .args(launch_args(chromium, &self.config.flags));

        // Empty path lets chromiumoxide look the binary up itself.
        if !chromium.executable_path.is_empty() {
            builder = builder.chrome_executable(&chromium.executable_path);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !chromium.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = chromium.tab_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }
        builder.build().map_err(BrowserError::Configuration)
    }
}

fn check_profile(profile_dir: &Path) -> BrowserResult<()> {
    if !profile_dir.is_dir() {
        return Err(BrowserError::Configuration(format!(
            "profile directory {} does not exist; sign in first",
            profile_dir.display()
        )));
    }
    if profile_dir.join(PROFILE_LOCK).symlink_metadata().is_ok() {
        warn!(
            profile = %profile_dir.display(),
            "profile looks locked by another chromium; launch may fail"
        );
    }
    Ok(())
}

/// Command-line switches on top of chromiumoxide's defaults.
fn launch_args(chromium: &ChromiumSection, flags: &FlagsSection) -> Vec<String> {
    let [width, height] = chromium.window_size;
    let mut args = vec![format!("--window-size={width},{height}")];
    if chromium.disable_gpu {
        args.push("--disable-gpu".into());
    }
    if flags.mute_audio {
        args.push("--mute-audio".into());
    }
    // Timelines autoplay video; blocking it keeps probes from stalling.
    if !flags.autoplay_policy.is_empty() {
        args.push(format!("--autoplay-policy={}", flags.autoplay_policy));
    }
    if let Some(lang) = &flags.lang {
        args.push(format!("--lang={lang}"));
    }
    if let Some(accept) = &flags.accept_language {
        args.push(format!("--accept-lang={accept}"));
    }
    if !flags.disable_blink_features.is_empty() {
        args.push(format!(
            "--disable-blink-features={}",
            flags.disable_blink_features.join(",")
        ));
    }
    if flags.no_first_run {
        args.push("--no-first-run".into());
    }
    if flags.disable_automation_controlled {
        args.push("--disable-features=AutomationControlled".into());
    }
    // A background tab must keep its timers or the pacing sleeps drift.
    args.push("--disable-background-timer-throttling".into());
    args.push("--disable-renderer-backgrounding".into());
    args.push("--password-store=basic".into());
    args
}

fn language_script(lang: &str) -> String {
    let primary = lang.split('-').next().unwrap_or(lang);
    format!(
        "Object.defineProperty(navigator, 'language', {{ get: () => '{lang}' }});\n\
         Object.defineProperty(navigator, 'languages', {{ get: () => ['{lang}', '{primary}'] }});"
    )
}

/// A running browser. Call [`BrowserAutomation::shutdown`] when done.
#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    config: Arc<SweepConfig>,
}

impl BrowserAutomation {
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub async fn new_page(&self) -> BrowserResult<ChromiumPage> {
        let page = self
            .browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        self.prepare_page(&page).await?;
        Ok(ChromiumPage::new(
            page,
            self.config.selectors.clone(),
            Duration::from_millis(self.config.timeouts.navigation_settle_ms),
        ))
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("closing chromium");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "chromium did not close cleanly");
        }
        if let Some(handle) = self.handler_task.take() {
            handle.await?;
        }
        Ok(())
    }

    async fn prepare_page(&self, page: &Page) -> BrowserResult<()> {
        page.enable_stealth_mode().await?;
        if let Some(lang) = &self.config.flags.lang {
            let params = AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(language_script(lang))
                .build()
                .map_err(BrowserError::Configuration)?;
            page.evaluate_on_new_document(params).await?;
        }
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("browser dropped without shutdown; chromium may linger");
            }
        }
    }
}
