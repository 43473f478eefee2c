use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use rand::Rng;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::SelectorSection;
use crate::sweep::RawItem;

use super::driver::{Key, PageDriver, Scope};
use super::error::{BrowserError, BrowserResult};

const TARGET_ATTR: &str = "data-postsweep-target";

#[derive(Debug)]
pub struct ChromiumPage {
    page: Page,
    selectors: SelectorSection,
    settle: Duration,
    cursor: Point,
}

impl ChromiumPage {
    pub fn new(page: Page, selectors: SelectorSection, settle: Duration) -> Self {
        Self {
            page,
            selectors,
            settle,
            cursor: Point::new(0.0, 0.0),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> BrowserResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("failed to decode result: {err}")))
    }

    /// JS expression resolving `scope` to a root node (or `null`).
    fn scope_prelude(&self, scope: &Scope) -> String {
        let key = match scope {
            Scope::Page => "null".to_string(),
            Scope::Item(key) => js_string(key),
        };
        format!(
            "const __key = {key};
    const __root = (() => {{
        if (__key === null) return document;
        for (const item of document.querySelectorAll({item})) {{
            for (const link of item.querySelectorAll({permalink})) {{
                let path = '';
                try {{
                    path = new URL(link.getAttribute('href') || '', location.origin).pathname.toLowerCase();
                }} catch (_) {{
                    continue;
                }}
                if (path === __key || path.startsWith(__key + '/')) return item;
            }}
        }}
        return null;
    }})();",
            item = js_string(&self.selectors.item),
            permalink = js_string(&self.selectors.permalink),
        )
    }

    /// Eased cursor approach before a click, so input never teleports.
    async fn approach(&mut self, target: Point) -> BrowserResult<()> {
        let start = self.cursor;
        let (steps, step_delay, jitter) = {
            let mut rng = rand::thread_rng();
            let steps = rng.gen_range(8..=16usize);
            let delay = Duration::from_millis(rng.gen_range(8..=22));
            let jitter: Vec<(f64, f64)> = (0..steps)
                .map(|_| (rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2)))
                .collect();
            (steps, delay, jitter)
        };
        for (idx, (jx, jy)) in jitter.into_iter().enumerate() {
            let t = (idx + 1) as f64 / steps as f64;
            let eased = ease_in_out_cubic(t);
            let point = Point::new(
                start.x + (target.x - start.x) * eased + jx,
                start.y + (target.y - start.y) * eased + jy,
            );
            self.page.move_mouse(point).await?;
            sleep(step_delay).await;
        }
        self.page.move_mouse(target).await?;
        self.cursor = target;
        Ok(())
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: Key) -> BrowserResult<()> {
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.name())
            .code(key.name())
            .windows_virtual_key_code(key.virtual_key_code())
            .native_virtual_key_code(key.virtual_key_code())
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.execute(params).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        let navigation = async {
            self.page.goto(params).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        navigation.await.map_err(|err| BrowserError::Navigation {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        sleep(self.settle).await;
        Ok(())
    }

    async fn reload(&mut self) -> BrowserResult<()> {
        self.page.reload().await.map_err(|err| BrowserError::Navigation {
            url: "<reload>".to_string(),
            reason: err.to_string(),
        })?;
        sleep(self.settle).await;
        Ok(())
    }

    async fn snapshot_items(&mut self) -> BrowserResult<Vec<RawItem>> {
        let s = &self.selectors;
        let script = format!(
            "(() => {{
    const out = [];
    document.querySelectorAll({item}).forEach(item => {{
        const link = item.querySelector({permalink});
        const time = item.querySelector({timestamp});
        const text = item.querySelector({text});
        const author = item.querySelector({author});
        const context = item.querySelector({social});
        const contextLink = context ? (context.closest('a') || context.querySelector('a')) : null;
        const reply = item.querySelector({reply});
        const replyLink = reply ? reply.querySelector('a[href^=\"/\"]') : null;
        out.push({{
            permalink: link ? link.getAttribute('href') : null,
            datetime: time ? time.getAttribute('datetime') : null,
            text: text ? (text.innerText || text.textContent || '') : null,
            authorHref: author ? author.getAttribute('href') : null,
            socialContext: context ? (context.innerText || '').trim() : null,
            socialContextHref: contextLink ? contextLink.getAttribute('href') : null,
            replyContext: reply ? (reply.innerText || '').trim() : null,
            replyToHref: replyLink ? replyLink.getAttribute('href') : null,
        }});
    }});
    return out;
}})()",
            item = js_string(&s.item),
            permalink = js_string(&s.permalink),
            timestamp = js_string(&s.timestamp),
            text = js_string(&s.text),
            author = js_string(&s.author_link),
            social = js_string(&s.social_context),
            reply = js_string(&s.reply_context),
        );
        let items: Vec<RawItem> = self.eval(&script).await?;
        trace!(count = items.len(), "item snapshot");
        Ok(items)
    }

    async fn count(&mut self, scope: &Scope, selector: &str) -> BrowserResult<usize> {
        let script = format!(
            "(() => {{
    {prelude}
    return __root ? __root.querySelectorAll({selector}).length : 0;
}})()",
            prelude = self.scope_prelude(scope),
            selector = js_string(selector),
        );
        self.eval(&script).await
    }

    async fn texts(&mut self, scope: &Scope, selector: &str) -> BrowserResult<Vec<String>> {
        let script = format!(
            "(() => {{
    {prelude}
    if (!__root) return [];
    return Array.from(__root.querySelectorAll({selector}))
        .map(node => (node.innerText || node.textContent || '').trim());
}})()",
            prelude = self.scope_prelude(scope),
            selector = js_string(selector),
        );
        self.eval(&script).await
    }

    async fn click(&mut self, scope: &Scope, selector: &str, index: usize) -> BrowserResult<()> {
        let script = format!(
            "(() => {{
    document.querySelectorAll('[{attr}]').forEach(node => node.removeAttribute('{attr}'));
    {prelude}
    if (!__root) return false;
    const node = __root.querySelectorAll({selector})[{index}];
    if (!node) return false;
    node.setAttribute('{attr}', '1');
    node.scrollIntoView({{ block: 'center', behavior: 'instant' }});
    return true;
}})()",
            attr = TARGET_ATTR,
            prelude = self.scope_prelude(scope),
            selector = js_string(selector),
        );
        let marked: bool = self.eval(&script).await?;
        if !marked {
            return Err(BrowserError::ElementNotFound(format!(
                "{selector}[{index}] in {scope}"
            )));
        }
        let element = self.page.find_element(format!("[{TARGET_ATTR}]")).await?;
        let point = element.clickable_point().await?;
        self.approach(point).await?;
        element.click().await?;
        let cleanup = format!(
            "document.querySelectorAll('[{TARGET_ATTR}]').forEach(node => node.removeAttribute('{TARGET_ATTR}'));"
        );
        if let Err(err) = self.page.evaluate(cleanup.as_str()).await {
            debug!(error = %err, "failed to clear click marker");
        }
        Ok(())
    }

    async fn press_key(&mut self, key: Key) -> BrowserResult<()> {
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        sleep(Duration::from_millis(rand::thread_rng().gen_range(40..=110))).await;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn scroll_by(&mut self, delta_y: f64) -> BrowserResult<()> {
        let js = format!("window.scrollBy({{ top: {delta_y}, behavior: 'smooth' }});");
        self.page.evaluate(js.as_str()).await.map_err(|err| {
            BrowserError::Script(format!("failed to execute scroll script: {err}"))
        })?;
        Ok(())
    }

    async fn wheel(&mut self, delta_y: f64) -> BrowserResult<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(self.cursor.x.max(1.0))
            .y(self.cursor.y.max(1.0))
            .delta_x(0.0)
            .delta_y(delta_y)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn scroll_to_top(&mut self) -> BrowserResult<()> {
        self.page
            .evaluate("window.scrollTo({ top: 0, behavior: 'instant' });")
            .await
            .map_err(|err| BrowserError::Script(format!("failed to scroll to top: {err}")))?;
        Ok(())
    }

    async fn content_extent(&mut self) -> BrowserResult<u64> {
        let extent: f64 = self
            .eval("Math.round(window.scrollY + window.innerHeight)")
            .await?;
        Ok(extent.max(0.0) as u64)
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
