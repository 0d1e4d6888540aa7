//! Test doubles for the crawler: scripted DOM fragments and a scripted
//! page driver. Everything here builds a MOCK, feeds it to the FUNCTION
//! under test, and lets the test assert on the OUTPUT.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use headless_client::{DomNode, PageDriver, Result, WaitOutcome};

use murmur_common::Record;

use crate::selectors;

/// A minimal record for store and thread tests.
pub fn record(id: &str) -> Record {
    Record {
        id: id.to_string(),
        url: format!("https://nitter.net/tester/status/{id}"),
        author_handle: "@tester".to_string(),
        author_display_name: "Tester".to_string(),
        body_text: format!("body {id}"),
        published_at: String::new(),
        engagement: BTreeMap::new(),
        media: None,
        reply_target_handles: None,
        reply_target_id: None,
        source_endpoint: "https://nitter.net".to_string(),
        fetched_at: Utc::now(),
        page_found: 1,
        thread_position: None,
        thread_size: None,
        thread_key: None,
    }
}

/// Start building one scripted post fragment.
pub fn frag() -> FragmentSpec {
    FragmentSpec::default()
}

#[derive(Debug, Default, Clone)]
pub struct FragmentSpec {
    permalink_href: Option<String>,
    data_id: Option<String>,
    author: Option<String>,
    fullname: Option<String>,
    body: Option<String>,
    date_title: Option<String>,
    reply_to: Vec<String>,
    parent_href: Option<String>,
    media: Vec<String>,
    stats: Vec<(String, String)>,
}

impl FragmentSpec {
    pub fn permalink(mut self, href: &str) -> Self {
        self.permalink_href = Some(href.to_string());
        self
    }

    pub fn data_id(mut self, id: &str) -> Self {
        self.data_id = Some(id.to_string());
        self
    }

    pub fn author(mut self, handle: &str) -> Self {
        self.author = Some(handle.to_string());
        self
    }

    pub fn fullname(mut self, name: &str) -> Self {
        self.fullname = Some(name.to_string());
        self
    }

    pub fn body(mut self, text: &str) -> Self {
        self.body = Some(text.to_string());
        self
    }

    pub fn date(mut self, title: &str) -> Self {
        self.date_title = Some(title.to_string());
        self
    }

    pub fn replying_to(mut self, handles: &[&str]) -> Self {
        self.reply_to = handles.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn parent(mut self, href: &str) -> Self {
        self.parent_href = Some(href.to_string());
        self
    }

    pub fn media(mut self, srcs: &[&str]) -> Self {
        self.media = srcs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn stat(mut self, name: &str, value: &str) -> Self {
        self.stats.push((name.to_string(), value.to_string()));
        self
    }

    fn has_reply_signals(&self) -> bool {
        !self.reply_to.is_empty() || self.parent_href.is_some()
    }
}

/// Turn a fragment spec into a DOM node usable against the extractors.
pub fn fragment_node(spec: FragmentSpec) -> Box<dyn DomNode> {
    Box::new(MockNode::Fragment(Arc::new(spec)))
}

fn text_node(text: &str) -> Box<dyn DomNode> {
    Box::new(MockNode::Text {
        text: text.to_string(),
        attrs: HashMap::new(),
    })
}

fn attr_node(name: &str, value: &str) -> Box<dyn DomNode> {
    Box::new(MockNode::Text {
        text: String::new(),
        attrs: HashMap::from([(name.to_string(), value.to_string())]),
    })
}

enum MockNode {
    Fragment(Arc<FragmentSpec>),
    Text {
        text: String,
        attrs: HashMap<String, String>,
    },
    ReplyingTo(Arc<FragmentSpec>),
    Attachments(Arc<FragmentSpec>),
    Stat {
        value: String,
    },
    LoadMore {
        state: Arc<Mutex<DriverState>>,
    },
}

#[async_trait]
impl DomNode for MockNode {
    async fn query(&self, selector: &str) -> Result<Option<Box<dyn DomNode>>> {
        let MockNode::Fragment(spec) = self else {
            if let MockNode::ReplyingTo(spec) = self {
                if selector == selectors::REPLY_PARENT {
                    return Ok(spec
                        .parent_href
                        .as_deref()
                        .map(|href| attr_node("href", href)));
                }
            }
            return Ok(None);
        };

        if selector == selectors::PERMALINK {
            return Ok(spec
                .permalink_href
                .as_deref()
                .map(|href| attr_node("href", href)));
        }
        if selector == selectors::BODY {
            return Ok(spec
                .data_id
                .as_deref()
                .map(|id| attr_node(selectors::ID_ATTR, id)));
        }
        if selector == selectors::USERNAME {
            return Ok(spec.author.as_deref().map(text_node));
        }
        if selector == selectors::FULLNAME {
            return Ok(spec.fullname.as_deref().map(text_node));
        }
        if selector == selectors::CONTENT {
            return Ok(spec.body.as_deref().map(text_node));
        }
        if selector == selectors::DATE_LINK {
            return Ok(spec
                .date_title
                .as_deref()
                .map(|title| attr_node("title", title)));
        }
        if selector == selectors::REPLYING_TO {
            if spec.has_reply_signals() {
                return Ok(Some(Box::new(MockNode::ReplyingTo(spec.clone()))));
            }
            return Ok(None);
        }
        if selector == selectors::ATTACHMENTS {
            if !spec.media.is_empty() {
                return Ok(Some(Box::new(MockNode::Attachments(spec.clone()))));
            }
            return Ok(None);
        }
        for (name, icon) in selectors::STAT_ICONS {
            if selector == *icon {
                return Ok(spec
                    .stats
                    .iter()
                    .find(|(stat, _)| stat == name)
                    .map(|(_, value)| {
                        Box::new(MockNode::Stat {
                            value: value.clone(),
                        }) as Box<dyn DomNode>
                    }));
            }
        }
        Ok(None)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn DomNode>>> {
        match self {
            MockNode::ReplyingTo(spec) if selector == "a" => Ok(spec
                .reply_to
                .iter()
                .map(|handle| text_node(&format!("@{handle}")))
                .collect()),
            MockNode::Attachments(spec) if selector == "img" => Ok(spec
                .media
                .iter()
                .map(|src| attr_node("src", src))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        match self {
            MockNode::Text { attrs, .. } => Ok(attrs.get(name).cloned()),
            _ => Ok(None),
        }
    }

    async fn inner_text(&self) -> Result<String> {
        match self {
            MockNode::Text { text, .. } => Ok(text.clone()),
            _ => Ok(String::new()),
        }
    }

    async fn call_js(&self, function: &str) -> Result<serde_json::Value> {
        match self {
            MockNode::Stat { value } => Ok(serde_json::Value::String(value.clone())),
            MockNode::LoadMore { state } if function.contains("click") => {
                let mut state = state.lock().unwrap();
                state.clicks += 1;
                state.advance_page();
                Ok(serde_json::Value::Null)
            }
            _ => Ok(serde_json::Value::Null),
        }
    }

    async fn click(&self) -> Result<()> {
        if let MockNode::LoadMore { state } = self {
            let mut state = state.lock().unwrap();
            state.clicks += 1;
            state.advance_page();
        }
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        Ok(())
    }
}

/// Start building one scripted results page.
pub fn page_spec(content: &str) -> PageSpec {
    PageSpec {
        fragments: Vec::new(),
        content: content.to_string(),
        load_more: false,
    }
}

#[derive(Debug, Default, Clone)]
pub struct PageSpec {
    fragments: Vec<FragmentSpec>,
    content: String,
    load_more: bool,
}

impl PageSpec {
    pub fn fragment(mut self, spec: FragmentSpec) -> Self {
        self.fragments.push(spec);
        self
    }

    /// Render a load-more control at the end of the page. Clicking it
    /// moves the driver to the next scripted page.
    pub fn with_load_more(mut self) -> Self {
        self.load_more = true;
        self
    }
}

#[derive(Default)]
struct DriverState {
    pages: Vec<PageSpec>,
    current: usize,
    navigations: Vec<String>,
    /// That many leading navigations land on pages serving nothing,
    /// regardless of the scripted pages. Exercises endpoint failover.
    dead_navigations: usize,
    clicks: u32,
    scrolls: u32,
    screenshots: Vec<String>,
}

impl DriverState {
    fn advance_page(&mut self) {
        if self.current + 1 < self.pages.len() {
            self.current += 1;
        }
    }

    fn live(&self) -> bool {
        self.navigations.len() > self.dead_navigations
    }

    fn current_page(&self) -> Option<&PageSpec> {
        self.pages.get(self.current)
    }
}

/// A scripted page driver: navigations succeed, results appear per the
/// scripted pages, and every interaction is recorded for assertions.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<DriverState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, spec: PageSpec) -> Self {
        self.state.lock().unwrap().pages.push(spec);
        self
    }

    pub fn dead_navigations(self, count: usize) -> Self {
        self.state.lock().unwrap().dead_navigations = count;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn clicks(&self) -> u32 {
        self.state.lock().unwrap().clicks
    }

    pub fn scrolls(&self) -> u32 {
        self.state.lock().unwrap().scrolls
    }

    pub fn screenshots(&self) -> Vec<String> {
        self.state.lock().unwrap().screenshots.clone()
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.state.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> WaitOutcome {
        let state = self.state.lock().unwrap();
        if selector == selectors::FRAGMENT
            && state.live()
            && state.current_page().is_some_and(|p| !p.fragments.is_empty())
        {
            WaitOutcome::Found
        } else {
            WaitOutcome::TimedOut
        }
    }

    async fn wait_for_count(
        &self,
        selector: &str,
        more_than: usize,
        _timeout: Duration,
    ) -> WaitOutcome {
        let mut state = self.state.lock().unwrap();
        if selector != selectors::FRAGMENT || state.current + 1 >= state.pages.len() {
            return WaitOutcome::TimedOut;
        }
        state.advance_page();
        let count = state
            .current_page()
            .map(|p| p.fragments.len())
            .unwrap_or_default();
        if count > more_than {
            WaitOutcome::Found
        } else {
            WaitOutcome::TimedOut
        }
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn DomNode>>> {
        let state = self.state.lock().unwrap();
        // Only the first load-more selector ever matches, so callers that
        // respect the priority order find the control immediately.
        if selector == selectors::LOAD_MORE[0]
            && state.current_page().is_some_and(|p| p.load_more)
        {
            return Ok(Some(Box::new(MockNode::LoadMore {
                state: self.state.clone(),
            })));
        }
        Ok(None)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn DomNode>>> {
        let state = self.state.lock().unwrap();
        if selector != selectors::FRAGMENT {
            return Ok(Vec::new());
        }
        Ok(state
            .current_page()
            .map(|p| {
                p.fragments
                    .iter()
                    .map(|spec| {
                        Box::new(MockNode::Fragment(Arc::new(spec.clone()))) as Box<dyn DomNode>
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state
            .current_page()
            .map(|p| p.content.clone())
            .unwrap_or_default())
    }

    async fn evaluate(&self, _js: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.state.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .screenshots
            .push(path.display().to_string());
        Ok(())
    }
}
