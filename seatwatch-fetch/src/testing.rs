//! Fakes shared by this crate's unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::browser::{BrowserLauncher, BrowserSession, LaunchOptions, NavigationResponse};
use crate::context::WaitCondition;
use crate::error::BrowserError;
use crate::host::cookie_store::Cookie;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BrowserEvent {
    Launched,
    Navigated(String),
    Closed,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    events: Mutex<Vec<BrowserEvent>>,
    launches: Mutex<Vec<LaunchOptions>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeState {
    fn push(&self, event: BrowserEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn events(&self) -> Vec<BrowserEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn launches(&self) -> Vec<LaunchOptions> {
        self.launches.lock().unwrap().clone()
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrowserEvent::Navigated(url) => Some(url),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct FakePage {
    prefix: String,
    response: NavigationResponse,
    body: String,
}

pub(crate) struct FakeLauncher {
    state: Arc<FakeState>,
    cookies: Vec<Cookie>,
    pages: Vec<FakePage>,
    navigation_delay: Duration,
    fail_launch: bool,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            cookies: Vec::new(),
            pages: Vec::new(),
            navigation_delay: Duration::ZERO,
            fail_launch: false,
        }
    }

    pub(crate) fn state(&self) -> Arc<FakeState> {
        Arc::clone(&self.state)
    }

    pub(crate) fn with_cookie(mut self, name: &str, value: &str, domain: &str) -> Self {
        self.cookies.push(Cookie::new(name, value, domain));
        self
    }

    pub(crate) fn with_page(mut self, prefix: &str, status: u16, body: &str) -> Self {
        self.pages.push(FakePage {
            prefix: prefix.to_string(),
            response: NavigationResponse {
                status: Some(status),
                status_text: if status == 200 { "OK" } else { "Error" }.to_string(),
            },
            body: body.to_string(),
        });
        self
    }

    pub(crate) fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    pub(crate) fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::Launch("no chromium in test".into()));
        }
        self.state.launches.lock().unwrap().push(options.clone());
        self.state.push(BrowserEvent::Launched);
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(active, Ordering::SeqCst);

        Ok(Arc::new(FakeSession {
            state: Arc::clone(&self.state),
            cookies: self.cookies.clone(),
            pages: self.pages.clone(),
            navigation_delay: self.navigation_delay,
            body: Mutex::new(String::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSession {
    state: Arc<FakeState>,
    cookies: Vec<Cookie>,
    pages: Vec<FakePage>,
    navigation_delay: Duration,
    body: Mutex<String>,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(
        &self,
        url: &str,
        _wait: WaitCondition,
    ) -> Result<NavigationResponse, BrowserError> {
        self.state.push(BrowserEvent::Navigated(url.to_string()));
        if !self.navigation_delay.is_zero() {
            tokio::time::sleep(self.navigation_delay).await;
        }

        let page = self.pages.iter().find(|p| url.starts_with(&p.prefix));
        let (response, body) = match page {
            Some(page) => (page.response.clone(), page.body.clone()),
            None => (
                NavigationResponse {
                    status: Some(200),
                    status_text: "OK".into(),
                },
                String::new(),
            ),
        };
        *self.body.lock().unwrap() = body;
        Ok(response)
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        Ok(self.cookies.clone())
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        Ok(self.body.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.push(BrowserEvent::Closed);
            self.state.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// A `name=value` cookie value long enough to pass the default policy.
pub(crate) fn long_value(len: usize) -> String {
    "v".repeat(len)
}
