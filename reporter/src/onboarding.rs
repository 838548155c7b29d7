//! Events tracked on the onboarding carousel, shown to first time users.

use crate::{ConsentGatedReporter, Disposition};
use walletmetrics_analytics::TrackedEvent;

pub const ONBOARDING_WELCOME_MESSAGE_VIEWED: &str = "Welcome Message Viewed";
pub const ONBOARDING_WELCOME_SCREEN_ENGAGEMENT: &str = "Welcome Screen Engagement";
pub const ONBOARDING_STARTED: &str = "Onboarding Started";

/// English titles of the carousel tabs, reported independent of the user's locale.
pub const CAROUSEL_TITLES: [&str; 3] = [
    "Welcome to MetaMask",
    "Manage your digital assets",
    "Your gateway to web3",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("carousel has {} tabs, there is no tab {0}", CAROUSEL_TITLES.len())]
    UnknownTab(usize),
}

/// Tracking side of the onboarding carousel.
///
/// Tabs are numbered from 1, the carousel starts on the first one.
pub struct OnboardingCarousel {
    reporter: ConsentGatedReporter,
    current_tab: usize,
}

impl OnboardingCarousel {
    pub fn new(reporter: ConsentGatedReporter) -> Self {
        Self { reporter, current_tab: 1 }
    }

    pub fn current_tab(&self) -> usize {
        self.current_tab
    }

    /// The carousel became visible.
    pub async fn shown(&self) -> Disposition {
        self.reporter
            .report(TrackedEvent::new(ONBOARDING_WELCOME_MESSAGE_VIEWED))
            .await
    }

    /// The user swiped to another tab, `index` being the zero based position of the new tab.
    pub async fn change_tab(&mut self, index: usize) -> Result<Disposition, Error> {
        let title = CAROUSEL_TITLES.get(index).ok_or_else(|| Error::UnknownTab(index.saturating_add(1)))?;
        self.current_tab = index + 1;

        Ok(self
            .reporter
            .report(TrackedEvent::new(ONBOARDING_WELCOME_SCREEN_ENGAGEMENT).with_property("message_title", *title))
            .await)
    }

    /// The user pressed "get started".
    pub async fn get_started(&self) -> Disposition {
        self.reporter.report(TrackedEvent::new(ONBOARDING_STARTED)).await
    }
}
